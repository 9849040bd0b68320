use crate::error::{ChunkerError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

/// Markup that tokenizers commonly reserve for control tokens.
static SPECIAL_TOKEN_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\|[^|>\s]{0,64}\|>|\[(?:CLS|SEP|PAD|UNK|MASK|BOS|EOS)\]|</?s>")
        .expect("special token pattern is valid")
});

const ZERO_WIDTH_SPACE: char = '\u{200b}';

/// Token-accurate sizing used by every splitter and the metadata enricher.
///
/// Implementations must never fail on arbitrary input: [`TokenCounter::encode`] tries the strict
/// path first and falls back to [`TokenCounter::encode_literal`], which treats special-token-like
/// substrings as plain text.
pub trait TokenCounter: Send + Sync {
    /// Short identifier used in logs and reports
    fn name(&self) -> &str;

    /// Strict encoding; may reject input containing control sequences
    fn try_encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Permissive encoding; never fails
    fn encode_literal(&self, text: &str) -> Vec<u32>;

    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn encode(&self, text: &str) -> Vec<u32> {
        match self.try_encode(text) {
            Ok(ids) => ids,
            Err(err) => {
                log::debug!("{}: strict encode failed ({err}), retrying permissively", self.name());
                self.encode_literal(text)
            }
        }
    }

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Dependency-free counter over Unicode word boundaries.
///
/// Every non-whitespace segment is one token and carries the whitespace that precedes it, so
/// decoding a contiguous id range reproduces the original text byte for byte.
#[derive(Default)]
pub struct WordTokenCounter {
    vocab: Mutex<Vocab>,
}

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, u32>,
    pieces: Vec<String>,
}

impl Vocab {
    fn intern(&mut self, piece: &str) -> u32 {
        if let Some(id) = self.ids.get(piece) {
            return *id;
        }
        let id = u32::try_from(self.pieces.len()).unwrap_or(u32::MAX);
        self.pieces.push(piece.to_string());
        self.ids.insert(piece.to_string(), id);
        id
    }
}

impl WordTokenCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pieces(text: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut pending: Option<usize> = None;
        for (idx, segment) in text.split_word_bound_indices() {
            if segment.chars().all(char::is_whitespace) {
                pending.get_or_insert(idx);
                continue;
            }
            let start = pending.take().unwrap_or(idx);
            out.push(&text[start..idx + segment.len()]);
        }
        if let Some(start) = pending {
            out.push(&text[start..]);
        }
        out
    }
}

impl TokenCounter for WordTokenCounter {
    fn name(&self) -> &str {
        "word"
    }

    fn try_encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.encode_literal(text))
    }

    fn encode_literal(&self, text: &str) -> Vec<u32> {
        let pieces = Self::pieces(text);
        let mut vocab = self.vocab.lock().unwrap_or_else(PoisonError::into_inner);
        pieces.into_iter().map(|piece| vocab.intern(piece)).collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let vocab = self.vocab.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for id in ids {
            let piece = vocab
                .pieces
                .get(*id as usize)
                .ok_or_else(|| ChunkerError::tokenizer(format!("unknown token id {id}")))?;
            out.push_str(piece);
        }
        Ok(out)
    }

    fn count(&self, text: &str) -> usize {
        Self::pieces(text).len()
    }
}

/// Hugging Face tokenizer loaded from a `tokenizer.json`.
pub struct HfTokenCounter {
    name: String,
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ChunkerError::tokenizer(format!("Failed to load tokenizer {}: {e}", path.display()))
        })?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| ChunkerError::tokenizer(format!("Tokenizer truncation failed: {e}")))?;

        let name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or("hf")
            .to_string();
        Ok(Self { name, tokenizer })
    }

    fn encode_raw(&self, text: &str) -> Result<Vec<u32>> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| ChunkerError::tokenizer(e.to_string()))
    }
}

impl TokenCounter for HfTokenCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_encode(&self, text: &str) -> Result<Vec<u32>> {
        self.encode_raw(text)
    }

    fn encode_literal(&self, text: &str) -> Vec<u32> {
        let neutralized = neutralize_special_tokens(text);
        if let Ok(ids) = self.encode_raw(&neutralized) {
            return ids;
        }

        let mut ids = Vec::new();
        for line in neutralized.split_inclusive('\n') {
            match self.encode_raw(line) {
                Ok(line_ids) => ids.extend(line_ids),
                Err(err) => log::warn!("{}: dropping unencodable line: {err}", self.name),
            }
        }
        ids
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, false)
            .map(|text| text.replace(ZERO_WIDTH_SPACE, ""))
            .map_err(|e| ChunkerError::tokenizer(e.to_string()))
    }
}

/// Break special-token markup so a tokenizer reads it as ordinary characters.
#[must_use]
pub fn neutralize_special_tokens(text: &str) -> String {
    SPECIAL_TOKEN_LIKE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            let mut chars = matched.chars();
            let first = chars.next().map(String::from).unwrap_or_default();
            format!("{first}{ZERO_WIDTH_SPACE}{}", chars.as_str())
        })
        .into_owned()
}
