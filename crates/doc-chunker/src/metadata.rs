use crate::config::MetadataConfig;
use crate::types::{SparseFeatures, TermWeight};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

const DOCUMENT_ID_LEN: usize = 16;
const CONTENT_HASH_LEN: usize = 16;
const MIN_TERM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "her", "was", "one",
    "our", "out", "has", "have", "had", "his", "how", "its", "may", "new", "now", "see", "who",
    "did", "get", "let", "use", "that", "this", "with", "from", "they", "will", "would", "there",
    "their", "what", "when", "which", "into", "than", "then", "them", "these", "those", "been",
    "were", "also", "each", "such", "only", "other", "some", "more", "most", "very", "your",
];

/// Stable id of a document: hash of its normalized path, or of its text when unnamed
#[must_use]
pub fn document_id(filename: &str, text: &str) -> String {
    let normalized = normalize_path(filename);
    let mut hasher = Sha256::new();
    if normalized.is_empty() {
        hasher.update(text.as_bytes());
    } else {
        hasher.update(normalized.as_bytes());
    }
    hex_prefix(&hasher.finalize(), DOCUMENT_ID_LEN)
}

#[must_use]
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{document_id}-{index:04}")
}

/// First 16 hex chars of the SHA-1 of `text`
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex_prefix(&hasher.finalize(), CONTENT_HASH_LEN)
}

fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut out: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    out.truncate(len);
    out
}

/// Lowercased alphanumeric terms of at least three characters, stopwords removed
pub(crate) fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
}

/// Derives sparse features and keywords according to [`MetadataConfig`]
#[derive(Debug, Clone)]
pub struct MetadataEnricher {
    config: MetadataConfig,
}

impl MetadataEnricher {
    #[must_use]
    pub const fn new(config: MetadataConfig) -> Self {
        Self { config }
    }

    /// Top terms by frequency, weight = count / total; ties by first appearance.
    ///
    /// Returns an empty value when sparse features are disabled.
    #[must_use]
    pub fn sparse_features(&self, text: &str) -> SparseFeatures {
        if !self.config.sparse_features {
            return SparseFeatures::default();
        }
        rank_terms(text, self.config.top_terms)
    }

    /// Section-path terms followed by the most frequent text terms, deduplicated.
    ///
    /// Returns an empty list when keywords are disabled.
    #[must_use]
    pub fn keywords(&self, section_path: &[String], text: &str) -> Vec<String> {
        if !self.config.keywords {
            return Vec::new();
        }

        let section_terms = section_path
            .iter()
            .filter(|entry| !entry.contains(':') || entry.contains(' '))
            .flat_map(|entry| terms(entry).collect::<Vec<_>>());
        let top_terms = rank_terms(text, self.config.max_keywords)
            .term_weights
            .into_iter()
            .map(|tw| tw.term);

        let mut seen = HashSet::new();
        section_terms
            .chain(top_terms)
            .filter(|term| seen.insert(term.clone()))
            .take(self.config.max_keywords)
            .collect()
    }
}

fn rank_terms(text: &str, limit: usize) -> SparseFeatures {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut total = 0usize;
    for (position, term) in terms(text).enumerate() {
        total += 1;
        counts.entry(term).or_insert((0, position)).0 += 1;
    }

    let unique_terms = counts.len();
    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let term_weights = ranked
        .into_iter()
        .take(limit)
        .map(|(term, count, _)| TermWeight {
            term,
            weight: count as f32 / total.max(1) as f32,
        })
        .collect();

    SparseFeatures {
        term_weights,
        unique_terms,
        total_terms: total,
    }
}
