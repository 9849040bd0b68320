use super::{RawChunk, SplitContext, SplitError};
use crate::backend::{Backend, Route};
use crate::error::{ChunkerError, Result};
use crate::tokens::TokenCounter;
use text_splitter::{ChunkConfig, ChunkSizer, TextSplitter};

/// One boundary-aware piece, with its byte offset when the chunker reports one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticPiece {
    pub text: String,
    pub offset: Option<usize>,
}

/// Pluggable semantic-boundary chunker
pub trait SemanticChunker: Send + Sync {
    fn name(&self) -> &str;

    /// Split `text` into pieces of at most `max_tokens` as measured by `counter`
    fn chunk(
        &self,
        text: &str,
        counter: &dyn TokenCounter,
        max_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<SemanticPiece>>;
}

/// Sizes candidate chunks with the engine's token counter
struct CounterSizer<'a>(&'a dyn TokenCounter);

impl ChunkSizer for CounterSizer<'_> {
    fn size(&self, chunk: &str) -> usize {
        self.0.count(chunk)
    }
}

/// [`SemanticChunker`] backed by the `text-splitter` crate's Unicode boundary levels
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSplitterChunker;

impl SemanticChunker for TextSplitterChunker {
    fn name(&self) -> &str {
        "text-splitter"
    }

    fn chunk(
        &self,
        text: &str,
        counter: &dyn TokenCounter,
        max_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<SemanticPiece>> {
        let config = ChunkConfig::new(max_tokens.max(1))
            .with_sizer(CounterSizer(counter))
            .with_overlap(overlap_tokens.min(max_tokens.saturating_sub(1)))
            .map_err(|e| ChunkerError::semantic(e.to_string()))?
            .with_trim(true);
        let splitter = TextSplitter::new(config);

        Ok(splitter
            .chunk_indices(text)
            .map(|(offset, piece)| SemanticPiece {
                text: piece.to_string(),
                offset: Some(offset),
            })
            .collect())
    }
}

/// Adapter running an optional [`SemanticChunker`] as a splitting backend
pub struct SemanticSplitter {
    chunker: Option<Box<dyn SemanticChunker>>,
}

impl SemanticSplitter {
    pub fn new(chunker: Option<Box<dyn SemanticChunker>>) -> Self {
        Self { chunker }
    }

    pub fn is_available(&self) -> bool {
        self.chunker.is_some()
    }

    pub(crate) fn split(
        &self,
        text: &str,
        route: Route,
        ctx: &SplitContext<'_>,
    ) -> std::result::Result<Vec<RawChunk>, SplitError> {
        let chunker = self
            .chunker
            .as_ref()
            .ok_or(SplitError::Unavailable("semantic"))?;

        let pieces = chunker
            .chunk(
                text,
                ctx.counter,
                ctx.strategy.max_tokens,
                ctx.strategy.overlap_tokens,
            )
            .map_err(|e| SplitError::Failed(format!("{}: {e}", chunker.name())))?;

        let mut chunks = Vec::with_capacity(pieces.len());
        let mut cursor = 0;
        for piece in pieces {
            let trimmed = piece.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let start = resolve_offset(text, &piece, trimmed, cursor);
            let end = (start + trimmed.len()).min(text.len());
            cursor = start;
            chunks.push(RawChunk {
                text: trimmed.to_string(),
                start,
                end,
                section_suffix: None,
                content_type: route.content_type,
                backend: Backend::Semantic,
                language: route.language,
            });
        }
        Ok(chunks)
    }
}

/// Reported offset when it points at the piece, otherwise a forward search from the last piece
fn resolve_offset(text: &str, piece: &SemanticPiece, trimmed: &str, cursor: usize) -> usize {
    if let Some(offset) = piece.offset {
        let lead = piece.text.len() - piece.text.trim_start().len();
        let start = offset + lead;
        if text.get(start..start + trimmed.len()) == Some(trimmed) {
            return start;
        }
    }
    text.get(cursor..)
        .and_then(|rest| rest.find(trimmed))
        .map_or(cursor.min(text.len()), |found| cursor + found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ChunkingStrategy;
    use crate::tokens::WordTokenCounter;
    use crate::types::ContentType;

    fn ctx_strategy(max_tokens: usize) -> ChunkingStrategy {
        ChunkingStrategy {
            name: "test".to_string(),
            max_tokens,
            overlap_tokens: 0,
            min_section_tokens: 1,
            description: String::new(),
        }
    }

    fn prose_route() -> Route {
        Route {
            backend: Backend::Semantic,
            content_type: ContentType::ProseSection,
            language: None,
        }
    }

    #[test]
    fn text_splitter_respects_budget_and_offsets() {
        let counter = WordTokenCounter::new();
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        let strategy = ctx_strategy(8);
        let ctx = SplitContext {
            counter: &counter,
            strategy: &strategy,
        };

        let splitter = SemanticSplitter::new(Some(Box::new(TextSplitterChunker)));
        let chunks = splitter.split(text, prose_route(), &ctx).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.count(&chunk.text) <= 8);
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
            assert_eq!(chunk.backend, Backend::Semantic);
        }
    }

    #[test]
    fn missing_chunker_is_unavailable() {
        let counter = WordTokenCounter::new();
        let strategy = ctx_strategy(8);
        let ctx = SplitContext {
            counter: &counter,
            strategy: &strategy,
        };
        let splitter = SemanticSplitter::new(None);
        assert!(!splitter.is_available());
        assert!(matches!(
            splitter.split("text", prose_route(), &ctx),
            Err(SplitError::Unavailable(_))
        ));
    }

    #[test]
    fn offsets_are_recovered_without_reported_positions() {
        let text = "one two one two";
        let piece = SemanticPiece {
            text: "one two".to_string(),
            offset: None,
        };
        assert_eq!(resolve_offset(text, &piece, "one two", 0), 0);
        assert_eq!(resolve_offset(text, &piece, "one two", 1), 8);
    }
}
