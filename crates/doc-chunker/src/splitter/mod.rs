//! Splitting backends and the fallback chain that drives them.

mod semantic;
mod structural;
mod syntax;

pub use semantic::{SemanticChunker, SemanticPiece, SemanticSplitter, TextSplitterChunker};
pub use structural::StructuralSplitter;
pub use syntax::SyntaxSplitter;

use crate::backend::{Backend, Route};
use crate::error::ChunkerError;
use crate::language::Language;
use crate::strategy::ChunkingStrategy;
use crate::tokens::TokenCounter;
use crate::types::ContentType;
use thiserror::Error;

/// Splitter output before metadata enrichment; offsets are relative to the split input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Synthetic `<language>:<node-type>` section entry
    pub section_suffix: Option<String>,
    pub content_type: ContentType,
    pub backend: Backend,
    pub language: Option<Language>,
}

impl RawChunk {
    /// Shift offsets by the position of the split input in its parent text
    #[must_use]
    pub(crate) fn offset_by(mut self, base: usize) -> Self {
        self.start += base;
        self.end += base;
        self
    }
}

/// Per-block failure absorbed by the fallback chain
#[derive(Debug, Error)]
pub(crate) enum SplitError {
    #[error("{0} backend unavailable")]
    Unavailable(&'static str),

    #[error("{0}")]
    Failed(String),
}

impl From<ChunkerError> for SplitError {
    fn from(err: ChunkerError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Sizing inputs shared by every backend for one document
pub struct SplitContext<'a> {
    pub counter: &'a dyn TokenCounter,
    pub strategy: &'a ChunkingStrategy,
}

/// Fallback bookkeeping for one document
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitTrace {
    pub fallbacks: usize,
}

/// The three backends, wired so that syntax can recurse into the others
pub struct Splitters {
    structural: StructuralSplitter,
    semantic: SemanticSplitter,
    syntax: SyntaxSplitter,
}

impl Splitters {
    pub fn new(semantic: SemanticSplitter, syntax: SyntaxSplitter) -> Self {
        Self {
            structural: StructuralSplitter,
            semantic,
            syntax,
        }
    }

    pub fn semantic_available(&self) -> bool {
        self.semantic.is_available()
    }

    /// Split `text` along the route's fallback chain
    pub fn split(
        &self,
        text: &str,
        route: Route,
        ctx: &SplitContext<'_>,
        trace: &mut SplitTrace,
    ) -> Vec<RawChunk> {
        self.run_chain(route.backend.fallback_chain(), text, route, ctx, trace)
    }

    /// Try each backend in order; the structural splitter terminates every chain
    pub(crate) fn run_chain(
        &self,
        chain: &[Backend],
        text: &str,
        route: Route,
        ctx: &SplitContext<'_>,
        trace: &mut SplitTrace,
    ) -> Vec<RawChunk> {
        for backend in chain {
            let attempt = match backend {
                Backend::Syntax => self.syntax.split(text, route, ctx, self, trace),
                Backend::Semantic => self.semantic.split(text, route, ctx),
                Backend::Structural => {
                    return self.structural.split(text, route.content_type, route.language, ctx)
                }
            };

            match attempt {
                Ok(chunks) if !chunks.is_empty() => return chunks,
                Ok(_) => {
                    log::debug!("{} backend produced no chunks, trying next", backend.label());
                    trace.fallbacks += 1;
                }
                Err(SplitError::Unavailable(name)) => {
                    log::debug!("{name} backend unavailable, trying next");
                }
                Err(err) => {
                    log::warn!(
                        "{} backend failed, falling back: {err}",
                        backend.label()
                    );
                    trace.fallbacks += 1;
                }
            }
        }

        self.structural
            .split(text, route.content_type, route.language, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{GrammarCache, NoGrammars};
    use crate::strategy::StrategyRegistry;
    use crate::tokens::WordTokenCounter;

    struct FailingChunker;

    impl SemanticChunker for FailingChunker {
        fn name(&self) -> &str {
            "failing"
        }

        fn chunk(
            &self,
            _text: &str,
            _counter: &dyn TokenCounter,
            _max_tokens: usize,
            _overlap_tokens: usize,
        ) -> crate::Result<Vec<SemanticPiece>> {
            Err(crate::ChunkerError::semantic("boom"))
        }
    }

    #[test]
    fn failing_semantic_backend_falls_back_to_structural() {
        let splitters = Splitters::new(
            SemanticSplitter::new(Some(Box::new(FailingChunker))),
            SyntaxSplitter::new(GrammarCache::new(Box::new(NoGrammars)), false),
        );
        let registry = StrategyRegistry::for_budget(1024, None, None);
        let counter = WordTokenCounter::new();
        let ctx = SplitContext {
            counter: &counter,
            strategy: registry.default_strategy(),
        };
        let route = Route {
            backend: Backend::Semantic,
            content_type: ContentType::ProseSection,
            language: None,
        };
        let mut trace = SplitTrace::default();

        let chunks = splitters.split("Some prose. More prose.", route, &ctx, &mut trace);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].backend, Backend::Structural);
        assert_eq!(chunks[0].content_type, ContentType::ProseSection);
        assert_eq!(trace.fallbacks, 1);
    }
}
