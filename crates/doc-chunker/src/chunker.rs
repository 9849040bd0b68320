use crate::backend::{BackendSelector, Capabilities, Route};
use crate::classifier::ContentClassifier;
use crate::config::EngineConfig;
use crate::convert::{ConvertedDocument, DocumentConverter, PlainTextConverter};
use crate::error::{ChunkerError, Result};
use crate::language::{BundledGrammars, GrammarCache, GrammarProvider, Language};
use crate::metadata::{self, MetadataEnricher};
use crate::models::{BuiltinModels, ModelRegistry, ModelSpec, DEFAULT_MAX_TOKENS};
use crate::quality::{QualityGate, QualityScorer, SentenceEmbedder};
use crate::report::{ChunkingOutcome, ProcessReport, ValidationReport};
use crate::splitter::{
    RawChunk, SemanticChunker, SemanticSplitter, SplitContext, SplitTrace, Splitters,
    StructuralSplitter, SyntaxSplitter, TextSplitterChunker,
};
use crate::strategy::{ChunkingStrategy, StrategyRegistry};
use crate::structure::{fenced_segments, parse_heading, StructureDetector};
use crate::tokens::{HfTokenCounter, TokenCounter, WordTokenCounter};
use crate::types::{Chunk, ContentType};
use std::path::Path;

/// Category recorded when the caller picks the strategy
const OVERRIDE_CATEGORY: &str = "override";

/// Hierarchical, model-aware chunking engine; immutable after construction
pub struct ChunkingEngine {
    config: EngineConfig,
    model: ModelSpec,
    strategies: StrategyRegistry,
    counter: Box<dyn TokenCounter>,
    detector: StructureDetector,
    classifier: ContentClassifier,
    selector: BackendSelector,
    splitters: Splitters,
    enricher: MetadataEnricher,
    scorer: QualityScorer,
    gate: QualityGate,
    converter: Box<dyn DocumentConverter>,
}

/// Collaborators injected into [`ChunkingEngine`]; anything unset gets its built-in default
pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<Box<dyn ModelRegistry>>,
    token_counter: Option<Box<dyn TokenCounter>>,
    grammars: Option<Box<dyn GrammarProvider>>,
    semantic_chunker: Option<Box<dyn SemanticChunker>>,
    sentence_embedder: Option<Box<dyn SentenceEmbedder>>,
    converter: Option<Box<dyn DocumentConverter>>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Some(Box::new(BuiltinModels::new())),
            token_counter: None,
            grammars: None,
            semantic_chunker: None,
            sentence_embedder: None,
            converter: None,
        }
    }

    /// Resolve models against `registry` instead of the built-in table
    #[must_use]
    pub fn registry(mut self, registry: Box<dyn ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run without any model registry; the default budget applies
    #[must_use]
    pub fn without_registry(mut self) -> Self {
        self.registry = None;
        self
    }

    #[must_use]
    pub fn token_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    #[must_use]
    pub fn grammars(mut self, grammars: Box<dyn GrammarProvider>) -> Self {
        self.grammars = Some(grammars);
        self
    }

    #[must_use]
    pub fn semantic_chunker(mut self, chunker: Box<dyn SemanticChunker>) -> Self {
        self.semantic_chunker = Some(chunker);
        self
    }

    #[must_use]
    pub fn sentence_embedder(mut self, embedder: Box<dyn SentenceEmbedder>) -> Self {
        self.sentence_embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: Box<dyn DocumentConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Validate the configuration, resolve the model and probe backend capabilities.
    ///
    /// Fails on an unknown explicit model, a size override above the model budget, an unknown
    /// fallback language, or a tokenizer that cannot be loaded.
    pub fn build(self) -> Result<ChunkingEngine> {
        let config = self.config;
        config.validate().map_err(ChunkerError::InvalidConfig)?;

        let model = resolve_model(config.model.as_deref(), self.registry.as_deref())?;
        if let Some(max) = config.max_tokens_override {
            if max > model.max_tokens {
                return Err(ChunkerError::invalid_config(format!(
                    "max_tokens_override ({max}) exceeds the {} budget of {} tokens",
                    model.name, model.max_tokens
                )));
            }
        }
        if let Some(overlap) = config.overlap_tokens_override {
            if overlap >= model.max_tokens {
                return Err(ChunkerError::invalid_config(format!(
                    "overlap_tokens_override ({overlap}) must be smaller than the {} budget of {} tokens",
                    model.name, model.max_tokens
                )));
            }
        }

        let fallback_language = Language::from_name(&config.fallback_language);
        if fallback_language == Language::Unknown {
            return Err(ChunkerError::invalid_config(format!(
                "Unknown fallback_language '{}'",
                config.fallback_language
            )));
        }

        let counter: Box<dyn TokenCounter> = match (self.token_counter, &model.tokenizer_path) {
            (Some(counter), _) => counter,
            (None, Some(path)) => Box::new(HfTokenCounter::from_file(path)?),
            (None, None) => Box::new(WordTokenCounter::new()),
        };

        let semantic = if config.semantic_enabled {
            Some(
                self.semantic_chunker
                    .unwrap_or_else(|| Box::new(TextSplitterChunker)),
            )
        } else {
            None
        };
        let grammars = self
            .grammars
            .unwrap_or_else(|| Box::new(BundledGrammars));
        let splitters = Splitters::new(
            SemanticSplitter::new(semantic),
            SyntaxSplitter::new(GrammarCache::new(grammars), config.include_module_code),
        );

        let capabilities = Capabilities {
            syntax: config.syntax_enabled,
            semantic: splitters.semantic_available(),
        };
        let strategies = StrategyRegistry::for_budget(
            model.max_tokens,
            config.max_tokens_override,
            config.overlap_tokens_override,
        );

        log::debug!(
            "Engine ready: model {} ({} tokens), tokenizer {}, syntax {}, semantic {}",
            model.name,
            model.max_tokens,
            counter.name(),
            capabilities.syntax,
            capabilities.semantic
        );

        Ok(ChunkingEngine {
            model,
            strategies,
            counter,
            detector: StructureDetector::new(),
            classifier: ContentClassifier::new(),
            selector: BackendSelector::new(capabilities, fallback_language),
            splitters,
            enricher: MetadataEnricher::new(config.metadata.clone()),
            scorer: QualityScorer::new(self.sentence_embedder),
            gate: QualityGate::new(config.quality.clone()),
            converter: self
                .converter
                .unwrap_or_else(|| Box::new(PlainTextConverter)),
            config,
        })
    }
}

fn resolve_model(name: Option<&str>, registry: Option<&dyn ModelRegistry>) -> Result<ModelSpec> {
    let default = || ModelSpec::new("default", DEFAULT_MAX_TOKENS, 0);
    match (name, registry) {
        (None, _) => Ok(default()),
        (Some(name), None) => {
            log::warn!("No model registry available for '{name}', using the default budget");
            Ok(default())
        }
        (Some(name), Some(registry)) => {
            registry
                .resolve(name)
                .ok_or_else(|| ChunkerError::UnknownModel {
                    name: name.to_string(),
                    available: registry.available().join(", "),
                })
        }
    }
}

/// Everything derived per document before chunks are built
struct DocumentContext<'a> {
    filename: &'a str,
    document_id: String,
    category: &'a str,
    strategy: &'a ChunkingStrategy,
}

impl ChunkingEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn model(&self) -> &ModelSpec {
        &self.model
    }

    #[must_use]
    pub const fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    #[must_use]
    pub fn token_counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Chunk `text` with the classifier-selected strategy
    pub fn chunk(&self, text: &str, filename: &str) -> Result<Vec<Chunk>> {
        Ok(self.process(text, filename, None)?.chunks)
    }

    /// Convert and chunk a file
    pub fn process_file(
        &self,
        path: impl AsRef<Path>,
        strategy_override: Option<&str>,
    ) -> Result<ChunkingOutcome> {
        let path = path.as_ref();
        let document = self.converter.convert(path)?;
        let filename = path.to_string_lossy();
        self.process_converted(&document, &filename, strategy_override)
    }

    pub fn process(
        &self,
        text: &str,
        filename: &str,
        strategy_override: Option<&str>,
    ) -> Result<ChunkingOutcome> {
        self.process_converted(&ConvertedDocument::from_text(text), filename, strategy_override)
    }

    /// Chunk converted text, then append side-channel tables and figures
    pub fn process_converted(
        &self,
        document: &ConvertedDocument,
        filename: &str,
        strategy_override: Option<&str>,
    ) -> Result<ChunkingOutcome> {
        let text = document.text.as_str();
        let (category, strategy) = match strategy_override {
            Some(name) => {
                let strategy = self
                    .strategies
                    .get(name)
                    .ok_or_else(|| ChunkerError::UnknownStrategy(name.to_string()))?;
                (OVERRIDE_CATEGORY, strategy)
            }
            None => {
                let classification = self.classifier.classify(text, filename);
                let strategy = self
                    .strategies
                    .get(classification.strategy)
                    .unwrap_or_else(|| self.strategies.default_strategy());
                (classification.category, strategy)
            }
        };

        let doc = DocumentContext {
            filename,
            document_id: metadata::document_id(filename, text),
            category,
            strategy,
        };
        let mut report = ProcessReport {
            document_id: doc.document_id.clone(),
            document_category: category.to_string(),
            strategy: strategy.name.clone(),
            model_max_tokens: self.model.max_tokens,
            ..Default::default()
        };

        if text.trim().is_empty() && document.tables.is_empty() && document.figures.is_empty() {
            log::info!("Skipping empty document '{filename}'");
            return Ok(ChunkingOutcome {
                chunks: Vec::new(),
                report,
            });
        }

        let ctx = SplitContext {
            counter: self.counter.as_ref(),
            strategy,
        };
        let mut trace = SplitTrace::default();
        let mut raw_chunks: Vec<(Vec<String>, RawChunk)> = Vec::new();

        let blocks = self.detector.detect(text);
        report.blocks = blocks.len();
        for block in &blocks {
            for (offset, segment, route) in self.route_block(&block.text, filename) {
                let pieces = self.splitters.split(segment, route, &ctx, &mut trace);
                if pieces.is_empty() {
                    log::debug!("Block {:?} produced no chunks", block.heading_path);
                }
                raw_chunks.extend(pieces.into_iter().map(|piece| {
                    (
                        block.heading_path.clone(),
                        piece.offset_by(block.start_char + offset),
                    )
                }));
            }
        }
        raw_chunks.extend(self.side_channel_chunks(document, &ctx));
        report.fallbacks = trace.fallbacks;

        let chunks: Vec<Chunk> = raw_chunks
            .into_iter()
            .enumerate()
            .map(|(index, (heading_path, raw))| self.build_chunk(&doc, index, heading_path, raw))
            .collect();

        report.total_chunks = chunks.len();
        report.oversized_chunks = chunks.iter().filter(|c| !c.within_token_limit).count();
        for chunk in &chunks {
            *report.backend_usage.entry(chunk.backend.clone()).or_insert(0) += 1;
        }

        let outcome = self.gate.apply(chunks);
        report.accepted = outcome.accepted.len();
        report.rejected = outcome.rejected;
        report.promoted = outcome.promoted;

        if outcome.accepted.is_empty() {
            log::warn!("Document '{filename}' produced no chunks");
        } else {
            log::info!(
                "Chunked '{filename}' [{} / {}]: {} of {} chunks accepted ({} promoted, {} oversized, {} fallbacks)",
                report.document_category,
                report.strategy,
                report.accepted,
                report.total_chunks,
                report.promoted,
                report.oversized_chunks,
                report.fallbacks
            );
        }

        Ok(ChunkingOutcome {
            chunks: outcome.accepted,
            report,
        })
    }

    #[must_use]
    pub fn validate(&self, chunks: &[Chunk]) -> ValidationReport {
        ValidationReport::from_chunks(chunks, self.model.max_tokens)
    }

    /// Route a block whole, or per segment when it mixes prose and fenced code
    fn route_block<'t>(&self, text: &'t str, filename: &str) -> Vec<(usize, &'t str, Route)> {
        let segments = fenced_segments(text);
        let mixed = segments.iter().any(|s| s.fenced) && segments.iter().any(|s| !s.fenced);
        if !mixed {
            return vec![(0, text, self.selector.select(text, filename))];
        }

        segments
            .into_iter()
            .filter_map(|segment| {
                let slice = &text[segment.start..segment.end];
                let trimmed = slice.trim();
                if trimmed.is_empty() {
                    return None;
                }
                // the heading is already carried by section_path
                if !segment.fenced && !trimmed.contains('\n') && parse_heading(trimmed).is_some()
                {
                    return None;
                }
                Some((segment.start, slice, self.selector.select(slice, filename)))
            })
            .collect()
    }

    fn side_channel_chunks(
        &self,
        document: &ConvertedDocument,
        ctx: &SplitContext<'_>,
    ) -> Vec<(Vec<String>, RawChunk)> {
        let end = document.text.len();
        let mut out = Vec::new();

        for (idx, table) in document.tables.iter().enumerate() {
            let label = table
                .caption
                .clone()
                .unwrap_or_else(|| format!("Table {}", idx + 1));
            let text = match &table.caption {
                Some(caption) => format!("Table: {caption}\n\n{}", table.markdown),
                None => table.markdown.clone(),
            };
            for piece in StructuralSplitter.split(&text, ContentType::TableStructure, None, ctx) {
                out.push((vec![label.clone()], anchor_at(piece, end)));
            }
        }

        for (idx, figure) in document.figures.iter().enumerate() {
            let lines: Vec<String> = [
                figure.caption.as_ref().map(|c| format!("Figure: {c}")),
                figure.alt_text.as_ref().map(|a| format!("Alt text: {a}")),
                figure.path.as_ref().map(|p| format!("Source: {p}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            if figure.caption.is_none() && figure.alt_text.is_none() {
                continue;
            }
            let label = format!("Figure {}", idx + 1);
            for piece in
                StructuralSplitter.split(&lines.join("\n"), ContentType::FigureCaption, None, ctx)
            {
                out.push((vec![label.clone()], anchor_at(piece, end)));
            }
        }
        out
    }

    fn build_chunk(
        &self,
        doc: &DocumentContext<'_>,
        index: usize,
        mut section_path: Vec<String>,
        raw: RawChunk,
    ) -> Chunk {
        if let Some(suffix) = raw.section_suffix {
            section_path.push(suffix);
        }
        let token_count = self.counter.count(&raw.text);
        let within_token_limit = token_count <= self.model.max_tokens;
        if !within_token_limit {
            log::debug!(
                "Chunk {index} of '{}' has {token_count} tokens (model max {})",
                doc.filename,
                self.model.max_tokens
            );
        }

        Chunk {
            chunk_id: metadata::chunk_id(&doc.document_id, index),
            document_id: doc.document_id.clone(),
            chunk_index: index,
            char_count: raw.text.chars().count(),
            token_count,
            start_char: raw.start,
            end_char: raw.end,
            chunking_strategy: format!(
                "hierarchical_{}_{}",
                doc.strategy.name,
                raw.backend.label()
            ),
            content_type: raw.content_type,
            backend: raw.backend.label().to_string(),
            language: raw.language.map(|lang| lang.as_str().to_string()),
            within_token_limit,
            content_hash: metadata::content_hash(&raw.text),
            document_category: doc.category.to_string(),
            keywords: self.enricher.keywords(&section_path, &raw.text),
            sparse_features: self.enricher.sparse_features(&raw.text),
            advanced_scores: self.scorer.score(&raw.text, token_count),
            quality_fallback: false,
            quality_note: None,
            section_path,
            text: raw.text,
        }
    }
}

/// Side-channel chunks have no span in the text; anchor them at its end
fn anchor_at(mut piece: RawChunk, offset: usize) -> RawChunk {
    piece.start = offset;
    piece.end = offset;
    piece
}
