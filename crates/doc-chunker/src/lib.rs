//! # Docprep Chunker
//!
//! Hierarchical, model-aware document chunking for retrieval-augmented generation.
//!
//! ## Philosophy
//!
//! The chunker creates retrieval units that:
//! - Respect document structure (heading breadcrumbs travel with every chunk)
//! - Fit the token budget of the target embedding model
//! - Keep code definitions whole where a grammar is available
//! - Never lose content: every backend failure degrades to structural splitting
//!
//! ## Architecture
//!
//! ```text
//! Document Text
//!     │
//!     ├──> Classification (keyword heuristic → category + strategy)
//!     │
//!     ├──> Structure Detection (headings → blocks with breadcrumbs)
//!     │
//!     ├──> Backend Selection per block
//!     │    ├─> tree_sitter  (code, whole definitions)
//!     │    ├─> semantic     (prose, sentence/paragraph boundaries)
//!     │    └─> structural   (greedy sentence packing, always available)
//!     │
//!     ├──> Enrichment
//!     │    ├─> ids, content hash, keywords, sparse term weights
//!     │    └─> semantic / structural / retrieval scores
//!     │
//!     └──> Quality Gate → Chunk[] + ProcessReport
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docprep_chunker::{ChunkingEngine, EngineConfig};
//!
//! let engine = ChunkingEngine::new(EngineConfig::default())?;
//! let outcome = engine.process("# Intro\nSome prose about chunking.", "notes.md", None)?;
//! for chunk in &outcome.chunks {
//!     println!(
//!         "{} {:?} [{}] {} tokens",
//!         chunk.chunk_id, chunk.section_path, chunk.backend, chunk.token_count
//!     );
//! }
//! # Ok::<(), docprep_chunker::ChunkerError>(())
//! ```

mod backend;
mod chunker;
mod classifier;
mod config;
mod convert;
mod error;
mod language;
mod metadata;
mod models;
mod quality;
mod report;
mod splitter;
mod strategy;
mod structure;
mod tokens;
mod types;

pub use backend::{Backend, BackendSelector, Capabilities, Route, OVERSIZED_NODE_CHAIN};
pub use chunker::{ChunkingEngine, EngineBuilder};
pub use classifier::{Classification, ContentClassifier};
pub use config::{EngineConfig, MetadataConfig, QualityGateConfig};
pub use convert::{ConvertedDocument, DocumentConverter, PlainTextConverter};
pub use error::{ChunkerError, Result};
pub use language::{BundledGrammars, GrammarCache, GrammarProvider, Language, NoGrammars};
pub use metadata::{chunk_id, content_hash, document_id, MetadataEnricher};
pub use models::{
    BuiltinModels, ManifestModels, ModelRegistry, ModelSpec, DEFAULT_MAX_TOKENS,
    DEFAULT_OVERLAP_TOKENS,
};
pub use quality::{GateOutcome, QualityGate, QualityScorer, SentenceEmbedder};
pub use report::{ChunkingOutcome, ChunkingStats, OversizedDetail, ProcessReport, ValidationReport};
pub use splitter::{SemanticChunker, SemanticPiece, TextSplitterChunker};
pub use strategy::{ChunkingStrategy, StrategyRegistry, DEFAULT_STRATEGY};
pub use structure::{ContentBlock, StructureDetector};
pub use tokens::{neutralize_special_tokens, HfTokenCounter, TokenCounter, WordTokenCounter};
pub use types::{
    Chunk, ContentType, FigureData, QualityScores, SparseFeatures, TableData, TermWeight,
};
