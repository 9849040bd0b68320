use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_OVERSIZED_DETAILS: usize = 10;

/// Per-call processing summary, returned alongside the chunks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessReport {
    pub document_id: String,
    pub document_category: String,
    pub strategy: String,
    pub model_max_tokens: usize,
    pub blocks: usize,
    /// Chunks produced per backend label, before gating
    pub backend_usage: BTreeMap<String, usize>,
    /// Backend attempts that failed or yielded nothing and fell through the chain
    pub fallbacks: usize,
    pub total_chunks: usize,
    pub oversized_chunks: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub promoted: usize,
}

/// Chunks plus the report describing how they were produced
#[derive(Debug, Clone, Default)]
pub struct ChunkingOutcome {
    pub chunks: Vec<Chunk>,
    pub report: ProcessReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OversizedDetail {
    pub chunk_id: String,
    pub token_count: usize,
}

/// Token-limit compliance summary; informational only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub model_max_tokens: usize,
    /// First ten oversized chunks
    pub oversized_details: Vec<OversizedDetail>,
}

impl ValidationReport {
    #[must_use]
    pub fn from_chunks(chunks: &[Chunk], model_max_tokens: usize) -> Self {
        let oversized: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| chunk.token_count > model_max_tokens)
            .collect();

        Self {
            total: chunks.len(),
            valid: chunks.len() - oversized.len(),
            invalid: oversized.len(),
            model_max_tokens,
            oversized_details: oversized
                .into_iter()
                .take(MAX_OVERSIZED_DETAILS)
                .map(|chunk| OversizedDetail {
                    chunk_id: chunk.chunk_id.clone(),
                    token_count: chunk.token_count,
                })
                .collect(),
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub fallback_chunks: usize,
}

impl ChunkingStats {
    #[must_use]
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        Self {
            total_chunks: chunks.len(),
            total_tokens,
            avg_tokens_per_chunk: total_tokens.checked_div(chunks.len()).unwrap_or(0),
            min_tokens: chunks.iter().map(|c| c.token_count).min().unwrap_or(0),
            max_tokens: chunks.iter().map(|c| c.token_count).max().unwrap_or(0),
            fallback_chunks: chunks.iter().filter(|c| c.quality_fallback).count(),
        }
    }
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Tokens: {} | Avg: {} | Range: {}-{} | Fallback: {}",
            self.total_chunks,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.fallback_chunks
        )
    }
}
