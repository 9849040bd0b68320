//! Chunk quality scoring and the accept/promote gate.

use crate::config::QualityGateConfig;
use crate::error::Result;
use crate::types::{Chunk, QualityScores};
use std::collections::HashSet;

const SEMANTIC_BASELINE: f32 = 0.6;
const MAX_EMBEDDED_SPANS: usize = 5;

const TECHNICAL_TERMS: &[&str] = &[
    "api", "function", "class", "config", "install", "error", "parameter", "return", "database",
    "server", "model", "token", "query", "endpoint", "module", "library", "request", "schema",
];

const ACTIONABLE_CUES: &[&str] = &[
    "how to", "example", "step", "run ", "use ", "install", "configure", "create", "must",
    "should", "note",
];

/// Optional embedding backend for semantic coherence
pub trait SentenceEmbedder: Send + Sync {
    fn embed(&self, spans: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Computes semantic, structural and retrieval scores for chunk text
pub struct QualityScorer {
    embedder: Option<Box<dyn SentenceEmbedder>>,
}

impl QualityScorer {
    pub fn new(embedder: Option<Box<dyn SentenceEmbedder>>) -> Self {
        Self { embedder }
    }

    pub fn score(&self, text: &str, token_count: usize) -> QualityScores {
        QualityScores::new(
            self.semantic(text),
            structural_score(text),
            retrieval_score(text, token_count),
        )
    }

    fn semantic(&self, text: &str) -> f32 {
        let spans = sentence_like_spans(text);
        if let Some(embedder) = &self.embedder {
            let head: Vec<&str> = spans.iter().take(MAX_EMBEDDED_SPANS).copied().collect();
            if head.len() >= 2 {
                match embedder.embed(&head) {
                    Ok(vectors) => {
                        if let Some(score) = mean_pairwise_cosine(&vectors) {
                            return score;
                        }
                    }
                    Err(err) => log::debug!("Sentence embedding failed, using heuristic: {err}"),
                }
            }
        }
        heuristic_coherence(&spans)
    }
}

fn sentence_like_spans(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|span| !span.is_empty())
        .collect()
}

/// Longer, lexically diverse sentences score higher; short or repeated ones lower
fn heuristic_coherence(spans: &[&str]) -> f32 {
    if spans.is_empty() {
        return 0.0;
    }
    let words: Vec<String> = spans
        .iter()
        .flat_map(|span| span.split_whitespace())
        .map(str::to_lowercase)
        .collect();
    let avg_len = words.len() as f32 / spans.len() as f32;

    let mut score = SEMANTIC_BASELINE;
    score += if avg_len >= 12.0 {
        0.15
    } else if avg_len >= 6.0 {
        0.05
    } else if avg_len < 3.0 {
        -0.15
    } else {
        0.0
    };

    score += (lexical_diversity(&words) - 0.5) * 0.4;

    let unique_spans: HashSet<&str> = spans.iter().copied().collect();
    let duplicate_ratio = 1.0 - unique_spans.len() as f32 / spans.len() as f32;
    score - duplicate_ratio * 0.3
}

fn mean_pairwise_cosine(vectors: &[Vec<f32>]) -> Option<f32> {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            total += cosine(a, b)?;
            pairs += 1;
        }
    }
    (pairs > 0).then(|| total / pairs as f32)
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

fn lexical_diversity(words: &[String]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&String> = words.iter().collect();
    unique.len() as f32 / words.len() as f32
}

fn is_list_line(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("+ ") {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (line[digits..].starts_with(". ") || line[digits..].starts_with(") "))
}

fn structural_score(text: &str) -> f32 {
    let mut score = 0.4;
    if text.trim_start().starts_with('#') {
        score += 0.3;
    }
    if text.lines().any(|line| line.trim_start().starts_with('#')) {
        score += 0.2;
    }
    if text.lines().any(is_list_line) {
        score += 0.1;
    }
    let last = text.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("");
    let last = last.trim();
    let terminated = last.ends_with(['.', '!', '?']) || last.starts_with('#');
    if !terminated {
        score -= 0.2;
    }
    score
}

/// Peaks at 500-1500 tokens and decays linearly outside that band
fn length_fitness(tokens: usize) -> f32 {
    let t = tokens as f32;
    if t < 500.0 {
        t / 500.0
    } else if t <= 1500.0 {
        1.0
    } else {
        (1.0 - (t - 1500.0) / 1500.0).max(0.0)
    }
}

fn retrieval_score(text: &str, token_count: usize) -> f32 {
    let lowered = text.to_lowercase();
    let words: Vec<String> = lowered.split_whitespace().map(str::to_string).collect();
    let technical = TECHNICAL_TERMS.iter().any(|term| lowered.contains(term));
    let actionable = ACTIONABLE_CUES.iter().any(|cue| lowered.contains(cue));

    0.3 * lexical_diversity(&words)
        + if technical { 0.2 } else { 0.0 }
        + if actionable { 0.2 } else { 0.0 }
        + 0.3 * length_fitness(token_count)
}

/// Result of gating one document's chunks
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    /// Accepted chunks in index order
    pub accepted: Vec<Chunk>,
    pub rejected: usize,
    pub promoted: usize,
}

/// Accepts chunks meeting every threshold and promotes the best rejects when none do
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityGateConfig,
}

impl QualityGate {
    #[must_use]
    pub const fn new(config: QualityGateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn passes(&self, scores: &QualityScores) -> bool {
        scores.semantic >= self.config.semantic_threshold
            && scores.structural >= self.config.structural_threshold
            && scores.retrieval_quality >= self.config.retrieval_threshold
    }

    /// Number of rejects promoted when nothing is accepted
    #[must_use]
    pub fn promotion_count(&self, rejected: usize) -> usize {
        let by_ratio = (rejected as f64 * f64::from(self.config.fallback_ratio)).floor() as usize;
        by_ratio.min(self.config.fallback_cap).max(1).min(rejected)
    }

    pub fn apply(&self, chunks: Vec<Chunk>) -> GateOutcome {
        if !self.config.enabled {
            return GateOutcome {
                accepted: chunks,
                ..Default::default()
            };
        }

        let (accepted, mut rejected): (Vec<Chunk>, Vec<Chunk>) = chunks
            .into_iter()
            .partition(|chunk| self.passes(&chunk.advanced_scores));
        let rejected_count = rejected.len();

        if !accepted.is_empty() || rejected.is_empty() {
            return GateOutcome {
                accepted,
                rejected: rejected_count,
                promoted: 0,
            };
        }

        let promote = self.promotion_count(rejected.len());
        rejected.sort_by(|a, b| {
            b.advanced_scores
                .overall
                .total_cmp(&a.advanced_scores.overall)
        });
        rejected.truncate(promote);

        for chunk in &mut rejected {
            chunk.quality_fallback = true;
            chunk.quality_note = Some(format!(
                "Promoted after no chunk passed the quality gate (overall {:.3}; semantic {:.2}/{:.2}, structural {:.2}/{:.2}, retrieval {:.2}/{:.2})",
                chunk.advanced_scores.overall,
                chunk.advanced_scores.semantic,
                self.config.semantic_threshold,
                chunk.advanced_scores.structural,
                self.config.structural_threshold,
                chunk.advanced_scores.retrieval_quality,
                self.config.retrieval_threshold,
            ));
        }
        rejected.sort_by_key(|chunk| chunk.chunk_index);
        log::debug!("Promoted {promote} of {rejected_count} rejected chunks");

        GateOutcome {
            accepted: rejected,
            rejected: rejected_count - promote,
            promoted: promote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentType, SparseFeatures};

    fn chunk(index: usize, semantic: f32, structural: f32, retrieval: f32) -> Chunk {
        Chunk {
            chunk_id: format!("doc-{index:04}"),
            document_id: "doc".to_string(),
            chunk_index: index,
            text: format!("chunk {index}"),
            section_path: Vec::new(),
            token_count: 2,
            char_count: 7,
            start_char: 0,
            end_char: 7,
            chunking_strategy: "hierarchical_balanced_structural".to_string(),
            content_type: ContentType::HierarchicalSection,
            backend: "structural".to_string(),
            language: None,
            within_token_limit: true,
            content_hash: String::new(),
            document_category: "general".to_string(),
            keywords: Vec::new(),
            sparse_features: SparseFeatures::default(),
            advanced_scores: QualityScores::new(semantic, structural, retrieval),
            quality_fallback: false,
            quality_note: None,
        }
    }

    #[test]
    fn structural_score_rules() {
        assert!((structural_score("# Title\nSome text.") - 0.9).abs() < 1e-6);
        assert!((structural_score("plain text without end") - 0.2).abs() < 1e-6);
        assert!((structural_score("Intro:\n- item one.") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn length_fitness_band() {
        assert!((length_fitness(250) - 0.5).abs() < 1e-6);
        assert!((length_fitness(1000) - 1.0).abs() < 1e-6);
        assert!((length_fitness(2250) - 0.5).abs() < 1e-6);
        assert!(length_fitness(5000).abs() < 1e-6);
    }

    #[test]
    fn scores_are_bounded() {
        let scorer = QualityScorer::new(None);
        for text in ["", "a", "# H\n- x\n1. y", "word word word word word word.", "```\n}\n```"] {
            let scores = scorer.score(text, 3000);
            for value in [
                scores.semantic,
                scores.structural,
                scores.retrieval_quality,
                scores.overall,
            ] {
                assert!((0.0..=1.0).contains(&value), "{text:?} -> {value}");
            }
        }
    }

    #[test]
    fn repeated_sentences_score_lower() {
        let scorer = QualityScorer::new(None);
        let varied = scorer.score(
            "The parser reads tokens from the stream. Each token carries its source span.",
            20,
        );
        let repeated = scorer.score("Same words here. Same words here. Same words here.", 20);
        assert!(varied.semantic > repeated.semantic);
    }

    struct ParallelEmbedder;

    impl SentenceEmbedder for ParallelEmbedder {
        fn embed(&self, spans: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(spans.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn embedder_drives_semantic_score() {
        let scorer = QualityScorer::new(Some(Box::new(ParallelEmbedder)));
        let scores = scorer.score("One. Two. Three.", 3);
        assert!((scores.semantic - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gate_accepts_chunks_meeting_all_thresholds() {
        let gate = QualityGate::new(QualityGateConfig::default());
        let outcome = gate.apply(vec![chunk(0, 0.9, 0.9, 0.9), chunk(1, 0.9, 0.1, 0.9)]);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.promoted, 0);
        assert!(!outcome.accepted[0].quality_fallback);
    }

    #[test]
    fn gate_promotes_top_fraction_when_nothing_passes() {
        let gate = QualityGate::new(QualityGateConfig::default());
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk(i, 0.1, 0.05 * i as f32, 0.1))
            .collect();
        let outcome = gate.apply(chunks);

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.promoted, 2);
        assert_eq!(outcome.rejected, 8);
        let indices: Vec<usize> = outcome.accepted.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![8, 9]);
        assert!(outcome.accepted.iter().all(|c| c.quality_fallback));
        assert!(outcome.accepted.iter().all(|c| c.quality_note.is_some()));
    }

    #[test]
    fn promotion_count_bounds() {
        let gate = QualityGate::new(QualityGateConfig {
            fallback_cap: 3,
            ..Default::default()
        });
        assert_eq!(gate.promotion_count(1), 1);
        assert_eq!(gate.promotion_count(3), 1);
        assert_eq!(gate.promotion_count(8), 2);
        assert_eq!(gate.promotion_count(100), 3);
    }

    #[test]
    fn disabled_gate_accepts_everything() {
        let gate = QualityGate::new(QualityGateConfig {
            enabled: false,
            ..Default::default()
        });
        let outcome = gate.apply(vec![chunk(0, 0.0, 0.0, 0.0)]);
        assert_eq!(outcome.accepted.len(), 1);
        assert!(!outcome.accepted[0].quality_fallback);
    }
}
