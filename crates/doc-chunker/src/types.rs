use serde::{Deserialize, Serialize};

/// A retrieval-ready span of document text with metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `<document_id>-<index:04>`
    pub chunk_id: String,

    /// Stable hash of the normalized source path
    pub document_id: String,

    /// Position within the document, strictly increasing
    pub chunk_index: usize,

    /// Chunk text (non-empty, trimmed)
    pub text: String,

    /// Heading breadcrumb, optionally ending in `<language>:<node-type>`
    pub section_path: Vec<String>,

    pub token_count: usize,
    pub char_count: usize,

    /// Byte offsets into the original document (best effort for syntax/semantic backends)
    pub start_char: usize,
    pub end_char: usize,

    /// Strategy name plus backend suffix, e.g. `hierarchical_balanced_tree_sitter`
    pub chunking_strategy: String,

    pub content_type: ContentType,

    /// Backend label that produced this chunk
    pub backend: String,

    /// Language hint for code chunks
    #[serde(default)]
    pub language: Option<String>,

    /// `token_count` fits the model budget
    pub within_token_limit: bool,

    /// First 16 hex chars of the SHA-1 of `text`
    pub content_hash: String,

    /// Document category chosen by the classifier
    pub document_category: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub sparse_features: SparseFeatures,

    #[serde(default)]
    pub advanced_scores: QualityScores,

    /// Accepted only through fallback promotion
    #[serde(default)]
    pub quality_fallback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_note: Option<String>,
}

impl Chunk {
    /// Innermost heading, ignoring the synthetic syntax suffix
    #[must_use]
    pub fn heading(&self) -> Option<&str> {
        self.section_path
            .iter()
            .rev()
            .find(|entry| !entry.contains(':') || entry.contains(' '))
            .map(String::as_str)
    }

    /// Check if the chunk span covers a byte offset
    #[must_use]
    pub const fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start_char && offset < self.end_char
    }
}

/// Kind of content a chunk carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain heading section, structural fallback
    HierarchicalSection,
    CodeBlock,
    TableSection,
    ListSection,
    ProseSection,
    /// Table from the conversion side channel
    TableStructure,
    /// Figure caption from the conversion side channel
    FigureCaption,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HierarchicalSection => "hierarchical_section",
            Self::CodeBlock => "code_block",
            Self::TableSection => "table_section",
            Self::ListSection => "list_section",
            Self::ProseSection => "prose_section",
            Self::TableStructure => "table_structure",
            Self::FigureCaption => "figure_caption",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-chunk quality scores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityScores {
    pub semantic: f32,
    pub structural: f32,
    pub retrieval_quality: f32,
    pub overall: f32,
}

impl QualityScores {
    /// Clamp the components and derive `overall` as their mean
    #[must_use]
    pub fn new(semantic: f32, structural: f32, retrieval_quality: f32) -> Self {
        let semantic = clamp_unit(semantic);
        let structural = clamp_unit(structural);
        let retrieval_quality = clamp_unit(retrieval_quality);
        Self {
            semantic,
            structural,
            retrieval_quality,
            overall: clamp_unit((semantic + structural + retrieval_quality) / 3.0),
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Frequency-normalized lexical summary of a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseFeatures {
    pub term_weights: Vec<TermWeight>,
    pub unique_terms: usize,
    pub total_terms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermWeight {
    pub term: String,
    pub weight: f32,
}

/// Tabular data extracted by a document converter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableData {
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub caption: Option<String>,
    pub markdown: String,
}

/// Figure reference extracted by a document converter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FigureData {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_serializes_snake_case() {
        let json = serde_json::to_string(&ContentType::HierarchicalSection).unwrap();
        assert_eq!(json, "\"hierarchical_section\"");
        assert_eq!(ContentType::FigureCaption.to_string(), "figure_caption");
    }

    #[test]
    fn test_quality_scores_clamped() {
        let scores = QualityScores::new(1.4, -0.2, f32::NAN);
        assert!((scores.semantic - 1.0).abs() < f32::EPSILON);
        assert!(scores.structural.abs() < f32::EPSILON);
        assert!(scores.retrieval_quality.abs() < f32::EPSILON);
        assert!((scores.overall - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_heading_skips_syntax_suffix() {
        let chunk = Chunk {
            chunk_id: "doc-0000".to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            text: "def f(): pass".to_string(),
            section_path: vec!["Usage".to_string(), "python:function_definition".to_string()],
            token_count: 6,
            char_count: 13,
            start_char: 10,
            end_char: 23,
            chunking_strategy: "hierarchical_balanced_tree_sitter".to_string(),
            content_type: ContentType::CodeBlock,
            backend: "tree_sitter".to_string(),
            language: Some("python".to_string()),
            within_token_limit: true,
            content_hash: String::new(),
            document_category: "general".to_string(),
            keywords: Vec::new(),
            sparse_features: SparseFeatures::default(),
            advanced_scores: QualityScores::default(),
            quality_fallback: false,
            quality_note: None,
        };
        assert_eq!(chunk.heading(), Some("Usage"));
        assert!(chunk.contains_offset(10));
        assert!(!chunk.contains_offset(23));
    }
}
