use crate::language::Language;
use crate::structure::fence_marker;
use crate::types::ContentType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static CODE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:def|class|fn|pub|impl|struct|enum|trait|function|import|from|return|const|let|var|async|public|private|package|#include|use)\b",
    )
    .expect("code keyword pattern is valid")
});

static TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\|.*\|[ \t]*$").expect("table pattern is valid"));

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d{1,3}[.)])[ \t]+\S").expect("list pattern is valid")
});

/// Symbols that are rare in prose and dense in source code
const CODE_PUNCTUATION: &[char] = &['{', '}', '(', ')', ';', '=', '<', '>'];
const PUNCTUATION_DENSITY_THRESHOLD: f64 = 0.025;
const MIN_KEYWORD_HITS: usize = 2;

/// Splitting algorithm applied to a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Syntax,
    Semantic,
    Structural,
}

impl Backend {
    /// Label recorded on chunks and in `chunking_strategy`
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Syntax => "tree_sitter",
            Self::Semantic => "semantic",
            Self::Structural => "structural",
        }
    }

    /// Candidates tried in order until one produces chunks
    #[must_use]
    pub const fn fallback_chain(self) -> &'static [Backend] {
        match self {
            Self::Syntax => &[Self::Syntax, Self::Structural],
            Self::Semantic => &[Self::Semantic, Self::Structural],
            Self::Structural => &[Self::Structural],
        }
    }
}

/// Re-split chain for syntax nodes larger than the token budget
pub const OVERSIZED_NODE_CHAIN: &[Backend] = &[Backend::Semantic, Backend::Structural];

/// Routing decision for one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub backend: Backend,
    pub content_type: ContentType,
    pub language: Option<Language>,
}

impl Route {
    #[must_use]
    pub const fn structural(content_type: ContentType) -> Self {
        Self {
            backend: Backend::Structural,
            content_type,
            language: None,
        }
    }
}

/// Capabilities probed once when the engine is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub syntax: bool,
    pub semantic: bool,
}

/// Picks a backend per block from textual cues; a pure function of its inputs
#[derive(Debug, Clone)]
pub struct BackendSelector {
    capabilities: Capabilities,
    fallback_language: Language,
}

impl BackendSelector {
    #[must_use]
    pub const fn new(capabilities: Capabilities, fallback_language: Language) -> Self {
        Self {
            capabilities,
            fallback_language,
        }
    }

    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn select(&self, text: &str, filename: &str) -> Route {
        let file_language = Language::from_path(Path::new(filename));

        if file_language != Language::Unknown || looks_like_code(text) {
            let language = if file_language == Language::Unknown {
                self.fallback_language
            } else {
                file_language
            };
            let backend = if self.capabilities.syntax {
                Backend::Syntax
            } else {
                Backend::Structural
            };
            return Route {
                backend,
                content_type: ContentType::CodeBlock,
                language: Some(language),
            };
        }

        if TABLE_ROW.find_iter(text).nth(1).is_some() {
            return Route::structural(ContentType::TableSection);
        }

        if LIST_ITEM.is_match(text) {
            return Route::structural(ContentType::ListSection);
        }

        self.prose_route()
    }

    /// Route for prose that carries no code, table or list cues
    #[must_use]
    pub const fn prose_route(&self) -> Route {
        if self.capabilities.semantic {
            Route {
                backend: Backend::Semantic,
                content_type: ContentType::ProseSection,
                language: None,
            }
        } else {
            Route::structural(ContentType::HierarchicalSection)
        }
    }
}

fn looks_like_code(text: &str) -> bool {
    if text.lines().any(|line| fence_marker(line).is_some()) {
        return true;
    }
    if CODE_KEYWORD.find_iter(text).take(MIN_KEYWORD_HITS).count() >= MIN_KEYWORD_HITS {
        return true;
    }
    punctuation_density(text) > PUNCTUATION_DENSITY_THRESHOLD
}

fn punctuation_density(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let hits = text.chars().filter(|c| CODE_PUNCTUATION.contains(c)).count();
    hits as f64 / total as f64
}
