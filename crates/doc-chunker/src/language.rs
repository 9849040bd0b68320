use crate::error::{ChunkerError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Programming language hint for code content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Shell,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "sh" | "bash" | "zsh" => Language::Shell,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Resolve a name as written in a code fence info string or config
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" | "python3" => Language::Python,
            "javascript" | "node" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "golang" => Language::Go,
            "c++" => Language::Cpp,
            "c#" | "csharp" => Language::CSharp,
            "ruby" => Language::Ruby,
            "shell" | "console" => Language::Shell,
            other => Self::from_extension(other),
        }
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Shell => "shell",
            Language::Unknown => "unknown",
        }
    }

    /// Node kinds emitted as standalone chunks; outermost match wins
    pub fn target_node_types(self) -> &'static [&'static str] {
        match self {
            Language::Rust => &[
                "function_item",
                "impl_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "mod_item",
                "macro_definition",
            ],
            Language::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Language::JavaScript => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
            ],
            Language::TypeScript => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
                "abstract_class_declaration",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
            ],
            _ => &[],
        }
    }
}

/// Supplies tree-sitter grammars by language
pub trait GrammarProvider: Send + Sync {
    fn grammar(&self, language: Language) -> Result<tree_sitter::Language>;
}

/// Grammars linked into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledGrammars;

impl GrammarProvider for BundledGrammars {
    fn grammar(&self, language: Language) -> Result<tree_sitter::Language> {
        match language {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(ChunkerError::unsupported_language(language.as_str())),
        }
    }
}

/// Provider with no grammars; every language is unsupported
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGrammars;

impl GrammarProvider for NoGrammars {
    fn grammar(&self, language: Language) -> Result<tree_sitter::Language> {
        Err(ChunkerError::unsupported_language(language.as_str()))
    }
}

/// Memoizes grammar lookups so a failing language is disabled after one warning
pub struct GrammarCache {
    provider: Box<dyn GrammarProvider>,
    loaded: Mutex<HashMap<Language, Option<tree_sitter::Language>>>,
}

impl GrammarCache {
    pub fn new(provider: Box<dyn GrammarProvider>) -> Self {
        Self {
            provider,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, language: Language) -> Option<tree_sitter::Language> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        loaded
            .entry(language)
            .or_insert_with(|| match self.provider.grammar(language) {
                Ok(grammar) => Some(grammar),
                Err(err) => {
                    log::warn!(
                        "Grammar for {} unavailable, using structural fallback: {err}",
                        language.as_str()
                    );
                    None
                }
            })
            .clone()
    }
}
