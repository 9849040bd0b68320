use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while configuring or running the chunking engine
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Explicitly requested model is absent from the registry
    #[error("Unknown embedding model '{name}'. Available: {available}")]
    UnknownModel { name: String, available: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Strategy override names no registered strategy
    #[error("Unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    /// Tokenizer could not be loaded or failed to encode/decode
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Failed to parse the source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// Semantic chunker failed
    #[error("Semantic chunker error: {0}")]
    Semantic(String),

    /// Document conversion failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// TOML config decoding error
    #[error("Config error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ChunkerError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// Create a tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Create a semantic chunker error
    pub fn semantic(msg: impl Into<String>) -> Self {
        Self::Semantic(msg.into())
    }
}
