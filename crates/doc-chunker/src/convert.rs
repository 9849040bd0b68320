use crate::error::{ChunkerError, Result};
use crate::types::{FigureData, TableData};
use std::path::Path;

/// Text extracted from a source file plus structured side-channel data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub text: String,
    pub tables: Vec<TableData>,
    pub figures: Vec<FigureData>,
}

impl ConvertedDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Turns a file into markdown-like text before structure detection
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<ConvertedDocument>;
}

/// Reads UTF-8 text files as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextConverter;

impl DocumentConverter for PlainTextConverter {
    fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            ChunkerError::Conversion(format!(
                "{} is not UTF-8 text; configure a document converter for this format",
                path.display()
            ))
        })?;
        Ok(ConvertedDocument::from_text(text))
    }
}
