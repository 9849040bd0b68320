use crate::error::{ChunkerError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Token budget used when no model registry is available.
pub const DEFAULT_MAX_TOKENS: usize = 1024;
/// Overlap paired with [`DEFAULT_MAX_TOKENS`].
pub const DEFAULT_OVERLAP_TOKENS: usize = 128;

/// Embedding model capabilities relevant to chunk sizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub max_tokens: usize,
    pub vector_dim: usize,
    /// Absolute path to a `tokenizer.json`, when the registry knows one
    pub tokenizer_path: Option<PathBuf>,
}

impl ModelSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, max_tokens: usize, vector_dim: usize) -> Self {
        Self {
            name: name.into(),
            max_tokens,
            vector_dim,
            tokenizer_path: None,
        }
    }
}

/// Source of model budgets, consulted once at engine construction.
pub trait ModelRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<ModelSpec>;

    fn available(&self) -> Vec<String>;
}

fn normalize_model_name(raw: &str) -> String {
    let name = raw.trim().to_ascii_lowercase();
    match name.as_str() {
        "bge-small-en-v1.5" => "bge-small".to_string(),
        "bge-base-en-v1.5" => "bge-base".to_string(),
        "bge-large-en-v1.5" => "bge-large".to_string(),
        _ => name,
    }
}

/// Compiled-in table of widely used embedding models.
#[derive(Debug, Clone)]
pub struct BuiltinModels {
    specs: HashMap<String, ModelSpec>,
}

impl BuiltinModels {
    #[must_use]
    pub fn new() -> Self {
        let table: [(&str, usize, usize); 10] = [
            ("all-minilm-l6-v2", 256, 384),
            ("bge-small", 512, 384),
            ("bge-base", 512, 768),
            ("bge-large", 512, 1024),
            ("bge-m3", 8192, 1024),
            ("nomic-embed-text", 8192, 768),
            ("mxbai-embed-large", 512, 1024),
            ("jina-embeddings-v2-base-code", 8192, 768),
            ("text-embedding-3-small", 8191, 1536),
            ("qwen3-embedding-8b", 26000, 4096),
        ];
        let specs = table
            .into_iter()
            .map(|(name, max_tokens, dim)| (name.to_string(), ModelSpec::new(name, max_tokens, dim)))
            .collect();
        Self { specs }
    }
}

impl Default for BuiltinModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry for BuiltinModels {
    fn resolve(&self, name: &str) -> Option<ModelSpec> {
        self.specs.get(&normalize_model_name(name)).cloned()
    }

    fn available(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.specs.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Deserialize)]
struct ModelsManifest {
    schema_version: u32,
    models: Vec<ManifestModel>,
}

#[derive(Debug, Deserialize)]
struct ManifestModel {
    id: String,
    max_tokens: usize,
    dimension: usize,
    #[serde(default)]
    tokenizer: Option<String>,
}

/// Registry backed by a `manifest.json` in a models directory.
///
/// ```json
/// { "schema_version": 1,
///   "models": [{ "id": "bge-small", "max_tokens": 512, "dimension": 384,
///                "tokenizer": "bge-small/tokenizer.json" }] }
/// ```
#[derive(Debug, Clone)]
pub struct ManifestModels {
    specs: HashMap<String, ModelSpec>,
}

impl ManifestModels {
    /// Load `<model_dir>/manifest.json`
    pub fn from_dir(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let manifest_path = model_dir.join("manifest.json");
        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
            ChunkerError::invalid_config(format!(
                "Failed to read models manifest {}: {e}",
                manifest_path.display()
            ))
        })?;
        Self::from_json(&raw, model_dir)
    }

    /// Parse a manifest; relative tokenizer paths resolve against `model_dir`
    pub fn from_json(raw: &str, model_dir: &Path) -> Result<Self> {
        let manifest: ModelsManifest = serde_json::from_str(raw)?;
        if manifest.schema_version != 1 {
            return Err(ChunkerError::invalid_config(format!(
                "Unsupported models manifest schema_version {} (expected 1)",
                manifest.schema_version
            )));
        }

        let mut specs = HashMap::new();
        for model in manifest.models {
            if model.max_tokens == 0 {
                return Err(ChunkerError::invalid_config(format!(
                    "Model '{}' declares max_tokens = 0",
                    model.id
                )));
            }
            let tokenizer_path = match model.tokenizer.as_deref() {
                Some(rel) => Some(model_dir.join(safe_rel_path(&model.id, rel)?)),
                None => None,
            };
            let name = normalize_model_name(&model.id);
            specs.insert(
                name.clone(),
                ModelSpec {
                    name,
                    max_tokens: model.max_tokens,
                    vector_dim: model.dimension,
                    tokenizer_path,
                },
            );
        }
        Ok(Self { specs })
    }
}

impl ModelRegistry for ManifestModels {
    fn resolve(&self, name: &str) -> Option<ModelSpec> {
        self.specs.get(&normalize_model_name(name)).cloned()
    }

    fn available(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.specs.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn safe_rel_path(model_id: &str, rel: &str) -> Result<PathBuf> {
    let path = Path::new(rel);
    let mut has_component = false;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(ChunkerError::invalid_config(format!(
                    "Tokenizer path for model '{model_id}' must be relative: '{rel}'"
                )));
            }
            Component::ParentDir => {
                return Err(ChunkerError::invalid_config(format!(
                    "Tokenizer path for model '{model_id}' must not contain '..': '{rel}'"
                )));
            }
            Component::CurDir => {}
            Component::Normal(_) => has_component = true,
        }
    }
    if !has_component {
        return Err(ChunkerError::invalid_config(format!(
            "Tokenizer path for model '{model_id}' is empty"
        )));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_aliases() {
        let models = BuiltinModels::new();
        let spec = models.resolve("BGE-Small-EN-v1.5").unwrap();
        assert_eq!(spec.name, "bge-small");
        assert_eq!(spec.max_tokens, 512);
        assert!(models.resolve("no-such-model").is_none());
    }

    #[test]
    fn manifest_loads_models_with_tokenizer_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"schema_version":1,"models":[
                {"id":"tiny","max_tokens":256,"dimension":128,"tokenizer":"tiny/tokenizer.json"},
                {"id":"huge","max_tokens":26000,"dimension":4096}
            ]}"#,
        )
        .unwrap();

        let models = ManifestModels::from_dir(dir.path()).unwrap();
        assert_eq!(models.available(), vec!["huge".to_string(), "tiny".to_string()]);
        let tiny = models.resolve("tiny").unwrap();
        assert_eq!(
            tiny.tokenizer_path,
            Some(dir.path().join("tiny/tokenizer.json"))
        );
        assert_eq!(models.resolve("huge").unwrap().max_tokens, 26000);
    }

    #[test]
    fn manifest_rejects_path_traversal() {
        let raw = r#"{"schema_version":1,"models":[
            {"id":"evil","max_tokens":256,"dimension":8,"tokenizer":"../tokenizer.json"}]}"#;
        let err = ManifestModels::from_json(raw, Path::new("/models")).unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn manifest_rejects_unknown_schema() {
        let raw = r#"{"schema_version":2,"models":[]}"#;
        assert!(ManifestModels::from_json(raw, Path::new("/models")).is_err());
    }
}
