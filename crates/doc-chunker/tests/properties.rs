use docprep_chunker::{
    ChunkingEngine, ConvertedDocument, EngineConfig, ManifestModels, QualityGateConfig,
    TokenCounter, WordTokenCounter,
};
use std::sync::Arc;

const GUIDE: &str = "# Installation Guide

Install the package with the provided script. The script checks your environment first.

## Requirements

- A recent compiler
- Network access for the first build

## Configuration

Edit the config file to point at your model directory. Restart the service afterwards.

```bash
export MODEL_DIR=/opt/models
./run.sh --check
```

## Troubleshooting

If the service fails to start, read the log output. Most failures come from a wrong path.
";

fn sample_documents() -> Vec<(&'static str, String)> {
    vec![
        ("guide.md", GUIDE.to_string()),
        ("short.txt", "ok".to_string()),
        ("api.md", "# GET /users\nReturns the list of users.\n\n# POST /users\nCreates a user from the request body.".to_string()),
        (
            "lib.py",
            "import os\n\n\ndef load(path):\n    return open(path).read()\n\n\nclass Store:\n    def get(self, key):\n        return key\n"
                .to_string(),
        ),
        ("weird.md", "#\n\n###   \n\n   \n\ntext after empty headings".to_string()),
    ]
}

#[test]
fn every_non_empty_document_yields_a_chunk() {
    let engine = ChunkingEngine::new(EngineConfig::default()).unwrap();
    for (name, text) in sample_documents() {
        let chunks = engine.chunk(&text, name).unwrap();
        assert!(!chunks.is_empty(), "{name} produced no chunks");
    }
}

#[test]
fn chunk_indices_follow_source_order() {
    let config = EngineConfig {
        quality: QualityGateConfig {
            enabled: false,
            ..QualityGateConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = ChunkingEngine::new(config).unwrap();
    for (name, text) in sample_documents() {
        let chunks = engine.chunk(&text, name).unwrap();
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected, "{name}: index gap");
        }
        for pair in chunks.windows(2) {
            assert!(
                pair[0].start_char <= pair[1].start_char,
                "{name}: chunk {} starts after chunk {}",
                pair[0].chunk_index,
                pair[1].chunk_index
            );
        }
    }
}

#[test]
fn processing_is_idempotent() {
    let engine = ChunkingEngine::new(EngineConfig::default()).unwrap();
    let first = engine.chunk(GUIDE, "guide.md").unwrap();
    let second = engine.chunk(GUIDE, "guide.md").unwrap();

    let texts = |chunks: &[docprep_chunker::Chunk]| {
        chunks
            .iter()
            .map(|c| (c.chunk_id.clone(), c.text.clone(), c.content_hash.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(texts(&first), texts(&second));

    let rebuilt = ChunkingEngine::new(EngineConfig::default()).unwrap();
    assert_eq!(texts(&first), texts(&rebuilt.chunk(GUIDE, "guide.md").unwrap()));
}

#[test]
fn scores_stay_in_unit_interval() {
    let engine = ChunkingEngine::new(EngineConfig::for_recall()).unwrap();
    for (name, text) in sample_documents() {
        for chunk in engine.chunk(&text, name).unwrap() {
            let s = chunk.advanced_scores;
            for value in [s.semantic, s.structural, s.retrieval_quality, s.overall] {
                assert!((0.0..=1.0).contains(&value), "{name}: score {value} out of range");
            }
        }
    }
}

#[test]
fn structural_chunks_respect_budget() {
    let text = (0..120)
        .map(|i| format!("Sentence number {i} talks about something else."))
        .collect::<Vec<_>>()
        .join("\n");
    let config = EngineConfig {
        max_tokens_override: Some(40),
        semantic_enabled: false,
        quality: QualityGateConfig {
            enabled: false,
            ..QualityGateConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = ChunkingEngine::new(config).unwrap();
    let chunks = engine.chunk(&text, "notes.txt").unwrap();

    assert!(chunks.len() > 1);
    let counter = WordTokenCounter::new();
    for chunk in &chunks {
        assert!(chunk.token_count <= 40, "chunk {} has {} tokens", chunk.chunk_index, chunk.token_count);
        assert_eq!(chunk.token_count, counter.count(&chunk.text));
        assert!(chunk.within_token_limit);
    }
    assert!(chunks.last().unwrap().text.ends_with("Sentence number 119 talks about something else."));
}

#[test]
fn failing_every_threshold_promotes_best_chunks() {
    let text = (0..12)
        .map(|i| format!("# Part {i}\nShort note {i}."))
        .collect::<Vec<_>>()
        .join("\n");
    let config = EngineConfig {
        quality: QualityGateConfig {
            semantic_threshold: 1.0,
            structural_threshold: 1.0,
            retrieval_threshold: 1.0,
            ..QualityGateConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = ChunkingEngine::new(config).unwrap();
    let outcome = engine.process(&text, "parts.md", None).unwrap();

    assert_eq!(outcome.report.total_chunks, 12);
    assert_eq!(outcome.report.rejected, 12);
    assert_eq!(outcome.chunks.len(), 3);
    assert_eq!(outcome.report.promoted, 3);
    assert!(outcome.chunks.iter().all(|c| c.quality_fallback && c.quality_note.is_some()));
    assert!(outcome
        .chunks
        .windows(2)
        .all(|pair| pair[0].chunk_index < pair[1].chunk_index));
}

#[test]
fn side_channel_only_document_is_chunked() {
    let engine = ChunkingEngine::new(EngineConfig::for_recall()).unwrap();
    let document = ConvertedDocument {
        text: String::new(),
        tables: vec![docprep_chunker::TableData {
            rows: 1,
            cols: 2,
            caption: None,
            markdown: "| k | v |\n|---|---|".to_string(),
        }],
        figures: Vec::new(),
    };
    let outcome = engine.process_converted(&document, "scan.pdf", None).unwrap();
    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.chunks[0].section_path, vec!["Table 1".to_string()]);
}

#[test]
fn manifest_registry_sets_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("manifest.json"),
        r#"{"schema_version":1,"models":[{"id":"tiny","max_tokens":64,"dimension":32}]}"#,
    )
    .unwrap();
    let registry = ManifestModels::from_dir(dir.path()).unwrap();

    let engine = ChunkingEngine::builder(EngineConfig {
        model: Some("tiny".to_string()),
        ..EngineConfig::default()
    })
    .registry(Box::new(registry))
    .build()
    .unwrap();

    assert_eq!(engine.model().max_tokens, 64);
    assert_eq!(engine.strategies().get("context").unwrap().max_tokens, 64);
    let report = engine.validate(&engine.chunk(GUIDE, "guide.md").unwrap());
    assert_eq!(report.model_max_tokens, 64);
}

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(ChunkingEngine::new(EngineConfig::default()).unwrap());
    let expected = engine.chunk(GUIDE, "guide.md").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.chunk(GUIDE, "guide.md").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
