use docprep_chunker::{
    Chunk, ChunkingEngine, ContentType, EngineConfig, NoGrammars, QualityGateConfig,
};
use pretty_assertions::assert_eq;

fn structural_only(max_tokens: usize) -> EngineConfig {
    EngineConfig {
        max_tokens_override: Some(max_tokens),
        semantic_enabled: false,
        ..EngineConfig::default()
    }
}

fn without_gate() -> EngineConfig {
    EngineConfig {
        quality: QualityGateConfig {
            enabled: false,
            ..QualityGateConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn run(config: EngineConfig, text: &str, filename: &str) -> Vec<Chunk> {
    ChunkingEngine::new(config)
        .expect("engine should build")
        .chunk(text, filename)
        .expect("chunking failed")
}

#[test]
fn plain_prose_without_headings_is_one_chunk() {
    let text = "This is one sentence. This is another sentence that is slightly longer and more descriptive.";
    let chunks = run(structural_only(1000), text, "notes.txt");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].content_type, ContentType::HierarchicalSection);
    assert!(chunks[0].within_token_limit);
    assert!(chunks[0].section_path.is_empty());
}

#[test]
fn two_headings_yield_two_sections_in_order() {
    let chunks = run(without_gate(), "# A\ntext one\n# B\ntext two", "sections.md");

    let paths: Vec<Vec<String>> = chunks.iter().map(|c| c.section_path.clone()).collect();
    assert_eq!(paths, vec![vec!["A".to_string()], vec!["B".to_string()]]);
    assert!(chunks[0].text.contains("text one"));
    assert!(chunks[1].text.contains("text two"));
    assert_eq!(chunks[1].heading(), Some("B"));
}

#[test]
fn oversized_sentence_is_emitted_whole() {
    let text = (0..5000)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    let chunks = run(structural_only(100), &text, "wall.txt");

    assert_eq!(chunks.len(), 1, "oversized sentence must not be split");
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].token_count, 5000);
    assert!(!chunks[0].within_token_limit);
}

#[test]
fn fenced_python_routes_to_syntax_backend() {
    let text = "```python\ndef f(): pass\n```";
    let chunks = run(without_gate(), text, "snippet.md");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].backend, "tree_sitter");
    assert_eq!(chunks[0].content_type, ContentType::CodeBlock);
    assert_eq!(
        chunks[0].section_path.last().map(String::as_str),
        Some("python:function_definition")
    );
    assert_eq!(chunks[0].text, "def f(): pass");
    assert_eq!(chunks[0].language.as_deref(), Some("python"));
}

#[test]
fn fenced_python_without_grammar_stays_verbatim() {
    let text = "```python\ndef f(): pass\n```";
    let engine = ChunkingEngine::builder(without_gate())
        .grammars(Box::new(NoGrammars))
        .build()
        .unwrap();
    let outcome = engine.process(text, "snippet.md", None).unwrap();

    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.chunks[0].backend, "structural");
    assert_eq!(outcome.chunks[0].text, text);
    assert_eq!(outcome.report.fallbacks, 0);
}

#[test]
fn source_file_extension_selects_grammar() {
    let code = "use std::fmt;\n\nfn alpha() -> u32 {\n    1\n}\n\nstruct Beta {\n    x: u32,\n}\n";
    let chunks = run(without_gate(), code, "src/lib.rs");

    let suffixes: Vec<&str> = chunks
        .iter()
        .filter_map(|c| c.section_path.last().map(String::as_str))
        .collect();
    assert_eq!(
        suffixes,
        vec!["rust:module", "rust:function_item", "rust:struct_item"]
    );
    assert!(chunks.iter().all(|c| c.chunking_strategy.ends_with("_tree_sitter")
        || c.chunking_strategy.ends_with("_structural")));
}

#[test]
fn tables_and_lists_use_structural_backend() {
    let text = "# Data\n| name | value |\n|------|-------|\n| a | 1 |\n\n# Steps\n- first\n- second\n";
    let chunks = run(without_gate(), text, "mixed.md");

    let kinds: Vec<(ContentType, &str)> = chunks
        .iter()
        .map(|c| (c.content_type, c.backend.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ContentType::TableSection, "structural"),
            (ContentType::ListSection, "structural"),
        ]
    );
}
