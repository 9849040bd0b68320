use super::{RawChunk, SplitContext, SplitError, SplitTrace, Splitters};
use crate::backend::{Backend, Route, OVERSIZED_NODE_CHAIN};
use crate::error::ChunkerError;
use crate::language::{GrammarCache, Language};
use crate::structure::fence_marker;
use crate::types::ContentType;
use tree_sitter::{Node, Parser};

/// Splits source code into one chunk per top-level definition
pub struct SyntaxSplitter {
    grammars: GrammarCache,
    include_module_code: bool,
}

/// Code region of a split input, without fence lines
struct CodeRegion {
    start: usize,
    end: usize,
    language: Option<Language>,
}

impl SyntaxSplitter {
    pub fn new(grammars: GrammarCache, include_module_code: bool) -> Self {
        Self {
            grammars,
            include_module_code,
        }
    }

    /// Fails when no grammar is available or parsing fails; yields nothing when the code has
    /// no target definitions. Either way the chain falls back to the structural splitter.
    pub(crate) fn split(
        &self,
        text: &str,
        route: Route,
        ctx: &SplitContext<'_>,
        splitters: &Splitters,
        trace: &mut SplitTrace,
    ) -> Result<Vec<RawChunk>, SplitError> {
        let region = code_region(text);
        let language = region
            .language
            .or(route.language)
            .unwrap_or(Language::Unknown);
        let targets = language.target_node_types();
        if targets.is_empty() {
            return Err(SplitError::Unavailable("tree_sitter"));
        }
        let grammar = self
            .grammars
            .get(language)
            .ok_or(SplitError::Unavailable("tree_sitter"))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        let code = &text[region.start..region.end];
        let tree = parser
            .parse(code, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))?;

        let mut nodes = Vec::new();
        collect_targets(tree.root_node(), targets, &mut nodes);
        nodes.sort_by_key(Node::start_byte);
        if nodes.is_empty() {
            log::debug!("No {} definitions found in block", language.as_str());
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut cursor = 0;
        for node in nodes {
            if self.include_module_code {
                self.push_gap(code, cursor, node.start_byte(), language, ctx, splitters, &mut chunks);
            }
            cursor = node.end_byte();

            let suffix = format!("{}:{}", language.as_str(), node.kind());
            let raw = &code[node.start_byte()..node.end_byte()];
            let node_text = raw.trim();
            if node_text.is_empty() {
                continue;
            }
            let start = node.start_byte() + (raw.len() - raw.trim_start().len());

            if ctx.counter.count(node_text) > ctx.strategy.max_tokens {
                log::debug!(
                    "{suffix} at byte {start} exceeds {} tokens, re-splitting",
                    ctx.strategy.max_tokens
                );
                let route = Route {
                    backend: Backend::Semantic,
                    content_type: ContentType::CodeBlock,
                    language: Some(language),
                };
                for piece in splitters.run_chain(OVERSIZED_NODE_CHAIN, node_text, route, ctx, trace) {
                    let mut piece = piece.offset_by(start);
                    piece.section_suffix = Some(suffix.clone());
                    chunks.push(piece);
                }
                continue;
            }

            chunks.push(RawChunk {
                text: node_text.to_string(),
                start,
                end: start + node_text.len(),
                section_suffix: Some(suffix),
                content_type: ContentType::CodeBlock,
                backend: Backend::Syntax,
                language: Some(language),
            });
        }
        if self.include_module_code {
            self.push_gap(code, cursor, code.len(), language, ctx, splitters, &mut chunks);
        }

        Ok(chunks
            .into_iter()
            .map(|chunk| chunk.offset_by(region.start))
            .collect())
    }

    /// Module-level code between definitions
    #[allow(clippy::too_many_arguments)]
    fn push_gap(
        &self,
        code: &str,
        from: usize,
        to: usize,
        language: Language,
        ctx: &SplitContext<'_>,
        splitters: &Splitters,
        chunks: &mut Vec<RawChunk>,
    ) {
        if from >= to || code[from..to].trim().is_empty() {
            return;
        }
        let route = Route {
            backend: Backend::Structural,
            content_type: ContentType::CodeBlock,
            language: Some(language),
        };
        let mut trace = SplitTrace::default();
        let suffix = format!("{}:module", language.as_str());
        for piece in splitters.run_chain(&[Backend::Structural], &code[from..to], route, ctx, &mut trace) {
            let mut piece = piece.offset_by(from);
            piece.section_suffix = Some(suffix.clone());
            chunks.push(piece);
        }
    }
}

/// Strip an enclosing code fence and read its language from the info string
fn code_region(text: &str) -> CodeRegion {
    let whole = CodeRegion {
        start: 0,
        end: text.len(),
        language: None,
    };
    let Some(first_line) = text.split_inclusive('\n').next() else {
        return whole;
    };
    let Some(info) = fence_marker(first_line) else {
        return whole;
    };

    let start = first_line.len();
    let mut end = text.len();
    let mut offset = start;
    for line in text[start..].split_inclusive('\n') {
        if fence_marker(line).is_some() {
            end = offset;
            break;
        }
        offset += line.len();
    }

    let language = info
        .split_whitespace()
        .next()
        .map(Language::from_name)
        .filter(|lang| *lang != Language::Unknown);
    CodeRegion {
        start,
        end,
        language,
    }
}

/// Outermost nodes whose kind is a target; children of a target are never collected
fn collect_targets<'tree>(node: Node<'tree>, targets: &[&str], out: &mut Vec<Node<'tree>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if targets.contains(&child.kind()) {
            out.push(child);
        } else {
            collect_targets(child, targets, out);
        }
    }
}
