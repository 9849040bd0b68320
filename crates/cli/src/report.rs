use crate::DocumentOutput;
use docprep_chunker::{ChunkingStats, ModelSpec};

pub fn render_chunk_report(model: &ModelSpec, docs: &[DocumentOutput]) -> String {
    let mut md = String::new();
    md.push_str("# Chunking report\n\n");
    md.push_str(&format!(
        "- Model: `{}` (max_tokens={})\n",
        model.name, model.max_tokens
    ));
    md.push_str(&format!("- Documents: `{}`\n", docs.len()));
    md.push_str(&format!(
        "- Chunks: `{}`\n\n",
        docs.iter().map(|d| d.chunks.len()).sum::<usize>()
    ));

    md.push_str("## Documents\n\n");
    md.push_str("| path | category | strategy | blocks | chunks | accepted | promoted | oversized | fallbacks |\n");
    md.push_str("|---|---|---|---:|---:|---:|---:|---:|---:|\n");
    for doc in docs {
        let r = &doc.report;
        md.push_str(&format!(
            "| `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` |\n",
            escape_cell(&doc.path),
            r.document_category,
            r.strategy,
            r.blocks,
            r.total_chunks,
            r.accepted,
            r.promoted,
            r.oversized_chunks,
            r.fallbacks
        ));
    }
    md.push('\n');

    for doc in docs {
        md.push_str(&format!("## `{}`\n\n", escape_cell(&doc.path)));
        md.push_str(&format!("{}\n\n", ChunkingStats::from_chunks(&doc.chunks)));
        if !doc.report.backend_usage.is_empty() {
            let usage: Vec<String> = doc
                .report
                .backend_usage
                .iter()
                .map(|(backend, count)| format!("{backend}={count}"))
                .collect();
            md.push_str(&format!("- Backends: `{}`\n\n", usage.join(", ")));
        }

        md.push_str("| chunk | section | type | tokens | overall |\n");
        md.push_str("|---|---|---|---:|---:|\n");
        for chunk in &doc.chunks {
            md.push_str(&format!(
                "| `{}` | {} | `{}` | `{}` | `{:.3}` |\n",
                chunk.chunk_id,
                escape_cell(&truncate_one_line(&chunk.section_path.join(" > "), 80)),
                chunk.content_type,
                chunk.token_count,
                chunk.advanced_scores.overall
            ));
        }
        md.push('\n');
    }

    md
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let one_line = text.replace(['\n', '\r'], " ");
    if one_line.chars().count() <= max_chars {
        return one_line;
    }
    let mut out: String = one_line.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_sections() {
        assert_eq!(truncate_one_line("a\nb", 10), "a b");
        assert_eq!(truncate_one_line("abcdef", 4), "abc…");
        assert_eq!(escape_cell("a|b"), "a\\|b");
    }
}
