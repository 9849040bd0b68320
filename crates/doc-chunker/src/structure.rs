//! Heading-based document structure detection.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*)$").expect("heading pattern is valid"));

/// A heading section of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    /// Breadcrumb of enclosing headings, innermost last
    pub heading_path: Vec<String>,
    /// Heading level (1-6), 0 for content outside any heading
    pub level: usize,
    /// Trimmed block text, including its heading line
    pub text: String,
    /// Byte offset of `text` in the document
    pub start_char: usize,
    pub end_char: usize,
}

/// Opening or closing line of a fenced code block; yields the info string
pub(crate) fn fence_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))
        .map(|info| info.trim())
}

/// Parse a heading line into `(level, title)`
pub(crate) fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2)?.as_str().trim();
    let title = title.trim_end_matches('#').trim_end();
    Some((level, if title.is_empty() { caps.get(2)?.as_str().trim() } else { title }))
}

/// A run of prose or one fenced code block (fence lines included), as a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub start: usize,
    pub end: usize,
    pub fenced: bool,
}

/// Partition `text` into alternating prose and fenced-code segments.
///
/// An unterminated fence runs to the end of the text.
pub(crate) fn fenced_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open_at: Option<usize> = None;
    let mut prose_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if fence_marker(line).is_none() {
            continue;
        }
        match open_at.take() {
            None => {
                if start > prose_start {
                    segments.push(Segment {
                        start: prose_start,
                        end: start,
                        fenced: false,
                    });
                }
                open_at = Some(start);
            }
            Some(fence_start) => {
                segments.push(Segment {
                    start: fence_start,
                    end: offset,
                    fenced: true,
                });
                prose_start = offset;
            }
        }
    }

    match open_at {
        Some(fence_start) => segments.push(Segment {
            start: fence_start,
            end: text.len(),
            fenced: true,
        }),
        None if prose_start < text.len() => segments.push(Segment {
            start: prose_start,
            end: text.len(),
            fenced: false,
        }),
        None => {}
    }
    segments
}

/// Splits markdown-style text at heading lines
#[derive(Debug, Default, Clone, Copy)]
pub struct StructureDetector;

struct Section<'a> {
    start: usize,
    heading: Option<(usize, &'a str)>,
}

impl StructureDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Split `text` into blocks, one per heading, in document order.
    ///
    /// Lines inside fenced code blocks are never headings. Content before the first heading forms
    /// an implicit block with an empty path when it is not blank.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<ContentBlock> {
        let sections = Self::scan(text);
        let mut blocks = Vec::with_capacity(sections.len());
        let mut stack: Vec<(usize, String)> = Vec::new();

        for (idx, section) in sections.iter().enumerate() {
            let end = sections.get(idx + 1).map_or(text.len(), |next| next.start);
            let level = match section.heading {
                Some((level, title)) => {
                    while stack.last().is_some_and(|(top, _)| *top >= level) {
                        stack.pop();
                    }
                    stack.push((level, title.to_string()));
                    level
                }
                None => 0,
            };

            let raw = &text[section.start..end];
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                log::debug!("Skipping blank block at byte {}", section.start);
                continue;
            }
            let start_char = section.start + (raw.len() - raw.trim_start().len());
            blocks.push(ContentBlock {
                heading_path: stack.iter().map(|(_, title)| title.clone()).collect(),
                level,
                text: trimmed.to_string(),
                start_char,
                end_char: start_char + trimmed.len(),
            });
        }

        blocks
    }

    fn scan(text: &str) -> Vec<Section<'_>> {
        let mut sections = vec![Section {
            start: 0,
            heading: None,
        }];
        let mut in_fence = false;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            if fence_marker(line).is_some() {
                in_fence = !in_fence;
            } else if !in_fence {
                if let Some(heading) = parse_heading(line) {
                    sections.push(Section {
                        start: offset,
                        heading: Some(heading),
                    });
                }
            }
            offset += line.len();
        }

        if sections.len() > 1 && sections[1].start == 0 {
            sections.remove(0);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_headings_yields_single_stripped_block() {
        let text = "\n  Just some prose.\nMore prose.  \n\n";
        let blocks = StructureDetector::new().detect(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Just some prose.\nMore prose.");
        assert!(blocks[0].heading_path.is_empty());
        assert_eq!(blocks[0].level, 0);
        assert_eq!(&text[blocks[0].start_char..blocks[0].end_char], blocks[0].text);
    }

    #[test]
    fn sibling_headings_produce_separate_paths() {
        let text = "# A\ntext one\n# B\ntext two";
        let blocks = StructureDetector::new().detect(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].heading_path, vec!["A".to_string()]);
        assert_eq!(blocks[0].text, "# A\ntext one");
        assert_eq!(blocks[1].heading_path, vec!["B".to_string()]);
        assert_eq!(blocks[1].text, "# B\ntext two");
        assert_eq!(blocks[1].start_char, 13);
    }

    #[test]
    fn nested_headings_build_breadcrumb() {
        let text = "# Guide\nintro\n## Install\nsteps\n### Linux\napt\n## Usage\nrun it";
        let blocks = StructureDetector::new().detect(text);
        let paths: Vec<Vec<String>> = blocks.iter().map(|b| b.heading_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec!["Guide".to_string()],
                vec!["Guide".to_string(), "Install".to_string()],
                vec!["Guide".to_string(), "Install".to_string(), "Linux".to_string()],
                vec!["Guide".to_string(), "Usage".to_string()],
            ]
        );
        assert_eq!(blocks[2].level, 3);
    }

    #[test]
    fn leading_content_forms_implicit_block() {
        let text = "Preamble here.\n\n# Title\nbody";
        let blocks = StructureDetector::new().detect(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].heading_path.is_empty());
        assert_eq!(blocks[0].text, "Preamble here.");

        let blank_lead = StructureDetector::new().detect("\n\n# Title\nbody");
        assert_eq!(blank_lead.len(), 1);
    }

    #[test]
    fn hash_lines_inside_fences_are_not_headings() {
        let text = "# Setup\n```bash\n# install deps\npip install x\n```\nDone.";
        let blocks = StructureDetector::new().detect(text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].text.contains("# install deps"));
    }

    #[test]
    fn heading_only_block_is_kept() {
        let blocks = StructureDetector::new().detect("# Empty\n# Full\nbody");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "# Empty");
    }

    #[test]
    fn fenced_segments_alternate() {
        let text = "Intro\n```rust\nfn a() {}\n```\nMiddle\n~~~\nraw\n";
        let segments = fenced_segments(text);
        let parts: Vec<(&str, bool)> = segments
            .iter()
            .map(|s| (&text[s.start..s.end], s.fenced))
            .collect();
        assert_eq!(
            parts,
            vec![
                ("Intro\n", false),
                ("```rust\nfn a() {}\n```\n", true),
                ("Middle\n", false),
                ("~~~\nraw\n", true),
            ]
        );
        assert_eq!(fenced_segments("no fences").len(), 1);
    }

    #[test]
    fn parse_heading_strips_closing_hashes() {
        assert_eq!(parse_heading("## Title ##\n"), Some((2, "Title")));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### seven"), None);
    }
}
