use super::{RawChunk, SplitContext};
use crate::backend::Backend;
use crate::language::Language;
use crate::structure::fence_marker;
use crate::types::ContentType;

/// Sentence-packing splitter; always terminates and never fails
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralSplitter;

/// Pending chunk: an optional detached overlap seed followed by a document slice
struct Buffer {
    seed: Option<String>,
    start: usize,
    end: usize,
}

impl Buffer {
    const fn plain(start: usize, end: usize) -> Self {
        Self {
            seed: None,
            start,
            end,
        }
    }

    fn render<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        let slice = &text[self.start..self.end];
        match &self.seed {
            Some(seed) => std::borrow::Cow::Owned(format!("{seed}{slice}")),
            None => std::borrow::Cow::Borrowed(slice),
        }
    }

    fn extended(&self, end: usize) -> Self {
        Self {
            seed: self.seed.clone(),
            start: self.start,
            end,
        }
    }
}

impl StructuralSplitter {
    pub fn split(
        &self,
        text: &str,
        content_type: ContentType,
        language: Option<Language>,
        ctx: &SplitContext<'_>,
    ) -> Vec<RawChunk> {
        let max_tokens = ctx.strategy.max_tokens;
        let overlap_tokens = ctx.strategy.overlap_tokens;
        let mut chunks = Vec::new();
        let mut buffer: Option<Buffer> = None;

        for (start, end) in sentence_spans(text) {
            let Some(current) = buffer.take() else {
                buffer = Some(Buffer::plain(start, end));
                continue;
            };

            let candidate = current.extended(end);
            if ctx.counter.count(&candidate.render(text)) <= max_tokens {
                buffer = Some(candidate);
                continue;
            }

            let flushed = current.render(text).into_owned();
            let seeded = overlap_tail(&flushed, overlap_tokens, ctx)
                .map(|seed| seeded_buffer(text, seed, start, end))
                .filter(|seeded| ctx.counter.count(&seeded.render(text)) <= max_tokens);
            push_chunk(&mut chunks, text, &current, content_type, language);
            buffer = Some(seeded.unwrap_or_else(|| Buffer::plain(start, end)));
        }

        if let Some(last) = buffer {
            push_chunk(&mut chunks, text, &last, content_type, language);
        }
        chunks
    }
}

/// Pseudo-sentences as byte ranges.
///
/// Fence lines and lines inside fences are atomic; other lines accumulate until one ends in
/// `.`, `!` or `?`.
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pending: Option<usize> = None;
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let is_fence = fence_marker(line).is_some();
        if is_fence || in_fence {
            if let Some(open) = pending.take() {
                spans.push((open, start));
            }
            spans.push((start, offset));
            if is_fence {
                in_fence = !in_fence;
            }
            continue;
        }

        let open = *pending.get_or_insert(start);
        if line.trim_end().ends_with(['.', '!', '?']) {
            spans.push((open, offset));
            pending = None;
        }
    }

    if let Some(open) = pending {
        spans.push((open, text.len()));
    }
    spans
}

fn overlap_tail(flushed: &str, overlap_tokens: usize, ctx: &SplitContext<'_>) -> Option<String> {
    if overlap_tokens == 0 {
        return None;
    }
    let ids = ctx.counter.encode(flushed);
    let from = ids.len().saturating_sub(overlap_tokens);
    match ctx.counter.decode(&ids[from..]) {
        Ok(tail) if !tail.trim().is_empty() => Some(tail),
        Ok(_) => None,
        Err(err) => {
            log::debug!("Overlap decode failed, starting without overlap: {err}");
            None
        }
    }
}

/// Anchor the seed in the document when it is a verbatim suffix of the preceding text
fn seeded_buffer(text: &str, seed: String, start: usize, end: usize) -> Buffer {
    let head = text[..start].trim_end();
    let wanted = seed.trim();
    if head.ends_with(wanted) {
        return Buffer::plain(head.len() - wanted.len(), end);
    }
    Buffer {
        seed: Some(format!("{} ", seed.trim_end())),
        start,
        end,
    }
}

fn push_chunk(
    chunks: &mut Vec<RawChunk>,
    text: &str,
    buffer: &Buffer,
    content_type: ContentType,
    language: Option<Language>,
) {
    let rendered = buffer.render(text);
    let trimmed = rendered.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = if buffer.seed.is_some() {
        buffer.start
    } else {
        buffer.start + (rendered.len() - rendered.trim_start().len())
    };
    let end = if buffer.seed.is_some() {
        buffer.end
    } else {
        start + trimmed.len()
    };
    chunks.push(RawChunk {
        text: trimmed.to_string(),
        start,
        end,
        section_suffix: None,
        content_type,
        backend: Backend::Structural,
        language,
    });
}
