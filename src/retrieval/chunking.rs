//! Separator-priority chunking for ingestion.
//!
//! Documents are split on a priority list of separators, preferring larger semantic
//! boundaries (paragraph, line) and recursing to finer ones only when a segment still
//! exceeds the size bound. Separators stay attached to the preceding segment, so the
//! concatenation of all chunk cores reproduces the trimmed input exactly. Consecutive
//! chunks additionally carry a character overlap taken from the tail of the previous
//! chunk; each chunk records the byte length of that prefix so callers can strip it.

use super::types::ChunkingError;

/// Separator priority used when splitting oversized segments.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", " ", "", ". "];

/// One retrieval unit produced from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text, including the leading overlap prefix.
    pub text: String,
    /// Title of the source document.
    pub title: String,
    /// Ordinal position of the chunk within its document.
    pub index: usize,
    /// Deterministic label of the form `{title}_{index}`.
    pub label: String,
    /// Byte length of the overlap prefix carried from the previous chunk.
    pub overlap_len: usize,
}

/// Split a document into overlapping chunks bounded by `chunk_size` characters.
///
/// The size bound applies to each chunk's core (the text after its overlap prefix).
/// A document shorter than `chunk_size` yields exactly one chunk equal to the trimmed
/// input; whitespace-only input yields no chunks.
pub fn chunk_document(
    text: &str,
    title: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    split_recursive(trimmed, chunk_size, &SEPARATORS, &mut segments);
    let cores = merge_segments(segments, chunk_size);

    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    let mut chunks = Vec::with_capacity(cores.len());
    let mut previous: Option<&str> = None;

    for (index, core) in cores.iter().enumerate() {
        let (prefix, overlap_len) = match previous {
            Some(prev) => char_tail(prev, effective_overlap),
            None => ("", 0),
        };
        let mut chunk_text = String::with_capacity(prefix.len() + core.len());
        chunk_text.push_str(prefix);
        chunk_text.push_str(core);
        chunks.push(Chunk {
            text: chunk_text,
            title: title.to_string(),
            index,
            label: format!("{title}_{index}"),
            overlap_len,
        });
        previous = Some(core.as_str());
    }

    Ok(chunks)
}

/// Recursively split `text` until every segment fits the character budget.
///
/// Separators are tried in priority order; the empty separator falls back to
/// fixed-width character slices and guarantees termination.
fn split_recursive(text: &str, chunk_size: usize, separators: &[&str], out: &mut Vec<String>) {
    if char_len(text) <= chunk_size {
        if !text.is_empty() {
            out.push(text.to_string());
        }
        return;
    }

    let Some((&separator, rest)) = separators.split_first() else {
        out.push(text.to_string());
        return;
    };

    if separator.is_empty() {
        for piece in char_windows(text, chunk_size) {
            out.push(piece.to_string());
        }
        return;
    }

    if !text.contains(separator) {
        split_recursive(text, chunk_size, rest, out);
        return;
    }

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= chunk_size {
            out.push(piece.to_string());
        } else {
            split_recursive(piece, chunk_size, rest, out);
        }
    }
}

/// Greedily merge adjacent segments into cores no larger than `chunk_size` characters.
fn merge_segments(segments: Vec<String>, chunk_size: usize) -> Vec<String> {
    let mut cores: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for segment in segments {
        let segment_len = char_len(&segment);
        if current_len > 0 && current_len + segment_len > chunk_size {
            cores.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&segment);
        current_len += segment_len;
    }

    if !current.is_empty() {
        cores.push(current);
    }

    cores
}

/// Split `text` on `separator`, keeping each separator attached to the preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let step = separator.len();

    while let Some(found) = text[start..].find(separator) {
        let end = start + found + step;
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Return the last `count` characters of `text` along with their byte length.
fn char_tail(text: &str, count: usize) -> (&str, usize) {
    if count == 0 {
        return ("", 0);
    }
    let total = char_len(text);
    if total <= count {
        return (text, text.len());
    }
    let skip = total - count;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let tail = &text[start..];
    (tail, tail.len())
}

/// Slice `text` into consecutive windows of at most `width` characters.
fn char_windows(text: &str, width: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = text[start..]
            .char_indices()
            .nth(width)
            .map(|(offset, _)| start + offset)
            .unwrap_or(text.len());
        windows.push(&text[start..end]);
        start = end;
    }

    windows
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
