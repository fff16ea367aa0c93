//! Text loading and fixed-size overlapping chunking.
//!
//! Splits text into ordered [`Chunk`] windows of at most `chunk_size`
//! characters, with consecutive windows sharing `overlap` characters so the
//! model keeps some continuity between them. The summarizer feeds each
//! window to the backend separately, so `chunk_size` is tuned to keep one
//! window plus prompt overhead inside the model's context budget.
//!
//! Offsets are byte positions into the source text, but window boundaries
//! are computed on characters, so multi-byte text never splits a code point.

use std::path::Path;

use crate::error::LlmError;
use crate::models::Chunk;

/// Read a file as UTF-8 text.
///
/// Fails with [`LlmError::Io`] when the path does not exist or the contents
/// are not valid UTF-8.
pub fn load_text_file(path: &Path) -> Result<String, LlmError> {
    std::fs::read_to_string(path).map_err(|e| LlmError::io(path, e))
}

/// Split `text` into windows of at most `chunk_size` characters, each
/// overlapping its predecessor by `overlap` characters.
///
/// Windows are produced eagerly, in input order, and their spans cover the
/// whole text: the first starts at offset 0, the last ends at `text.len()`,
/// and each window starts `overlap` characters before its predecessor ends.
/// The last window may be shorter than `chunk_size`. Text no longer than
/// `chunk_size` yields exactly one window, and empty text yields a single
/// empty window so downstream passes always see at least one chunk.
///
/// Fails with [`LlmError::Config`] unless `chunk_size > overlap`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, LlmError> {
    if chunk_size == 0 {
        return Err(LlmError::Config("chunk_size must be positive".into()));
    }
    if overlap >= chunk_size {
        return Err(LlmError::Config(format!(
            "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    // Byte offset of every character boundary, including the end of the
    // text, so windows can be sliced without re-walking the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start_char = 0;
    loop {
        let end_char = (start_char + chunk_size).min(total_chars);
        let start = boundaries[start_char];
        let end = boundaries[end_char];
        chunks.push(Chunk {
            text: text[start..end].to_string(),
            start,
            end,
        });
        if end_char == total_chars {
            break;
        }
        start_char = end_char - overlap;
    }

    Ok(chunks)
}
