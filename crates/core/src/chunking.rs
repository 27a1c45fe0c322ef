use crate::error::ReduceError;
use crate::models::Chunk;
use sha2::{Digest, Sha256};

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into consecutive chunks of at most `max_words` whitespace
/// tokens. Every chunk but the last holds exactly `max_words` tokens and the
/// remainder is always flushed, so joining the chunk texts with single spaces
/// gives back [`normalize_whitespace`] of the input.
pub fn split_words(text: &str, max_words: usize) -> Result<Vec<Chunk>, ReduceError> {
    if max_words == 0 {
        return Err(ReduceError::InvalidConfiguration(
            "chunk size must be a positive number of words".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for token in text.split_whitespace() {
        buffer.push(token);
        if buffer.len() >= max_words {
            chunks.push(make_chunk(chunks.len(), &buffer));
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        chunks.push(make_chunk(chunks.len(), &buffer));
    }

    Ok(chunks)
}

fn make_chunk(index: usize, tokens: &[&str]) -> Chunk {
    let text = tokens.join(" ");
    Chunk {
        index,
        chunk_id: make_chunk_id(index, &text),
        word_count: tokens.len(),
        text,
    }
}

fn make_chunk_id(index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
