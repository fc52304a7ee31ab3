//! Search chunk generation
//!
//! Splits product descriptions into bounded chunks along sentence boundaries
//! and derives a fixed-length hashed-token embedding per chunk. The embedding
//! is a deterministic placeholder for a real semantic model: tokens are
//! bucketed by hash into a fixed-size vector of counts, then L2-normalized.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::models::SearchChunk;

/// Maximum chunk length in characters
pub const MAX_CHUNK_CHARS: usize = 500;

/// Dimension of the hashed-token embedding vectors
pub const EMBEDDING_DIM: usize = 256;

/// Build the search chunks for one product description
pub fn build_chunks(product_external_id: &str, description: &str) -> Vec<SearchChunk> {
    split_into_chunks(description, MAX_CHUNK_CHARS)
        .into_iter()
        .enumerate()
        .map(|(seq, content)| {
            let embedding = hashed_embedding(&content, EMBEDDING_DIM);
            SearchChunk {
                product_external_id: product_external_id.to_string(),
                seq: seq as u32,
                content,
                embedding,
            }
        })
        .collect()
}

/// Split text into chunks of at most `max_chars` characters along sentence
/// boundaries
///
/// A single sentence longer than the limit is hard-split at character
/// boundaries.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_chars {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = sentence.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        // +1 for the joining space when the chunk is non-empty
        let added = if current_len == 0 {
            sentence_len
        } else {
            sentence_len + 1
        };

        if current_len + added > max_chars {
            chunks.push(std::mem::take(&mut current));
            current.push_str(&sentence);
            current_len = sentence_len;
        } else {
            if current_len > 0 {
                current.push(' ');
            }
            current.push_str(&sentence);
            current_len += added;
        }
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

/// Split text into sentences, keeping the terminating punctuation
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Only a terminator followed by whitespace (or end) closes a
            // sentence, so "1.5" or "v2.0" stays intact.
            let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Deterministic hashed-token embedding
///
/// Tokens are split on non-alphanumerics, lowercased, bucketed by hash into
/// `dimension` slots, and the resulting count vector is L2-normalized. The
/// same text always produces the same vector.
pub fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0usize;
    for token in tokens(text) {
        token_count += 1;
        vector[bucket(&token, dim)] += 1.0;
    }

    if token_count == 0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dim: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dim
}
