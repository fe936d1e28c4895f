//! No-repeat-n-gram constraint.

/// Tokens that would complete an n-gram already present in `tokens`.
pub fn banned_next_tokens(tokens: &[u32], ngram_size: usize) -> Vec<u32> {
    if ngram_size == 0 || tokens.len() + 1 < ngram_size {
        return Vec::new();
    }

    let prefix = &tokens[tokens.len() + 1 - ngram_size..];
    let mut banned: Vec<u32> = tokens
        .windows(ngram_size)
        .filter(|window| &window[..ngram_size - 1] == prefix)
        .map(|window| window[ngram_size - 1])
        .collect();
    banned.sort_unstable();
    banned.dedup();
    banned
}

/// Mask banned continuations to `-inf` in one row of log-probabilities.
pub(crate) fn apply_no_repeat_ngram(scores: &mut [f32], tokens: &[u32], ngram_size: usize) {
    for token in banned_next_tokens(tokens, ngram_size) {
        if let Some(score) = scores.get_mut(token as usize) {
            *score = f32::NEG_INFINITY;
        }
    }
}

/// True when some n-gram occurs twice in `tokens`.
pub fn has_repeated_ngram(tokens: &[u32], ngram_size: usize) -> bool {
    if ngram_size == 0 || tokens.len() < ngram_size {
        return false;
    }
    let mut seen = std::collections::HashSet::new();
    tokens.windows(ngram_size).any(|window| !seen.insert(window))
}
