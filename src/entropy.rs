// Shannon entropy scoring for candidate tokens
use std::collections::HashMap;

/// Default minimum token length for a defined score
pub const DEFAULT_MIN_LENGTH: usize = 6;

/// Calculate Shannon entropy of a string in bits per character
///
/// 0.0 for a string of one repeated character, log2(k) for k equally
/// frequent symbols.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut freq: HashMap<char, u32> = HashMap::new();
    let mut len = 0u32;
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
        len += 1;
    }

    if len == 0 {
        return 0.0;
    }

    let len = f64::from(len);
    let entropy = -freq
        .values()
        .map(|&count| {
            let p = f64::from(count) / len;
            p * p.log2()
        })
        .sum::<f64>();

    // -0.0 for single-symbol strings
    entropy.max(0.0)
}

/// Entropy scorer that opts out of short tokens
#[derive(Debug, Clone, Copy)]
pub struct EntropyScorer {
    min_length: usize,
}

impl EntropyScorer {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Score a token, or `None` when it is too short to score reliably
    pub fn score(&self, token: &str) -> Option<f64> {
        if token.chars().count() < self.min_length {
            return None;
        }
        Some(shannon_entropy(token))
    }
}

impl Default for EntropyScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LENGTH)
    }
}
