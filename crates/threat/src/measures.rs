//! Statistical measures over candidate text

use std::collections::HashMap;

const SYNTAX_CHARS: &[char] = &[';', '{', '}', '(', ')', '<', '>', '$', '[', ']', '='];

/// Shannon entropy in bits per character.
pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Fraction of characters that are code-syntax punctuation.
pub fn syntax_density(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let hits = text.chars().filter(|c| SYNTAX_CHARS.contains(c)).count();
    hits as f64 / total as f64
}
