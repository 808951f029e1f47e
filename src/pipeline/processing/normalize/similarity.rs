//! String similarity for fuzzy canonical matching. Both metrics compare
//! lower-cased text and return a ratio in [0, 1].

use crate::config::SimilarityMetric;

impl SimilarityMetric {
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            SimilarityMetric::SequenceRatio => sequence_ratio(a, b),
            SimilarityMetric::Levenshtein => levenshtein_ratio(a, b),
        }
    }
}

/// Ratcliff/Obershelp ratio: `2 * M / T`, where `M` counts the characters in
/// recursively found longest common blocks and `T` is the combined length.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_match(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + k..], &b[j + k..])
}

/// Longest common block as `(start in a, start in b, length)`; ties go to the
/// block starting earliest in `a`, then earliest in `b`.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// `1 - distance / max_len` over characters
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }

    let len1 = a.chars().count();
    let len2 = b.chars().count();
    if len1 == 0 || len2 == 0 {
        return 0.0;
    }

    let max_len = len1.max(len2);
    1.0 - (levenshtein_distance(&a, &b) as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();

    let mut row: Vec<usize> = (0..=chars2.len()).collect();
    for (i, c1) in chars1.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, c2) in chars2.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[chars2.len()]
}
