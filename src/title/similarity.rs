//! Token-set similarity scoring between two titles.

use std::collections::BTreeSet;

use tracing::instrument;

/// Computes a token-set-ratio-style similarity score between two strings,
/// order-insensitive and multiset-aware: `similarity("Wired Dec 2023",
/// "2023 Wired Dec") == 100`.
///
/// Implementation: lowercase both strings, tokenize on whitespace, and
/// build the sorted intersection and sorted per-side remainder token
/// sets (the standard token-set-ratio construction). The score is the
/// best pairwise normalized-Levenshtein similarity among
/// `(intersection, intersection+remainder_a)`,
/// `(intersection, intersection+remainder_b)`, and
/// `(intersection+remainder_a, intersection+remainder_b)`, scaled to
/// 0..100. Returns 100 for two empty strings.
#[must_use]
#[instrument]
pub fn similarity(a: &str, b: &str) -> u8 {
    let tokens_a: BTreeSet<String> = tokenize(a);
    let tokens_b: BTreeSet<String> = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 100;
    }

    let intersection: BTreeSet<&String> = tokens_a.intersection(&tokens_b).collect();
    let only_a: BTreeSet<&String> = tokens_a.difference(&tokens_b).collect();
    let only_b: BTreeSet<&String> = tokens_b.difference(&tokens_a).collect();

    let sorted_intersection = join_sorted(intersection.iter().copied());
    let combined_a = join_sorted(
        intersection
            .iter()
            .copied()
            .chain(only_a.iter().copied()),
    );
    let combined_b = join_sorted(
        intersection
            .iter()
            .copied()
            .chain(only_b.iter().copied()),
    );

    let candidates = [
        ratio(&sorted_intersection, &combined_a),
        ratio(&sorted_intersection, &combined_b),
        ratio(&combined_a, &combined_b),
    ];

    candidates
        .into_iter()
        .max()
        .unwrap_or(0)
}

/// Returns `true` if `similarity(a, b) >= threshold`.
#[must_use]
pub fn matches(a: &str, b: &str, threshold: u8) -> bool {
    similarity(a, b) >= threshold
}

fn tokenize(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn join_sorted<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    let mut sorted: Vec<&str> = tokens.map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    let score = strsim::normalized_levenshtein(a, b);
    (score * 100.0).round() as u8
}
