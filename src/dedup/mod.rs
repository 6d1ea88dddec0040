//! Group-key computation for cheap, exact-equality submission dedup.
//!
//! Two distinct fuzzy surfaces exist in this crate: this module's
//! `fuzzy_match_group_id` is the O(1)-equality key used at submit time
//! (§4.4/§4.9), while [`crate::title::similarity`] is the O(N)
//! token-set-ratio used once per imported file by the Import Pipeline.
//! They are not interchangeable: the group key intentionally collapses
//! less ("Wired December 2023" and "Wired December 2024" get different
//! keys only because the year token survives"), trading precision for
//! the ability to run at submit time without quadratic cost.

use std::sync::LazyLock;

use std::collections::HashMap;

use tracing::instrument;

static MONTH_ABBREVIATIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("jan", "january"),
        ("feb", "february"),
        ("mar", "march"),
        ("apr", "april"),
        ("may", "may"),
        ("jun", "june"),
        ("jul", "july"),
        ("aug", "august"),
        ("sep", "september"),
        ("sept", "september"),
        ("oct", "october"),
        ("nov", "november"),
        ("dec", "december"),
    ])
});

/// Computes the dedup group key for a search result title.
///
/// Lowercases, splits on whitespace, maps month abbreviations to their
/// full names so `"Wired Dec 2023"` and `"Wired December 2023"` collapse
/// to the same key, keeps the first three tokens longer than two
/// characters, and joins them with `-`.
#[must_use]
#[instrument]
pub fn fuzzy_match_group_id(title: &str) -> String {
    let normalized = title.to_lowercase();
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let expanded: Vec<&str> = words
        .into_iter()
        .map(|word| MONTH_ABBREVIATIONS.get(word).copied().unwrap_or(word))
        .collect();

    expanded
        .into_iter()
        .filter(|word| word.len() > 2)
        .take(3)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_equality_under_month_variation() {
        assert_eq!(
            fuzzy_match_group_id("Wired December 2023"),
            fuzzy_match_group_id("Wired Dec 2023")
        );
    }

    #[test]
    fn test_group_key_collapses_whitespace_and_case() {
        assert_eq!(
            fuzzy_match_group_id("  WIRED   December 2023  "),
            fuzzy_match_group_id("wired december 2023")
        );
    }

    #[test]
    fn test_group_key_keeps_first_three_significant_tokens() {
        assert_eq!(
            fuzzy_match_group_id("National Geographic Kids January 2024"),
            "national-geographic-kids"
        );
    }

    #[test]
    fn test_group_key_skips_short_tokens() {
        // "of" has length 2, is skipped; "pc" also length 2, skipped.
        assert_eq!(fuzzy_match_group_id("Of PC and Men"), "and-men");
    }

    #[test]
    fn test_group_key_empty_title_is_empty_string() {
        assert_eq!(fuzzy_match_group_id(""), "");
        assert_eq!(fuzzy_match_group_id("   "), "");
    }

    #[test]
    fn test_group_key_sept_abbreviation() {
        assert_eq!(
            fuzzy_match_group_id("Wired Sept 2023"),
            fuzzy_match_group_id("Wired September 2023")
        );
    }
}
