//! Title categorization (§4.2 step 5 of the Import Pipeline),
//! grounded in `core/parsers/categorizer.py`'s `FileCategorizer`: an
//! ordered keyword-to-category map, case-insensitive substring match,
//! defaulting to `"Magazines"`.

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Comics", &["comic", "comics", "graphic novel"]),
    ("News", &["newspaper", "gazette", "tribune", "herald", "chronicle", "post", "times"]),
    ("Articles", &["journal", "article", "quarterly", "review"]),
];

/// Categorizes `title` by matching against an ordered keyword table;
/// the first category whose keyword list contains a case-insensitive
/// substring match wins. Falls back to `"Magazines"`.
#[must_use]
pub fn categorize(title: &str) -> &'static str {
    if title.is_empty() {
        return "Magazines";
    }
    let title_lower = title.to_lowercase();

    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|keyword| title_lower.contains(keyword)) {
            return category;
        }
    }

    "Magazines"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_comic_title() {
        assert_eq!(categorize("Batman Comics Monthly"), "Comics");
    }

    #[test]
    fn test_categorize_news_title() {
        assert_eq!(categorize("The Daily Tribune"), "News");
    }

    #[test]
    fn test_categorize_journal_title() {
        assert_eq!(categorize("Nature Journal Quarterly"), "Articles");
    }

    #[test]
    fn test_categorize_default_is_magazines() {
        assert_eq!(categorize("Wired"), "Magazines");
    }

    #[test]
    fn test_categorize_empty_title_is_magazines() {
        assert_eq!(categorize(""), "Magazines");
    }
}
