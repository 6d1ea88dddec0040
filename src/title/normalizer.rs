//! `clean_title`: the ordered, all-or-nothing transformation pipeline that
//! turns a raw scene-release/feed title into a canonical title.

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

/// Release keywords stripped in step 2, tried whitespace/dot delimited.
const RELEASE_KEYWORDS: &[&str] = &[
    "GERMAN", "HYBRID", "MAGAZINE", "EBOOK", "PDF", "EPUB", "RETAIL", "READNFO", "REPACK",
    "UNPACK", "DIRFIX",
];

/// Override table for titles whose default title-casing would be wrong.
/// Matched case-insensitively against the fully-cleaned (pre-override) title.
const TITLE_OVERRIDES: &[(&str, &str)] = &[
    ("national geographic", "National Geographic"),
    ("pcgamer", "PC Gamer"),
    ("pc gamer", "PC Gamer"),
    ("pc world", "PC World"),
    ("mac world", "Mac World"),
    ("e-news", "E-News"),
    ("wired", "Wired"),
    ("2600", "2600"),
];

static ISSUE_NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[.\s]no\.?\s*\d+").expect("static regex"));
static ISSUE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[.\s]issue\.?\s*\d+").expect("static regex"));
static DATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.\s]\d{4}(-\d{2})?\b").expect("static regex"));
static LEADING_UNPACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^unpack[._]?").expect("static regex"));
static TRAILING_GROUP_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[A-Za-z][A-Za-z0-9]*-[a-z]+$").expect("static regex"));
static TRAILING_HASH_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[a-zA-Z0-9]+\]-[a-z]+$").expect("static regex"));
static TRAILING_XPOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[a-z]+$").expect("static regex"));
static CAMEL_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));
static TRAILING_MAGAZINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(magazine|mag\.?)$").expect("static regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

fn strip_keyword(title: &str, keyword: &str) -> String {
    let dotted = Regex::new(&format!(r"(?i)[.\s]{keyword}\.?"))
        .map(|re| re.replace_all(title, ".").into_owned())
        .unwrap_or_else(|_| title.to_string());
    let leading = Regex::new(&format!(r"(?i)^{keyword}\.?"))
        .map(|re| re.replace(&dotted, "").into_owned())
        .unwrap_or(dotted);
    leading
}

/// Cleans a raw scene-release/feed title string into a canonical title.
///
/// Applies an ordered, all-or-nothing sequence of transformations; no step
/// is skipped based on the result of a later one. Deterministic and
/// stateless: `clean_title(clean_title(x)) == clean_title(x)`.
#[must_use]
#[instrument]
pub fn clean_title(raw_title: &str) -> String {
    // 1. Strip issue/date tokens.
    let mut title = ISSUE_NO_RE.replace_all(raw_title, "").into_owned();
    title = ISSUE_NUMBER_RE.replace_all(&title, "").into_owned();
    title = DATE_TOKEN_RE.replace_all(&title, "").into_owned();

    // 2. Strip known release keywords.
    for keyword in RELEASE_KEYWORDS {
        title = strip_keyword(&title, keyword);
    }
    title = LEADING_UNPACK_RE.replace(&title, "").into_owned();

    // 3. Strip trailing release-group tags.
    title = TRAILING_GROUP_TAG_RE.replace(&title, "").into_owned();
    title = TRAILING_HASH_TAG_RE.replace(&title, "").into_owned();
    title = TRAILING_XPOST_RE.replace(&title, "").into_owned();

    // 4. Replace `.` and `_` with space; collapse repeated whitespace.
    title = title.replace(['.', '_'], " ");
    title = WHITESPACE_RE.replace_all(&title, " ").trim().to_string();

    // 5. Split camelCase.
    title = CAMEL_SPLIT_RE.replace_all(&title, "$1 $2").into_owned();

    // 6. Remove trailing " Magazine"/" Mag"/" Mag.".
    title = TRAILING_MAGAZINE_RE.replace(&title, "").into_owned();
    title = WHITESPACE_RE.replace_all(&title, " ").trim().to_string();

    // 7 & 8. Override table, else title-case the remainder.
    let lower = title.to_lowercase();
    for (key, value) in TITLE_OVERRIDES {
        if lower == *key {
            return (*value).to_string();
        }
    }

    title_case(&title)
}

/// Capitalizes the first letter of each whitespace-delimited word.
fn title_case(title: &str) -> String {
    title
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_strips_issue_and_date_tokens() {
        assert_eq!(clean_title("Wired.No.245.2023"), "Wired");
        assert_eq!(clean_title("Wired Issue 12 2023-04"), "Wired");
    }

    #[test]
    fn test_clean_title_strips_release_keywords() {
        assert_eq!(clean_title("Wired.GERMAN.PDF-GROUP-xpost"), "Wired");
        assert_eq!(clean_title("UNPACK_Wired.EPUB"), "Wired");
    }

    #[test]
    fn test_clean_title_strips_trailing_group_tags() {
        assert_eq!(clean_title("Wired Magazine-LORENZ-xpost"), "Wired");
        assert_eq!(clean_title("Wired [df86e9c1f]-xpost"), "Wired");
    }

    #[test]
    fn test_clean_title_splits_camel_case() {
        assert_eq!(clean_title("NationalGeographic"), "National Geographic");
    }

    #[test]
    fn test_clean_title_strips_trailing_magazine_word() {
        assert_eq!(clean_title("PC World Magazine"), "PC World");
        assert_eq!(clean_title("Retro Gamer Mag"), "Retro Gamer");
    }

    #[test]
    fn test_clean_title_applies_override_table() {
        assert_eq!(clean_title("pcgamer"), "PC Gamer");
        assert_eq!(clean_title("national.geographic"), "National Geographic");
        assert_eq!(clean_title("2600"), "2600");
    }

    #[test]
    fn test_clean_title_default_title_case() {
        assert_eq!(clean_title("field and stream"), "Field And Stream");
    }

    #[test]
    fn test_clean_title_is_idempotent() {
        let samples = [
            "Wired.Magazine.No.245.2023.PDF-GROUP-xpost",
            "NationalGeographic_2023_03",
            "UNPACK_Retro.Gamer.Issue.99.EPUB",
            "pcgamer",
        ];
        for sample in samples {
            let once = clean_title(sample);
            let twice = clean_title(&once);
            assert_eq!(once, twice, "clean_title must be idempotent for {sample}");
        }
    }

    #[test]
    fn test_clean_title_collapses_whitespace() {
        assert_eq!(clean_title("Field___and...Stream"), "Field And Stream");
    }
}
