//! Language detection (§4.2), grounded in `core/language_utils.py`'s
//! `LANGUAGE_INDICATORS` table: a whole-word, case-insensitive scan
//! for known language names/codes, defaulting to English.

use std::sync::LazyLock;

use regex::Regex;

const LANGUAGE_INDICATORS: &[(&str, &[&str])] = &[
    ("German", &["GERMAN", "DEUTSCH", "DE"]),
    ("French", &["FRENCH", "FRANCAIS", "FRAN\u{00c7}AIS", "FR"]),
    ("Spanish", &["SPANISH", "ESPANOL", "ESPA\u{00d1}OL", "ES"]),
    ("Italian", &["ITALIAN", "ITALIANO", "IT"]),
    ("Portuguese", &["PORTUGUESE", "PORTUGUES", "PORTUGU\u{00ca}S", "PT"]),
    ("Dutch", &["DUTCH", "NEDERLANDS", "NL"]),
    ("Polish", &["POLISH", "POLSKI", "PL"]),
    ("Russian", &["RUSSIAN", "\u{0420}\u{0423}\u{0421}\u{0421}\u{041a}\u{0418}\u{0419}", "RU"]),
    ("Japanese", &["JAPANESE", "JP"]),
    ("Chinese", &["CHINESE", "ZH", "CN"]),
    ("Korean", &["KOREAN", "KR"]),
];

/// Compiled whole-word patterns for each indicator, built once.
static INDICATOR_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    LANGUAGE_INDICATORS
        .iter()
        .map(|(language, indicators)| {
            let patterns = indicators
                .iter()
                .map(|indicator| {
                    Regex::new(&format!(r"\b{}\b", regex::escape(indicator)))
                        .expect("language indicator pattern is always a valid regex")
                })
                .collect();
            (*language, patterns)
        })
        .collect()
});

/// Detects a language name embedded in `text` (title or filename),
/// defaulting to `"English"` when no indicator is found.
#[must_use]
pub fn detect_language(text: &str) -> String {
    if text.is_empty() {
        return "English".to_string();
    }
    let text_upper = text.to_uppercase();

    for (language, patterns) in INDICATOR_PATTERNS.iter() {
        if patterns.iter().any(|pattern| pattern.is_match(&text_upper)) {
            return (*language).to_string();
        }
    }

    "English".to_string()
}
