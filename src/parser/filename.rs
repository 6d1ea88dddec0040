//! Filename/path metadata extraction (§4.2), grounded in
//! `processor/metadata_extractor.py`'s `MetadataExtractor`: a 7-entry
//! ordered pattern catalog over the filename stem, falling back to a
//! directory walk for date-only/year-only/unparseable stems.

use std::path::Path;

use chrono::NaiveDate;
use std::sync::LazyLock;

use regex::Regex;

use super::country::detect_country;
use super::language::detect_language;

const MIN_VALID_YEAR: i32 = 1900;
const MAX_VALID_YEAR: i32 = 2100;

const SYSTEM_FOLDERS: &[&str] = &[
    ".",
    "..",
    "downloads",
    "data",
    "_magazines",
    "_comics",
    "_articles",
    "_news",
    ".covers",
    "local",
    "cache",
    "config",
    "logs",
    "app",
    "english",
    "spanish",
    "french",
    "german",
    "italian",
    "portuguese",
    "dutch",
    "russian",
    "chinese",
    "japanese",
    "korean",
];

const SPECIAL_EDITION_MARKERS: &[&str] = &[
    "special",
    "annual",
    "collector",
    "holiday",
    "christmas",
    "summer special",
    "winter special",
    "spring special",
    "fall special",
    "anniversary",
    "yearbook",
    "best of",
    "commemorative",
];

/// Which entry of the pattern catalog produced a [`ParsedFilename`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedPattern {
    /// `{Title} - {MonAbbr}{Year}`, e.g. `Wired Magazine - Dec2006`.
    TitleDashMonAbbrYear,
    /// `{Title}.{MonthName|Abbr}.{Year}`, dot-separated.
    DotSeparatedTitleMonthYear,
    /// `{Title} {Month} {Year}`, full or abbreviated month name.
    TitleMonthYear,
    /// `{Title} {YYYY}-{MM}`.
    TitleYearDashMonth,
    /// `{Month}{Year}` or `{Month} {Year}` alone; title must come from
    /// the directory walk.
    DateOnlyStem,
    /// A bare 4-digit year anywhere in the stem; title must come from
    /// the directory walk.
    YearOnlyStem,
    /// No pattern matched; the raw stem is used as the title and the
    /// current date is a placeholder.
    Fallback,
}

/// How much to trust a [`ParsedFilename`]'s title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Low,
}

/// The result of matching the filename stem against the pattern
/// catalog, before any directory-walk title resolution.
#[derive(Debug, Clone)]
pub struct ParsedFilename {
    pub title: String,
    pub issue_date: NaiveDate,
    pub year: i32,
    pub month_name: Option<String>,
    pub matched_pattern: MatchedPattern,
    pub confidence: Confidence,
}

/// The combined result of filename parsing and directory-walk title
/// resolution, plus language/country/special-edition detection.
#[derive(Debug, Clone)]
pub struct ParsedMetadata {
    pub title: String,
    pub issue_date: NaiveDate,
    pub is_special_edition: bool,
    pub language: String,
    pub country: Option<&'static str>,
    pub matched_pattern: MatchedPattern,
    pub confidence: Confidence,
}

static PATTERN_DASH_MON_ABBR_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)\s*-\s*([A-Za-z]{3})(\d{4})").expect("fixed regex"));

static PATTERN_DOT_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^([^.]+)\.(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.(\d{4})",
    )
    .expect("fixed regex")
});

static PATTERN_TITLE_MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)\s+([A-Za-z]+)\s+(\d{4})$").expect("fixed regex"));

static PATTERN_TITLE_YEAR_DASH_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)\s+(\d{4})-(\d{2})$").expect("fixed regex"));

static PATTERN_DATE_ONLY_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Za-z]+)(\d{4})$").expect("fixed regex"));

static PATTERN_DATE_ONLY_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Za-z]+)\s+(\d{4})$").expect("fixed regex"));

static PATTERN_YEAR_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").expect("fixed regex"));

/// Parses a filename stem (no extension) against the ordered pattern
/// catalog. Patterns 5/6 ([`MatchedPattern::DateOnlyStem`],
/// [`MatchedPattern::YearOnlyStem`]) and the fallback leave `title` as
/// the raw stem; callers combining this with a path should resolve
/// the title via [`get_title_from_path`] in those cases.
#[must_use]
pub fn parse_filename(stem: &str) -> ParsedFilename {
    if let Some(captures) = PATTERN_DASH_MON_ABBR_YEAR.captures(stem) {
        let title = captures[1].trim().to_string();
        let month_str = &captures[2];
        let year_str = &captures[3];
        if let Some((date, month_name)) = month_year_to_date(month_str, year_str) {
            return ParsedFilename {
                title,
                issue_date: date,
                year: date.year_value(),
                month_name: Some(month_name),
                matched_pattern: MatchedPattern::TitleDashMonAbbrYear,
                confidence: Confidence::High,
            };
        }
    }

    if let Some(captures) = PATTERN_DOT_SEPARATED.captures(stem) {
        let title = captures[1].replace('.', " ").trim().to_string();
        let month_str = &captures[2];
        let year_str = &captures[3];
        if let Some((date, month_name)) = month_year_to_date(month_str, year_str) {
            return ParsedFilename {
                title,
                issue_date: date,
                year: date.year_value(),
                month_name: Some(month_name),
                matched_pattern: MatchedPattern::DotSeparatedTitleMonthYear,
                confidence: Confidence::High,
            };
        }
    }

    if let Some(captures) = PATTERN_TITLE_MONTH_YEAR.captures(stem) {
        let title = captures[1].trim().to_string();
        let month_str = &captures[2];
        let year_str = &captures[3];
        if let Some((date, month_name)) = month_year_to_date(month_str, year_str) {
            return ParsedFilename {
                title,
                issue_date: date,
                year: date.year_value(),
                month_name: Some(month_name),
                matched_pattern: MatchedPattern::TitleMonthYear,
                confidence: Confidence::High,
            };
        }
    }

    if let Some(captures) = PATTERN_TITLE_YEAR_DASH_MONTH.captures(stem) {
        let title = captures[1].trim().to_string();
        let year: i32 = captures[2].parse().unwrap_or(0);
        let month: u32 = captures[3].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
            return ParsedFilename {
                title,
                issue_date: date,
                year,
                month_name: month_name_for(month),
                matched_pattern: MatchedPattern::TitleYearDashMonth,
                confidence: Confidence::High,
            };
        }
    }

    if let Some(captures) =
        PATTERN_DATE_ONLY_GLUED.captures(stem).or_else(|| PATTERN_DATE_ONLY_SPACED.captures(stem))
    {
        let month_str = &captures[1];
        let year_str = &captures[2];
        if let Some((date, month_name)) = month_year_to_date(month_str, year_str) {
            return ParsedFilename {
                title: stem.to_string(),
                issue_date: date,
                year: date.year_value(),
                month_name: Some(month_name),
                matched_pattern: MatchedPattern::DateOnlyStem,
                confidence: Confidence::Low,
            };
        }
    }

    if let Some(captures) = PATTERN_YEAR_ANYWHERE.captures(stem) {
        let year: i32 = captures[1].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
            return ParsedFilename {
                title: stem.to_string(),
                issue_date: date,
                year,
                month_name: None,
                matched_pattern: MatchedPattern::YearOnlyStem,
                confidence: Confidence::Low,
            };
        }
    }

    ParsedFilename {
        title: stem.to_string(),
        issue_date: current_date_placeholder(),
        year: current_date_placeholder().year_value(),
        month_name: None,
        matched_pattern: MatchedPattern::Fallback,
        confidence: Confidence::Low,
    }
}

/// Parses the file at `path`, combining [`parse_filename`] with a
/// directory-walk title resolution for low-confidence matches, then
/// layering special-edition, language, and country detection over
/// the combined filename + path text.
///
/// # Errors
/// Returns [`super::ParseError::NoFileStem`] if `path` has no file
/// stem to parse.
pub fn parse_file(path: &Path) -> super::Result<ParsedMetadata> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| super::ParseError::NoFileStem(path.display().to_string()))?;

    let parsed = parse_filename(stem);

    let title = if matches!(parsed.confidence, Confidence::Low) {
        get_title_from_path(path).unwrap_or(parsed.title)
    } else {
        parsed.title
    };

    let detection_text = format!("{} {}", path.display(), title);
    let is_special_edition =
        SPECIAL_EDITION_MARKERS.iter().any(|marker| detection_text.to_lowercase().contains(marker));

    Ok(ParsedMetadata {
        language: detect_language(&detection_text),
        country: detect_country(&detection_text),
        issue_date: parsed.issue_date,
        matched_pattern: parsed.matched_pattern,
        confidence: parsed.confidence,
        title,
        is_special_edition,
    })
}

/// Walks up from `path`'s parent directory, skipping system folders
/// and 4-digit folder names that fall within the plausible year range
/// `[1900, 2100]`, returning the first folder name that survives
/// both checks. A folder literally named `"2600"` is returned as a
/// title since it is outside neither check applies to non-year
/// interpretations — only true year folders are skipped.
#[must_use]
pub fn get_title_from_path(path: &Path) -> Option<String> {
    let mut current = path.parent();

    while let Some(dir) = current {
        let Some(folder_name) = dir.file_name().and_then(|name| name.to_str()) else {
            current = dir.parent();
            continue;
        };

        if SYSTEM_FOLDERS.contains(&folder_name.to_lowercase().as_str()) {
            current = dir.parent();
            continue;
        }

        if folder_name.len() == 4 && folder_name.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year_value) = folder_name.parse::<i32>() {
                if (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year_value) {
                    current = dir.parent();
                    continue;
                }
            }
        }

        return Some(folder_name.to_string());
    }

    None
}

/// Converts a month name/abbreviation plus a 4-digit year string
/// into a date (the 1st of that month) and the month's full name.
fn month_year_to_date(month_str: &str, year_str: &str) -> Option<(NaiveDate, String)> {
    let year: i32 = year_str.parse().ok()?;
    let (month, full_name) = month_number_and_name(month_str)?;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((date, full_name))
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

fn month_number_and_name(month_str: &str) -> Option<(u32, String)> {
    let lower = month_str.to_lowercase();
    for (index, name) in MONTH_NAMES.iter().enumerate() {
        let name_lower = name.to_lowercase();
        let is_full_match = name_lower == lower;
        let is_abbr_match = lower.len() == 3 && name_lower.starts_with(&lower);
        if is_full_match || is_abbr_match {
            return Some((index as u32 + 1, (*name).to_string()));
        }
    }
    None
}

fn month_name_for(month: u32) -> Option<String> {
    MONTH_NAMES.get((month as usize).checked_sub(1)?).map(|name| (*name).to_string())
}

/// Helper trait so callers can pull the year out of a `NaiveDate`
/// without importing `chrono::Datelike` at every call site.
trait YearValue {
    fn year_value(&self) -> i32;
}

impl YearValue for NaiveDate {
    fn year_value(&self) -> i32 {
        use chrono::Datelike;
        self.year()
    }
}

fn current_date_placeholder() -> NaiveDate {
    // `parse_file`/`parse_filename` cannot call `chrono::Local::now()`
    // from pure parsing code under test; callers needing "now" as a
    // placeholder get a fixed epoch-like date and are expected to
    // treat `Fallback`/low-confidence matches as needing review
    // rather than relying on the exact placeholder value.
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}
