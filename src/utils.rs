//! Utility functions for episode naming and date tokens

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static INVALID_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex")
});

static MONTH_NAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
    )
    .expect("static regex")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("static regex")
});

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{2}|\d{4})\b").expect("static regex")
});

/// Replace characters that are invalid in file names with `-`
///
/// # Examples
///
/// ```
/// use c2c_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Coast: Aliens/UFOs?"), "Coast- Aliens-UFOs-");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    INVALID_FILENAME_CHARS
        .replace_all(name.trim(), "-")
        .into_owned()
}

/// Find a calendar date inside free text
///
/// Recognizes `January 5, 2024`, `Jan 5th 2024`, `2024-01-05`, `1/5/24` and `01.05.2024`
/// (month first). Returns the first match that is a real date.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = MONTH_NAME_DATE.captures(text) {
        let month = month_number(&caps[1])?;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = ISO_DATE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    let caps = NUMERIC_DATE.captures(text)?;
    let month = caps[1].parse().ok()?;
    let day = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Publish token for a title
///
/// A date found in the title, as `YYYY-MM-DD`. Titles without a date fall back to
/// their leading segment (everything before the first `" - "`).
pub fn publish_token(title: &str) -> String {
    match find_date(title) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => title
            .split(" - ")
            .next()
            .unwrap_or(title)
            .trim()
            .to_string(),
    }
}

/// Whether a publish token is a normalized date
pub fn token_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// Output file name: `<sanitized-title> <YYYY-MM-DD>.<ext>`
///
/// The date part is the publish date, never the retrieval date, so the name is the
/// same on every run. Titles without a parseable date get `<sanitized-title>.<ext>`.
///
/// # Examples
///
/// ```
/// use c2c_dl::utils::episode_file_name;
///
/// assert_eq!(
///     episode_file_name("Coast to Coast AM", "2024-01-05", "mp4"),
///     "Coast to Coast AM 2024-01-05.mp4"
/// );
/// assert_eq!(
///     episode_file_name("Coast Replay", "Coast Replay", "mp4"),
///     "Coast Replay.mp4"
/// );
/// ```
#[must_use]
pub fn episode_file_name(title: &str, token: &str, extension: &str) -> String {
    let stem = episode_file_stem(title, token);
    let extension = extension.trim_start_matches('.');
    format!("{stem}.{extension}")
}

/// Output file name without extension
#[must_use]
pub fn episode_file_stem(title: &str, token: &str) -> String {
    let stem = sanitize_filename(title);
    match token_date(token) {
        Some(date) => format!("{} {}", stem, date.format("%Y-%m-%d")),
        None => stem,
    }
}
