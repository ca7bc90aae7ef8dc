//! Descriptive side file for downloaded episodes
//!
//! Best-effort: every field falls back to a fixed placeholder, and nothing here can
//! fail or influence whether an episode counts as retrieved.

use crate::types::EpisodeRecord;
use crate::utils::{find_date, token_date};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const UNKNOWN_HOST: &str = "Unknown";
const UNKNOWN_DATE: &str = "Unknown";
const NO_DESCRIPTION: &str = "No description available.";
const NO_GUESTS: &str = "None listed";

static HOST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?im)^\s*(?:host(?:ed by)?|presenter)\s*[:\-]\s*(.+?)\s*$").expect("static regex")
});

static HOST_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b[Hh]ost\s+([A-Z][\w.'-]+(?:\s+[A-Z][\w.'-]+)+)").expect("static regex")
});

static GUEST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?im)^\s*guests?\s*[:\-]\s*(.+?)\s*$").expect("static regex")
});

static GUEST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\s*(?:,|;|&|\band\b)\s*").expect("static regex")
});

static LABELLED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^\s*(?:host(?:ed by)?|presenter|guests?|date|title)\s*[:\-]").expect("static regex")
});

/// Fields of the descriptive template
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpisodeMetadata {
    /// Episode title
    pub title: String,
    /// Show host
    pub host: String,
    /// Air date, `YYYY-MM-DD` when known
    pub date: String,
    /// Free-text summary
    pub description: String,
    /// Guest names, possibly empty
    pub guests: Vec<String>,
}

impl EpisodeMetadata {
    /// Parse whatever can be recovered from a record's title, token and notes
    pub fn from_record(record: &EpisodeRecord) -> Self {
        let notes = record.notes.as_deref().unwrap_or("");

        let host = HOST_LINE
            .captures(notes)
            .or_else(|| HOST_INLINE.captures(notes))
            .map(|caps| caps[1].trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN_HOST.to_string());

        let date = token_date(&record.publish_token)
            .or_else(|| find_date(notes))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        let guests = GUEST_LINE
            .captures(notes)
            .map(|caps| {
                GUEST_SEPARATOR
                    .split(&caps[1])
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let description = notes
            .split("\n\n")
            .flat_map(|para| para.lines())
            .filter(|line| !LABELLED_LINE.is_match(line))
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let description = if description.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            description
        };

        Self {
            title: record.title.clone(),
            host,
            date,
            description,
            guests,
        }
    }

    /// Render the fixed text template
    pub fn render(&self) -> String {
        let guests = if self.guests.is_empty() {
            NO_GUESTS.to_string()
        } else {
            self.guests
                .iter()
                .map(|g| format!("- {g}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Title: {}\nHost: {}\nDate: {}\n\nDescription:\n{}\n\nGuests:\n{}\n",
            self.title, self.host, self.date, self.description, guests
        )
    }
}

/// Text rendering for a record
pub fn describe(record: &EpisodeRecord) -> String {
    EpisodeMetadata::from_record(record).render()
}

/// Side file path for a media file (`.txt` next to it)
pub fn description_path(media_path: &Path) -> PathBuf {
    media_path.with_extension("txt")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_notes(notes: Option<&str>) -> EpisodeRecord {
        let mut record = EpisodeRecord::new("Coast to Coast AM - January 5, 2024", "ref");
        record.notes = notes.map(str::to_string);
        record
    }

    #[test]
    fn labelled_fields_are_parsed() {
        let record = record_with_notes(Some(
            "Host: George Noory\nGuests: Jane Doe, John Roe and Ann Poe\n\nUFO sightings over the desert.\nCallers weigh in.",
        ));

        let meta = EpisodeMetadata::from_record(&record);

        assert_eq!(meta.host, "George Noory");
        assert_eq!(meta.date, "2024-01-05");
        assert_eq!(meta.guests, vec!["Jane Doe", "John Roe", "Ann Poe"]);
        assert_eq!(meta.description, "UFO sightings over the desert. Callers weigh in.");
    }

    #[test]
    fn inline_host_mention_is_recognized() {
        let record = record_with_notes(Some("Tonight host George Noory welcomes callers."));
        let meta = EpisodeMetadata::from_record(&record);
        assert_eq!(meta.host, "George Noory");
    }

    #[test]
    fn every_field_has_a_fallback() {
        let mut record = EpisodeRecord::new("Coast Special", "ref");
        record.notes = None;

        let text = describe(&record);

        assert_eq!(
            text,
            "Title: Coast Special\nHost: Unknown\nDate: Unknown\n\nDescription:\nNo description available.\n\nGuests:\nNone listed\n"
        );
    }

    #[test]
    fn date_falls_back_to_notes() {
        let mut record = EpisodeRecord::new("Coast Special", "ref");
        record.notes = Some("Aired March 3, 2023".to_string());
        assert_eq!(EpisodeMetadata::from_record(&record).date, "2023-03-03");
    }

    #[test]
    fn rendered_guests_are_listed() {
        let record = record_with_notes(Some("Guest: Jane Doe"));
        let text = describe(&record);
        assert!(text.contains("Guests:\n- Jane Doe\n"));
        assert!(text.starts_with("Title: Coast to Coast AM - January 5, 2024\n"));
    }

    #[test]
    fn side_file_sits_next_to_media() {
        assert_eq!(
            description_path(Path::new("downloads/Coast 2024-01-05.mp4")),
            PathBuf::from("downloads/Coast 2024-01-05.txt")
        );
    }
}
