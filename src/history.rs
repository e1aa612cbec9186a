use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Processing: ([^\n]+)").expect("filename pattern"));
static PDF_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PDF saved to (.+\.pdf)").expect("pdf path pattern"));

pub const UNKNOWN_FILENAME: &str = "Recent processing";
pub const FAILED_FILENAME: &str = "Failed processing";

/// One finished run of the external tool.
///
/// `filename` and `output_path` are scraped from whatever the tool printed,
/// so both are best effort.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub id: Uuid,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_secs: f64,
    pub output_path: Option<String>,
}

impl ProcessedFile {
    pub fn succeeded(captured: &str, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: extract_filename(captured),
            timestamp: Utc::now(),
            success: true,
            duration_secs: duration.as_secs_f64(),
            output_path: extract_pdf_path(captured),
        }
    }

    pub fn failed(duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: FAILED_FILENAME.to_string(),
            timestamp: Utc::now(),
            success: false,
            duration_secs: duration.as_secs_f64(),
            output_path: None,
        }
    }
}

pub fn extract_filename(text: &str) -> String {
    FILENAME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('\r').to_string())
        .unwrap_or_else(|| UNKNOWN_FILENAME.to_string())
}

pub fn extract_pdf_path(text: &str) -> Option<String> {
    PDF_PATH_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|path| !path.is_empty())
}

/// A history entry as the history sheet shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    #[serde(flatten)]
    pub entry: ProcessedFile,
    pub relative_label: String,
    pub duration_label: String,
}

// Newest-first list of runs, gone when the app quits
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<ProcessedFile>,
}

impl History {
    pub fn record(&mut self, entry: ProcessedFile) {
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[ProcessedFile] {
        &self.entries
    }

    /// Rows for display, newest first, with labels relative to `now`.
    pub fn rows(&self, now: DateTime<Utc>) -> Vec<HistoryRow> {
        self.entries
            .iter()
            .map(|entry| HistoryRow {
                relative_label: relative_time(entry.timestamp, now),
                duration_label: format_duration(entry.duration_secs),
                entry: entry.clone(),
            })
            .collect()
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn format_duration(secs: f64) -> String {
    format!("{:.1}s", secs)
}

/// Short "how long ago" label for a history row.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} min ago", secs / 60),
        3600..=86_399 => format!("{} hr ago", secs / 3600),
        _ => {
            let days = secs / 86_400;
            if days == 1 {
                "1 day ago".to_string()
            } else {
                format!("{} days ago", days)
            }
        }
    }
}
