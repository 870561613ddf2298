//! Log source: fetches application logs for analysis.
//!
//! "No matching entries" is an answer, not an error — implementations only
//! raise for genuine I/O failure.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::Result;

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Severity filter applied to fetched log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Error,
    Warning,
    Info,
    All,
}

impl LogSeverity {
    /// Whether a raw log line passes this filter. Matching is by uppercase
    /// level marker; `CRITICAL` always passes.
    pub fn matches(&self, line: &str) -> bool {
        if line.contains("CRITICAL") {
            return true;
        }
        match self {
            LogSeverity::Error => line.contains("ERROR"),
            LogSeverity::Warning => line.contains("WARNING"),
            LogSeverity::Info => line.contains("INFO"),
            LogSeverity::All => true,
        }
    }
}

/// What to fetch: a time window plus a severity filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFilter {
    /// Window spec such as `"5m"`, `"1h"`, `"1d"`.
    pub time_range: String,
    pub severity: LogSeverity,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            time_range: "1h".into(),
            severity: LogSeverity::Error,
        }
    }
}

impl LogFilter {
    /// Maximum number of lines returned for the requested window.
    pub fn line_cap(&self) -> usize {
        match self.time_range.as_str() {
            "5m" => 10,
            "15m" => 30,
            "30m" => 50,
            "1h" => 100,
            "6h" => 300,
            "1d" => 500,
            _ => 100,
        }
    }
}

// ---------------------------------------------------------------------------
// LogSource trait
// ---------------------------------------------------------------------------

/// Fetches application logs from a monitoring backend.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch matching log text. May return empty or explanatory text when
    /// nothing matches; must only fail for I/O errors.
    async fn fetch(&self, filter: &LogFilter) -> Result<String>;
}

// ---------------------------------------------------------------------------
// FileLogSource
// ---------------------------------------------------------------------------

/// Reads logs from a local file, newest entries last. A missing or empty
/// file yields explanatory text rather than an error, since an application
/// that has not logged yet is a normal situation.
pub struct FileLogSource {
    path: PathBuf,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn fetch(&self, filter: &LogFilter) -> Result<String> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(
                "no logs found; the application may not have started or has not logged yet"
                    .to_string(),
            );
        }

        let text = tokio::fs::read_to_string(&self.path).await?;
        if text.trim().is_empty() {
            return Ok("log file is empty; nothing has been recorded yet".to_string());
        }

        let matching: Vec<&str> = text
            .lines()
            .filter(|line| filter.severity.matches(line))
            .collect();
        if matching.is_empty() {
            return Ok(format!(
                "no log entries matched severity filter in the last {}",
                filter.time_range
            ));
        }

        let cap = filter.line_cap();
        let recent = if matching.len() > cap {
            &matching[matching.len() - cap..]
        } else {
            &matching[..]
        };
        tracing::debug!(
            path = %self.path.display(),
            matched = matching.len(),
            returned = recent.len(),
            "logs fetched"
        );
        Ok(recent.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// StaticLogSource
// ---------------------------------------------------------------------------

/// Always returns the same text. Useful in tests and demos.
pub struct StaticLogSource {
    text: String,
}

impl StaticLogSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl LogSource for StaticLogSource {
    async fn fetch(&self, _filter: &LogFilter) -> Result<String> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let source = FileLogSource::new("/definitely/not/here.log");
        let text = source.fetch(&LogFilter::default()).await.unwrap();
        assert!(text.contains("no logs found"));
    }

    #[tokio::test]
    async fn empty_file_yields_explanatory_text() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = FileLogSource::new(file.path());
        let text = source.fetch(&LogFilter::default()).await.unwrap();
        assert!(text.contains("empty"));
    }

    #[tokio::test]
    async fn severity_filter_keeps_errors_and_critical() {
        let file = write_log(&[
            "2026-08-05 INFO  startup complete",
            "2026-08-05 ERROR KeyError: 'api_key'",
            "2026-08-05 WARNING retrying",
            "2026-08-05 CRITICAL disk full",
        ]);
        let source = FileLogSource::new(file.path());
        let text = source.fetch(&LogFilter::default()).await.unwrap();
        assert!(text.contains("KeyError"));
        assert!(text.contains("disk full"));
        assert!(!text.contains("startup complete"));
        assert!(!text.contains("retrying"));
    }

    #[tokio::test]
    async fn all_severity_returns_everything() {
        let file = write_log(&["INFO one", "ERROR two"]);
        let source = FileLogSource::new(file.path());
        let filter = LogFilter {
            time_range: "1h".into(),
            severity: LogSeverity::All,
        };
        let text = source.fetch(&filter).await.unwrap();
        assert!(text.contains("one"));
        assert!(text.contains("two"));
    }

    #[tokio::test]
    async fn window_caps_returned_lines_keeping_newest() {
        let lines: Vec<String> = (0..20).map(|i| format!("ERROR line {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_log(&refs);
        let source = FileLogSource::new(file.path());
        let filter = LogFilter {
            time_range: "5m".into(),
            severity: LogSeverity::Error,
        };
        let text = source.fetch(&filter).await.unwrap();
        let returned: Vec<&str> = text.lines().collect();
        assert_eq!(returned.len(), 10);
        assert_eq!(returned[0], "ERROR line 10");
        assert_eq!(returned[9], "ERROR line 19");
    }

    #[tokio::test]
    async fn no_matching_entries_is_an_answer() {
        let file = write_log(&["INFO quiet day"]);
        let source = FileLogSource::new(file.path());
        let text = source.fetch(&LogFilter::default()).await.unwrap();
        assert!(text.contains("no log entries matched"));
    }

    #[tokio::test]
    async fn static_source_echoes_text() {
        let source = StaticLogSource::new("ERROR canned");
        let text = source.fetch(&LogFilter::default()).await.unwrap();
        assert_eq!(text, "ERROR canned");
    }

    #[test]
    fn unknown_time_range_uses_default_cap() {
        let filter = LogFilter {
            time_range: "3w".into(),
            severity: LogSeverity::Error,
        };
        assert_eq!(filter.line_cap(), 100);
    }
}
