use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::broadcast::summary::{DeliveryStatus, Summary};

pub const LOG_HEADER: &str = "user_id,status,error,timestamp";
const LOG_PREFIX: &str = "broadcast_log_";

/// Per-run CSV audit log: exactly one row per audience member, appended
/// while the run lock is held, closed when the run ends.
pub struct DeliveryLog {
    path: PathBuf,
    file: File,
}

impl DeliveryLog {
    /// Creates a fresh log for this run. The filename carries the run
    /// timestamp so runs never overwrite each other.
    pub fn create(logs_dir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(logs_dir)
            .with_context(|| format!("creating logs directory {logs_dir:?}"))?;
        let name = format!("{LOG_PREFIX}{}.csv", started_at.format("%Y%m%d_%H%M%S"));
        let path = logs_dir.join(name);
        let mut file = File::create(&path)
            .with_context(|| format!("creating delivery log {path:?}"))?;
        writeln!(file, "{LOG_HEADER}")?;
        Ok(DeliveryLog { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn append(
        &mut self,
        user_id: i64,
        status: DeliveryStatus,
        error_detail: &str,
        timestamp: DateTime<Local>,
    ) -> Result<()> {
        writeln!(
            self.file,
            "{},{},{},{}",
            user_id,
            status.as_str(),
            csv_escape(error_detail),
            timestamp.format("%Y-%m-%d %H:%M:%S")
        )?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        self.file.flush()?;
        Ok(self.path)
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Newest delivery log in the directory, by the timestamp in the filename.
pub fn latest_log(logs_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(logs_dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .max()
}

/// Recomputes the run summary from a stored log. Read-only; sends nothing.
/// Rows with an unknown status are skipped, matching the tolerant reads of
/// the suppression store.
pub fn summarize_log(path: &Path) -> Result<Summary> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading delivery log {path:?}"))?;
    let mut summary = Summary::new();
    for line in content.lines().skip(1) {
        let Some(status_field) = line.split(',').nth(1) else {
            continue;
        };
        if let Some(status) = DeliveryStatus::from_str(status_field.trim()) {
            summary.record(status);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_log_has_header_and_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let log = DeliveryLog::create(dir.path(), ts()).unwrap();
        assert_eq!(log.file_name(), "broadcast_log_20260830_120000.csv");

        let path = log.finish().unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, format!("{LOG_HEADER}\n"));
    }

    #[test]
    fn rows_append_and_summarize_agrees() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = DeliveryLog::create(dir.path(), ts()).unwrap();
        log.append(1, DeliveryStatus::Delivered, "", ts()).unwrap();
        log.append(2, DeliveryStatus::Blocked, "Forbidden: bot was blocked", ts())
            .unwrap();
        log.append(3, DeliveryStatus::Delivered, "", ts()).unwrap();
        let path = log.finish().unwrap();

        let summary = summarize_log(&path).unwrap();
        assert_eq!(summary.count(DeliveryStatus::Delivered), 2);
        assert_eq!(summary.count(DeliveryStatus::Blocked), 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn error_detail_with_commas_stays_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = DeliveryLog::create(dir.path(), ts()).unwrap();
        log.append(9, DeliveryStatus::Error, "weird, \"quoted\" detail", ts())
            .unwrap();
        let path = log.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"weird, \"\"quoted\"\" detail\""));

        // status is still parseable as the second bare field
        let summary = summarize_log(&path).unwrap();
        assert_eq!(summary.count(DeliveryStatus::Error), 1);
    }

    #[test]
    fn latest_log_picks_newest_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broadcast_log_20260101_000000.csv"), "x").unwrap();
        fs::write(dir.path().join("broadcast_log_20260830_093000.csv"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let latest = latest_log(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap().to_str().unwrap(),
            "broadcast_log_20260830_093000.csv"
        );
    }

    #[test]
    fn latest_log_empty_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_log(dir.path()).is_none());
    }
}
