use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub const SUPPRESSION_HEADER: &str = "user_id,reason,date_added";

/// Why a recipient must never be messaged again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressReason {
    Blocked,
    DeletedOrInvalid,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::Blocked => "blocked",
            SuppressReason::DeletedOrInvalid => "deleted_or_invalid",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuppressionRecord {
    pub user_id: i64,
    pub reason: SuppressReason,
    pub date_added: NaiveDate,
}

/// Append-only CSV of recipients excluded from all future broadcasts.
/// Rows are history, never rewritten; presence of an id at all means
/// "do not send".
pub struct SuppressionStore {
    path: PathBuf,
}

impl SuppressionStore {
    pub fn new(path: PathBuf) -> Self {
        SuppressionStore { path }
    }

    /// Distinct suppressed ids. Malformed rows are skipped, a missing file
    /// is an empty set.
    pub fn load(&self) -> HashSet<i64> {
        let mut ids = HashSet::new();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return ids,
        };
        for line in content.lines() {
            let Some(first) = line.split(',').next() else {
                continue;
            };
            if let Ok(id) = first.trim().parse::<i64>() {
                ids.insert(id);
            }
        }
        ids
    }

    /// Appends new records, writing the header only when the file is new.
    /// Empty input is a no-op (no file is created either).
    pub fn append(&self, rows: &[SuppressionRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening suppression store {:?}", self.path))?;

        if needs_header {
            writeln!(file, "{SUPPRESSION_HEADER}")?;
        }
        for row in rows {
            writeln!(
                file,
                "{},{},{}",
                row.user_id,
                row.reason.as_str(),
                row.date_added.format("%Y-%m-%d")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn record(user_id: i64, reason: SuppressReason) -> SuppressionRecord {
        SuppressionRecord {
            user_id,
            reason,
            date_added: Local::now().date_naive(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SuppressionStore::new(dir.path().join("suppressed.csv"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn empty_append_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppressed.csv");
        let store = SuppressionStore::new(path.clone());
        store.append(&[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn header_is_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppressed.csv");
        let store = SuppressionStore::new(path.clone());

        store.append(&[record(1, SuppressReason::Blocked)]).unwrap();
        store.append(&[record(2, SuppressReason::DeletedOrInvalid)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content
            .lines()
            .filter(|l| *l == SUPPRESSION_HEADER)
            .count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn load_skips_malformed_rows_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppressed.csv");
        fs::write(
            &path,
            "user_id,reason,date_added\n\
             10,blocked,2026-01-01\n\
             garbage line\n\
             ,,\n\
             10,deleted_or_invalid,2026-02-02\n\
             20,blocked,2026-01-05\n",
        )
        .unwrap();

        let store = SuppressionStore::new(path);
        let ids = store.load();
        assert_eq!(ids, HashSet::from([10, 20]));
    }

    #[test]
    fn repeated_ids_are_appended_not_deduped_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppressed.csv");
        let store = SuppressionStore::new(path.clone());

        store.append(&[record(5, SuppressReason::Blocked)]).unwrap();
        store.append(&[record(5, SuppressReason::Blocked)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let rows_for_5 = content.lines().filter(|l| l.starts_with("5,")).count();
        assert_eq!(rows_for_5, 2);
        assert_eq!(store.load(), HashSet::from([5]));
    }
}
