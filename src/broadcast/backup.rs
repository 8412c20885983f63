use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct BackupRow {
    user_id: i64,
}

/// Point-in-time dump of the audience, written before any send. Audit-only;
/// the engine never reads it back.
pub fn write_backup(
    backups_dir: &Path,
    audience: &[i64],
    started_at: DateTime<Local>,
) -> Result<PathBuf> {
    let folder = backups_dir.join(started_at.format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&folder)
        .with_context(|| format!("creating backup folder {folder:?}"))?;

    let csv_path = folder.join("users_backup.csv");
    let mut csv = File::create(&csv_path)
        .with_context(|| format!("creating {csv_path:?}"))?;
    writeln!(csv, "user_id")?;
    for id in audience {
        writeln!(csv, "{id}")?;
    }
    csv.flush()?;

    let rows: Vec<BackupRow> = audience.iter().map(|&user_id| BackupRow { user_id }).collect();
    let json_path = folder.join("users_backup.json");
    let json = File::create(&json_path)
        .with_context(|| format!("creating {json_path:?}"))?;
    serde_json::to_writer(json, &rows)?;

    Ok(folder)
}
