use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::audience::SheetAudience;
use crate::broadcast::{EngineSettings, RunPaths, SuppressionStore};

/// Loads .env and verifies the variables the bot cannot start without.
pub fn load_environment() -> Result<()> {
    dotenv::dotenv().ok();
    env::var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN must be set")?;
    env::var("ADMIN_ID").context("ADMIN_ID must be set")?;
    env::var("AUDIENCE_CSV_URL").context("AUDIENCE_CSV_URL must be set")?;
    Ok(())
}

/// On-disk layout for run artifacts under one base directory.
#[derive(Clone, Debug)]
pub struct DataPaths {
    base: PathBuf,
}

impl DataPaths {
    pub fn new(base: PathBuf) -> Self {
        DataPaths { base }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.base.join("backups")
    }

    pub fn suppression_file(&self) -> PathBuf {
        self.base.join("suppressed_users.csv")
    }

    pub fn run_paths(&self) -> RunPaths {
        RunPaths {
            logs_dir: self.logs_dir(),
            backups_dir: self.backups_dir(),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.logs_dir())?;
        fs::create_dir_all(self.backups_dir())?;
        Ok(())
    }
}

/// Shared bot state injected into handlers via dptree dependencies.
pub struct AppState {
    pub admin_id: i64,
    pub membership_link: Option<String>,
    pub paths: DataPaths,
    pub audience: SheetAudience,
    pub engine: EngineSettings,
}

impl AppState {
    pub fn from_env() -> Result<Self> {
        let admin_id = env::var("ADMIN_ID")
            .context("ADMIN_ID must be set")?
            .trim()
            .parse::<i64>()
            .context("ADMIN_ID must be a numeric Telegram id")?;
        let audience_url = env::var("AUDIENCE_CSV_URL").context("AUDIENCE_CSV_URL must be set")?;
        let base = env::var("BOT_DATA_DIR").unwrap_or_else(|_| "data".to_string());

        Ok(AppState {
            admin_id,
            membership_link: env::var("MEMBERSHIP_LINK").ok(),
            paths: DataPaths::new(PathBuf::from(base)),
            audience: SheetAudience::new(audience_url),
            engine: EngineSettings::default(),
        })
    }

    pub fn suppression_store(&self) -> SuppressionStore {
        SuppressionStore::new(self.paths.suppression_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_paths_layout() {
        let paths = DataPaths::new(PathBuf::from("data"));
        assert_eq!(paths.logs_dir(), PathBuf::from("data/logs"));
        assert_eq!(paths.backups_dir(), PathBuf::from("data/backups"));
        assert_eq!(
            paths.suppression_file(),
            PathBuf::from("data/suppressed_users.csv")
        );
    }
}
