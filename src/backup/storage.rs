//! Backup file persistence
//!
//! One file per device per day: `{hostname}_{YYYY-MM-DD}.txt`. Files are
//! written to a temporary sibling and renamed into place.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub struct ConfigStore {
    output_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, hostname: &str, run_date: NaiveDate) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.txt", hostname, run_date.format("%Y-%m-%d")))
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    /// Write `config` verbatim; a same-day rerun replaces the file
    pub async fn save(
        &self,
        hostname: &str,
        run_date: NaiveDate,
        config: &str,
    ) -> std::io::Result<PathBuf> {
        let path = self.path_for(hostname, run_date);
        let tmp = path.with_extension("txt.tmp");

        if let Err(e) = tokio::fs::write(&tmp, config.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
    }

    #[test]
    fn test_path_naming() {
        let store = ConfigStore::new("/var/backups/net");
        assert_eq!(
            store.path_for("r1", date(5)),
            PathBuf::from("/var/backups/net/r1_2025-12-05.txt")
        );
    }

    #[tokio::test]
    async fn test_save_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());

        let content = "hostname r1\r\n!\n banner motd ^C ünïcode ^C\n";
        let path = store.save("r1", date(1), content).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), content.as_bytes());
        // No temp file left behind
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["r1_2025-12-01.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_same_day_overwrites_other_day_adds() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());

        let first = store.save("r1", date(1), "version 1").await.unwrap();
        let other = store.save("r2", date(1), "r2 config").await.unwrap();
        let again = store.save("r1", date(1), "v2").await.unwrap();
        let next_day = store.save("r1", date(2), "version 3").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "v2");
        assert_eq!(std::fs::read_to_string(&next_day).unwrap(), "version 3");
        assert_eq!(std::fs::read_to_string(&other).unwrap(), "r2 config");
    }

    #[tokio::test]
    async fn test_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("missing"));
        assert!(store.save("r1", date(1), "x").await.is_err());

        store.ensure_dir().await.unwrap();
        assert!(store.save("r1", date(1), "x").await.is_ok());
    }
}
