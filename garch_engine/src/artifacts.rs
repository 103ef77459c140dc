/// artifacts.rs — Model Artifact Repository
///
/// LAYOUT:
///   <dir>/2024-03-08T153000.123456Z_AAPL.json   one fitted model, never rewritten
///   <dir>/manifest.jsonl                        one JSON record per artifact
///
/// File names start with a fixed-width UTC timestamp, so a lexicographic
/// sort of `*_<TICKER>.json` is chronological. The manifest is the primary
/// index: it is keyed by (ticker, created_at) and carries a SHA-256 of the
/// bytes. Files matching the naming pattern but missing from the manifest
/// (copied in by hand) are merged into listings without a checksum.
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::Ticker;

pub const MANIFEST_FILE: &str = "manifest.jsonl";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S%.6fZ";
const MAX_NAME_ATTEMPTS: usize = 1_000;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No model trained for {0}")]
    NotFound(Ticker),
    #[error("artifact I/O failed for {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("manifest line {line} is unreadable: {source}")]
    Manifest { line: usize, source: serde_json::Error },
    #[error("artifact {} does not match its recorded checksum", path.display())]
    Checksum { path: PathBuf },
    #[error("artifact pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub ticker:     Ticker,
    pub created_at: DateTime<Utc>,
    /// File name relative to the repository directory
    pub file:       String,
    /// Hex SHA-256 of the file bytes; absent for glob-discovered files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256:     Option<String>,
}

pub fn artifact_file_name(ticker: &Ticker, created_at: DateTime<Utc>) -> String {
    format!("{}_{}.json", created_at.format(TIMESTAMP_FORMAT), ticker)
}

#[derive(Debug, Clone)]
pub struct ArtifactRepository {
    dir: PathBuf,
}

impl ArtifactRepository {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `bytes` as a new artifact stamped with the current time.
    pub fn store(&self, ticker: &Ticker, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        self.store_at(ticker, bytes, Utc::now())
    }

    /// Write `bytes` as a new artifact stamped `now`. An existing file is
    /// never replaced; a colliding name moves the stamp forward 1µs.
    pub fn store_at(
        &self,
        ticker: &Ticker,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> Result<PathBuf, ArtifactError> {
        fs::create_dir_all(&self.dir).map_err(|source| self.io(&self.dir, source))?;

        let mut created_at = now.trunc_subsecs(6);
        let mut attempts = 0;
        let (path, file_name) = loop {
            let file_name = artifact_file_name(ticker, created_at);
            let path = self.dir.join(&file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes).map_err(|source| self.io(&path, source))?;
                    file.sync_all().map_err(|source| self.io(&path, source))?;
                    break (path, file_name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                    debug!("Artifact name {} taken, advancing timestamp", file_name);
                    created_at += Duration::microseconds(1);
                    attempts += 1;
                }
                Err(source) => return Err(self.io(&path, source)),
            }
        };

        let record = ArtifactRecord {
            ticker: ticker.clone(),
            created_at,
            file: file_name,
            sha256: Some(sha256_hex(bytes)),
        };
        if let Err(e) = self.append_manifest(&record) {
            // the glob would otherwise list it without a checksum
            if let Err(rm) = fs::remove_file(&path) {
                warn!("Could not remove unindexed artifact {}: {}", path.display(), rm);
            }
            return Err(e);
        }

        info!("Stored artifact {}", path.display());
        Ok(path)
    }

    /// The most recent artifact for `ticker` and its bytes.
    pub fn latest(&self, ticker: &Ticker) -> Result<(PathBuf, Vec<u8>), ArtifactError> {
        let record = self
            .list(ticker)?
            .pop()
            .ok_or_else(|| ArtifactError::NotFound(ticker.clone()))?;

        let path = self.dir.join(&record.file);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Manifest points at missing artifact {}", path.display());
                return Err(ArtifactError::NotFound(ticker.clone()));
            }
            Err(source) => return Err(self.io(&path, source)),
        };
        if let Some(expected) = &record.sha256 {
            if *expected != sha256_hex(&bytes) {
                return Err(ArtifactError::Checksum { path });
            }
        }
        debug!("Latest artifact for {} is {}", ticker, path.display());
        Ok((path, bytes))
    }

    /// Every artifact for `ticker`, oldest first. Manifest records come
    /// first so that on equal stamps a listed file wins over an unlisted one.
    pub fn list(&self, ticker: &Ticker) -> Result<Vec<ArtifactRecord>, ArtifactError> {
        let manifest = self.dir.join(MANIFEST_FILE);
        let mut records: Vec<ArtifactRecord> = if manifest.is_file() {
            self.read_manifest(&manifest)?
                .into_iter()
                .filter(|r| &r.ticker == ticker)
                .collect()
        } else {
            Vec::new()
        };

        let listed: HashSet<String> = records.iter().map(|r| r.file.clone()).collect();
        let unlisted: Vec<_> = self
            .glob_records(ticker)?
            .into_iter()
            .filter(|r| !listed.contains(&r.file))
            .collect();
        if !unlisted.is_empty() && !listed.is_empty() {
            debug!("{} artifact(s) for {} are not in the manifest", unlisted.len(), ticker);
        }
        records.extend(unlisted);

        // stable: equal stamps keep manifest order
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn read_manifest(&self, path: &Path) -> Result<Vec<ArtifactRecord>, ArtifactError> {
        let text = fs::read_to_string(path).map_err(|source| self.io(path, source))?;
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .map_err(|source| ArtifactError::Manifest { line: i + 1, source })
            })
            .collect()
    }

    fn append_manifest(&self, record: &ArtifactRecord) -> Result<(), ArtifactError> {
        let path = self.dir.join(MANIFEST_FILE);
        let mut line = serde_json::to_string(record)
            .map_err(|source| ArtifactError::Manifest { line: 0, source })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| self.io(&path, source))?;
        // one write per record so concurrent appenders do not interleave
        file.write_all(line.as_bytes()).map_err(|source| self.io(&path, source))
    }

    fn glob_records(&self, ticker: &Ticker) -> Result<Vec<ArtifactRecord>, ArtifactError> {
        let pattern = format!(
            "{}/*_{}.json",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            ticker
        );
        let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(Result::ok).collect();
        files.sort();

        Ok(files
            .iter()
            .filter_map(|path| {
                let file = path.file_name()?.to_str()?.to_owned();
                let stamp = file.strip_suffix(&format!("_{ticker}.json"))?;
                let created_at =
                    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?.and_utc();
                Some(ArtifactRecord { ticker: ticker.clone(), created_at, file, sha256: None })
            })
            .collect())
    }

    fn io(&self, path: &Path, source: std::io::Error) -> ArtifactError {
        ArtifactError::Io { path: path.to_path_buf(), source }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn aapl() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    fn at(secs: u32, micros: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, 15, 30, secs).unwrap() + Duration::microseconds(micros as i64)
    }

    #[test]
    fn file_name_is_fixed_width_and_sortable() {
        let name = artifact_file_name(&aapl(), at(0, 42));
        assert_eq!(name, "2024-03-08T153000.000042Z_AAPL.json");
    }

    #[test]
    fn empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());
        let err = repo.latest(&aapl()).unwrap_err();
        assert_eq!(err.to_string(), "No model trained for AAPL");
    }

    #[test]
    fn latest_is_by_timestamp_not_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());

        repo.store_at(&aapl(), b"newer", at(2, 0)).unwrap();
        repo.store_at(&aapl(), b"older", at(1, 0)).unwrap();

        let (path, bytes) = repo.latest(&aapl()).unwrap();
        assert_eq!(bytes, b"newer");
        assert!(path.ends_with("2024-03-08T153002.000000Z_AAPL.json"));
        assert_eq!(repo.list(&aapl()).unwrap().len(), 2);
    }

    #[test]
    fn collision_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());

        let first = repo.store_at(&aapl(), b"one", at(0, 0)).unwrap();
        let second = repo.store_at(&aapl(), b"two", at(0, 0)).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(repo.latest(&aapl()).unwrap().1, b"two");
    }

    #[test]
    fn tickers_do_not_leak_into_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());
        let msft = Ticker::parse("MSFT").unwrap();

        repo.store_at(&aapl(), b"a", at(0, 0)).unwrap();
        repo.store_at(&msft, b"m", at(5, 0)).unwrap();

        assert_eq!(repo.latest(&aapl()).unwrap().1, b"a");
        assert_eq!(repo.latest(&msft).unwrap().1, b"m");
    }

    #[test]
    fn glob_fallback_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(artifact_file_name(&aapl(), at(9, 0))), b"late").unwrap();
        fs::write(dir.path().join(artifact_file_name(&aapl(), at(3, 0))), b"early").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let repo = ArtifactRepository::new(dir.path());
        let records = repo.list(&aapl()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].created_at, at(3, 0));
        assert!(records.iter().all(|r| r.sha256.is_none()));
        assert_eq!(repo.latest(&aapl()).unwrap().1, b"late");
    }

    #[test]
    fn hand_copied_artifact_is_seen_next_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());
        repo.store_at(&aapl(), b"indexed", at(1, 0)).unwrap();
        fs::write(dir.path().join(artifact_file_name(&aapl(), at(7, 0))), b"copied").unwrap();

        let records = repo.list(&aapl()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].sha256.is_some());
        assert!(records[1].sha256.is_none());

        let (path, bytes) = repo.latest(&aapl()).unwrap();
        assert_eq!(bytes, b"copied");
        assert!(path.ends_with("2024-03-08T153007.000000Z_AAPL.json"));

        // an older unlisted file does not displace the newer indexed one
        fs::write(dir.path().join(artifact_file_name(&aapl(), at(0, 5))), b"stale").unwrap();
        assert_eq!(repo.list(&aapl()).unwrap().len(), 3);
        assert_eq!(repo.latest(&aapl()).unwrap().1, b"copied");
    }

    #[test]
    fn manifest_entry_keeps_its_checksum_when_also_globbed() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());
        repo.store_at(&aapl(), b"only", at(4, 0)).unwrap();

        let records = repo.list(&aapl()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sha256.as_deref(), Some(sha256_hex(b"only").as_str()));
    }

    #[test]
    fn failed_manifest_append_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the manifest file should be makes the append fail
        fs::create_dir(dir.path().join(MANIFEST_FILE)).unwrap();
        let repo = ArtifactRepository::new(dir.path());

        let err = repo.store_at(&aapl(), b"orphan", at(0, 0)).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
        assert!(!dir.path().join(artifact_file_name(&aapl(), at(0, 0))).exists());
    }

    #[test]
    fn tampered_artifact_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ArtifactRepository::new(dir.path());
        let path = repo.store_at(&aapl(), b"original", at(0, 0)).unwrap();
        fs::write(&path, b"edited").unwrap();

        assert!(matches!(repo.latest(&aapl()), Err(ArtifactError::Checksum { .. })));
    }
}
