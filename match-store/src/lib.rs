use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use threadwatch_core::{CoreError, MatchRecord, StoreError};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};


pub const COLUMNS: [&str; 5] = ["date", "type", "subreddit", "content", "url"];

/// A CSV file of match records with a `date,type,subreddit,content,url` header.
///
/// Only whole-file reads, appends and full rewrites are supported. Callers that
/// share a store across tasks go through [`SharedStores`].
#[derive(Debug, Clone)]
pub struct MatchStore {
    path: PathBuf,
}

impl MatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn has_content(&self) -> bool {
        fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    /// Creates the file with only a header row. Returns `true` when the file was created.
    pub fn ensure_exists(&self) -> Result<bool, CoreError> {
        if self.has_content() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_failed(e))?;
        }

        let file = File::create(&self.path).map_err(|e| self.write_failed(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(COLUMNS).map_err(StoreError::from)?;
        writer.flush().map_err(|e| self.write_failed(e))?;

        info!("Created {} with columns: {}", self.display_path(), COLUMNS.join(","));
        Ok(true)
    }

    /// Reads every record in file order. A missing or empty file reads as no records.
    pub fn load(&self) -> Result<Vec<MatchRecord>, CoreError> {
        if !self.has_content() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| StoreError::ReadFailed {
                path: self.display_path(),
                reason: e.to_string(),
            })?;

        let headers = reader.headers().map_err(StoreError::from)?.clone();
        if headers.len() != COLUMNS.len() || headers.iter().zip(COLUMNS).any(|(a, b)| a != b) {
            return Err(StoreError::UnexpectedHeader {
                path: self.display_path(),
                found: headers.iter().collect::<Vec<_>>().join(","),
            }
            .into());
        }

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<MatchRecord>().enumerate() {
            let record = row.map_err(|e| StoreError::MalformedRow {
                path: self.display_path(),
                line: e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(index as u64 + 2),
                reason: e.to_string(),
            })?;
            records.push(record);
        }

        debug!("Loaded {} records from {}", records.len(), self.display_path());
        Ok(records)
    }

    /// Appends records, writing the header first when the file is new or empty.
    pub fn append(&self, records: &[MatchRecord]) -> Result<(), CoreError> {
        let needs_header = !self.has_content();
        if needs_header {
            self.ensure_exists()?;
        }
        if records.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_failed(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in records {
            writer.serialize(record).map_err(StoreError::from)?;
        }
        writer.flush().map_err(|e| self.write_failed(e))?;

        debug!("Appended {} records to {}", records.len(), self.display_path());
        Ok(())
    }

    /// Replaces the file contents. The new contents are written to a sibling
    /// temporary file first and renamed over the store.
    pub fn rewrite(&self, records: &[MatchRecord]) -> Result<(), CoreError> {
        let tmp_path = self.temp_path();

        let file = File::create(&tmp_path).map_err(|e| self.write_failed(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(COLUMNS).map_err(StoreError::from)?;
        for record in records {
            writer.serialize(record).map_err(StoreError::from)?;
        }
        let file = writer.into_inner().map_err(|e| StoreError::WriteFailed {
            path: tmp_path.display().to_string(),
            reason: e.to_string(),
        })?;
        file.sync_all().map_err(|e| self.write_failed(e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.write_failed(e))?;

        debug!("Rewrote {} with {} records", self.display_path(), records.len());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_failed(&self, error: impl ToString) -> StoreError {
        StoreError::WriteFailed {
            path: self.display_path(),
            reason: error.to_string(),
        }
    }
}

/// The pending raw-results store and the permanent tracking store.
#[derive(Debug, Clone)]
pub struct MatchStores {
    pub raw: MatchStore,
    pub tracking: MatchStore,
}

impl MatchStores {
    pub fn new(raw_path: impl Into<PathBuf>, tracking_path: impl Into<PathBuf>) -> Self {
        Self {
            raw: MatchStore::new(raw_path),
            tracking: MatchStore::new(tracking_path),
        }
    }

    pub fn ensure_exists(&self) -> Result<(), CoreError> {
        self.raw.ensure_exists()?;
        self.tracking.ensure_exists()?;
        Ok(())
    }
}

/// Serializes every read-modify-write of the two stores across tasks.
#[derive(Debug, Clone)]
pub struct SharedStores {
    inner: Arc<Mutex<MatchStores>>,
}

impl SharedStores {
    pub fn new(stores: MatchStores) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stores)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, MatchStores> {
        self.inner.lock().await
    }
}
