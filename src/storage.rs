//! Bucket-style object storage for ETL jobs
//!
//! `ObjectStore` is the seam for an S3 client. `LocalObjectStore` keeps
//! objects as files below a bucket directory, with `/` separated keys.

use crate::error::{IntrastatError, Result};
use crate::table::Table;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Minimal object storage operations
pub trait ObjectStore: Send + Sync {
    /// Bucket name, used in log messages
    fn bucket(&self) -> &str;

    /// Keys starting with `prefix`, sorted
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    fn put_object(&self, key: &str, body: &[u8]) -> Result<()>;
}

/// Filesystem-backed bucket
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    /// Bucket `bucket` stored in `root/bucket`
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains('/') || bucket.contains('\\') {
            return Err(IntrastatError::ConfigError(format!(
                "Invalid bucket name: '{}'",
                bucket
            )));
        }
        let store = Self {
            root: root.into(),
            bucket,
        };
        fs::create_dir_all(store.bucket_dir())?;
        Ok(store)
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(IntrastatError::InvalidData(format!(
                "Invalid object key: '{}'",
                key
            )));
        }
        Ok(self.bucket_dir().join(relative))
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(self.bucket_dir()) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.bucket_dir(), &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IntrastatError::MissingDataError(format!(
                    "No object '{}' in bucket '{}'",
                    key, self.bucket
                ))
            } else {
                IntrastatError::IoError(e)
            }
        })
    }

    fn put_object(&self, key: &str, body: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }
}

/// Output formats of [`BucketConnector::write_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FromStr for FileFormat {
    type Err = IntrastatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(IntrastatError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "csv"),
            FileFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Reads and writes tables in a bucket
pub struct BucketConnector<S: ObjectStore> {
    store: S,
}

impl<S: ObjectStore> BucketConnector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list_files_in_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.store.list_keys(prefix)
    }

    pub fn read_csv(&self, key: &str, delimiter: u8) -> Result<Table> {
        log::info!("Reading file {}/{}", self.store.bucket(), key);
        let body = self.store.get_object(key)?;
        Table::read_csv(body.as_slice(), delimiter)
    }

    pub fn read_parquet(&self, key: &str) -> Result<Table> {
        log::info!("Reading file {}/{}", self.store.bucket(), key);
        let body = self.store.get_object(key)?;
        Table::read_parquet(body)
    }

    /// Write a table. Returns `false` without writing when the table is empty.
    pub fn write_table(&self, table: &Table, key: &str, format: FileFormat) -> Result<bool> {
        if table.is_empty() {
            log::info!("Table is empty. No file to be written!");
            return Ok(false);
        }

        let body = match format {
            FileFormat::Csv => table.to_csv_bytes()?,
            FileFormat::Parquet => table.to_parquet_bytes()?,
        };
        log::info!("Writing {} file to {}/{}", format, self.store.bucket(), key);
        self.store.put_object(key, &body)?;
        Ok(true)
    }
}
