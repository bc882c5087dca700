//! Historical archive: per-site files in object storage, collated into one CSV.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lmnh_bucket::{BucketError, BucketStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{coerce_cell, RawRecord};

pub const COLLATED_FILE_NAME: &str = "lmnh_hist_data.csv";
pub const ARCHIVE_HEADER: [&str; 4] = ["at", "site", "val", "type"];

static ARCHIVE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(lmnh_hist_data_[0-9]*\.csv|lmnh_exhibition_\w*\.json)$")
        .unwrap_or_else(|err| panic!("archive key pattern must compile: {err}"))
});

/// Whether an object key belongs to the archive.
pub fn is_archive_key(key: &str) -> bool {
    ARCHIVE_KEY.is_match(key)
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Bucket(#[from] BucketError),
    #[error("archive I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed archive CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One line of the collated CSV. Cells stay as text until validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveRow {
    pub at: String,
    pub site: String,
    pub val: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ArchiveRow {
    /// Shape the row like a stream message so both paths share one validator.
    /// Numeric cells become numbers; an empty `type` is treated as absent.
    pub fn to_raw_record(&self) -> RawRecord {
        let mut raw = RawRecord::default();
        raw.insert("at", Value::String(self.at.clone()));
        raw.insert("site", Value::String(self.site.clone()));
        raw.insert("val", coerce_cell(&self.val));
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.trim().is_empty()) {
            raw.insert("type", coerce_cell(kind));
        }
        raw
    }
}

#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Rows of the collated archive in file order; `None` means all of them.
    async fn fetch_collated_rows(&self, limit: Option<usize>)
        -> Result<Vec<ArchiveRow>, ArchiveError>;
}

/// Downloads archive objects into `data_dir` and merges the CSVs.
pub struct ArchiveCollator<B> {
    bucket: B,
    data_dir: PathBuf,
}

impl<B: BucketStore> ArchiveCollator<B> {
    pub fn new(bucket: B, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bucket,
            data_dir: data_dir.into(),
        }
    }

    pub fn collated_path(&self) -> PathBuf {
        self.data_dir.join(COLLATED_FILE_NAME)
    }

    /// Download every archive object, rewrite the collated CSV from the
    /// per-site CSVs and delete those once appended. Exhibition JSON files are
    /// kept. Returns the matching keys in listing order.
    pub async fn collate(&self) -> Result<Vec<String>, ArchiveError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| ArchiveError::Io {
            path: self.data_dir.clone(),
            source,
        })?;

        let collated_path = self.collated_path();
        let mut writer = csv::Writer::from_path(&collated_path).map_err(|source| {
            ArchiveError::Csv {
                path: collated_path.clone(),
                source,
            }
        })?;
        writer
            .write_record(ARCHIVE_HEADER)
            .map_err(|source| ArchiveError::Csv {
                path: collated_path.clone(),
                source,
            })?;

        let mut matched = Vec::new();
        for key in self.bucket.list_keys().await? {
            if !is_archive_key(&key) {
                debug!(%key, "Ignoring non-archive object");
                continue;
            }
            let bytes = self.bucket.get_object(&key).await?;
            let local = self.data_dir.join(&key);
            fs::write(&local, &bytes).map_err(|source| ArchiveError::Io {
                path: local.clone(),
                source,
            })?;

            if key.ends_with(".csv") {
                let appended = append_rows(&local, &mut writer)?;
                fs::remove_file(&local).map_err(|source| ArchiveError::Io {
                    path: local.clone(),
                    source,
                })?;
                debug!(%key, rows = appended, "Appended archive CSV");
            } else {
                info!(%key, "Downloaded exhibition file");
            }
            matched.push(key);
        }

        writer.flush().map_err(|source| ArchiveError::Io {
            path: collated_path.clone(),
            source,
        })?;
        Ok(matched)
    }

    /// Read back the collated CSV, header skipped.
    pub fn read_rows(&self, limit: Option<usize>) -> Result<Vec<ArchiveRow>, ArchiveError> {
        read_collated(&self.collated_path(), limit)
    }
}

#[async_trait]
impl<B: BucketStore> ArchiveSource for ArchiveCollator<B> {
    async fn fetch_collated_rows(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<ArchiveRow>, ArchiveError> {
        let files = self.collate().await?;
        info!(?files, "All files downloaded");
        self.read_rows(limit)
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(csv::Trim::All);
    builder
}

fn append_rows(path: &Path, writer: &mut csv::Writer<File>) -> Result<usize, ArchiveError> {
    let csv_err = |source: csv::Error| ArchiveError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = reader_builder().from_path(path).map_err(csv_err)?;
    let mut count = 0;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        // Ratings often omit the trailing `type` cell.
        let cells = (0..ARCHIVE_HEADER.len()).map(|i| record.get(i).unwrap_or(""));
        writer.write_record(cells).map_err(csv_err)?;
        count += 1;
    }
    Ok(count)
}

pub fn read_collated(path: &Path, limit: Option<usize>) -> Result<Vec<ArchiveRow>, ArchiveError> {
    let csv_err = |source: csv::Error| ArchiveError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = reader_builder().from_path(path).map_err(csv_err)?;
    let rows = reader.deserialize::<ArchiveRow>();
    match limit {
        Some(n) => rows.take(n).collect::<Result<Vec<_>, _>>().map_err(csv_err),
        None => rows.collect::<Result<Vec<_>, _>>().map_err(csv_err),
    }
}
