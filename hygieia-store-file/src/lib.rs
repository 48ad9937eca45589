//! Record store keeping the whole facility collection in one JSON file.

use std::io::{ErrorKind as IoErrorKind, Result as IoResult, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::Builder as TempBuilder;
use tokio::sync::Mutex;
use tokio::{fs, task};
use tracing::{debug, warn};

use hygieia_core::{
    model::{Facility, FacilityId},
    ports::{PortError, RecordStore, replace_or_push},
};

/// Record store backed by a JSON array on disk.
///
/// Plain reads treat a missing file, an unreadable file, or a file that is not
/// a JSON array as an empty collection. A record inside the array that does not
/// decode is reported as [`PortError::MalformedRecord`] instead of hiding its
/// neighbours. Updates read strictly and refuse to write over a collection they
/// could not load in full.
///
/// Writes go to a uniquely named staging file next to the target, which is then
/// renamed over it, so readers never see a partially written collection.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store for the file at `path`. The file does not need to exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Read the collection, failing on anything but a missing file.
    async fn read_strict(&self) -> Result<Vec<Facility>, PortError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store file missing, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let records: Vec<Value> = serde_json::from_slice(&bytes)?;
        let facilities = records
            .into_iter()
            .enumerate()
            .map(|(position, record)| decode_record(position, record))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(path = %self.path.display(), count = facilities.len(), "loaded facilities");
        Ok(facilities)
    }

    async fn write_collection(&self, facilities: &[Facility]) -> Result<(), PortError> {
        let mut body = serde_json::to_vec_pretty(facilities)?;
        body.push(b'\n');

        let directory = self.directory();
        let target = self.path.clone();
        task::spawn_blocking(move || replace_file(&directory, &target, &body))
            .await
            .map_err(|err| PortError::Internal(format!("store writer task failed: {err}")))??;

        debug!(path = %self.path.display(), count = facilities.len(), "saved facilities");
        Ok(())
    }
}

fn decode_record(position: usize, record: Value) -> Result<Facility, PortError> {
    let id = record.get("id").and_then(Value::as_i64).map(FacilityId);
    serde_json::from_value(record).map_err(|err| PortError::MalformedRecord {
        position,
        id,
        reason: err.to_string(),
    })
}

/// Write `body` to a fresh staging file in `directory` and rename it over `target`.
///
/// The staging file is removed if anything fails before the rename.
fn replace_file(directory: &Path, target: &Path, body: &[u8]) -> IoResult<()> {
    let mut staging = TempBuilder::new()
        .prefix(".hygieia-")
        .suffix(".tmp")
        .tempfile_in(directory)?;
    staging.write_all(body)?;
    staging.as_file().sync_all()?;
    staging.persist(target).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn load_all(&self) -> Result<Vec<Facility>, PortError> {
        match self.read_strict().await {
            Err(PortError::Io(err)) => {
                warn!(path = %self.path.display(), error = %err, "store file unreadable, treating as empty");
                Ok(Vec::new())
            }
            Err(PortError::Serialization(err)) => {
                warn!(path = %self.path.display(), error = %err, "store file is not a facility list, treating as empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn load_for_update(&self) -> Result<Vec<Facility>, PortError> {
        self.read_strict().await
    }

    async fn save_all(&self, facilities: &[Facility]) -> Result<(), PortError> {
        let _lock = self.write_lock.lock().await;
        self.write_collection(facilities).await
    }

    async fn upsert(&self, facility: Facility) -> Result<(), PortError> {
        let _lock = self.write_lock.lock().await;
        let mut facilities = self.read_strict().await?;
        replace_or_push(&mut facilities, facility);
        self.write_collection(&facilities).await
    }
}
