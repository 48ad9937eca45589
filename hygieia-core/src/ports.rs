//! Traits describing the store, scorer, and clock capabilities the service depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;
use std::io::Error as IoError;

use crate::error::ErrorKind;
use crate::model::{AnalysisReport, Facility, FacilityId};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to store or scorer backends.
pub enum PortError {
    /// Reading or writing the backing storage failed.
    #[error("Storage error: {0}")]
    Io(#[from] IoError),
    /// Encoding or decoding a payload failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] JsonError),
    /// Network layer failed while calling a remote scorer.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// A stored record could not be decoded into a [`Facility`].
    #[error("Stored record #{position}{} is malformed: {reason}", .id.map_or_else(String::new, |id| format!(" (id {id})")))]
    MalformedRecord {
        /// Zero-based position of the record in the collection.
        position: usize,
        /// Identifier of the record, when it could be read.
        id: Option<FacilityId>,
        /// Decoder message.
        reason: String,
    },
    /// The scorer rejected the input or returned an unusable result.
    #[error("Scorer error: {0}")]
    Scorer(String),
    /// Internal adapter error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Serialization(_) => ErrorKind::StoreFailure,
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::Network(_) | Self::Scorer(_) => ErrorKind::ScorerFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[async_trait]
/// Whole-collection persistence of facility records.
///
/// Implementations that cannot read their backing storage recover by
/// returning an empty collection; write failures are reported.
pub trait RecordStore: Send + Sync {
    /// Short label of the backend, used in logs.
    fn name(&self) -> &str;

    /// Load every record.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] only when the backend cannot degrade to an empty collection.
    async fn load_all(&self) -> Result<Vec<Facility>, PortError>;

    /// Load every record ahead of a read-modify-write.
    ///
    /// Unlike [`Self::load_all`], this must not degrade: anything short of a
    /// collection that is known to be complete is an error, so that a
    /// following write cannot drop records.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the collection cannot be read in full.
    async fn load_for_update(&self) -> Result<Vec<Facility>, PortError> {
        self.load_all().await
    }

    /// Replace the persisted collection.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the collection cannot be written.
    async fn save_all(&self, facilities: &[Facility]) -> Result<(), PortError>;

    /// Look up a single record.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when loading fails.
    async fn get(&self, id: FacilityId) -> Result<Option<Facility>, PortError> {
        let facilities = self.load_all().await?;
        Ok(facilities.into_iter().find(|facility| facility.id == id))
    }

    /// Replace the record with the same id, or append it.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when loading or writing fails.
    async fn upsert(&self, facility: Facility) -> Result<(), PortError> {
        let mut facilities = self.load_for_update().await?;
        replace_or_push(&mut facilities, facility);
        self.save_all(&facilities).await
    }
}

/// Replace the entry sharing `facility.id`, or append when there is none.
pub fn replace_or_push(facilities: &mut Vec<Facility>, facility: Facility) {
    match facilities.iter_mut().find(|existing| existing.id == facility.id) {
        Some(slot) => *slot = facility,
        None => facilities.push(facility),
    }
}

#[async_trait]
/// Produces a cleanliness assessment from a raw image payload.
///
/// The service makes no assumption about determinism.
pub trait FacilityScorer: Send + Sync {
    /// Short label of the scorer, used in logs.
    fn name(&self) -> &str;

    /// Analyse the payload.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the scorer cannot produce a report.
    async fn analyze(&self, payload: &[u8]) -> Result<AnalysisReport, PortError>;
}

/// Source of the current time for `last_updated` stamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::Coordinate;

    /// Store whose plain reads fall back to an empty collection while the
    /// backing data is unusable.
    #[derive(Default)]
    struct DegradingStore {
        saved: Mutex<Vec<Vec<Facility>>>,
    }

    #[async_trait]
    impl RecordStore for DegradingStore {
        fn name(&self) -> &str {
            "degrading"
        }

        async fn load_all(&self) -> Result<Vec<Facility>, PortError> {
            Ok(Vec::new())
        }

        async fn load_for_update(&self) -> Result<Vec<Facility>, PortError> {
            Err(PortError::Internal("collection unreadable".into()))
        }

        async fn save_all(&self, facilities: &[Facility]) -> Result<(), PortError> {
            self.saved.lock().unwrap().push(facilities.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn upsert_never_writes_after_a_degraded_read() {
        let store = DegradingStore::default();
        let facility = Facility::new(FacilityId(1), Coordinate::new(0.0, 0.0)).with_crowd(9);

        let result = store.upsert(facility).await;

        assert!(matches!(result, Err(PortError::Internal(_))));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_records_keep_their_kind() {
        let err = PortError::MalformedRecord {
            position: 1,
            id: Some(FacilityId(2)),
            reason: "invalid type: floating point `2.5`, expected i32".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
        assert!(err.to_string().contains("id 2"));
    }
}
