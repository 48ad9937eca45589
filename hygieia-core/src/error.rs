//! Error taxonomy shared by the core operations and the transport layer.

use serde::Serialize;

use crate::model::FacilityId;
use crate::ports::PortError;

#[derive(thiserror::Error, Debug)]
/// Errors returned by the geo filter, the ranker, and the service facade.
pub enum HygieiaError {
    /// A record lacks a field the operation needs.
    #[error("Facility {id} is missing required field `{field}`")]
    MalformedRecord {
        /// Record that failed validation.
        id: FacilityId,
        /// Name of the missing field.
        field: &'static str,
    },
    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// No record matched the identifier of a mutation.
    #[error("Facility {0} not found")]
    NotFound(FacilityId),
    /// A store or scorer adapter failed.
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`HygieiaError::MalformedRecord`].
    MalformedRecord,
    /// See [`HygieiaError::InvalidInput`].
    InvalidInput,
    /// See [`HygieiaError::NotFound`].
    NotFound,
    /// Persisting the collection failed.
    StoreFailure,
    /// The facility scorer could not produce an assessment.
    ScorerFailure,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Snake-case name used in error envelopes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRecord => "malformed_record",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::StoreFailure => "store_failure",
            Self::ScorerFailure => "scorer_failure",
            Self::Internal => "internal",
        }
    }
}

impl HygieiaError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Port(port) => port.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        let malformed = HygieiaError::MalformedRecord {
            id: FacilityId(4),
            field: "crowd",
        };
        assert_eq!(malformed.kind(), ErrorKind::MalformedRecord);
        assert_eq!(
            malformed.to_string(),
            "Facility 4 is missing required field `crowd`"
        );

        let scorer = HygieiaError::from(PortError::Scorer("timeout".into()));
        assert_eq!(scorer.kind(), ErrorKind::ScorerFailure);
        assert_eq!(scorer.kind().as_str(), "scorer_failure");
    }
}
