//! Domain data structures for facilities, coordinates, and cleanliness assessments.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HygieiaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a facility record, unique across the collection.
pub struct FacilityId(pub i64);

impl fmt::Display for FacilityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A point on the earth in decimal degrees.
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate without validating it.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns true when both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Return the coordinate if it is usable as a query origin.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::InvalidInput`] for out-of-range or non-finite values.
    pub fn validated(self) -> Result<Self, HygieiaError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(HygieiaError::InvalidInput(format!(
                "coordinate ({}, {}) is outside lat [-90, 90] / lon [-180, 180]",
                self.lat, self.lon
            )))
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::new(lat, lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Letter grade derived from a cleanliness score.
pub enum Grade {
    /// Score of 85 or more.
    A,
    /// Score from 70 to 84.
    B,
    /// Score from 50 to 69.
    C,
    /// Score below 50.
    D,
}

impl Grade {
    /// Map a cleanliness score onto the fixed grade table.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            85.. => Self::A,
            70..=84 => Self::B,
            50..=69 => Self::C,
            _ => Self::D,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        write!(formatter, "{letter}")
    }
}

/// Result of analysing a facility image.
///
/// Built only through [`AnalysisReport::new`], which keeps the score in
/// `[0, 100]` and the grade consistent with [`Grade::from_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    cleanliness_score: u8,
    grade: Grade,
    garbage_detected: bool,
    water_present: bool,
}

impl AnalysisReport {
    /// Build a report, clamping the raw score into `[0, 100]`.
    #[must_use]
    pub fn new(raw_score: i64, garbage_detected: bool, water_present: bool) -> Self {
        let cleanliness_score = u8::try_from(raw_score.clamp(0, 100)).unwrap_or(100);
        Self {
            cleanliness_score,
            grade: Grade::from_score(cleanliness_score),
            garbage_detected,
            water_present,
        }
    }

    /// Cleanliness score in `[0, 100]`.
    #[must_use]
    pub const fn cleanliness_score(&self) -> u8 {
        self.cleanliness_score
    }

    /// Grade derived from the score.
    #[must_use]
    pub const fn grade(&self) -> Grade {
        self.grade
    }

    /// Whether garbage was detected in the image.
    #[must_use]
    pub const fn garbage_detected(&self) -> bool {
        self.garbage_detected
    }

    /// Whether running water was detected in the image.
    #[must_use]
    pub const fn water_present(&self) -> bool {
        self.water_present
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Latest image analysis merged into a facility.
pub struct AiMetrics {
    /// Score from the most recent analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanliness_score: Option<u8>,
    /// Grade from the most recent analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

/// A single field change requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Replace the cleanliness score.
    Cleanliness(i32),
    /// Replace the crowd level.
    Crowd(i32),
    /// Replace the water availability flag.
    Water(bool),
}

impl FieldUpdate {
    /// Name of the persisted field this update writes.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Cleanliness(_) => "cleanliness",
            Self::Crowd(_) => "crowd",
            Self::Water(_) => "water",
        }
    }
}

/// A public toilet as persisted by the record store.
///
/// Signal fields are optional on the wire so that an incomplete record can be
/// loaded and reported as malformed by the operation that needs it. Attributes
/// this type does not know about are kept in `extra` and written back as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Unique, immutable identifier.
    pub id: FacilityId,
    /// Latitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Cleanliness score, higher is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanliness: Option<i32>,
    /// Crowd level, lower is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crowd: Option<i32>,
    /// Whether water is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<bool>,
    /// Time of the last mutation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Image analysis results, absent until the first analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_metrics: Option<AiMetrics>,
    /// Unrecognised attributes, preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    // A proximity distance that leaked into storage is dropped on read.
    #[serde(default, rename = "distance", skip_serializing)]
    stale_distance: IgnoredAny,
}

impl Facility {
    /// Create a facility at the given location with no signals set.
    #[must_use]
    pub fn new(id: FacilityId, location: Coordinate) -> Self {
        Self {
            id,
            lat: Some(location.lat),
            lon: Some(location.lon),
            cleanliness: None,
            crowd: None,
            water: None,
            last_updated: None,
            ai_metrics: None,
            extra: Map::new(),
            stale_distance: IgnoredAny,
        }
    }

    /// Set the cleanliness score.
    #[must_use]
    pub fn with_cleanliness(mut self, cleanliness: i32) -> Self {
        self.cleanliness = Some(cleanliness);
        self
    }

    /// Set the crowd level.
    #[must_use]
    pub fn with_crowd(mut self, crowd: i32) -> Self {
        self.crowd = Some(crowd);
        self
    }

    /// Set water availability.
    #[must_use]
    pub fn with_water(mut self, water: bool) -> Self {
        self.water = Some(water);
        self
    }

    /// Location of the facility.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::MalformedRecord`] when `lat` or `lon` is missing.
    pub fn location(&self) -> Result<Coordinate, HygieiaError> {
        let lat = self.require(self.lat, "lat")?;
        let lon = self.require(self.lon, "lon")?;
        Ok(Coordinate::new(lat, lon))
    }

    /// Unwrap an optional field or report it as missing on this record.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::MalformedRecord`] naming `field` when `value` is `None`.
    pub fn require<T>(&self, value: Option<T>, field: &'static str) -> Result<T, HygieiaError> {
        value.ok_or(HygieiaError::MalformedRecord { id: self.id, field })
    }

    /// Apply a field update and stamp the modification time.
    pub fn apply(&mut self, update: FieldUpdate, at: DateTime<Utc>) {
        match update {
            FieldUpdate::Cleanliness(score) => self.cleanliness = Some(score),
            FieldUpdate::Crowd(crowd) => self.crowd = Some(crowd),
            FieldUpdate::Water(water) => self.water = Some(water),
        }
        self.last_updated = Some(at);
    }

    /// Merge an analysis report into `ai_metrics`, creating it when absent.
    pub fn record_analysis(&mut self, report: &AnalysisReport, at: DateTime<Utc>) {
        let metrics = self.ai_metrics.get_or_insert_with(AiMetrics::default);
        metrics.cleanliness_score = Some(report.cleanliness_score());
        metrics.grade = Some(report.grade());
        self.last_updated = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A facility returned from a proximity query, annotated with its distance.
///
/// This is a response type only; stores accept [`Facility`], so the distance
/// cannot be written back.
pub struct NearbyFacility {
    /// The matched facility.
    #[serde(flatten)]
    pub facility: Facility,
    /// Distance from the query origin in kilometers, rounded to two decimals.
    pub distance: f64,
}

/// Serde adapter for `last_updated`.
///
/// Writes RFC 3339 in UTC. Reads RFC 3339 as well as naive
/// `YYYY-MM-DD HH:MM:SS[.ffffff]` local timestamps found in older files.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    pub(super) fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse(&raw).map_err(D::Error::custom))
            .transpose()
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Ok(at.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT)
            .map_err(|err| format!("unrecognised timestamp `{raw}`: {err}"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|at| at.with_timezone(&Utc))
            .ok_or_else(|| format!("timestamp `{raw}` does not exist in the local time zone"))
    }
}
