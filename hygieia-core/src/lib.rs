//! Core types and service wiring for the Hygieia facility finder.

/// Error taxonomy shared by all layers.
pub mod error;
/// Geodesic distance and the proximity filter.
pub mod geo;
/// In-process record store.
pub mod memory;
/// Domain models and identifiers.
pub mod model;
/// Traits describing the store, scorer, and clock interfaces.
pub mod ports;
/// Composite scoring of nearby facilities.
pub mod ranking;
/// High-level service facade used by transports.
pub mod service;

pub use error::*;
pub use geo::{DEFAULT_RADIUS_KM, find_nearby, geodesic_distance_km};
pub use memory::*;
pub use model::*;
pub use ports::*;
pub use ranking::{RankedFacility, RankingWeights, rank, recommend_best};
pub use service::*;
