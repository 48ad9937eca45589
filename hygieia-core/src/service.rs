//! High-level service facade combining the store, geo filter, ranker, and scorer.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::HygieiaError;
use crate::geo::{self, DEFAULT_RADIUS_KM};
use crate::model::{AnalysisReport, Coordinate, Facility, FacilityId, FieldUpdate, NearbyFacility};
use crate::ports::{Clock, FacilityScorer, RecordStore, SystemClock};
use crate::ranking::{self, RankingWeights};

/// What a mutation does when no record carries the requested id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTargetPolicy {
    /// Fail with [`HygieiaError::NotFound`].
    #[default]
    Reject,
    /// Report success without writing anything.
    Ignore,
}

/// Tunables of the facade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSettings {
    /// Radius of proximity queries that do not pass one.
    pub default_radius_km: f64,
    /// Ranking weights used by recommendations.
    pub weights: RankingWeights,
    /// Behaviour for mutations of unknown ids.
    pub missing_target: MissingTargetPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_radius_km: DEFAULT_RADIUS_KM,
            weights: RankingWeights::default(),
            missing_target: MissingTargetPolicy::default(),
        }
    }
}

/// Result of a mutation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The record was changed and persisted.
    Applied,
    /// No record matched; nothing was written.
    NoMatch,
}

/// Result of [`HygieiaService::analyze_and_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// The scorer's assessment.
    pub report: AnalysisReport,
    /// Whether a record was updated with it.
    pub outcome: MutationOutcome,
}

/// Public entry point for querying and updating facilities.
///
/// Every call works on a fresh copy of the collection loaded from the store.
/// Mutations run one at a time through an internal gate, so concurrent
/// updates issued through the same service do not overwrite each other.
pub struct HygieiaService {
    store: Arc<dyn RecordStore>,
    scorer: Arc<dyn FacilityScorer>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
    write_gate: Mutex<()>,
}

impl HygieiaService {
    /// Create a service with default settings and the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, scorer: Arc<dyn FacilityScorer>) -> Self {
        Self {
            store,
            scorer,
            clock: Arc::new(SystemClock),
            settings: ServiceSettings::default(),
            write_gate: Mutex::new(()),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the clock used for `last_updated`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Return every facility.
    ///
    /// # Errors
    ///
    /// Returns a [`HygieiaError::Port`] when the store fails.
    pub async fn list_all(&self) -> Result<Vec<Facility>, HygieiaError> {
        Ok(self.store.load_all().await?)
    }

    /// Facilities within `radius_km` (or the default radius) of `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::InvalidInput`] for an invalid origin or a non-finite
    /// radius, and [`HygieiaError::MalformedRecord`] for records without a location.
    pub async fn find_nearby(
        &self,
        origin: Coordinate,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyFacility>, HygieiaError> {
        let origin = origin.validated()?;
        let radius_km = radius_km.unwrap_or(self.settings.default_radius_km);
        if !radius_km.is_finite() {
            return Err(HygieiaError::InvalidInput(format!(
                "radius must be a finite number of kilometers (got {radius_km})"
            )));
        }

        let facilities = self.store.load_all().await?;
        let nearby = geo::find_nearby(&origin, &facilities, radius_km)?;
        debug!(
            lat = origin.lat,
            lon = origin.lon,
            radius_km,
            scanned = facilities.len(),
            matched = nearby.len(),
            "proximity query"
        );
        Ok(nearby)
    }

    /// Best facility within the default radius of `origin`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Self::find_nearby`], plus [`HygieiaError::MalformedRecord`] for
    /// candidates missing a ranking signal.
    pub async fn recommend(&self, origin: Coordinate) -> Result<Option<NearbyFacility>, HygieiaError> {
        let nearby = self.find_nearby(origin, None).await?;
        let best = ranking::recommend_best(&nearby, &self.settings.weights)?;
        debug!(
            candidates = nearby.len(),
            recommended = ?best.as_ref().map(|hit| hit.facility.id),
            "recommendation"
        );
        Ok(best)
    }

    /// Overwrite one field of a facility and stamp `last_updated`.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::NotFound`] for an unknown id under
    /// [`MissingTargetPolicy::Reject`], or a [`HygieiaError::Port`] when the store fails.
    pub async fn set_field(
        &self,
        id: FacilityId,
        update: FieldUpdate,
    ) -> Result<MutationOutcome, HygieiaError> {
        let _gate = self.write_gate.lock().await;

        let Some(mut facility) = self.store.get(id).await? else {
            return self.missing_target(id, update.field());
        };
        facility.apply(update, self.clock.now());
        self.store.upsert(facility).await?;

        info!(facility_id = %id, field = update.field(), ?update, "facility updated");
        Ok(MutationOutcome::Applied)
    }

    /// Run the scorer on `payload` and merge its result into the facility's `ai_metrics`.
    ///
    /// Under [`MissingTargetPolicy::Ignore`] the scorer runs even when no record
    /// matches, and its report is returned.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::NotFound`] for an unknown id under
    /// [`MissingTargetPolicy::Reject`], or a [`HygieiaError::Port`] when the store or
    /// scorer fails.
    pub async fn analyze_and_update(
        &self,
        id: FacilityId,
        payload: &[u8],
    ) -> Result<AnalysisOutcome, HygieiaError> {
        if self.settings.missing_target == MissingTargetPolicy::Reject
            && self.store.get(id).await?.is_none()
        {
            return Err(HygieiaError::NotFound(id));
        }

        let report = self.scorer.analyze(payload).await?;
        debug!(
            facility_id = %id,
            scorer = self.scorer.name(),
            bytes = payload.len(),
            score = report.cleanliness_score(),
            grade = %report.grade(),
            "analysis finished"
        );

        let _gate = self.write_gate.lock().await;
        let Some(mut facility) = self.store.get(id).await? else {
            let outcome = self.missing_target(id, "ai_metrics")?;
            return Ok(AnalysisOutcome { report, outcome });
        };
        facility.record_analysis(&report, self.clock.now());
        self.store.upsert(facility).await?;

        info!(facility_id = %id, grade = %report.grade(), "analysis recorded");
        Ok(AnalysisOutcome {
            report,
            outcome: MutationOutcome::Applied,
        })
    }

    fn missing_target(&self, id: FacilityId, field: &str) -> Result<MutationOutcome, HygieiaError> {
        match self.settings.missing_target {
            MissingTargetPolicy::Reject => Err(HygieiaError::NotFound(id)),
            MissingTargetPolicy::Ignore => {
                warn!(facility_id = %id, field, store = self.store.name(), "no facility matched, update ignored");
                Ok(MutationOutcome::NoMatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::Grade;
    use crate::ports::PortError;

    struct FixedScorer(i64);

    #[async_trait]
    impl FacilityScorer for FixedScorer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, _payload: &[u8]) -> Result<AnalysisReport, PortError> {
            Ok(AnalysisReport::new(self.0, false, true))
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl FacilityScorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _payload: &[u8]) -> Result<AnalysisReport, PortError> {
            Err(PortError::Scorer("model offline".into()))
        }
    }

    /// Clock that advances one second per reading.
    struct TickingClock(AtomicI64);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.0.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap()
        }
    }

    fn scenario() -> Vec<Facility> {
        vec![
            Facility::new(FacilityId(1), Coordinate::new(10.0, 10.0))
                .with_cleanliness(80)
                .with_crowd(2)
                .with_water(true),
            Facility::new(FacilityId(2), Coordinate::new(10.01, 10.01))
                .with_cleanliness(90)
                .with_crowd(5)
                .with_water(false),
        ]
    }

    fn service_with(store: Arc<MemoryStore>, settings: ServiceSettings) -> HygieiaService {
        HygieiaService::new(store, Arc::new(FixedScorer(88)))
            .with_settings(settings)
            .with_clock(Arc::new(TickingClock(AtomicI64::new(0))))
    }

    #[tokio::test]
    async fn end_to_end_recommendation() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let service = service_with(Arc::clone(&store), ServiceSettings::default());
        let origin = Coordinate::new(10.0, 10.0);

        let nearby = service.find_nearby(origin, Some(2.0)).await.unwrap();
        assert_eq!(nearby.len(), 2);
        assert!(nearby.iter().all(|hit| hit.distance < 2.0));

        let best = service.recommend(origin).await.unwrap().unwrap();
        assert_eq!(best.facility.id, FacilityId(1));

        // Distances never reach the store.
        assert_eq!(store.load_all().await.unwrap(), scenario());
    }

    #[tokio::test]
    async fn recommend_far_away_is_none() {
        let service = service_with(Arc::new(MemoryStore::new(scenario())), ServiceSettings::default());
        assert!(service.recommend(Coordinate::new(-45.0, 120.0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_origin_is_rejected() {
        let service = service_with(Arc::new(MemoryStore::new(scenario())), ServiceSettings::default());
        let result = service.find_nearby(Coordinate::new(95.0, 0.0), None).await;
        assert!(matches!(result, Err(HygieiaError::InvalidInput(_))));

        let result = service.find_nearby(Coordinate::new(10.0, 10.0), Some(f64::INFINITY)).await;
        assert!(matches!(result, Err(HygieiaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn set_field_is_idempotent_apart_from_timestamp() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let service = service_with(Arc::clone(&store), ServiceSettings::default());

        service.set_field(FacilityId(2), FieldUpdate::Crowd(1)).await.unwrap();
        let first = store.get(FacilityId(2)).await.unwrap().unwrap();
        service.set_field(FacilityId(2), FieldUpdate::Crowd(1)).await.unwrap();
        let second = store.get(FacilityId(2)).await.unwrap().unwrap();

        assert_eq!(first.crowd, Some(1));
        assert!(second.last_updated > first.last_updated);
        let mut second_without_stamp = second.clone();
        second_without_stamp.last_updated = first.last_updated;
        assert_eq!(second_without_stamp, first);
    }

    #[tokio::test]
    async fn unknown_id_is_rejected_by_default() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let service = service_with(Arc::clone(&store), ServiceSettings::default());

        let result = service.set_field(FacilityId(42), FieldUpdate::Water(true)).await;
        assert!(matches!(result, Err(HygieiaError::NotFound(FacilityId(42)))));
        assert_eq!(store.load_all().await.unwrap(), scenario());
    }

    #[tokio::test]
    async fn unknown_id_can_be_ignored() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let settings = ServiceSettings {
            missing_target: MissingTargetPolicy::Ignore,
            ..ServiceSettings::default()
        };
        let service = service_with(Arc::clone(&store), settings);

        let outcome = service.set_field(FacilityId(42), FieldUpdate::Cleanliness(10)).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NoMatch);

        let analysis = service.analyze_and_update(FacilityId(42), b"img").await.unwrap();
        assert_eq!(analysis.outcome, MutationOutcome::NoMatch);
        assert_eq!(analysis.report.cleanliness_score(), 88);
        assert_eq!(store.load_all().await.unwrap(), scenario());
    }

    #[tokio::test]
    async fn analysis_is_merged_into_metrics() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let service = service_with(Arc::clone(&store), ServiceSettings::default());

        let analysis = service.analyze_and_update(FacilityId(1), b"img").await.unwrap();
        assert_eq!(analysis.outcome, MutationOutcome::Applied);
        assert_eq!(analysis.report.grade(), Grade::A);

        let updated = store.get(FacilityId(1)).await.unwrap().unwrap();
        let metrics = updated.ai_metrics.unwrap();
        assert_eq!(metrics.cleanliness_score, Some(88));
        assert_eq!(metrics.grade, Some(Grade::A));
        assert!(updated.last_updated.is_some());
        // Analysis leaves the reported cleanliness alone.
        assert_eq!(updated.cleanliness, Some(80));
    }

    #[tokio::test]
    async fn scorer_failure_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let shared: Arc<dyn RecordStore> = store.clone();
        let service = HygieiaService::new(shared, Arc::new(FailingScorer));

        let result = service.analyze_and_update(FacilityId(1), b"img").await;
        assert!(matches!(result, Err(HygieiaError::Port(PortError::Scorer(_)))));
        assert_eq!(store.load_all().await.unwrap(), scenario());
    }

    #[tokio::test]
    async fn concurrent_updates_to_one_record_are_not_lost() {
        let store = Arc::new(MemoryStore::new(scenario()));
        let service = Arc::new(service_with(Arc::clone(&store), ServiceSettings::default()));

        let crowd = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.set_field(FacilityId(1), FieldUpdate::Crowd(9)).await })
        };
        let water = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.set_field(FacilityId(1), FieldUpdate::Water(false)).await })
        };
        crowd.await.unwrap().unwrap();
        water.await.unwrap().unwrap();

        let facility = store.get(FacilityId(1)).await.unwrap().unwrap();
        assert_eq!(facility.crowd, Some(9));
        assert_eq!(facility.water, Some(false));
    }
}
