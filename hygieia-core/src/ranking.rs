//! Composite scoring and ranking of nearby facilities.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::HygieiaError;
use crate::model::{Facility, NearbyFacility};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Non-negative weights of the four ranking signals.
///
/// Cleanliness and water add to the score, crowd and distance subtract from
/// it. Keeping every weight non-negative makes the score monotonic in each
/// signal.
pub struct RankingWeights {
    cleanliness: f64,
    crowd: f64,
    water: f64,
    distance: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            cleanliness: 1.0,
            crowd: 5.0,
            water: 20.0,
            distance: 10.0,
        }
    }
}

impl RankingWeights {
    /// Build a custom weighting.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::InvalidInput`] when any weight is negative or not finite.
    pub fn new(cleanliness: f64, crowd: f64, water: f64, distance: f64) -> Result<Self, HygieiaError> {
        for (name, weight) in [
            ("cleanliness", cleanliness),
            ("crowd", crowd),
            ("water", water),
            ("distance", distance),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(HygieiaError::InvalidInput(format!(
                    "{name} weight must be a finite, non-negative number (got {weight})"
                )));
            }
        }
        Ok(Self {
            cleanliness,
            crowd,
            water,
            distance,
        })
    }

    /// Score of a single candidate.
    ///
    /// # Errors
    ///
    /// Returns [`HygieiaError::MalformedRecord`] when cleanliness, crowd, or water is missing.
    pub fn score(&self, candidate: &NearbyFacility) -> Result<f64, HygieiaError> {
        let signals = Signals::of(&candidate.facility)?;
        let water_bonus = if signals.water { self.water } else { 0.0 };

        Ok(self.cleanliness * f64::from(signals.cleanliness) - self.crowd * f64::from(signals.crowd)
            + water_bonus
            - self.distance * candidate.distance)
    }
}

struct Signals {
    cleanliness: i32,
    crowd: i32,
    water: bool,
}

impl Signals {
    fn of(facility: &Facility) -> Result<Self, HygieiaError> {
        Ok(Self {
            cleanliness: facility.require(facility.cleanliness, "cleanliness")?,
            crowd: facility.require(facility.crowd, "crowd")?,
            water: facility.require(facility.water, "water")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A candidate together with its composite score.
pub struct RankedFacility {
    /// The scored candidate.
    #[serde(flatten)]
    pub candidate: NearbyFacility,
    /// Composite score, higher is better.
    pub score: f64,
}

/// Best-first order: higher score, then shorter distance, then lower id.
fn best_first(left: &RankedFacility, right: &RankedFacility) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.candidate.distance.total_cmp(&right.candidate.distance))
        .then_with(|| left.candidate.facility.id.cmp(&right.candidate.facility.id))
}

/// Score and order all candidates, best first.
///
/// No filtering happens here; callers restrict the candidate set beforehand.
///
/// # Errors
///
/// Returns [`HygieiaError::MalformedRecord`] when a candidate lacks a ranking signal.
pub fn rank(
    candidates: &[NearbyFacility],
    weights: &RankingWeights,
) -> Result<Vec<RankedFacility>, HygieiaError> {
    let mut ranked = candidates
        .iter()
        .map(|candidate| {
            Ok(RankedFacility {
                score: weights.score(candidate)?,
                candidate: candidate.clone(),
            })
        })
        .collect::<Result<Vec<_>, HygieiaError>>()?;

    ranked.sort_by(best_first);
    Ok(ranked)
}

/// Pick the single best candidate; `None` when there are no candidates.
///
/// # Errors
///
/// Returns [`HygieiaError::MalformedRecord`] when a candidate lacks a ranking signal.
pub fn recommend_best(
    candidates: &[NearbyFacility],
    weights: &RankingWeights,
) -> Result<Option<NearbyFacility>, HygieiaError> {
    Ok(rank(candidates, weights)?
        .into_iter()
        .next()
        .map(|ranked| ranked.candidate))
}
