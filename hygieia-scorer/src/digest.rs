//! Placeholder scorer deriving its verdict from a SHA-256 digest of the image.
//!
//! It stands in for a real detection model: the same image always gets the
//! same assessment, but the assessment says nothing about the image content.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use hygieia_core::{
    model::AnalysisReport,
    ports::{FacilityScorer, PortError},
};

const BASE_SCORE_MIN: i64 = 60;
const BASE_SCORE_SPAN: u8 = 36;
const GARBAGE_PENALTY: i64 = 20;
const NO_WATER_PENALTY: i64 = 10;

#[derive(Debug, Clone, Copy, Default)]
/// Deterministic stand-in for an image model.
pub struct DigestScorer;

impl DigestScorer {
    /// Assess a payload without going through the async port.
    #[must_use]
    pub fn assess(payload: &[u8]) -> AnalysisReport {
        let digest = Sha256::digest(payload);
        let byte = |index: usize| digest.get(index).copied().unwrap_or_default();

        let garbage_detected = byte(0) & 1 == 1;
        let water_present = byte(1) & 1 == 1;

        let mut score = BASE_SCORE_MIN + i64::from(byte(2) % BASE_SCORE_SPAN);
        if garbage_detected {
            score -= GARBAGE_PENALTY;
        }
        if !water_present {
            score -= NO_WATER_PENALTY;
        }

        AnalysisReport::new(score, garbage_detected, water_present)
    }
}

#[async_trait]
impl FacilityScorer for DigestScorer {
    fn name(&self) -> &str {
        "digest"
    }

    async fn analyze(&self, payload: &[u8]) -> Result<AnalysisReport, PortError> {
        Ok(Self::assess(payload))
    }
}
