//! HTTP routes mapping requests onto the service facade.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use hygieia_core::{
    model::{AnalysisReport, Coordinate, Facility, FacilityId, FieldUpdate, NearbyFacility},
    service::HygieiaService,
};

use crate::error::ApiError;

const SYSTEM_NAME: &str = "HygieiaX Smart Toilet System";
const API_VERSION: &str = "1.0";
const UPLOAD_FIELD: &str = "file";
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const RANKING_FACTORS: [&str; 4] = ["cleanliness", "crowd", "water availability", "distance"];

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the router exposing the facade.
pub fn router(service: Arc<HygieiaService>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/toilets", get(list_toilets))
        .route("/nearby", get(nearby))
        .route("/recommend", get(recommend))
        .route("/update_cleanliness", post(update_cleanliness))
        .route("/update_crowd", post(update_crowd))
        .route("/update_water", post(update_water))
        .route("/analyze", post(analyze))
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    system: &'static str,
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct LocationQuery {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct NearbyResponse {
    user_location: Coordinate,
    results: Vec<NearbyFacility>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RecommendResponse {
    recommended: Option<NearbyFacility>,
    based_on: [&'static str; 4],
}

#[derive(Debug, Deserialize)]
struct CleanlinessQuery {
    toilet_id: i64,
    score: i32,
}

#[derive(Debug, Serialize)]
struct CleanlinessResponse {
    status: &'static str,
    toilet_id: i64,
    new_score: i32,
}

#[derive(Debug, Deserialize)]
struct CrowdQuery {
    toilet_id: i64,
    crowd: i32,
}

#[derive(Debug, Serialize)]
struct CrowdResponse {
    status: &'static str,
    toilet_id: i64,
    crowd: i32,
}

#[derive(Debug, Deserialize)]
struct WaterQuery {
    toilet_id: i64,
    water: bool,
}

#[derive(Debug, Serialize)]
struct WaterResponse {
    status: &'static str,
    toilet_id: i64,
    water: bool,
}

#[derive(Debug, Deserialize)]
struct AnalyzeQuery {
    toilet_id: i64,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    toilet_id: i64,
    analysis: AnalysisReport,
}

async fn home() -> Json<SystemInfo> {
    Json(SystemInfo {
        system: SYSTEM_NAME,
        status: "Running",
        version: API_VERSION,
    })
}

async fn list_toilets(State(service): State<Arc<HygieiaService>>) -> ApiResult<Vec<Facility>> {
    Ok(Json(service.list_all().await?))
}

async fn nearby(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> ApiResult<NearbyResponse> {
    let Query(location) = query?;
    let origin = Coordinate::new(location.lat, location.lon);
    let results = service.find_nearby(origin, None).await?;

    Ok(Json(NearbyResponse {
        user_location: origin,
        count: results.len(),
        results,
    }))
}

async fn recommend(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> ApiResult<RecommendResponse> {
    let Query(location) = query?;
    let recommended = service
        .recommend(Coordinate::new(location.lat, location.lon))
        .await?;

    Ok(Json(RecommendResponse {
        recommended,
        based_on: RANKING_FACTORS,
    }))
}

async fn update_cleanliness(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<CleanlinessQuery>, QueryRejection>,
) -> ApiResult<CleanlinessResponse> {
    let Query(update) = query?;
    service
        .set_field(FacilityId(update.toilet_id), FieldUpdate::Cleanliness(update.score))
        .await?;

    Ok(Json(CleanlinessResponse {
        status: "updated",
        toilet_id: update.toilet_id,
        new_score: update.score,
    }))
}

async fn update_crowd(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<CrowdQuery>, QueryRejection>,
) -> ApiResult<CrowdResponse> {
    let Query(update) = query?;
    service
        .set_field(FacilityId(update.toilet_id), FieldUpdate::Crowd(update.crowd))
        .await?;

    Ok(Json(CrowdResponse {
        status: "updated",
        toilet_id: update.toilet_id,
        crowd: update.crowd,
    }))
}

async fn update_water(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<WaterQuery>, QueryRejection>,
) -> ApiResult<WaterResponse> {
    let Query(update) = query?;
    service
        .set_field(FacilityId(update.toilet_id), FieldUpdate::Water(update.water))
        .await?;

    Ok(Json(WaterResponse {
        status: "updated",
        toilet_id: update.toilet_id,
        water: update.water,
    }))
}

async fn analyze(
    State(service): State<Arc<HygieiaService>>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<AnalyzeResponse> {
    let Query(target) = query?;
    let mut multipart = multipart?;

    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            image = Some(field.bytes().await?);
            break;
        }
    }
    let image = image.ok_or_else(|| {
        ApiError::invalid_input(format!("multipart field `{UPLOAD_FIELD}` is required"))
    })?;

    info!(toilet_id = target.toilet_id, bytes = image.len(), "image received");
    let outcome = service
        .analyze_and_update(FacilityId(target.toilet_id), &image)
        .await?;

    Ok(Json(AnalyzeResponse {
        toilet_id: target.toilet_id,
        analysis: outcome.report,
    }))
}

async fn unknown_route() -> ApiError {
    ApiError::not_found("no such route")
}
