use crate::domain::{CollectionOutcome, CollectionService, PositionLookup, Proximity, QueryService};
use crate::http::error::{internal_error, ApiError};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::domain::{DomainError, DomainResult};
use common::geo;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub collection_service: Arc<CollectionService>,
    pub query_service: Arc<QueryService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/collect", get(collect))
        .route("/api/vehicle-position", get(vehicle_position))
        .route("/health", get(health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    pub ok: bool,
    pub upserted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_warning: Option<String>,
}

impl From<CollectionOutcome> for CollectResponse {
    fn from(outcome: CollectionOutcome) -> Self {
        // Zero-count cycles report a message instead of the key list
        let (vehicle_names, duration_ms) = match outcome.message {
            Some(_) => (None, None),
            None => (
                Some(outcome.vehicle_keys),
                Some(outcome.duration.as_millis() as u64),
            ),
        };

        Self {
            ok: true,
            upserted: outcome.upserted,
            vehicle_names,
            duration_ms,
            message: outcome.message,
            history_warning: outcome.history_warning,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePositionParams {
    pub vehicle: Option<String>,
    /// Optional reference point; both must be given together
    pub from_lat: Option<String>,
    pub from_lng: Option<String>,
}

impl VehiclePositionParams {
    fn origin(&self) -> DomainResult<Option<(f64, f64)>> {
        let (lat, lng) = match (&self.from_lat, &self.from_lng) {
            (None, None) => return Ok(None),
            (Some(lat), Some(lng)) => (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()),
            _ => {
                return Err(DomainError::InvalidQuery(
                    "`fromLat` and `fromLng` must be given together".to_string(),
                ));
            }
        };

        match (lat, lng) {
            (Ok(lat), Ok(lng)) if geo::is_valid_coordinate(lat, lng) => Ok(Some((lat, lng))),
            _ => Err(DomainError::InvalidQuery(
                "`fromLat`/`fromLng` must be valid decimal degrees".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePositionResponse {
    pub vehicle_key: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Provider observation time, or the cache write time when the provider sent none
    pub timestamp: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub age_secs: u64,
    pub stale: bool,
    pub matched_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
}

impl VehiclePositionResponse {
    fn new(lookup: PositionLookup, proximity: Option<Proximity>) -> Self {
        let timestamp = lookup.position.observed_at();
        let position = lookup.position.position;
        Self {
            vehicle_key: position.vehicle_key,
            lat: position.lat,
            lng: position.lng,
            speed_kph: position.speed_kph,
            heading: position.heading,
            timestamp,
            collected_at: lookup.position.collected_at,
            age_secs: lookup.age.as_secs(),
            stale: lookup.stale,
            matched_by: lookup.matched_by.to_string(),
            distance_km: proximity.map(|p| p.distance_km),
            distance_miles: proximity.map(|p| p.distance_miles),
            eta_secs: proximity.and_then(|p| p.eta).map(|eta| eta.as_secs()),
        }
    }
}

async fn collect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CollectResponse>, ApiError> {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let outcome = state.collection_service.collect(credential).await?;
    Ok(Json(outcome.into()))
}

async fn vehicle_position(
    State(state): State<AppState>,
    Query(params): Query<VehiclePositionParams>,
) -> Result<Json<VehiclePositionResponse>, ApiError> {
    let origin = params.origin()?;
    let query = params.vehicle.ok_or_else(|| {
        DomainError::InvalidQuery("missing required `vehicle` query parameter".to_string())
    })?;

    let lookup = state.query_service.find_vehicle(&query).await?;
    let proximity = origin.map(|origin| lookup.proximity_to(origin));
    Ok(Json(VehiclePositionResponse::new(lookup, proximity)))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    internal_error("internal server error".to_string())
}
