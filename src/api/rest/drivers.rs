use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::AdminUser;
use crate::engine::availability::{self, AvailabilityReport};
use crate::engine::performance;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverListing, NewDriver};
use crate::models::metrics::DriverPerformance;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_driver).get(list_drivers))
        .route("/metrics", get(all_metrics))
        .route("/:id/performance-metrics", get(driver_metrics))
        .route("/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriverRequest {
    #[serde(default)]
    pub name: String,
    pub vehicle_capacity: Option<f64>,
}

#[derive(Deserialize)]
pub struct ListDriversQuery {
    pub available: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
struct DriverCreated {
    message: &'static str,
    driver: Driver,
}

#[derive(Serialize)]
struct DriverList {
    message: &'static str,
    drivers: Vec<DriverListing>,
}

#[derive(Serialize)]
struct MetricsView<T> {
    message: &'static str,
    metrics: T,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(payload): ApiJson<CreateDriverRequest>,
) -> Result<(StatusCode, Json<DriverCreated>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "El nombre del transportista es obligatorio.".to_string(),
        ));
    }

    let vehicle_capacity = payload
        .vehicle_capacity
        .filter(|capacity| capacity.is_finite() && *capacity > 0.0)
        .ok_or_else(|| {
            AppError::BadRequest(
                "La capacidad del vehículo debe ser un número positivo.".to_string(),
            )
        })?;

    let driver = state
        .store
        .create_driver(NewDriver {
            name: name.to_string(),
            vehicle_capacity,
        })
        .await?;
    info!(driver_id = driver.id, vehicle_capacity, "driver created");

    Ok((
        StatusCode::CREATED,
        Json(DriverCreated {
            message: "Transportista creado exitosamente",
            driver,
        }),
    ))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ListDriversQuery>,
) -> Result<Json<DriverList>, AppError> {
    let drivers = state
        .store
        .list_drivers(query.available)
        .await?
        .into_iter()
        .map(DriverListing::from)
        .collect();

    Ok(Json(DriverList {
        message: "Lista de transportistas",
        drivers,
    }))
}

async fn all_metrics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<MetricsQuery>,
) -> Result<Json<MetricsView<Vec<DriverPerformance>>>, AppError> {
    let range = performance::parse_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    Ok(Json(MetricsView {
        message: "Métricas obtenidas exitosamente",
        metrics: performance::performance_metrics(&state, range).await?,
    }))
}

async fn driver_metrics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(driver_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MetricsQuery>,
) -> Result<Json<MetricsView<DriverPerformance>>, AppError> {
    let range = performance::parse_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    Ok(Json(MetricsView {
        message: "Métricas obtenidas exitosamente",
        metrics: performance::driver_performance(&state, driver_id, range).await?,
    }))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(driver_id): ApiPath<i64>,
) -> Result<Json<AvailabilityReport>, AppError> {
    Ok(Json(
        availability::recalculate_availability(&state, driver_id).await?,
    ))
}
