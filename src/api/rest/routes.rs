use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::auth::AdminUser;
use crate::engine::cache_sync;
use crate::error::AppError;
use crate::models::route::{NewRoute, Route, RouteWithDrivers};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_route).get(list_routes))
        .route("/:route_id", get(get_route).delete(delete_route))
        .route("/:route_id/assign-driver", post(assign_driver))
}

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: i64,
}

#[derive(Serialize)]
struct RouteView<T> {
    message: &'static str,
    route: T,
}

#[derive(Serialize)]
struct RouteList {
    message: &'static str,
    routes: Vec<Route>,
}

#[derive(Serialize)]
struct MessageView {
    message: &'static str,
}

fn route_missing(route_id: i64) -> AppError {
    AppError::NotFound(format!("La ruta con ID {route_id} no existe."))
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(payload): ApiJson<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteView<Route>>), AppError> {
    let fields = [&payload.name, &payload.origin, &payload.destination];
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::BadRequest(
            "El nombre, el origen y el destino de la ruta son obligatorios.".to_string(),
        ));
    }

    let route = state
        .store
        .create_route(NewRoute {
            name: payload.name.trim().to_string(),
            origin: payload.origin.trim().to_string(),
            destination: payload.destination.trim().to_string(),
        })
        .await?;
    info!(route_id = route.id, "route created");

    Ok((
        StatusCode::CREATED,
        Json(RouteView {
            message: "Ruta creada exitosamente",
            route,
        }),
    ))
}

async fn list_routes(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<RouteList>, AppError> {
    Ok(Json(RouteList {
        message: "Lista de rutas",
        routes: state.store.list_routes().await?,
    }))
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(route_id): ApiPath<i64>,
) -> Result<Json<RouteView<RouteWithDrivers>>, AppError> {
    let route = state
        .store
        .find_route(route_id)
        .await?
        .ok_or_else(|| route_missing(route_id))?;

    Ok(Json(RouteView {
        message: "Ruta encontrada",
        route,
    }))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(route_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AssignDriverRequest>,
) -> Result<Json<MessageView>, AppError> {
    state.store.attach_driver(route_id, payload.driver_id).await?;
    info!(route_id, driver_id = payload.driver_id, "driver attached to route");

    Ok(Json(MessageView {
        message: "Transportista agregado a la ruta exitosamente",
    }))
}

async fn delete_route(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(route_id): ApiPath<i64>,
) -> Result<Json<MessageView>, AppError> {
    let detached = state
        .store
        .delete_route(route_id)
        .await?
        .ok_or_else(|| route_missing(route_id))?;
    cache_sync::forget_snapshots(&state, &detached).await;
    info!(route_id, detached_orders = detached.len(), "route deleted");

    Ok(Json(MessageView {
        message: "Ruta eliminada exitosamente",
    }))
}
