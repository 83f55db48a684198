use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::{AdminUser, AuthUser};
use crate::engine::orders::OrderListQuery;
use crate::engine::{assignment, delivery, orders};
use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::order::{Order, OrderDetails, OrderInput, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:order_id", get(get_order))
        .route("/:order_id/status", get(get_status).put(update_status))
        .route("/:order_id/assign", post(assign_order))
}

#[derive(Serialize)]
struct OrderCreated {
    message: &'static str,
    order: Order,
}

#[derive(Serialize)]
struct OrderList {
    message: &'static str,
    orders: Vec<OrderDetails>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    order_id: Uuid,
    status: OrderStatus,
}

#[derive(Serialize)]
struct MessageView {
    message: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub route_id: i64,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ApiJson(payload): ApiJson<OrderInput>,
) -> Result<(StatusCode, Json<OrderCreated>), AppError> {
    let order = orders::create_order(&state, claims.user_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreated {
            message: "Orden de envío creada exitosamente",
            order,
        }),
    ))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Json<OrderList>, AppError> {
    let orders = orders::list_orders(&state, &query).await?;

    Ok(Json(OrderList {
        message: "Lista de órdenes",
        orders,
    }))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(orders::get_order(&state, order_id, &claims).await?))
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<StatusView>, AppError> {
    let status = orders::get_order_status(&state, order_id, &claims).await?;
    Ok(Json(StatusView { order_id, status }))
}

async fn assign_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(order_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignRequest>,
) -> Result<Json<AssignmentResult>, AppError> {
    Ok(Json(
        assignment::assign_route(&state, order_id, payload.route_id).await?,
    ))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(order_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> Result<Json<MessageView>, AppError> {
    let outcome = delivery::update_order_status(&state, order_id, &payload.status).await?;
    Ok(Json(MessageView {
        message: outcome.message(),
    }))
}
