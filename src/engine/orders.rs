use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::validation::check_order_input;
use crate::engine::{cache_sync, outcome_label};
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::metrics::{day_after, start_of_day};
use crate::models::order::{Order, OrderDetails, OrderFilter, OrderInput, OrderStatus};
use crate::models::route::RouteWithDrivers;
use crate::models::user::UserSummary;
use crate::state::AppState;

pub const ORDER_NOT_FOUND: &str = "Orden no encontrada.";
const CREATE_FAILED: &str = "No se pudo crear la orden. Por favor, intente nuevamente.";
const NOT_YOUR_ORDER: &str = "No tiene permiso para consultar esta orden.";
const INVALID_DATES: &str = "Fechas no válidas.";

pub async fn create_order(
    state: &AppState,
    user_id: i64,
    input: OrderInput,
) -> Result<Order, AppError> {
    let start = Instant::now();
    let result = create_order_inner(state, user_id, input).await;

    state
        .metrics
        .observe_workflow("create_order", outcome_label(&result), start.elapsed().as_secs_f64());
    result
}

async fn create_order_inner(
    state: &AppState,
    user_id: i64,
    input: OrderInput,
) -> Result<Order, AppError> {
    check_order_input(&input).map_err(|message| AppError::BadRequest(message.to_string()))?;

    let destination = state.geocoder.validate(&input.destination_address).await;
    if !destination.is_valid {
        return Err(AppError::BadRequest(format!(
            "Error en dirección de destino: {}",
            destination.reason.unwrap_or_default()
        )));
    }

    let return_check = state.geocoder.validate(&input.return_address).await;
    if !return_check.is_valid {
        return Err(AppError::BadRequest(format!(
            "Error en dirección de retorno: {}",
            return_check.reason.unwrap_or_default()
        )));
    }

    let order = state
        .store
        .create_order(input.into_new_order(user_id))
        .await
        .map_err(|err| {
            error!(user_id, error = %err, "failed to persist order");
            AppError::Internal(CREATE_FAILED.to_string())
        })?;

    cache_sync::record_created(state, &order).await;
    state.metrics.orders_created_total.inc();
    info!(order_id = %order.id, user_id, status = %order.status, "order created");

    Ok(order)
}

/// Read-through lookup of the full order snapshot. Callers that are not
/// admins only see their own orders.
pub async fn get_order(
    state: &AppState,
    order_id: Uuid,
    caller: &Claims,
) -> Result<OrderDetails, AppError> {
    let details = match cache_sync::cached_snapshot(state, order_id).await {
        Some(details) => details,
        None => {
            let details = state
                .store
                .find_order_details(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.to_string()))?;

            cache_sync::store_snapshot(state, &details).await;
            details
        }
    };

    if !caller.is_admin() && details.order.user_id != caller.user_id {
        return Err(AppError::Forbidden(NOT_YOUR_ORDER.to_string()));
    }
    Ok(details)
}

/// Current status through the `order:<id>:status` key. Owners go through the
/// snapshot instead, which also carries the owner id.
pub async fn get_order_status(
    state: &AppState,
    order_id: Uuid,
    caller: &Claims,
) -> Result<OrderStatus, AppError> {
    if !caller.is_admin() {
        return Ok(get_order(state, order_id, caller).await?.order.status);
    }

    if let Some(status) = cache_sync::cached_status(state, order_id).await {
        return Ok(status);
    }

    let order = state
        .store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.to_string()))?;

    cache_sync::store_status(state, order_id, order.status).await;
    Ok(order.status)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    /// Comma separated status names.
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl OrderListQuery {
    pub fn to_filter(&self) -> Result<OrderFilter, AppError> {
        let statuses = match self.status.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<OrderStatus>().map_err(AppError::BadRequest))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(OrderFilter {
            statuses,
            created_from: parse_day(self.start_date.as_deref())?.map(start_of_day),
            created_before: parse_day(self.end_date.as_deref())?.map(day_after),
        })
    }
}

pub(crate) fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(INVALID_DATES.to_string())),
        None => Ok(None),
    }
}

/// Loads each owner, route and driver once per listing.
struct Relations<'a> {
    state: &'a AppState,
    users: HashMap<i64, UserSummary>,
    routes: HashMap<i64, Option<RouteWithDrivers>>,
    drivers: HashMap<i64, Option<Driver>>,
}

impl<'a> Relations<'a> {
    fn new(state: &'a AppState) -> Self {
        Self {
            state,
            users: HashMap::new(),
            routes: HashMap::new(),
            drivers: HashMap::new(),
        }
    }

    async fn user(&mut self, id: i64) -> Result<UserSummary, AppError> {
        if let Some(user) = self.users.get(&id) {
            return Ok(user.clone());
        }

        let user = self
            .state
            .store
            .find_user(id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| AppError::Internal(format!("owner {id} is missing")))?;
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn route(&mut self, id: Option<i64>) -> Result<Option<RouteWithDrivers>, AppError> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(route) = self.routes.get(&id) {
            return Ok(route.clone());
        }

        let route = self.state.store.find_route(id).await?;
        self.routes.insert(id, route.clone());
        Ok(route)
    }

    async fn driver(&mut self, id: Option<i64>) -> Result<Option<Driver>, AppError> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(driver) = self.drivers.get(&id) {
            return Ok(driver.clone());
        }

        let driver = self.state.store.find_driver(id).await?;
        self.drivers.insert(id, driver.clone());
        Ok(driver)
    }
}

/// Filtered listing from the store, with owner, route and driver attached.
pub async fn list_orders(
    state: &AppState,
    query: &OrderListQuery,
) -> Result<Vec<OrderDetails>, AppError> {
    let filter = query.to_filter()?;
    let orders = state.store.list_orders(&filter).await?;

    let mut relations = Relations::new(state);
    let mut listed = Vec::with_capacity(orders.len());
    for order in orders {
        let user = relations.user(order.user_id).await?;
        let route = relations.route(order.route_id).await?;
        let driver = relations.driver(order.driver_id).await?;
        listed.push(OrderDetails {
            order,
            user,
            route,
            driver,
        });
    }
    Ok(listed)
}
