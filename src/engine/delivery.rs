use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::orders::ORDER_NOT_FOUND;
use crate::engine::{cache_sync, outcome_label};
use crate::error::AppError;
use crate::models::assignment::DeliveryCommit;
use crate::models::driver::Driver;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub const STATUS_UPDATED: &str = "Estado actualizado exitosamente";
pub const NO_CHANGE: &str = "No se realizó ningún cambio. La orden no está en estado 'En tránsito'.";
const ONLY_DELIVERED: &str = "Solo se permite cambiar el estado a 'Entregado'.";
const NO_DRIVER: &str = "La orden no tiene conductor asignado.";

/// Weight residues smaller than this are float noise and count as zero.
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Unchanged,
}

impl DeliveryOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => STATUS_UPDATED,
            DeliveryOutcome::Unchanged => NO_CHANGE,
        }
    }
}

/// Closes an in-transit order and releases its weight from the driver.
/// Orders in any other status are left untouched.
pub async fn update_order_status(
    state: &AppState,
    order_id: Uuid,
    requested: &str,
) -> Result<DeliveryOutcome, AppError> {
    let start = Instant::now();
    let result = complete_delivery(state, order_id, requested).await;
    let outcome = match &result {
        Ok(DeliveryOutcome::Unchanged) => "no_change",
        other => outcome_label(other),
    };

    state.metrics.deliveries_total.with_label_values(&[outcome]).inc();
    state
        .metrics
        .observe_workflow("complete_delivery", outcome, start.elapsed().as_secs_f64());

    if let Err(err) = &result {
        warn!(order_id = %order_id, error = %err, "status update rejected");
    }
    result
}

async fn complete_delivery(
    state: &AppState,
    order_id: Uuid,
    requested: &str,
) -> Result<DeliveryOutcome, AppError> {
    let order = state
        .store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.to_string()))?;

    if requested.trim().parse::<OrderStatus>() != Ok(OrderStatus::Delivered) {
        return Err(AppError::BadRequest(ONLY_DELIVERED.to_string()));
    }

    if !order.status.can_transition_to(OrderStatus::Delivered) {
        info!(order_id = %order_id, status = %order.status, "delivery skipped");
        return Ok(DeliveryOutcome::Unchanged);
    }

    let driver = carrying_driver(state, &order)
        .await?
        .ok_or_else(|| AppError::Conflict(NO_DRIVER.to_string()))?;

    let commit = DeliveryCommit {
        order_id,
        driver_id: driver.id,
        expected_driver_weight: driver.assigned_weight,
        new_driver_weight: released_weight(driver.assigned_weight, order.weight),
        delivered_at: Utc::now(),
    };
    state.store.apply_delivery(&commit).await?;

    cache_sync::record_transition(state, order_id, order.status, OrderStatus::Delivered).await;

    let load = Driver {
        assigned_weight: commit.new_driver_weight,
        ..driver
    }
    .load_ratio();
    state
        .metrics
        .driver_load_ratio
        .with_label_values(&[&commit.driver_id.to_string()])
        .set(load);

    info!(
        order_id = %order_id,
        driver_id = commit.driver_id,
        assigned_weight = commit.new_driver_weight,
        "order delivered"
    );
    Ok(DeliveryOutcome::Delivered)
}

/// The order's own driver, falling back to the first driver of its route.
async fn carrying_driver(state: &AppState, order: &Order) -> Result<Option<Driver>, AppError> {
    if let Some(driver_id) = order.driver_id {
        if let Some(driver) = state.store.find_driver(driver_id).await? {
            return Ok(Some(driver));
        }
    }

    let Some(route_id) = order.route_id else {
        return Ok(None);
    };
    Ok(state
        .store
        .find_route(route_id)
        .await?
        .and_then(|route| route.primary_driver().cloned()))
}

fn released_weight(current: f64, order_weight: f64) -> f64 {
    let remaining = current - order_weight;
    if remaining < WEIGHT_EPSILON {
        0.0
    } else {
        remaining
    }
}
