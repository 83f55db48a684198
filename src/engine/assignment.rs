use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{cache_sync, outcome_label};
use crate::error::AppError;
use crate::models::assignment::{AssignmentCommit, AssignmentResult};
use crate::models::driver::Driver;
use crate::models::order::OrderStatus;
use crate::state::AppState;

pub const ASSIGNED: &str = "Orden asignada exitosamente";

/// Puts a pending order on the route's first driver, if the driver's vehicle
/// can carry the extra weight.
pub async fn assign_route(
    state: &AppState,
    order_id: Uuid,
    route_id: i64,
) -> Result<AssignmentResult, AppError> {
    let start = Instant::now();
    let result = assign_route_inner(state, order_id, route_id).await;
    let outcome = outcome_label(&result);

    state.metrics.assignments_total.with_label_values(&[outcome]).inc();
    state
        .metrics
        .observe_workflow("assign_route", outcome, start.elapsed().as_secs_f64());

    if let Err(err) = &result {
        warn!(order_id = %order_id, route_id, error = %err, "assignment rejected");
    }
    result
}

async fn assign_route_inner(
    state: &AppState,
    order_id: Uuid,
    route_id: i64,
) -> Result<AssignmentResult, AppError> {
    let order = state
        .store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("La orden no existe".to_string()))?;

    if !order.status.can_transition_to(OrderStatus::InTransit) {
        return Err(AppError::Conflict("La orden ya ha sido asignada.".to_string()));
    }

    let route = state
        .store
        .find_route(route_id)
        .await?
        .ok_or_else(|| AppError::NotFound("La ruta no existe".to_string()))?;

    let driver = route.primary_driver().cloned().ok_or_else(|| {
        AppError::Conflict("La ruta no tiene conductores asignados".to_string())
    })?;

    let total_weight = driver.assigned_weight + order.weight;
    if total_weight > driver.vehicle_capacity {
        return Err(AppError::Conflict(format!(
            "El peso total ({total_weight} kg) supera la capacidad del vehículo ({} kg)",
            driver.vehicle_capacity
        )));
    }

    let commit = AssignmentCommit {
        order_id,
        route_id,
        driver_id: driver.id,
        expected_driver_weight: driver.assigned_weight,
        new_driver_weight: total_weight,
        assigned_at: Utc::now(),
    };
    state.store.apply_assignment(&commit).await?;

    cache_sync::record_transition(state, order_id, order.status, OrderStatus::InTransit).await;

    let driver = Driver {
        assigned_weight: commit.new_driver_weight,
        is_available: false,
        ..driver
    };
    state
        .metrics
        .driver_load_ratio
        .with_label_values(&[&driver.id.to_string()])
        .set(driver.load_ratio());

    let mut order = order;
    order.route_id = Some(route_id);
    order.driver_id = Some(driver.id);
    order.status = OrderStatus::InTransit;
    order.assigned_at = Some(commit.assigned_at);
    order.updated_at = commit.assigned_at;

    info!(
        order_id = %order_id,
        route_id,
        driver_id = driver.id,
        assigned_weight = driver.assigned_weight,
        "order assigned"
    );

    Ok(AssignmentResult {
        message: ASSIGNED.to_string(),
        order,
        route: route.route,
        driver,
    })
}
