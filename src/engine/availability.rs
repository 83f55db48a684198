use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub const DRIVER_NOT_FOUND: &str = "Transportista no encontrado.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub success: bool,
    pub message: String,
}

impl AvailabilityReport {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Manual reconciliation: a driver becomes available again only once every
/// order is delivered and no weight is left on the vehicle.
pub async fn recalculate_availability(
    state: &AppState,
    driver_id: i64,
) -> Result<AvailabilityReport, AppError> {
    let driver = state
        .store
        .find_driver(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(DRIVER_NOT_FOUND.to_string()))?;

    let active_orders = state.store.count_active_orders(driver_id).await?;
    if active_orders > 0 {
        return Err(AppError::Conflict(format!(
            "El transportista tiene {active_orders} órdenes activas y no puede marcarse como disponible."
        )));
    }

    if driver.assigned_weight != 0.0 {
        return Err(AppError::BadRequest(format!(
            "El transportista aún tiene {} kg asignados sin órdenes activas.",
            driver.assigned_weight
        )));
    }

    if driver.is_available {
        return Ok(AvailabilityReport::ok("El transportista ya está disponible."));
    }

    state.store.set_driver_availability(driver_id, true).await?;
    info!(driver_id, "driver marked available");

    Ok(AvailabilityReport::ok(
        "Disponibilidad del transportista actualizada a disponible.",
    ))
}
