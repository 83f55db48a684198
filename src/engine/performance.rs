use crate::engine::availability::DRIVER_NOT_FOUND;
use crate::engine::orders::parse_day;
use crate::error::AppError;
use crate::models::metrics::{DateRange, DriverOrderStats, DriverPerformance};
use crate::state::AppState;

const DATES_REQUIRED: &str = "startDate y endDate son obligatorios.";
const NO_ORDERS: &str = "No hay órdenes para este transportista en el rango de fechas indicado.";

/// Both bounds are whole days; the end day is included.
pub fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange, AppError> {
    match (parse_day(start)?, parse_day(end)?) {
        (Some(first), Some(last)) => Ok(DateRange::from_days(first, last)),
        _ => Err(AppError::BadRequest(DATES_REQUIRED.to_string())),
    }
}

/// `HH:MM:SS`, each part floored.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{hours:02}:{minutes:02}:{secs:02}")
}

fn to_performance(stats: DriverOrderStats) -> DriverPerformance {
    let avg = stats.avg_delivery_seconds.unwrap_or(0.0);

    DriverPerformance {
        driver_id: stats.driver_id,
        total_orders: stats.total_orders,
        completed_shipments: stats.completed_shipments,
        avg_delivery_time_seconds: format!("{avg:.2}"),
        avg_delivery_time: format_duration(avg),
        message: None,
    }
}

fn empty_performance(driver_id: i64) -> DriverPerformance {
    DriverPerformance {
        message: Some(NO_ORDERS.to_string()),
        ..to_performance(DriverOrderStats {
            driver_id,
            total_orders: 0,
            completed_shipments: 0,
            avg_delivery_seconds: None,
        })
    }
}

/// Every driver with at least one order created inside the range.
pub async fn performance_metrics(
    state: &AppState,
    range: DateRange,
) -> Result<Vec<DriverPerformance>, AppError> {
    let stats = state.store.driver_order_stats(range, None).await?;
    Ok(stats.into_iter().map(to_performance).collect())
}

pub async fn driver_performance(
    state: &AppState,
    driver_id: i64,
    range: DateRange,
) -> Result<DriverPerformance, AppError> {
    if state.store.find_driver(driver_id).await?.is_none() {
        return Err(AppError::NotFound(DRIVER_NOT_FOUND.to_string()));
    }

    let stats = state
        .store
        .driver_order_stats(range, Some(driver_id))
        .await?
        .into_iter()
        .find(|entry| entry.driver_id == driver_id);

    Ok(match stats {
        Some(stats) if stats.total_orders > 0 => to_performance(stats),
        _ => empty_performance(driver_id),
    })
}
