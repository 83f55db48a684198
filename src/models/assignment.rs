use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::order::Order;
use crate::models::route::Route;

/// Writes that move a pending order onto a driver. Stores apply both halves
/// in one transaction and refuse the commit when the driver's weight or the
/// order's status changed since they were read.
#[derive(Debug, Clone)]
pub struct AssignmentCommit {
    pub order_id: Uuid,
    pub route_id: i64,
    pub driver_id: i64,
    pub expected_driver_weight: f64,
    pub new_driver_weight: f64,
    pub assigned_at: DateTime<Utc>,
}

/// Writes that close an in-transit order and release the driver's weight.
#[derive(Debug, Clone)]
pub struct DeliveryCommit {
    pub order_id: Uuid,
    pub driver_id: i64,
    pub expected_driver_weight: f64,
    pub new_driver_weight: f64,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentResult {
    pub message: String,
    pub order: Order,
    pub route: Route,
    pub driver: Driver,
}
