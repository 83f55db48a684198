//! Persistence port for users, drivers, routes and orders.
//!
//! Workflows only talk to [`Store`]; `main` picks [`postgres::PgStore`] when a
//! database URL is configured and [`memory::MemoryStore`] otherwise.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::assignment::{AssignmentCommit, DeliveryCommit};
use crate::models::driver::{Driver, DriverWithRoutes, NewDriver};
use crate::models::metrics::{DateRange, DriverOrderStats};
use crate::models::order::{NewOrder, Order, OrderDetails, OrderFilter};
use crate::models::route::{NewRoute, Route, RouteWithDrivers};
use crate::models::user::{NewUser, User, UserCredentials};

pub const DUPLICATE_EMAIL: &str = "El correo ya está registrado";
pub const STALE_TRANSITION: &str =
    "La orden o el transportista cambiaron durante la operación. Intente nuevamente.";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// A uniqueness rule or a transition guard rejected the write.
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("store record not found: {0}")]
    NotFound(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases pooled connections. Called once after the server stops.
    async fn shutdown(&self) {}

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Looks up by the lower-cased email and includes the password hash.
    async fn find_user_by_email(&self, email: &str)
        -> Result<Option<UserCredentials>, StoreError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn create_driver(&self, driver: NewDriver) -> Result<Driver, StoreError>;

    async fn list_drivers(
        &self,
        available: Option<bool>,
    ) -> Result<Vec<DriverWithRoutes>, StoreError>;

    async fn find_driver(&self, id: i64) -> Result<Option<Driver>, StoreError>;

    async fn set_driver_availability(&self, id: i64, available: bool) -> Result<(), StoreError>;

    /// Orders on this driver that are still `En espera` or `En tránsito`.
    async fn count_active_orders(&self, driver_id: i64) -> Result<i64, StoreError>;

    /// Aggregates orders created inside `range`, grouped by driver. Orders
    /// without a driver are ignored.
    async fn driver_order_stats(
        &self,
        range: DateRange,
        driver_id: Option<i64>,
    ) -> Result<Vec<DriverOrderStats>, StoreError>;

    async fn create_route(&self, route: NewRoute) -> Result<Route, StoreError>;

    async fn list_routes(&self) -> Result<Vec<Route>, StoreError>;

    async fn find_route(&self, id: i64) -> Result<Option<RouteWithDrivers>, StoreError>;

    /// Links a driver to a route (no-op when already linked) and marks the
    /// driver unavailable.
    async fn attach_driver(&self, route_id: i64, driver_id: i64) -> Result<(), StoreError>;

    /// Returns `None` when the route did not exist. Otherwise the ids of the
    /// orders whose route reference was cleared.
    async fn delete_route(&self, id: i64) -> Result<Option<Vec<Uuid>>, StoreError>;

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn find_order_details(&self, id: Uuid) -> Result<Option<OrderDetails>, StoreError>;

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Atomically updates driver weight and order placement. Fails with
    /// [`StoreError::Conflict`] and writes nothing if either record moved on.
    async fn apply_assignment(&self, commit: &AssignmentCommit) -> Result<(), StoreError>;

    /// Atomically releases driver weight and marks the order delivered.
    async fn apply_delivery(&self, commit: &DeliveryCommit) -> Result<(), StoreError>;
}
