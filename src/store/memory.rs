use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::assignment::{AssignmentCommit, DeliveryCommit};
use crate::models::driver::{Driver, DriverWithRoutes, NewDriver};
use crate::models::metrics::{DateRange, DriverOrderStats};
use crate::models::order::{NewOrder, Order, OrderDetails, OrderFilter, OrderStatus};
use crate::models::route::{NewRoute, Route, RouteWithDrivers};
use crate::models::user::{NewUser, User, UserCredentials, UserSummary};
use crate::store::{Store, StoreError, DUPLICATE_EMAIL, STALE_TRANSITION};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, UserCredentials>,
    drivers: BTreeMap<i64, Driver>,
    routes: BTreeMap<i64, Route>,
    /// Join rows in attachment order.
    route_drivers: Vec<(i64, i64)>,
    orders: HashMap<Uuid, Order>,
    next_user_id: i64,
    next_driver_id: i64,
    next_route_id: i64,
}

impl Tables {
    fn route_with_drivers(&self, route: &Route) -> RouteWithDrivers {
        let drivers = self
            .route_drivers
            .iter()
            .filter(|(route_id, _)| *route_id == route.id)
            .filter_map(|(_, driver_id)| self.drivers.get(driver_id).cloned())
            .collect();

        RouteWithDrivers {
            route: route.clone(),
            drivers,
        }
    }

    fn routes_of(&self, driver_id: i64) -> Vec<Route> {
        self.route_drivers
            .iter()
            .filter(|(_, id)| *id == driver_id)
            .filter_map(|(route_id, _)| self.routes.get(route_id).cloned())
            .collect()
    }
}

/// In-process store used for development runs and tests. Every operation
/// holds one lock over all tables, which makes transition commits atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a driver's committed weight without going through assignment.
    pub async fn set_driver_weight(&self, id: i64, weight: f64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {id}")))?;

        driver.assigned_weight = weight;
        Ok(())
    }

    /// Overwrites timestamps of an existing order. Used to build fixtures
    /// for date-range queries.
    pub async fn backdate_order(
        &self,
        id: Uuid,
        created_at: DateTime<Utc>,
        assigned_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;

        order.created_at = created_at;
        order.assigned_at = assigned_at.or(order.assigned_at);
        order.delivered_at = delivered_at.or(order.delivered_at);
        Ok(())
    }

    /// Puts an order in transit with exactly the given references, bypassing
    /// assignment. Timestamps other than `updated_at` are left alone.
    pub async fn force_in_transit(
        &self,
        id: Uuid,
        route_id: Option<i64>,
        driver_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;

        let now = Utc::now();
        order.status = OrderStatus::InTransit;
        order.route_id = route_id;
        order.driver_id = driver_id;
        order.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .values()
            .any(|existing| existing.user.email == user.email)
        {
            return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        tables.users.insert(
            created.id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|entry| entry.user.email == email)
            .cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|entry| entry.user.clone()))
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;

        entry.user.last_login_at = Some(at);
        entry.user.updated_at = at;
        Ok(())
    }

    async fn create_driver(&self, driver: NewDriver) -> Result<Driver, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_driver_id += 1;

        let created = Driver {
            id: tables.next_driver_id,
            name: driver.name,
            vehicle_capacity: driver.vehicle_capacity,
            is_available: true,
            assigned_weight: 0.0,
        };
        tables.drivers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_drivers(
        &self,
        available: Option<bool>,
    ) -> Result<Vec<DriverWithRoutes>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .drivers
            .values()
            .filter(|driver| available.map_or(true, |wanted| driver.is_available == wanted))
            .map(|driver| DriverWithRoutes {
                driver: driver.clone(),
                routes: tables.routes_of(driver.id),
            })
            .collect())
    }

    async fn find_driver(&self, id: i64) -> Result<Option<Driver>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.drivers.get(&id).cloned())
    }

    async fn set_driver_availability(&self, id: i64, available: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {id}")))?;

        driver.is_available = available;
        Ok(())
    }

    async fn count_active_orders(&self, driver_id: i64) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        let count = tables
            .orders
            .values()
            .filter(|order| order.driver_id == Some(driver_id) && order.status.is_active())
            .count();

        Ok(count as i64)
    }

    async fn driver_order_stats(
        &self,
        range: DateRange,
        driver_id: Option<i64>,
    ) -> Result<Vec<DriverOrderStats>, StoreError> {
        let tables = self.tables.lock().await;
        let mut grouped: BTreeMap<i64, (i64, i64, Vec<f64>)> = BTreeMap::new();

        for order in tables.orders.values() {
            let Some(owner) = order.driver_id else {
                continue;
            };
            if driver_id.is_some_and(|wanted| wanted != owner) || !range.contains(order.created_at)
            {
                continue;
            }

            let entry = grouped.entry(owner).or_default();
            entry.0 += 1;

            let Some(delivered_at) = order.delivered_at else {
                continue;
            };
            entry.1 += 1;

            // Deliveries without an assignment stamp count but have no duration.
            if let Some(assigned_at) = order.assigned_at {
                let millis = (delivered_at - assigned_at).num_milliseconds();
                entry.2.push(millis as f64 / 1000.0);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(driver_id, (total, completed, durations))| DriverOrderStats {
                driver_id,
                total_orders: total,
                completed_shipments: completed,
                avg_delivery_seconds: (!durations.is_empty())
                    .then(|| durations.iter().sum::<f64>() / durations.len() as f64),
            })
            .collect())
    }

    async fn create_route(&self, route: NewRoute) -> Result<Route, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_route_id += 1;

        let created = Route {
            id: tables.next_route_id,
            name: route.name,
            origin: route.origin,
            destination: route.destination,
        };
        tables.routes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_routes(&self) -> Result<Vec<Route>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.routes.values().cloned().collect())
    }

    async fn find_route(&self, id: i64) -> Result<Option<RouteWithDrivers>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .routes
            .get(&id)
            .map(|route| tables.route_with_drivers(route)))
    }

    async fn attach_driver(&self, route_id: i64, driver_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.routes.contains_key(&route_id) {
            return Err(StoreError::NotFound("La ruta no existe".to_string()));
        }
        let Some(driver) = tables.drivers.get_mut(&driver_id) else {
            return Err(StoreError::NotFound(
                "El transportista no existe".to_string(),
            ));
        };
        driver.is_available = false;

        if !tables.route_drivers.contains(&(route_id, driver_id)) {
            tables.route_drivers.push((route_id, driver_id));
        }
        Ok(())
    }

    async fn delete_route(&self, id: i64) -> Result<Option<Vec<Uuid>>, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.routes.remove(&id).is_none() {
            return Ok(None);
        }

        tables.route_drivers.retain(|(route_id, _)| *route_id != id);
        let now = Utc::now();
        let mut detached = Vec::new();
        for order in tables.orders.values_mut() {
            if order.route_id == Some(id) {
                order.route_id = None;
                order.updated_at = now;
                detached.push(order.id);
            }
        }
        detached.sort();
        Ok(Some(detached))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&order.user_id) {
            return Err(StoreError::NotFound(format!("user {}", order.user_id)));
        }

        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            route_id: None,
            driver_id: None,
            weight: order.weight,
            dimensions: order.dimensions,
            product_type: order.product_type,
            destination_address: order.destination_address,
            return_address: order.return_address,
            recipient_name: order.recipient_name,
            recipient_phone: order.recipient_phone,
            recipient_email: order.recipient_email,
            sender_name: order.sender_name,
            sender_phone: order.sender_phone,
            sender_email: order.sender_email,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            delivered_at: None,
        };
        tables.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn find_order_details(&self, id: Uuid) -> Result<Option<OrderDetails>, StoreError> {
        let tables = self.tables.lock().await;
        let Some(order) = tables.orders.get(&id) else {
            return Ok(None);
        };

        let user = tables
            .users
            .get(&order.user_id)
            .map(|entry| UserSummary::from(&entry.user))
            .ok_or_else(|| StoreError::Backend(format!("order {id} has no owner")))?;
        let route = order
            .route_id
            .and_then(|route_id| tables.routes.get(&route_id))
            .map(|route| tables.route_with_drivers(route));
        let driver = order
            .driver_id
            .and_then(|driver_id| tables.drivers.get(&driver_id).cloned());

        Ok(Some(OrderDetails {
            order: order.clone(),
            user,
            route,
            driver,
        }))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn apply_assignment(&self, commit: &AssignmentCommit) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        let driver_ok = tables.drivers.get(&commit.driver_id).is_some_and(|driver| {
            driver.assigned_weight == commit.expected_driver_weight
                && commit.new_driver_weight <= driver.vehicle_capacity
        });
        let order_ok = tables
            .orders
            .get(&commit.order_id)
            .is_some_and(|order| order.status == OrderStatus::Pending);
        if !driver_ok || !order_ok {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        if let Some(driver) = tables.drivers.get_mut(&commit.driver_id) {
            driver.assigned_weight = commit.new_driver_weight;
            driver.is_available = false;
        }
        if let Some(order) = tables.orders.get_mut(&commit.order_id) {
            order.route_id = Some(commit.route_id);
            order.driver_id = Some(commit.driver_id);
            order.status = OrderStatus::InTransit;
            order.assigned_at = Some(commit.assigned_at);
            order.updated_at = commit.assigned_at;
        }
        Ok(())
    }

    async fn apply_delivery(&self, commit: &DeliveryCommit) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        let driver_ok = tables
            .drivers
            .get(&commit.driver_id)
            .is_some_and(|driver| driver.assigned_weight == commit.expected_driver_weight);
        let order_ok = tables
            .orders
            .get(&commit.order_id)
            .is_some_and(|order| order.status == OrderStatus::InTransit);
        if !driver_ok || !order_ok {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        if let Some(driver) = tables.drivers.get_mut(&commit.driver_id) {
            driver.assigned_weight = commit.new_driver_weight;
        }
        if let Some(order) = tables.orders.get_mut(&commit.order_id) {
            order.status = OrderStatus::Delivered;
            order.delivered_at = Some(commit.delivered_at);
            order.updated_at = commit.delivered_at;
        }
        Ok(())
    }
}
