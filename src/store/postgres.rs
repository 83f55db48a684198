//! PostgreSQL adapter. Row structs mirror the tables in `migrations/` and are
//! converted into domain models at this boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::assignment::{AssignmentCommit, DeliveryCommit};
use crate::models::driver::{Driver, DriverWithRoutes, NewDriver};
use crate::models::metrics::{DateRange, DriverOrderStats};
use crate::models::order::{Dimensions, NewOrder, Order, OrderDetails, OrderFilter, OrderStatus};
use crate::models::route::{NewRoute, Route, RouteWithDrivers};
use crate::models::user::{NewUser, User, UserCredentials, UserSummary};
use crate::store::{Store, StoreError, DUPLICATE_EMAIL, STALE_TRANSITION};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, last_login_at, created_at, updated_at";
const DRIVER_COLUMNS: &str = "id, name, vehicle_capacity, is_available, assigned_weight";
const ORDER_COLUMNS: &str = "id, user_id, route_id, driver_id, weight, dimensions, product_type, \
     destination_address, return_address, recipient_name, recipient_phone, recipient_email, \
     sender_name, sender_phone, sender_email, status, created_at, updated_at, assigned_at, \
     delivered_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(DUPLICATE_EMAIL.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserCredentials {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(StoreError::Backend)?;
        Ok(UserCredentials {
            user: User {
                id: row.id,
                username: row.username,
                email: row.email,
                role,
                is_active: row.is_active,
                last_login_at: row.last_login_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

#[derive(FromRow)]
struct DriverRow {
    id: i64,
    name: String,
    vehicle_capacity: f64,
    is_available: bool,
    assigned_weight: f64,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            id: row.id,
            name: row.name,
            vehicle_capacity: row.vehicle_capacity,
            is_available: row.is_available,
            assigned_weight: row.assigned_weight,
        }
    }
}

#[derive(FromRow)]
struct RouteRow {
    id: i64,
    name: String,
    origin: String,
    destination: String,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            name: row.name,
            origin: row.origin,
            destination: row.destination,
        }
    }
}

#[derive(FromRow)]
struct DriverRouteRow {
    driver_id: i64,
    id: i64,
    name: String,
    origin: String,
    destination: String,
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: i64,
    route_id: Option<i64>,
    driver_id: Option<i64>,
    weight: f64,
    dimensions: Json<Dimensions>,
    product_type: String,
    destination_address: String,
    return_address: String,
    recipient_name: String,
    recipient_phone: String,
    recipient_email: String,
    sender_name: Option<String>,
    sender_phone: Option<String>,
    sender_email: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(StoreError::Backend)?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            route_id: row.route_id,
            driver_id: row.driver_id,
            weight: row.weight,
            dimensions: row.dimensions.0,
            product_type: row.product_type,
            destination_address: row.destination_address,
            return_address: row.return_address,
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            recipient_email: row.recipient_email,
            sender_name: row.sender_name,
            sender_phone: row.sender_phone,
            sender_email: row.sender_email,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            assigned_at: row.assigned_at,
            delivered_at: row.delivered_at,
        })
    }
}

#[derive(FromRow)]
struct StatsRow {
    driver_id: i64,
    total_orders: i64,
    completed_shipments: i64,
    avg_delivery_seconds: Option<f64>,
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens the pool and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Backend(format!("migration failed: {err}")))?;

        Ok(Self { pool })
    }

    async fn route_drivers(&self, route_id: i64) -> Result<Vec<Driver>, StoreError> {
        let rows = sqlx::query_as::<_, DriverRow>(
            "SELECT d.id, d.name, d.vehicle_capacity, d.is_available, d.assigned_weight \
             FROM route_drivers rd JOIN drivers d ON d.id = rd.driver_id \
             WHERE rd.route_id = $1 ORDER BY rd.id",
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Driver::from).collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(UserCredentials::try_from(row)?.user)
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserCredentials::try_from)
            .transpose()
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(UserCredentials::try_from)
            .transpose()?
            .map(|credentials| credentials.user))
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_driver(&self, driver: NewDriver) -> Result<Driver, StoreError> {
        let sql = format!(
            "INSERT INTO drivers (name, vehicle_capacity) VALUES ($1, $2) RETURNING {DRIVER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DriverRow>(&sql)
            .bind(&driver.name)
            .bind(driver.vehicle_capacity)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn list_drivers(
        &self,
        available: Option<bool>,
    ) -> Result<Vec<DriverWithRoutes>, StoreError> {
        let sql = format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers \
             WHERE ($1::boolean IS NULL OR is_available = $1) ORDER BY id"
        );
        let drivers = sqlx::query_as::<_, DriverRow>(&sql)
            .bind(available)
            .fetch_all(&self.pool)
            .await?;

        let links = sqlx::query_as::<_, DriverRouteRow>(
            "SELECT rd.driver_id, r.id, r.name, r.origin, r.destination \
             FROM route_drivers rd JOIN routes r ON r.id = rd.route_id ORDER BY rd.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut routes_by_driver: HashMap<i64, Vec<Route>> = HashMap::new();
        for link in links {
            routes_by_driver
                .entry(link.driver_id)
                .or_default()
                .push(Route {
                    id: link.id,
                    name: link.name,
                    origin: link.origin,
                    destination: link.destination,
                });
        }

        Ok(drivers
            .into_iter()
            .map(|row| {
                let routes = routes_by_driver.remove(&row.id).unwrap_or_default();
                DriverWithRoutes {
                    driver: row.into(),
                    routes,
                }
            })
            .collect())
    }

    async fn find_driver(&self, id: i64) -> Result<Option<Driver>, StoreError> {
        let sql = format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = $1");
        let row = sqlx::query_as::<_, DriverRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Driver::from))
    }

    async fn set_driver_availability(&self, id: i64, available: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE drivers SET is_available = $1 WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("driver {id}")));
        }
        Ok(())
    }

    async fn count_active_orders(&self, driver_id: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE driver_id = $1 AND status IN ($2, $3)",
        )
        .bind(driver_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(OrderStatus::InTransit.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn driver_order_stats(
        &self,
        range: DateRange,
        driver_id: Option<i64>,
    ) -> Result<Vec<DriverOrderStats>, StoreError> {
        let rows = sqlx::query_as::<_, StatsRow>(
            "SELECT driver_id, \
                    COUNT(id) AS total_orders, \
                    COUNT(id) FILTER (WHERE delivered_at IS NOT NULL) AS completed_shipments, \
                    (AVG(EXTRACT(EPOCH FROM (delivered_at - assigned_at))) \
                        FILTER (WHERE delivered_at IS NOT NULL))::float8 AS avg_delivery_seconds \
             FROM orders \
             WHERE driver_id IS NOT NULL \
               AND created_at >= $1 AND created_at < $2 \
               AND ($3::bigint IS NULL OR driver_id = $3) \
             GROUP BY driver_id ORDER BY driver_id",
        )
        .bind(range.start)
        .bind(range.end)
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DriverOrderStats {
                driver_id: row.driver_id,
                total_orders: row.total_orders,
                completed_shipments: row.completed_shipments,
                avg_delivery_seconds: row.avg_delivery_seconds,
            })
            .collect())
    }

    async fn create_route(&self, route: NewRoute) -> Result<Route, StoreError> {
        let row = sqlx::query_as::<_, RouteRow>(
            "INSERT INTO routes (name, origin, destination) VALUES ($1, $2, $3) \
             RETURNING id, name, origin, destination",
        )
        .bind(&route.name)
        .bind(&route.origin)
        .bind(&route.destination)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_routes(&self) -> Result<Vec<Route>, StoreError> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, origin, destination FROM routes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Route::from).collect())
    }

    async fn find_route(&self, id: i64) -> Result<Option<RouteWithDrivers>, StoreError> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, origin, destination FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let drivers = self.route_drivers(id).await?;

        Ok(Some(RouteWithDrivers {
            route: row.into(),
            drivers,
        }))
    }

    async fn attach_driver(&self, route_id: i64, driver_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let route_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM routes WHERE id = $1)")
                .bind(route_id)
                .fetch_one(&mut *tx)
                .await?;
        if !route_exists {
            return Err(StoreError::NotFound("La ruta no existe".to_string()));
        }

        let updated = sqlx::query("UPDATE drivers SET is_available = FALSE WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(
                "El transportista no existe".to_string(),
            ));
        }

        sqlx::query(
            "INSERT INTO route_drivers (route_id, driver_id) VALUES ($1, $2) \
             ON CONFLICT (route_id, driver_id) DO NOTHING",
        )
        .bind(route_id)
        .bind(driver_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_route(&self, id: i64) -> Result<Option<Vec<Uuid>>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut detached: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE orders SET route_id = NULL, updated_at = NOW() \
             WHERE route_id = $1 RETURNING id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        detached.sort();
        Ok(Some(detached))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let sql = format!(
            "INSERT INTO orders (id, user_id, weight, dimensions, product_type, \
                 destination_address, return_address, recipient_name, recipient_phone, \
                 recipient_email, sender_name, sender_phone, sender_email, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id)
            .bind(order.weight)
            .bind(Json(order.dimensions))
            .bind(&order.product_type)
            .bind(&order.destination_address)
            .bind(&order.return_address)
            .bind(&order.recipient_name)
            .bind(&order.recipient_phone)
            .bind(&order.recipient_email)
            .bind(&order.sender_name)
            .bind(&order.sender_phone)
            .bind(&order.sender_email)
            .bind(OrderStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn find_order_details(&self, id: Uuid) -> Result<Option<OrderDetails>, StoreError> {
        let Some(order) = self.find_order(id).await? else {
            return Ok(None);
        };

        let user = self
            .find_user(order.user_id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| StoreError::Backend(format!("order {id} has no owner")))?;
        let route = match order.route_id {
            Some(route_id) => self.find_route(route_id).await?,
            None => None,
        };
        let driver = match order.driver_id {
            Some(driver_id) => self.find_driver(driver_id).await?,
            None => None,
        };

        Ok(Some(OrderDetails {
            order,
            user,
            route,
            driver,
        }))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter
                .statuses
                .iter()
                .map(|status| status.as_str().to_string())
                .collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(from) = filter.created_from {
            query.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at < ").push_bind(before);
        }
        query.push(" ORDER BY created_at, id");

        query
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn apply_assignment(&self, commit: &AssignmentCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let driver = sqlx::query(
            "UPDATE drivers SET assigned_weight = $1, is_available = FALSE \
             WHERE id = $2 AND assigned_weight = $3 AND $1 <= vehicle_capacity",
        )
        .bind(commit.new_driver_weight)
        .bind(commit.driver_id)
        .bind(commit.expected_driver_weight)
        .execute(&mut *tx)
        .await?;
        if driver.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        let order = sqlx::query(
            "UPDATE orders SET route_id = $1, driver_id = $2, status = $3, \
                 assigned_at = $4, updated_at = $4 \
             WHERE id = $5 AND status = $6",
        )
        .bind(commit.route_id)
        .bind(commit.driver_id)
        .bind(OrderStatus::InTransit.as_str())
        .bind(commit.assigned_at)
        .bind(commit.order_id)
        .bind(OrderStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;
        if order.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_delivery(&self, commit: &DeliveryCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let driver = sqlx::query(
            "UPDATE drivers SET assigned_weight = $1 WHERE id = $2 AND assigned_weight = $3",
        )
        .bind(commit.new_driver_weight)
        .bind(commit.driver_id)
        .bind(commit.expected_driver_weight)
        .execute(&mut *tx)
        .await?;
        if driver.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        let order = sqlx::query(
            "UPDATE orders SET status = $1, delivered_at = $2, updated_at = $2 \
             WHERE id = $3 AND status = $4",
        )
        .bind(OrderStatus::Delivered.as_str())
        .bind(commit.delivered_at)
        .bind(commit.order_id)
        .bind(OrderStatus::InTransit.as_str())
        .execute(&mut *tx)
        .await?;
        if order.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_TRANSITION.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }
}
