use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::route::RouteWithDrivers;
use crate::models::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "En espera")]
    Pending,
    #[serde(rename = "En tránsito")]
    InTransit,
    #[serde(rename = "Entregado")]
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "En espera",
            OrderStatus::InTransit => "En tránsito",
            OrderStatus::Delivered => "Entregado",
        }
    }

    /// Statuses only ever move one step forward.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::InTransit)
                | (OrderStatus::InTransit, OrderStatus::Delivered)
        )
    }

    /// Pending and in-transit orders still hold a driver's attention.
    pub fn is_active(&self) -> bool {
        !matches!(self, OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw.trim())
            .ok_or_else(|| format!("Estado de orden no válido: {raw}"))
    }
}

/// Package dimensions in cm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub weight: f64,
    pub dimensions: Dimensions,
    pub product_type: String,
    pub destination_address: String,
    pub return_address: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_email: String,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub weight: f64,
    pub dimensions: Dimensions,
    pub product_type: String,
    pub destination_address: String,
    pub return_address: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_email: String,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
}

/// Order fields as submitted by a client, before any rule is checked.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub weight: f64,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub destination_address: String,
    #[serde(default)]
    pub return_address: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_phone: String,
    #[serde(default)]
    pub recipient_email: String,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
}

impl OrderInput {
    pub fn into_new_order(self, user_id: i64) -> NewOrder {
        NewOrder {
            user_id,
            weight: self.weight,
            dimensions: self.dimensions,
            product_type: self.product_type.trim().to_string(),
            destination_address: self.destination_address.trim().to_string(),
            return_address: self.return_address.trim().to_string(),
            recipient_name: self.recipient_name.trim().to_string(),
            recipient_phone: self.recipient_phone.trim().to_string(),
            recipient_email: self.recipient_email.trim().to_lowercase(),
            sender_name: self.sender_name.map(|name| name.trim().to_string()),
            sender_phone: self.sender_phone.map(|phone| phone.trim().to_string()),
            sender_email: self.sender_email.map(|email| email.trim().to_lowercase()),
        }
    }
}

/// Full order snapshot with its relations loaded. This is the shape stored
/// under `order:<id>` in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub user: UserSummary,
    pub route: Option<RouteWithDrivers>,
    pub driver: Option<Driver>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub statuses: Vec<OrderStatus>,
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub created_before: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&order.status);
        let from_ok = self
            .created_from
            .map_or(true, |from| order.created_at >= from);
        let before_ok = self
            .created_before
            .map_or(true, |before| order.created_at < before);

        status_ok && from_ok && before_ok
    }
}
