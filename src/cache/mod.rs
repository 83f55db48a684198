//! Side cache for order status lookups and order snapshots.
//!
//! The cache is never authoritative. Workflows write the status key on
//! creation, delete keys on every status change and let reads repopulate them.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),

    #[error("cached value is not usable: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn ping(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Adds a member and refreshes the TTL of the whole set.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), CacheError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError>;
}

pub fn status_key(order_id: Uuid) -> String {
    format!("order:{order_id}:status")
}

pub fn status_set_key(status: OrderStatus) -> String {
    format!("order:status:{}", status.as_str())
}

pub fn snapshot_key(order_id: Uuid) -> String {
    format!("order:{order_id}")
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{snapshot_key, status_key, status_set_key};
    use crate::models::order::OrderStatus;

    #[test]
    fn keys_follow_order_namespace() {
        let id = Uuid::nil();

        assert_eq!(
            status_key(id),
            "order:00000000-0000-0000-0000-000000000000:status"
        );
        assert_eq!(
            snapshot_key(id),
            "order:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            status_set_key(OrderStatus::InTransit),
            "order:status:En tránsito"
        );
    }
}
