//! Keeps the side cache in step with committed store writes.
//!
//! Every helper here is best-effort: failures are logged, counted and
//! swallowed, because the store already holds the truth.

use tracing::warn;
use uuid::Uuid;

use crate::cache::{snapshot_key, status_key, status_set_key, CacheError};
use crate::models::order::{Order, OrderDetails, OrderStatus};
use crate::state::AppState;

fn absorb<T>(
    state: &AppState,
    operation: &'static str,
    order_id: Uuid,
    result: Result<T, CacheError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(order_id = %order_id, operation, error = %err, "cache operation failed");
            state
                .metrics
                .cache_errors_total
                .with_label_values(&[operation])
                .inc();
            None
        }
    }
}

/// Publishes the initial status of a freshly created order.
pub async fn record_created(state: &AppState, order: &Order) {
    let id = order.id.to_string();

    let result = state
        .cache
        .set_ex(&status_key(order.id), order.status.as_str(), state.cache_ttl)
        .await;
    absorb(state, "set_ex", order.id, result);

    let result = state
        .cache
        .set_add(&status_set_key(order.status), &id, state.cache_ttl)
        .await;
    absorb(state, "set_add", order.id, result);
}

/// Moves the id between status sets and drops the point keys so the next
/// read goes to the store.
pub async fn record_transition(
    state: &AppState,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) {
    let id = order_id.to_string();

    let result = state.cache.set_remove(&status_set_key(from), &id).await;
    absorb(state, "set_remove", order_id, result);

    let result = state
        .cache
        .set_add(&status_set_key(to), &id, state.cache_ttl)
        .await;
    absorb(state, "set_add", order_id, result);

    let result = state.cache.delete(&status_key(order_id)).await;
    absorb(state, "delete", order_id, result);

    let result = state.cache.delete(&snapshot_key(order_id)).await;
    absorb(state, "delete", order_id, result);
}

/// Drops snapshots that still embed relations the store no longer has.
pub async fn forget_snapshots(state: &AppState, order_ids: &[Uuid]) {
    for &order_id in order_ids {
        let result = state.cache.delete(&snapshot_key(order_id)).await;
        absorb(state, "delete", order_id, result);
    }
}

pub async fn cached_status(state: &AppState, order_id: Uuid) -> Option<OrderStatus> {
    let result = state.cache.get(&status_key(order_id)).await;
    let raw = absorb(state, "get", order_id, result)??;

    match raw.parse() {
        Ok(status) => Some(status),
        Err(err) => {
            let corrupt = Err::<(), _>(CacheError::Corrupt(err));
            absorb(state, "decode", order_id, corrupt);
            None
        }
    }
}

pub async fn store_status(state: &AppState, order_id: Uuid, status: OrderStatus) {
    let result = state
        .cache
        .set_ex(&status_key(order_id), status.as_str(), state.cache_ttl)
        .await;
    absorb(state, "set_ex", order_id, result);
}

/// Returns the cached snapshot. An undecodable entry is dropped.
pub async fn cached_snapshot(state: &AppState, order_id: Uuid) -> Option<OrderDetails> {
    let key = snapshot_key(order_id);
    let result = state.cache.get(&key).await;
    let raw = absorb(state, "get", order_id, result)??;

    match serde_json::from_str(&raw) {
        Ok(details) => Some(details),
        Err(err) => {
            let corrupt = Err::<(), _>(CacheError::Corrupt(err.to_string()));
            absorb(state, "decode", order_id, corrupt);

            let result = state.cache.delete(&key).await;
            absorb(state, "delete", order_id, result);
            None
        }
    }
}

pub async fn store_snapshot(state: &AppState, details: &OrderDetails) {
    let order_id = details.order.id;
    let encoded = match serde_json::to_string(details) {
        Ok(encoded) => encoded,
        Err(err) => {
            let corrupt = Err::<(), _>(CacheError::Corrupt(err.to_string()));
            absorb(state, "encode", order_id, corrupt);
            return;
        }
    };

    let result = state
        .cache
        .set_ex(&snapshot_key(order_id), &encoded, state.cache_ttl)
        .await;
    absorb(state, "set_ex", order_id, result);
}
