//! Business workflows. Each takes the shared [`AppState`](crate::state::AppState)
//! and returns domain values or an [`AppError`].

pub mod accounts;
pub mod assignment;
pub mod availability;
pub mod cache_sync;
pub mod delivery;
pub mod orders;
pub mod performance;
pub mod validation;

use crate::error::AppError;

/// Label used for outcome-partitioned metrics.
pub(crate) fn outcome_label<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AppError::BadRequest(_)) => "invalid",
        Err(AppError::NotFound(_)) => "not_found",
        Err(AppError::Conflict(_)) => "conflict",
        Err(AppError::Unauthorized(_) | AppError::Forbidden(_)) => "denied",
        Err(AppError::Internal(_)) => "error",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::auth::AuthSettings;
    use crate::cache::memory::MemoryCache;
    use crate::cache::{CacheError, StatusCache};
    use crate::geo::StaticValidator;
    use crate::models::driver::NewDriver;
    use crate::models::order::{Dimensions, NewOrder, Order};
    use crate::models::route::NewRoute;
    use crate::models::user::{NewUser, Role};
    use crate::state::AppState;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;

    pub struct Fixture<C = MemoryCache> {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub cache: Arc<C>,
        pub user_id: i64,
    }

    /// A cache whose backend is always down.
    pub struct FailingCache;

    fn down<T>() -> Result<T, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    #[async_trait]
    impl StatusCache for FailingCache {
        async fn ping(&self) -> Result<(), CacheError> {
            down()
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            down()
        }

        async fn set_ex(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            down()
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            down()
        }

        async fn set_add(
            &self,
            _key: &str,
            _member: &str,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            down()
        }

        async fn set_remove(&self, _key: &str, _member: &str) -> Result<(), CacheError> {
            down()
        }

        async fn set_members(&self, _key: &str) -> Result<Vec<String>, CacheError> {
            down()
        }
    }

    pub async fn fixture() -> Fixture {
        fixture_on(Arc::new(MemoryCache::new())).await
    }

    pub async fn failing_fixture() -> Fixture<FailingCache> {
        fixture_on(Arc::new(FailingCache)).await
    }

    async fn fixture_on<C: StatusCache + 'static>(cache: Arc<C>) -> Fixture<C> {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn StatusCache> = cache.clone();
        let state = AppState::new(
            store.clone(),
            shared,
            Arc::new(StaticValidator::new()),
            AuthSettings::new("test-secret", Duration::from_secs(60)),
            Duration::from_secs(60),
        )
        .unwrap();

        let user = store
            .create_user(NewUser::new(
                "ana".to_string(),
                "ana@example.com",
                "hash".to_string(),
                Role::User,
            ))
            .await
            .unwrap();

        Fixture {
            state,
            store,
            cache,
            user_id: user.id,
        }
    }

    impl<C> Fixture<C> {
        /// A route with one driver already carrying `assigned_weight`.
        pub async fn route_with_driver(&self, capacity: f64, assigned_weight: f64) -> (i64, i64) {
            let driver = self
                .store
                .create_driver(NewDriver {
                    name: "Luis".to_string(),
                    vehicle_capacity: capacity,
                })
                .await
                .unwrap();
            let route = self
                .store
                .create_route(NewRoute {
                    name: "Bogotá - Cali".to_string(),
                    origin: "Bogotá".to_string(),
                    destination: "Cali".to_string(),
                })
                .await
                .unwrap();
            self.store.attach_driver(route.id, driver.id).await.unwrap();

            if assigned_weight > 0.0 {
                self.store
                    .set_driver_weight(driver.id, assigned_weight)
                    .await
                    .unwrap();
            }
            (route.id, driver.id)
        }

        pub async fn order(&self, weight: f64) -> Order {
            let order = self
                .store
                .create_order(NewOrder {
                    user_id: self.user_id,
                    weight,
                    dimensions: Dimensions {
                        length: 1.0,
                        width: 1.0,
                        height: 1.0,
                    },
                    product_type: "Ropa".to_string(),
                    destination_address: "Carrera 7 # 32-16, Bogotá".to_string(),
                    return_address: "Calle 10 # 5-20, Medellín".to_string(),
                    recipient_name: "Eva".to_string(),
                    recipient_phone: "3001234567".to_string(),
                    recipient_email: "eva@example.com".to_string(),
                    sender_name: None,
                    sender_phone: None,
                    sender_email: None,
                })
                .await
                .unwrap();

            super::cache_sync::record_created(&self.state, &order).await;
            order
        }
    }
}
