use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthSettings;
use crate::cache::StatusCache;
use crate::error::AppError;
use crate::geo::AddressValidator;
use crate::observability::metrics::Metrics;
use crate::store::Store;

/// Handles shared by every request. Backends are constructed by the caller
/// and injected, so tests can swap in in-process ones.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn StatusCache>,
    pub geocoder: Arc<dyn AddressValidator>,
    pub auth: AuthSettings,
    pub cache_ttl: Duration,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn StatusCache>,
        geocoder: Arc<dyn AddressValidator>,
        auth: AuthSettings,
        cache_ttl: Duration,
    ) -> Result<Self, AppError> {
        let metrics = Metrics::new()
            .map_err(|err| AppError::Internal(format!("failed to register metrics: {err}")))?;

        Ok(Self {
            store,
            cache,
            geocoder,
            auth,
            cache_ttl,
            metrics,
        })
    }
}
