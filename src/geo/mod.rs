//! Address validation against a geocoder.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AppError;

const EMPTY_ADDRESS: &str = "La dirección no puede estar vacía";
const NOT_FOUND: &str = "No se encontró la dirección";
const INCOMPLETE: &str = "La dirección es incompleta o imprecisa";
const TIMED_OUT: &str = "Tiempo de espera agotado al validar la dirección";
const UNAVAILABLE: &str = "No se pudo validar la dirección";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCheck {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl AddressCheck {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Geocoder failures never surface as errors: every outcome is a verdict.
#[async_trait]
pub trait AddressValidator: Send + Sync {
    async fn validate(&self, address: &str) -> AddressCheck;
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: Option<String>,
    lon: Option<String>,
    display_name: Option<String>,
}

fn judge_places(places: &[Place]) -> AddressCheck {
    let Some(first) = places.first() else {
        return AddressCheck::invalid(NOT_FOUND);
    };

    let complete = [&first.lat, &first.lon, &first.display_name]
        .iter()
        .all(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()));

    if complete {
        AddressCheck::valid()
    } else {
        AddressCheck::invalid(INCOMPLETE)
    }
}

pub struct NominatimValidator {
    client: reqwest::Client,
    search_url: String,
    country_codes: String,
}

impl NominatimValidator {
    pub fn new(
        base_url: &str,
        country_codes: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build geocoder client: {err}")))?;

        Ok(Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            country_codes: country_codes.to_string(),
        })
    }

    async fn search(&self, address: &str) -> Result<Vec<Place>, reqwest::Error> {
        self.client
            .get(&self.search_url)
            .query(&[
                ("format", "json"),
                ("q", address),
                ("countrycodes", self.country_codes.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Place>>()
            .await
    }
}

#[async_trait]
impl AddressValidator for NominatimValidator {
    async fn validate(&self, address: &str) -> AddressCheck {
        let address = address.trim();
        if address.is_empty() {
            return AddressCheck::invalid(EMPTY_ADDRESS);
        }

        match self.search(address).await {
            Ok(places) => {
                let check = judge_places(&places);
                debug!(address, valid = check.is_valid, "address checked");
                check
            }
            Err(err) if err.is_timeout() => {
                warn!(address, error = %err, "geocoder timed out");
                AddressCheck::invalid(TIMED_OUT)
            }
            Err(err) => {
                warn!(address, error = %err, "geocoder request failed");
                AddressCheck::invalid(UNAVAILABLE)
            }
        }
    }
}

/// Offline validator: accepts every non-empty address except the ones
/// registered with [`StaticValidator::reject`].
#[derive(Debug, Default, Clone)]
pub struct StaticValidator {
    rejected: HashMap<String, String>,
}

impl StaticValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, address: &str, reason: &str) -> Self {
        self.rejected
            .insert(address.trim().to_string(), reason.to_string());
        self
    }
}

#[async_trait]
impl AddressValidator for StaticValidator {
    async fn validate(&self, address: &str) -> AddressCheck {
        let address = address.trim();
        if address.is_empty() {
            return AddressCheck::invalid(EMPTY_ADDRESS);
        }

        match self.rejected.get(address) {
            Some(reason) => AddressCheck::invalid(reason.clone()),
            None => AddressCheck::valid(),
        }
    }
}
