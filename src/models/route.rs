use serde::{Deserialize, Serialize};

use crate::models::driver::Driver;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Clone)]
pub struct NewRoute {
    pub name: String,
    pub origin: String,
    pub destination: String,
}

/// A route together with its drivers, in the order they were attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWithDrivers {
    #[serde(flatten)]
    pub route: Route,
    pub drivers: Vec<Driver>,
}

impl RouteWithDrivers {
    /// The driver that receives new assignments on this route. There is no
    /// balancing across drivers: the earliest attached one always wins.
    pub fn primary_driver(&self) -> Option<&Driver> {
        self.drivers.first()
    }
}
