use serde::{Deserialize, Serialize};

use crate::models::route::Route;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: i64,
    pub name: String,
    /// Maximum payload in kg.
    pub vehicle_capacity: f64,
    pub is_available: bool,
    /// Weight in kg committed to orders that are not delivered yet.
    pub assigned_weight: f64,
}

impl Driver {
    pub fn load_ratio(&self) -> f64 {
        if self.vehicle_capacity <= 0.0 {
            return 0.0;
        }

        (self.assigned_weight / self.vehicle_capacity).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewDriver {
    pub name: String,
    pub vehicle_capacity: f64,
}

#[derive(Debug, Clone)]
pub struct DriverWithRoutes {
    pub driver: Driver,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedRoute {
    pub route_id: i64,
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverListing {
    pub id: i64,
    pub name: String,
    pub vehicle_capacity: f64,
    pub is_available: bool,
    pub assigned_weight: f64,
    pub assigned_routes: Vec<AssignedRoute>,
}

impl From<DriverWithRoutes> for DriverListing {
    fn from(entry: DriverWithRoutes) -> Self {
        let DriverWithRoutes { driver, routes } = entry;
        Self {
            id: driver.id,
            name: driver.name,
            vehicle_capacity: driver.vehicle_capacity,
            is_available: driver.is_available,
            assigned_weight: driver.assigned_weight,
            assigned_routes: routes
                .into_iter()
                .map(|route| AssignedRoute {
                    route_id: route.id,
                    origin: route.origin,
                    destination: route.destination,
                })
                .collect(),
        }
    }
}
