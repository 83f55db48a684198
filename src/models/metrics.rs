use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// Half-open creation-date window: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Covers whole calendar days, `first_day` through `last_day` inclusive.
    pub fn from_days(first_day: NaiveDate, last_day: NaiveDate) -> Self {
        Self {
            start: start_of_day(first_day),
            end: day_after(last_day),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::default()).and_utc()
}

pub fn day_after(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day.checked_add_days(Days::new(1)).unwrap_or(day))
}

/// Raw per-driver aggregates as computed by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOrderStats {
    pub driver_id: i64,
    pub total_orders: i64,
    pub completed_shipments: i64,
    pub avg_delivery_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPerformance {
    pub driver_id: i64,
    pub total_orders: i64,
    pub completed_shipments: i64,
    pub avg_delivery_time_seconds: String,
    pub avg_delivery_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
