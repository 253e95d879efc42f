use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{self, RECORD_PREFIX};
use crate::options::PersistenceOptions;
use crate::route_types::*;

/// Root of the route tree in the realtime database.
pub const ROUTES_ROOT: &str = "routes";

pub const DEFAULT_FIRST_BUS_TIME: &str = "06:00";
pub const DEFAULT_LAST_BUS_TIME: &str = "22:00";
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 30;
pub const DEFAULT_STATUS: &str = "active";
pub const DEFAULT_ROUTE_TYPE: &str = "city_bus";
pub const IMPORTED_BY: &str = "admin_kml_import";

/// Path-addressed record store, e.g. a Firebase Realtime Database.
///
/// Writes are independent: there are no transactions across paths.
pub trait RouteStore {
    fn is_connected(&self) -> bool;

    /// Replace the value at `path`.
    fn put(
        &self,
        path: &str,
        record: serde_json::Value,
    ) -> impl Future<Output = Result<(), StoreError>>;
}

/// `routes/{city}/{route_id}`
pub fn route_path(city: &str, route_id: &str) -> String {
    format!("{ROUTES_ROOT}/{city}/{route_id}")
}

/// A route as stored by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRouteRecord {
    pub id: String,
    pub route_number: String,
    pub route_name: String,
    pub city: String,
    pub route_type: String,
    pub description: String,
    pub first_bus_time: String,
    pub last_bus_time: String,
    pub frequency: u32,
    pub stops: Vec<SystemStopRecord>,
    pub status: String,
    pub created_at: String,
    pub created_by: String,
    pub imported_at: String,
    pub source: String,
    pub kml_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStopRecord {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_stop_time")]
    pub stop_time: u32,
}

fn default_stop_time() -> u32 {
    DEFAULT_STOP_TIME_MINUTES
}

impl SystemRouteRecord {
    pub fn path(&self) -> String {
        route_path(&self.city, &self.id)
    }
}

/// Turn routes into store records, filling the schedule fields KML does
/// not carry with fixed defaults. Routes without stops are left out.
pub fn to_system_records(
    routes: &RouteCollection,
    opts: &PersistenceOptions,
    now: DateTime<Utc>,
) -> Vec<SystemRouteRecord> {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    routes
        .iter()
        .filter(|r| !r.stops.is_empty())
        .enumerate()
        .map(|(n, route)| SystemRouteRecord {
            id: ids::next_id(RECORD_PREFIX),
            route_number: format!("KML-{:03}", n + 1),
            route_name: non_empty_or(&route.name, "Imported KML Route"),
            city: opts.city.clone(),
            route_type: DEFAULT_ROUTE_TYPE.to_string(),
            description: non_empty_or(&route.description, "Route imported from KML file"),
            first_bus_time: DEFAULT_FIRST_BUS_TIME.to_string(),
            last_bus_time: DEFAULT_LAST_BUS_TIME.to_string(),
            frequency: DEFAULT_FREQUENCY_MINUTES,
            stops: route
                .stops
                .iter()
                .map(|s| SystemStopRecord {
                    id: s.id.clone(),
                    name: non_empty_or(&s.name, "Imported Stop"),
                    latitude: s.point.latitude,
                    longitude: s.point.longitude,
                    stop_time: s.stop_time_minutes,
                })
                .collect(),
            status: DEFAULT_STATUS.to_string(),
            created_at: timestamp.clone(),
            created_by: IMPORTED_BY.to_string(),
            imported_at: timestamp.clone(),
            source: RouteSource::KmlImport.as_str().to_string(),
            kml_file_name: opts.file_name().to_string(),
            color: Some(route.color_hex.clone()),
        })
        .collect()
}

/// Turn stored routes back into routes for KML export.
pub fn routes_from_system_records(records: &[SystemRouteRecord]) -> RouteCollection {
    records
        .iter()
        .map(|record| {
            let name = non_empty_or(&record.route_name, "Unnamed Route");
            let mut route = Route::new(record.id.clone(), name.clone(), RouteSource::SystemExport);
            route.description = non_empty_or(&record.description, &format!("System route: {name}"));
            if let Some(color) = record.color.as_deref().filter(|c| !c.is_empty()) {
                route.color_hex = color.to_string();
            }
            route.stops = record
                .stops
                .iter()
                .map(|s| {
                    let point = GeoPoint::new(s.longitude, s.latitude);
                    let mut stop = Stop::new(s.id.clone(), s.name.clone(), point);
                    stop.stop_time_minutes = s.stop_time;
                    stop
                })
                .collect();
            route
        })
        .collect::<Vec<_>>()
        .into()
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
