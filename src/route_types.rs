use serde::{Deserialize, Serialize};

/// Colour used when a placemark carries no style at all.
pub const DEFAULT_ROUTE_COLOR: &str = "#3b82f6";

/// Colour used when a placemark only references a shared style by URL.
/// Shared styles are not resolved.
pub const STYLE_URL_ROUTE_COLOR: &str = "#ea580c";

/// Dwell time assigned to stops that do not specify one.
pub const DEFAULT_STOP_TIME_MINUTES: u32 = 2;

/// A WGS84 position as written in KML (`lon,lat[,alt]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            altitude: 0.0,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    /// True when both axes are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        (-180.0..=180.0).contains(&self.longitude) && (-90.0..=90.0).contains(&self.latitude)
    }
}

/// A named point on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub point: GeoPoint,
    #[serde(default = "default_stop_time")]
    pub stop_time_minutes: u32,
}

impl Stop {
    pub fn new(id: impl Into<String>, name: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            point,
            stop_time_minutes: DEFAULT_STOP_TIME_MINUTES,
        }
    }
}

fn default_stop_time() -> u32 {
    DEFAULT_STOP_TIME_MINUTES
}

/// Where a route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    KmlImport,
    SystemExport,
    #[default]
    Manual,
}

impl RouteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KmlImport => "kml_import",
            Self::SystemExport => "system_export",
            Self::Manual => "manual",
        }
    }
}

/// A bus line: display metadata plus an ordered list of stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color_hex: String,
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub source: RouteSource,
}

fn default_color() -> String {
    DEFAULT_ROUTE_COLOR.to_string()
}

impl Route {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: RouteSource) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color_hex: default_color(),
            stops: Vec::new(),
            source,
        }
    }

    /// A line needs two points; shorter routes are shown as markers only.
    pub fn is_drawable(&self) -> bool {
        self.stops.len() >= 2
    }

    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.stops.iter().map(|s| s.point)
    }
}

/// The routes of one loaded KML file or one system route set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteCollection {
    routes: Vec<Route>,
}

impl RouteCollection {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Route> {
        self.routes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }

    pub fn as_slice(&self) -> &[Route] {
        &self.routes
    }

    pub fn into_inner(self) -> Vec<Route> {
        self.routes
    }
}

impl From<Vec<Route>> for RouteCollection {
    fn from(routes: Vec<Route>) -> Self {
        Self::new(routes)
    }
}

impl<'a> IntoIterator for &'a RouteCollection {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// A Point placemark that does not belong to any route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LooseStop {
    pub stop: Stop,
    #[serde(default)]
    pub description: String,
}

/// Everything recovered from one KML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    pub routes: RouteCollection,
    pub loose_stops: Vec<LooseStop>,
    /// Number of `Placemark` elements seen.
    pub placemark_count: usize,
    /// Placemarks that produced neither a route nor a stop.
    pub skipped_placemarks: usize,
}

impl ParsedDocument {
    /// True when no placemark yielded usable data.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.loose_stops.is_empty()
    }

    pub fn imported_placemarks(&self) -> usize {
        self.placemark_count - self.skipped_placemarks
    }

    /// Short human-readable import summary.
    pub fn summary(&self) -> String {
        format!(
            "{} of {} placemarks imported",
            self.imported_placemarks(),
            self.placemark_count
        )
    }
}
