use serde::Deserialize;

use crate::route_types::DEFAULT_STOP_TIME_MINUTES;

pub const DEFAULT_EXPORT_TITLE: &str = "Punjab Transport Routes";
pub const DEFAULT_IMPORT_CITY: &str = "KML_Imported";
pub const DEFAULT_KML_FILE_NAME: &str = "unknown.kml";

/// What to do with Point placemarks that are not part of a LineString.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointPlacemarks {
    /// Keep them apart from routes in `ParsedDocument::loose_stops`.
    #[default]
    LooseStops,
    /// Turn each into a route with a single stop.
    SingleStopRoutes,
}

/// Options for reading KML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    #[serde(default)]
    pub point_placemarks: PointPlacemarks,

    /// Dwell time given to every extracted stop (default: 2)
    #[serde(default = "default_stop_time")]
    pub stop_time_minutes: u32,

    /// Let standalone points that sit exactly on a route stop name that
    /// stop (default: true)
    #[serde(default = "default_true")]
    pub adopt_stop_names: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            point_placemarks: PointPlacemarks::default(),
            stop_time_minutes: DEFAULT_STOP_TIME_MINUTES,
            adopt_stop_names: true,
        }
    }
}

/// Options for writing KML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// `<Document><name>` (default: "Punjab Transport Routes")
    #[serde(default = "default_title")]
    pub title: String,

    /// Emit each route's own colour as an inline style (default: true)
    #[serde(default = "default_true")]
    pub route_colors: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            title: default_title(),
            route_colors: true,
        }
    }
}

impl ExportOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Options for turning routes into persistence records.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceOptions {
    /// City/group key under `routes/` (default: "KML_Imported")
    #[serde(default = "default_city")]
    pub city: String,

    /// Name of the KML file the routes came from
    #[serde(default)]
    pub kml_file_name: Option<String>,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            city: default_city(),
            kml_file_name: None,
        }
    }
}

impl PersistenceOptions {
    pub fn file_name(&self) -> &str {
        self.kml_file_name.as_deref().unwrap_or(DEFAULT_KML_FILE_NAME)
    }
}

fn default_true() -> bool {
    true
}

fn default_stop_time() -> u32 {
    DEFAULT_STOP_TIME_MINUTES
}

fn default_title() -> String {
    DEFAULT_EXPORT_TITLE.to_string()
}

fn default_city() -> String {
    DEFAULT_IMPORT_CITY.to_string()
}
