use crate::color::kml_color_to_hex;
use crate::coordinates::{parse_coordinate_list, parse_single_point};
use crate::ids::{self, ROUTE_PREFIX, STOP_PREFIX};
use crate::route_types::*;

pub const UNNAMED_ROUTE: &str = "Unnamed Route";
pub const UNNAMED_STOP: &str = "Unnamed Stop";

/// The fields of one `<Placemark>` this crate cares about, as raw text.
#[derive(Debug, Default, Clone)]
pub struct PlacemarkFields {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `LineString/coordinates`
    pub line_coordinates: Option<String>,
    /// `Point/coordinates`
    pub point_coordinates: Option<String>,
    /// `LineStyle/color`
    pub line_color: Option<String>,
    pub style_url: Option<String>,
}

/// What a placemark turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Route(Route),
    Stop(LooseStop),
}

/// Build a route or a standalone stop from one placemark.
///
/// A LineString with coordinate text wins over a Point; an empty one falls
/// through to the Point. Returns `None` when the placemark has no usable
/// geometry.
pub fn extract(fields: &PlacemarkFields, stop_time_minutes: u32) -> Option<Extracted> {
    if let Some(coords) = non_empty(&fields.line_coordinates) {
        return extract_route(fields, coords, stop_time_minutes).map(Extracted::Route);
    }

    if let Some(coords) = non_empty(&fields.point_coordinates) {
        return match parse_single_point(coords) {
            Ok(point) => {
                let name = non_empty(&fields.name).unwrap_or(UNNAMED_STOP);
                let mut stop = Stop::new(ids::next_id(STOP_PREFIX), name, point);
                stop.stop_time_minutes = stop_time_minutes;
                Some(Extracted::Stop(LooseStop {
                    stop,
                    description: non_empty(&fields.description).unwrap_or_default().to_string(),
                }))
            }
            Err(e) => {
                log::debug!("Skipping point placemark: {e}");
                None
            }
        };
    }

    None
}

fn extract_route(fields: &PlacemarkFields, coords: &str, stop_time_minutes: u32) -> Option<Route> {
    let points = parse_coordinate_list(coords);
    if points.is_empty() {
        log::debug!("Skipping line placemark without valid coordinates");
        return None;
    }

    let name = non_empty(&fields.name).unwrap_or(UNNAMED_ROUTE);
    let mut route = Route::new(ids::next_id(ROUTE_PREFIX), name, RouteSource::KmlImport);
    route.description = non_empty(&fields.description).unwrap_or_default().to_string();
    route.color_hex = style_color(fields).unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_string());
    route.stops = points
        .into_iter()
        .enumerate()
        .map(|(i, point)| {
            let mut stop = Stop::new(ids::next_id(STOP_PREFIX), format!("Stop {}", i + 1), point);
            stop.stop_time_minutes = stop_time_minutes;
            stop
        })
        .collect();

    Some(route)
}

/// Inline `LineStyle/color` first, then a shared style reference.
fn style_color(fields: &PlacemarkFields) -> Option<String> {
    if let Some(color) = non_empty(&fields.line_color) {
        return Some(kml_color_to_hex(color));
    }
    non_empty(&fields.style_url).map(|_| STYLE_URL_ROUTE_COLOR.to_string())
}

/// The text as written, unless it is blank.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Wrap a standalone stop in a route of its own.
pub fn single_stop_route(loose: LooseStop) -> Route {
    let mut route = Route::new(
        ids::next_id(ROUTE_PREFIX),
        loose.stop.name.clone(),
        RouteSource::KmlImport,
    );
    route.description = loose.description;
    route.stops.push(loose.stop);
    route
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &str) -> PlacemarkFields {
        PlacemarkFields {
            name: Some("Route A".to_string()),
            line_coordinates: Some(coords.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_line_string_route() {
        let Some(Extracted::Route(route)) = extract(&line("76.78,30.74,0 76.80,30.75,0"), 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.name, "Route A");
        assert_eq!(route.source, RouteSource::KmlImport);
        assert_eq!(route.color_hex, DEFAULT_ROUTE_COLOR);
        let names: Vec<&str> = route.stops.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Stop 1", "Stop 2"]);
        assert!((route.stops[1].point.latitude - 30.75).abs() < 1e-12);
        assert!((route.stops[1].point.longitude - 76.80).abs() < 1e-12);
        assert!(route.stops.iter().all(|s| s.stop_time_minutes == 2));
        assert_ne!(route.stops[0].id, route.stops[1].id);
    }

    #[test]
    fn test_stop_numbering_skips_bad_tokens() {
        let Some(Extracted::Route(route)) = extract(&line("bad,data 76.78,30.74 76.79,30.75"), 2)
        else {
            panic!("Expected route");
        };
        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[0].name, "Stop 1");
    }

    #[test]
    fn test_line_string_without_points_is_skipped() {
        assert_eq!(extract(&line("garbage"), 2), None);
    }

    #[test]
    fn test_line_string_precedence() {
        let mut fields = line("76.78,30.74 76.80,30.75");
        fields.point_coordinates = Some("10,10".to_string());
        assert!(matches!(extract(&fields, 2), Some(Extracted::Route(_))));
    }

    #[test]
    fn test_default_names() {
        let fields = PlacemarkFields {
            name: Some("   ".to_string()),
            line_coordinates: Some("1,1 2,2".to_string()),
            ..Default::default()
        };
        let Some(Extracted::Route(route)) = extract(&fields, 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.name, UNNAMED_ROUTE);
        assert_eq!(route.description, "");

        let fields = PlacemarkFields {
            point_coordinates: Some("1,1".to_string()),
            ..Default::default()
        };
        let Some(Extracted::Stop(loose)) = extract(&fields, 2) else {
            panic!("Expected stop");
        };
        assert_eq!(loose.stop.name, UNNAMED_STOP);
    }

    #[test]
    fn test_point_placemark() {
        let fields = PlacemarkFields {
            name: Some("Bus Stand".to_string()),
            description: Some("Main stand".to_string()),
            point_coordinates: Some(" 76.78,30.74,3 ".to_string()),
            ..Default::default()
        };
        let Some(Extracted::Stop(loose)) = extract(&fields, 4) else {
            panic!("Expected stop");
        };
        assert_eq!(loose.stop.name, "Bus Stand");
        assert_eq!(loose.description, "Main stand");
        assert_eq!(loose.stop.point, GeoPoint::new(76.78, 30.74).with_altitude(3.0));
        assert_eq!(loose.stop.stop_time_minutes, 4);
    }

    #[test]
    fn test_invalid_point_is_skipped() {
        let fields = PlacemarkFields {
            point_coordinates: Some("north,east".to_string()),
            ..Default::default()
        };
        assert_eq!(extract(&fields, 2), None);
    }

    #[test]
    fn test_no_geometry() {
        let fields = PlacemarkFields {
            name: Some("Just a label".to_string()),
            description: Some("Nothing here".to_string()),
            ..Default::default()
        };
        assert_eq!(extract(&fields, 2), None);
    }

    #[test]
    fn test_inline_color_beats_style_url() {
        let mut fields = line("1,1 2,2");
        fields.line_color = Some("ff00ff00".to_string());
        fields.style_url = Some("#routeStyle".to_string());
        let Some(Extracted::Route(route)) = extract(&fields, 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.color_hex, "#00ff00");
    }

    #[test]
    fn test_style_url_color() {
        let mut fields = line("1,1 2,2");
        fields.style_url = Some("#someSharedStyle".to_string());
        let Some(Extracted::Route(route)) = extract(&fields, 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.color_hex, STYLE_URL_ROUTE_COLOR);
    }

    #[test]
    fn test_malformed_inline_color() {
        let mut fields = line("1,1 2,2");
        fields.line_color = Some("red".to_string());
        let Some(Extracted::Route(route)) = extract(&fields, 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.color_hex, DEFAULT_ROUTE_COLOR);
    }

    #[test]
    fn test_single_stop_route() {
        let loose = LooseStop {
            stop: Stop::new("s1", "Depot", GeoPoint::new(1.0, 2.0)),
            description: "Night parking".to_string(),
        };
        let route = single_stop_route(loose);
        assert_eq!(route.name, "Depot");
        assert_eq!(route.description, "Night parking");
        assert_eq!(route.stops.len(), 1);
        assert!(!route.is_drawable());
    }

    #[test]
    fn test_empty_line_string_falls_through_to_point() {
        let mut fields = line("  ");
        fields.point_coordinates = Some("1,1".to_string());
        let Some(Extracted::Stop(loose)) = extract(&fields, 2) else {
            panic!("Expected stop");
        };
        assert_eq!(loose.stop.point, GeoPoint::new(1.0, 1.0));
    }

    #[test]
    fn test_names_kept_as_written() {
        let mut fields = line("1,1 2,2");
        fields.name = Some(" Route A ".to_string());
        let Some(Extracted::Route(route)) = extract(&fields, 2) else {
            panic!("Expected route");
        };
        assert_eq!(route.name, " Route A ");
    }
}
