use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::route_types::*;

/// Convert routes to a GeoJSON FeatureCollection for GeoJSON map layers.
///
/// Each route becomes a LineString (or a Point when it has one stop),
/// followed by a Point feature per stop.
pub fn to_feature_collection(routes: &RouteCollection) -> FeatureCollection {
    let mut features = Vec::new();

    for route in routes.iter().filter(|r| !r.stops.is_empty()) {
        features.push(route_to_feature(route));
        features.extend(route.stops.iter().map(|s| stop_to_feature(route, s)));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn route_to_feature(route: &Route) -> Feature {
    let geometry = if route.is_drawable() {
        Geometry::new(Value::LineString(route.points().map(|p| point_coords(&p)).collect()))
    } else {
        Geometry::new(Value::Point(point_coords(&route.stops[0].point)))
    };

    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String("route".to_string()));
    props.insert("routeId".to_string(), JsonValue::String(route.id.clone()));
    props.insert("name".to_string(), JsonValue::String(route.name.clone()));
    props.insert(
        "description".to_string(),
        JsonValue::String(route.description.clone()),
    );
    props.insert("color".to_string(), JsonValue::String(route.color_hex.clone()));
    props.insert(
        "source".to_string(),
        JsonValue::String(route.source.as_str().to_string()),
    );

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn stop_to_feature(route: &Route, stop: &Stop) -> Feature {
    let geometry = Geometry::new(Value::Point(point_coords(&stop.point)));

    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String("stop".to_string()));
    props.insert("routeId".to_string(), JsonValue::String(route.id.clone()));
    props.insert("stopId".to_string(), JsonValue::String(stop.id.clone()));
    props.insert("name".to_string(), JsonValue::String(stop.name.clone()));
    props.insert("color".to_string(), JsonValue::String(route.color_hex.clone()));
    props.insert(
        "stopTime".to_string(),
        JsonValue::Number(stop.stop_time_minutes.into()),
    );

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Build [lon, lat] or [lon, lat, alt] coordinate array.
fn point_coords(p: &GeoPoint) -> Vec<f64> {
    if p.altitude != 0.0 {
        vec![p.longitude, p.latitude, p.altitude]
    } else {
        vec![p.longitude, p.latitude]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> RouteCollection {
        let mut a = Route::new("r1", "Route A", RouteSource::KmlImport);
        a.stops = vec![
            Stop::new("s1", "Depot", GeoPoint::new(76.78, 30.74)),
            Stop::new("s2", "Market", GeoPoint::new(76.80, 30.75).with_altitude(9.0)),
        ];
        let mut b = Route::new("r2", "Shuttle", RouteSource::Manual);
        b.stops = vec![Stop::new("s3", "Gate", GeoPoint::new(75.0, 31.0))];
        RouteCollection::new(vec![a, b, Route::new("r3", "Empty", RouteSource::Manual)])
    }

    #[test]
    fn test_features() {
        let fc = to_feature_collection(&routes());
        // route A + 2 stops, route B + 1 stop
        assert_eq!(fc.features.len(), 5);

        let line = &fc.features[0];
        match &line.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords.len(), 2);
                assert_eq!(coords[0], vec![76.78, 30.74]);
                assert_eq!(coords[1], vec![76.80, 30.75, 9.0]);
            }
            _ => panic!("Expected LineString"),
        }
        let props = line.properties.as_ref().unwrap();
        assert_eq!(props["kind"], "route");
        assert_eq!(props["name"], "Route A");
        assert_eq!(props["source"], "kml_import");
        assert_eq!(props["color"], DEFAULT_ROUTE_COLOR);

        let stop = fc.features[1].properties.as_ref().unwrap();
        assert_eq!(stop["kind"], "stop");
        assert_eq!(stop["name"], "Depot");
        assert_eq!(stop["stopTime"], 2);
    }

    #[test]
    fn test_single_stop_route_is_point() {
        let fc = to_feature_collection(&routes());
        assert!(matches!(
            fc.features[3].geometry.as_ref().unwrap().value,
            Value::Point(_)
        ));
    }
}
