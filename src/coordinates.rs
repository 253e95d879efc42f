use crate::error::KmlError;
use crate::route_types::GeoPoint;

/// Parse a KML `<coordinates>` block into points.
///
/// Tokens are separated by whitespace and hold `lon,lat[,alt]`. A token that
/// does not yield a valid in-range longitude and latitude is skipped; the
/// rest of the list is still returned in order.
pub fn parse_coordinate_list(text: &str) -> Vec<GeoPoint> {
    text.split_whitespace().filter_map(parse_token).collect()
}

/// Parse exactly one `lon,lat[,alt]` tuple, as found in a `<Point>`.
pub fn parse_single_point(text: &str) -> Result<GeoPoint, KmlError> {
    let trimmed = text.trim();
    // Some writers put a space after each comma; tolerate it for a lone point.
    let compact: String = trimmed.split(',').map(str::trim).collect::<Vec<_>>().join(",");
    if compact.split_whitespace().count() != 1 {
        return Err(KmlError::InvalidCoordinate(trimmed.to_string()));
    }
    parse_token(&compact).ok_or_else(|| KmlError::InvalidCoordinate(trimmed.to_string()))
}

/// Format a point as `lon,lat,alt`.
pub fn format_point(point: &GeoPoint) -> String {
    format!("{},{},{}", point.longitude, point.latitude, point.altitude)
}

fn parse_token(token: &str) -> Option<GeoPoint> {
    let fields: Vec<&str> = token.split(',').collect();
    if !(2..=3).contains(&fields.len()) {
        return None;
    }

    let lon = fields[0].parse::<f64>().ok()?;
    let lat = fields[1].parse::<f64>().ok()?;
    let alt = fields
        .get(2)
        .and_then(|a| a.parse::<f64>().ok())
        .filter(|a| a.is_finite())
        .unwrap_or(0.0);

    let point = GeoPoint::new(lon, lat).with_altitude(alt);
    point.is_valid().then_some(point)
}
