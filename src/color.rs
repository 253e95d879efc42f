use crate::route_types::DEFAULT_ROUTE_COLOR;

/// Convert a KML `aabbggrr` colour to CSS `#rrggbb`.
///
/// Anything that is not eight ASCII characters maps to the default route
/// colour instead of failing.
pub fn kml_color_to_hex(kml_color: &str) -> String {
    let c = kml_color.trim();
    if c.len() != 8 || !c.is_ascii() {
        return DEFAULT_ROUTE_COLOR.to_string();
    }
    let (b, g, r) = (&c[2..4], &c[4..6], &c[6..8]);
    format!("#{r}{g}{b}")
}

/// Convert a CSS `#rrggbb` colour to KML `aabbggrr` with the given alpha.
pub fn hex_to_kml_color(hex: &str, alpha: &str) -> String {
    let h = hex.trim();
    let h = h.strip_prefix('#').unwrap_or(h);
    let h = if h.len() == 6 && h.is_ascii() {
        h
    } else {
        &DEFAULT_ROUTE_COLOR[1..]
    };
    let alpha = if alpha.len() == 2 && alpha.is_ascii() {
        alpha
    } else {
        "ff"
    };
    let (r, g, b) = (&h[0..2], &h[2..4], &h[4..6]);
    format!("{alpha}{b}{g}{r}").to_ascii_lowercase()
}

/// [`hex_to_kml_color`] with an opaque alpha.
pub fn hex_to_opaque_kml_color(hex: &str) -> String {
    hex_to_kml_color(hex, "ff")
}
