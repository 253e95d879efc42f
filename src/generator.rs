use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::color::hex_to_opaque_kml_color;
use crate::coordinates::format_point;
use crate::error::KmlError;
use crate::options::ExportOptions;
use crate::route_types::*;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
pub const KML_MIME_TYPE: &str = "application/vnd.google-earth.kml+xml";
pub const DOCUMENT_DESCRIPTION: &str = "Bus routes exported from Punjab Transport Tracker";
pub const ROUTE_STYLE_ID: &str = "routeStyle";
pub const STOP_STYLE_ID: &str = "stopStyle";
pub const ROUTE_STYLE_COLOR: &str = "ff0000ff";
pub const ROUTE_LINE_WIDTH: &str = "4";
pub const STOP_ICON_HREF: &str = "http://maps.google.com/mapfiles/kml/paddle/red-circle.png";

type XmlWriter = Writer<Vec<u8>>;
type Result<T> = std::io::Result<T>;

/// Render routes as a complete KML document.
///
/// Every route with at least one stop becomes a LineString placemark
/// followed by one Point placemark per stop. The output depends only on the
/// collection and the options, so exporting twice gives identical bytes.
pub fn generate_kml(
    routes: &RouteCollection,
    opts: &ExportOptions,
) -> std::result::Result<String, KmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_document(&mut writer, routes, opts)?;
    let mut bytes = writer.into_inner();
    bytes.write_all(b"\n")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_document(w: &mut XmlWriter, routes: &RouteCollection, opts: &ExportOptions) -> Result<()> {
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("Document")))?;

    text_element(w, "name", &opts.title)?;
    text_element(w, "description", DOCUMENT_DESCRIPTION)?;
    write_shared_styles(w)?;

    for (index, route) in routes.iter().enumerate() {
        if route.stops.is_empty() {
            log::debug!("Not exporting route '{}' without stops", route.name);
            continue;
        }
        write_route_line(w, route, index, opts)?;
        write_route_stops(w, route)?;
    }

    w.write_event(Event::End(BytesEnd::new("Document")))?;
    w.write_event(Event::End(BytesEnd::new("kml")))?;
    Ok(())
}

fn write_shared_styles(w: &mut XmlWriter) -> Result<()> {
    start_with_id(w, "Style", ROUTE_STYLE_ID)?;
    line_style(w, ROUTE_STYLE_COLOR)?;
    end(w, "Style")?;

    start_with_id(w, "Style", STOP_STYLE_ID)?;
    start(w, "IconStyle")?;
    start(w, "Icon")?;
    text_element(w, "href", STOP_ICON_HREF)?;
    end(w, "Icon")?;
    end(w, "IconStyle")?;
    end(w, "Style")
}

fn write_route_line(
    w: &mut XmlWriter,
    route: &Route,
    index: usize,
    opts: &ExportOptions,
) -> Result<()> {
    let name = or_default(&route.name, || format!("Route {}", index + 1));
    let description = or_default(&route.description, || "Bus route".to_string());

    start(w, "Placemark")?;
    text_element(w, "name", &name)?;
    text_element(w, "description", &description)?;
    text_element(w, "styleUrl", &format!("#{ROUTE_STYLE_ID}"))?;
    if opts.route_colors {
        start(w, "Style")?;
        line_style(w, &hex_to_opaque_kml_color(&route.color_hex))?;
        end(w, "Style")?;
    }
    start(w, "LineString")?;
    text_element(w, "extrude", "1")?;
    text_element(w, "tessellate", "1")?;
    text_element(w, "coordinates", &coordinate_block(route))?;
    end(w, "LineString")?;
    end(w, "Placemark")
}

fn write_route_stops(w: &mut XmlWriter, route: &Route) -> Result<()> {
    let description = format!("Bus stop on route: {}", route.name);
    for (index, stop) in route.stops.iter().enumerate() {
        let name = or_default(&stop.name, || format!("Stop {}", index + 1));
        start(w, "Placemark")?;
        text_element(w, "name", &name)?;
        text_element(w, "description", &description)?;
        text_element(w, "styleUrl", &format!("#{STOP_STYLE_ID}"))?;
        start(w, "Point")?;
        text_element(w, "coordinates", &format_point(&stop.point))?;
        end(w, "Point")?;
        end(w, "Placemark")?;
    }
    Ok(())
}

/// One `lon,lat,alt` per line, indented under `<coordinates>`.
fn coordinate_block(route: &Route) -> String {
    let mut block = String::new();
    for stop in &route.stops {
        block.push_str("\n            ");
        block.push_str(&format_point(&stop.point));
    }
    block.push_str("\n          ");
    block
}

fn line_style(w: &mut XmlWriter, kml_color: &str) -> Result<()> {
    start(w, "LineStyle")?;
    text_element(w, "color", kml_color)?;
    text_element(w, "width", ROUTE_LINE_WIDTH)?;
    end(w, "LineStyle")
}

fn text_element(w: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, name)
}

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
}

fn start_with_id(w: &mut XmlWriter, name: &str, id: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name).with_attributes([("id", id)])))
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
}

/// `value` as written, or the fallback when it is blank.
fn or_default(value: &str, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

/// File name used when downloading a single route.
pub fn route_file_name(route_name: &str) -> String {
    let stem: String = route_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{stem}.kml")
}
