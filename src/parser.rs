use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::error::KmlError;
use crate::options::{ImportOptions, PointPlacemarks};
use crate::placemark::{Extracted, PlacemarkFields, extract, single_stop_route};
use crate::route_types::*;

type Result<T> = std::result::Result<T, KmlError>;

/// Parse a KML document into routes and standalone stops.
///
/// Placemarks are collected from anywhere in the document; `Document` and
/// `Folder` nesting is ignored. Only a document that is not well-formed XML
/// is an error. Placemarks without usable geometry are counted and skipped.
pub fn parse_kml(xml: &str, opts: &ImportOptions) -> Result<ParsedDocument> {
    let mut reader = Reader::from_str(xml);
    let mut doc = ParsedDocument::default();
    let mut routes = Vec::new();
    let mut depth: usize = 0;
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                check_element(&reader, &e, depth == 0 && seen_root)?;
                seen_root = true;
                if e.local_name().as_ref() == b"Placemark" {
                    let fields = parse_placemark(&e, &mut reader)?;
                    collect(&mut doc, &mut routes, &fields, opts);
                } else {
                    depth += 1;
                }
            }
            Ok(Event::Empty(e)) => {
                check_element(&reader, &e, depth == 0 && seen_root)?;
                seen_root = true;
                if e.local_name().as_ref() == b"Placemark" {
                    doc.placemark_count += 1;
                    doc.skipped_placemarks += 1;
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Text(e)) if depth == 0 => {
                if !e.as_ref().iter().all(u8::is_ascii_whitespace) {
                    return Err(outside_root(&reader));
                }
            }
            Ok(Event::CData(_)) if depth == 0 => return Err(outside_root(&reader)),
            Ok(Event::GeneralRef(e)) => {
                if depth == 0 {
                    return Err(outside_root(&reader));
                }
                resolve_ref(&reader, &e)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(KmlError::malformed(reader.error_position() as u64, e)),
            _ => {}
        }
    }

    if !seen_root {
        return Err(KmlError::malformed(0, "no root element"));
    }
    if depth != 0 {
        return Err(KmlError::malformed(
            reader.buffer_position() as u64,
            format!("{depth} element(s) not closed"),
        ));
    }

    if opts.adopt_stop_names && opts.point_placemarks == PointPlacemarks::LooseStops {
        adopt_stop_names(&mut routes, &mut doc.loose_stops);
    }
    doc.routes = RouteCollection::new(routes);

    log::info!(
        "Parsed KML: {} route(s), {} loose stop(s), {}",
        doc.routes.len(),
        doc.loose_stops.len(),
        doc.summary()
    );
    Ok(doc)
}

fn collect(
    doc: &mut ParsedDocument,
    routes: &mut Vec<Route>,
    fields: &PlacemarkFields,
    opts: &ImportOptions,
) {
    doc.placemark_count += 1;
    match extract(fields, opts.stop_time_minutes) {
        Some(Extracted::Route(route)) => routes.push(route),
        Some(Extracted::Stop(loose)) => match opts.point_placemarks {
            PointPlacemarks::LooseStops => doc.loose_stops.push(loose),
            PointPlacemarks::SingleStopRoutes => routes.push(single_stop_route(loose)),
        },
        None => doc.skipped_placemarks += 1,
    }
}

/// Read one `<Placemark>` subtree. Called after receiving Event::Start for it.
///
/// Each field takes the first matching descendant, so geometry inside a
/// `MultiGeometry` is still found.
fn parse_placemark<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<PlacemarkFields> {
    let mut fields = PlacemarkFields::default();
    let end_name = start.name().0.to_vec();
    let mut in_line_string = 0usize;
    let mut in_point = 0usize;
    let mut in_line_style = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                check_element(reader, &e, false)?;
                match e.local_name().as_ref() {
                    b"name" if fields.name.is_none() => {
                        fields.name = Some(read_text_owned(reader, &e)?);
                    }
                    b"description" if fields.description.is_none() => {
                        fields.description = Some(read_text_owned(reader, &e)?);
                    }
                    b"styleUrl" if fields.style_url.is_none() => {
                        fields.style_url = Some(read_text_owned(reader, &e)?);
                    }
                    b"coordinates" => {
                        let text = read_text_owned(reader, &e)?;
                        if in_line_string > 0 && fields.line_coordinates.is_none() {
                            fields.line_coordinates = Some(text);
                        } else if in_point > 0 && fields.point_coordinates.is_none() {
                            fields.point_coordinates = Some(text);
                        }
                    }
                    b"color" if in_line_style > 0 && fields.line_color.is_none() => {
                        fields.line_color = Some(read_text_owned(reader, &e)?);
                    }
                    b"LineString" => in_line_string += 1,
                    b"Point" => in_point += 1,
                    b"LineStyle" => in_line_style += 1,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => check_element(reader, &e, false)?,
            Ok(Event::End(e)) => {
                if e.name().0 == end_name.as_slice() {
                    break;
                }
                match e.local_name().as_ref() {
                    b"LineString" => in_line_string = in_line_string.saturating_sub(1),
                    b"Point" => in_point = in_point.saturating_sub(1),
                    b"LineStyle" => in_line_style = in_line_style.saturating_sub(1),
                    _ => {}
                }
            }
            Ok(Event::GeneralRef(e)) => {
                resolve_ref(reader, &e)?;
            }
            Ok(Event::Eof) => {
                return Err(KmlError::malformed(
                    reader.buffer_position() as u64,
                    "document ended inside <Placemark>",
                ));
            }
            Err(e) => return Err(KmlError::malformed(reader.error_position() as u64, e)),
            _ => {}
        }
    }

    Ok(fields)
}

/// Read text content of an element as an owned String, untrimmed.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::GeneralRef(e)) => text.push_str(&resolve_ref(reader, &e)?),
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => check_element(reader, &e, false)?,
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => {
                return Err(KmlError::malformed(
                    reader.buffer_position() as u64,
                    "document ended inside a text element",
                ));
            }
            Err(e) => return Err(KmlError::malformed(reader.error_position() as u64, e)),
            _ => {}
        }
    }

    Ok(text)
}

/// Reject a second root element and malformed attributes (unquoted values,
/// duplicate names).
fn check_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>, after_root: bool) -> Result<()> {
    if after_root {
        return Err(KmlError::malformed(
            reader.buffer_position() as u64,
            "more than one root element",
        ));
    }
    for attr_result in e.attributes() {
        attr_result.map_err(|err| KmlError::malformed(reader.buffer_position() as u64, err))?;
    }
    Ok(())
}

/// Resolve a character reference or one of the five predefined entities.
/// KML documents cannot declare entities, so any other name is an error.
fn resolve_ref(reader: &Reader<&[u8]>, e: &BytesRef<'_>) -> Result<String> {
    let position = reader.buffer_position() as u64;
    if let Some(ch) = e
        .resolve_char_ref()
        .map_err(|err| KmlError::malformed(position, err))?
    {
        return Ok(ch.to_string());
    }
    let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| KmlError::malformed(position, format!("undefined entity '&{name};'")))
}

fn outside_root(reader: &Reader<&[u8]>) -> KmlError {
    KmlError::malformed(
        reader.buffer_position() as u64,
        "content outside the root element",
    )
}

/// Give route stops the names of standalone points placed exactly on them.
///
/// Generated documents carry one named Point per route stop next to the
/// unnamed LineString; this folds those points back into their routes.
fn adopt_stop_names(routes: &mut [Route], loose_stops: &mut Vec<LooseStop>) {
    if routes.is_empty() || loose_stops.is_empty() {
        return;
    }
    let mut claimed: Vec<Vec<bool>> = routes.iter().map(|r| vec![false; r.stops.len()]).collect();

    loose_stops.retain(|loose| {
        for (route, taken) in routes.iter_mut().zip(claimed.iter_mut()) {
            let slot = route
                .stops
                .iter()
                .enumerate()
                .position(|(i, s)| !taken[i] && s.point == loose.stop.point);
            if let Some(i) = slot {
                taken[i] = true;
                route.stops[i].name = loose.stop.name.clone();
                return false;
            }
        }
        true
    });
}
