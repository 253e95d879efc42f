//! Map display through whichever SDK the dashboard loaded.

use serde::{Deserialize, Serialize};

use crate::route_types::*;

/// Zoom used when there is only one point to show.
pub const SINGLE_POINT_ZOOM: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<GeoPoint> for LatLng {
    fn from(p: GeoPoint) -> Self {
        Self {
            lat: p.latitude,
            lng: p.longitude,
        }
    }
}

/// Axis-aligned lat/lng box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn from_point(p: LatLng) -> Self {
        Self {
            south_west: p,
            north_east: p,
        }
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    pub fn of_points(points: impl IntoIterator<Item = LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn is_point(&self) -> bool {
        self.south_west == self.north_east
    }

    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }
}

/// The SDKs the dashboard can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapProviderKind {
    #[default]
    GoogleMaps,
    Leaflet,
    Mappls,
}

impl MapProviderKind {
    /// Pixel padding applied when fitting bounds.
    pub fn fit_padding(&self) -> u32 {
        match self {
            Self::Leaflet => 20,
            Self::GoogleMaps | Self::Mappls => 0,
        }
    }
}

/// Drawing operations every map SDK adapter provides.
pub trait MapProvider {
    fn kind(&self) -> MapProviderKind;
    fn draw_path(&mut self, path: &[LatLng], color: &str);
    fn place_marker(&mut self, at: LatLng, label: &str, title: &str, color: &str);
    fn fit_bounds(&mut self, bounds: &Bounds, padding: u32);
    fn set_view(&mut self, center: LatLng, zoom: u8);
}

/// Draw every route and move the viewport over all of them.
///
/// Routes with two or more stops get a line; every stop gets a numbered
/// marker. Returns the number of routes drawn.
pub fn show_routes<M: MapProvider>(map: &mut M, routes: &RouteCollection) -> usize {
    let mut drawn = 0;
    for route in routes.iter().filter(|r| !r.stops.is_empty()) {
        draw_route(map, route);
        drawn += 1;
    }

    let all = routes.iter().flat_map(|r| r.points()).map(LatLng::from);
    if let Some(bounds) = Bounds::of_points(all) {
        move_to(map, &bounds);
    }
    log::debug!("Displayed {drawn} route(s) on {:?}", map.kind());
    drawn
}

/// Move the viewport over one route. Returns false if it has no stops.
pub fn focus_route<M: MapProvider>(map: &mut M, route: &Route) -> bool {
    match Bounds::of_points(route.points().map(LatLng::from)) {
        Some(bounds) => {
            move_to(map, &bounds);
            true
        }
        None => false,
    }
}

fn draw_route<M: MapProvider>(map: &mut M, route: &Route) {
    if route.is_drawable() {
        let path: Vec<LatLng> = route.points().map(LatLng::from).collect();
        map.draw_path(&path, &route.color_hex);
    }
    for (i, stop) in route.stops.iter().enumerate() {
        let title = format!("{} - {}", route.name, stop.name);
        map.place_marker(stop.point.into(), &(i + 1).to_string(), &title, &route.color_hex);
    }
}

fn move_to<M: MapProvider>(map: &mut M, bounds: &Bounds) {
    if bounds.is_point() {
        map.set_view(bounds.center(), SINGLE_POINT_ZOOM);
    } else {
        let padding = map.kind().fit_padding();
        map.fit_bounds(bounds, padding);
    }
}
