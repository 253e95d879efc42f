pub mod color;
pub mod coordinates;
pub mod error;
pub mod generator;
pub mod geojson_export;
pub mod ids;
pub mod interchange;
mod js_bridge;
pub mod map;
pub mod options;
pub mod parser;
pub mod placemark;
pub mod route_types;
pub mod store;

use chrono::Utc;
use log::Level;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::error::InterchangeError;
use crate::interchange::{LoadTicket, RouteInterchange, write_records};
use crate::js_bridge::{JsMap, JsStore, to_js};
use crate::map::MapProviderKind;
use crate::options::{ExportOptions, ImportOptions, PersistenceOptions};
use crate::route_types::RouteCollection;
use crate::store::RouteStore;

pub use crate::js_bridge::{JsMapAdapter, JsRouteStore};

/// Install the panic hook and route `log` output to the browser console.
#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(Level::Info).is_ok() {
        log::info!("KML interchange ready");
    }
}

/// Parse KML text into `{ routes, looseStops, placemarkCount, skippedPlacemarks }`.
#[wasm_bindgen(js_name = parseKml)]
pub fn parse_kml(kml: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: ImportOptions = parse_options(options)?;
    let doc = parser::parse_kml(kml, &opts)?;
    to_js(&doc)
}

/// Render an array of routes as a KML document.
#[wasm_bindgen(js_name = generateKml)]
pub fn generate_kml(routes: JsValue, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let routes = parse_routes(routes)?;
    let opts: ExportOptions = parse_options(options)?;
    Ok(generator::generate_kml(&routes, &opts)?)
}

#[wasm_bindgen(js_name = kmlColorToHex)]
pub fn kml_color_to_hex(kml_color: &str) -> String {
    color::kml_color_to_hex(kml_color)
}

#[wasm_bindgen(js_name = hexToKmlColor)]
pub fn hex_to_kml_color(hex: &str, alpha: Option<String>) -> String {
    color::hex_to_kml_color(hex, alpha.as_deref().unwrap_or("ff"))
}

/// Convert an array of routes to a GeoJSON FeatureCollection.
#[wasm_bindgen(js_name = routesToGeoJson)]
pub fn routes_to_geojson(routes: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let routes = parse_routes(routes)?;
    to_js(&geojson_export::to_feature_collection(&routes))
}

/// Write routes to the store, one independent write per route.
/// Resolves to `{ saved, failed }`; rejects only if the store is offline.
#[wasm_bindgen(js_name = saveRoutes)]
pub async fn save_routes(
    routes: JsValue,
    store: JsRouteStore,
    options: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let routes = parse_routes(routes)?;
    let opts: PersistenceOptions = parse_options(options)?;
    let store = JsStore::new(store);
    if !store.is_connected() {
        return Err(InterchangeError::PersistenceUnavailable.into());
    }

    let records = store::to_system_records(&routes, &opts, Utc::now());
    if records.is_empty() {
        return Err(InterchangeError::NoUsableRoutes.into());
    }
    let report = write_records(&store, &records).await;
    to_js(&report)
}

/// The routes of one loaded KML file, held on the Rust side.
#[wasm_bindgen]
pub struct KmlSession {
    inner: RouteInterchange,
}

#[wasm_bindgen]
impl KmlSession {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<KmlSession, JsValue> {
        console_error_panic_hook::set_once();
        Ok(Self {
            inner: RouteInterchange::new(parse_options(options)?),
        })
    }

    /// Call when a file read starts; pass the ticket to `completeLoad`.
    #[wasm_bindgen(js_name = beginLoad)]
    pub fn begin_load(&mut self, file_name: Option<String>) -> LoadTicket {
        self.inner.begin_load(file_name.as_deref())
    }

    #[wasm_bindgen(js_name = completeLoad)]
    pub fn complete_load(&mut self, ticket: LoadTicket, kml: &str) -> Result<JsValue, JsValue> {
        let outcome = self.inner.complete_load(ticket, kml)?;
        to_js(&outcome)
    }

    #[wasm_bindgen(js_name = loadFromText)]
    pub fn load_from_text(
        &mut self,
        kml: &str,
        file_name: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let outcome = self.inner.load_from_text(kml, file_name.as_deref())?;
        to_js(&outcome)
    }

    pub fn routes(&self) -> Result<JsValue, JsValue> {
        to_js(self.inner.routes())
    }

    #[wasm_bindgen(js_name = looseStops)]
    pub fn loose_stops(&self) -> Result<JsValue, JsValue> {
        to_js(self.inner.loose_stops())
    }

    #[wasm_bindgen(js_name = fileName)]
    pub fn file_name(&self) -> Option<String> {
        self.inner.file_name().map(str::to_string)
    }

    /// `{ fileName, mimeType, content }` for the whole collection.
    #[wasm_bindgen(js_name = exportCurrent)]
    pub fn export_current(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.export_current()?)
    }

    #[wasm_bindgen(js_name = exportRoute)]
    pub fn export_route(&self, index: usize) -> Result<JsValue, JsValue> {
        to_js(&self.inner.export_route(index)?)
    }

    #[wasm_bindgen(js_name = persistenceRecords)]
    pub fn persistence_records(&self, options: JsValue) -> Result<JsValue, JsValue> {
        let opts: PersistenceOptions = parse_options(options)?;
        to_js(&self.inner.persistence_records(&opts))
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Draw the routes through `adapter`; `provider` is "googleMaps",
    /// "leaflet" or "mappls".
    #[wasm_bindgen(js_name = showOnMap)]
    pub fn show_on_map(&self, adapter: JsMapAdapter, provider: JsValue) -> Result<usize, JsValue> {
        let mut map = JsMap::new(adapter, parse_options::<MapProviderKind>(provider)?);
        Ok(self.inner.show_on_map(&mut map))
    }

    #[wasm_bindgen(js_name = focusRoute)]
    pub fn focus_route(
        &self,
        adapter: JsMapAdapter,
        provider: JsValue,
        index: usize,
    ) -> Result<(), JsValue> {
        let mut map = JsMap::new(adapter, parse_options::<MapProviderKind>(provider)?);
        Ok(self.inner.focus_route(&mut map, index)?)
    }
}

fn parse_routes(routes: JsValue) -> Result<RouteCollection, JsValue> {
    serde_wasm_bindgen::from_value(routes).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options<T: DeserializeOwned + Default>(options: JsValue) -> Result<T, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
