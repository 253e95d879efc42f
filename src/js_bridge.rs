//! Adapters from JavaScript objects to the store and map traits.

use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::error::StoreError;
use crate::map::{Bounds, LatLng, MapProvider, MapProviderKind};
use crate::store::RouteStore;

#[wasm_bindgen]
extern "C" {
    /// Any object with `isConnected(): boolean` and
    /// `set(path, value): Promise`, such as a wrapped Firebase database.
    pub type JsRouteStore;

    #[wasm_bindgen(method, js_name = isConnected)]
    fn js_is_connected(this: &JsRouteStore) -> bool;

    #[wasm_bindgen(method, catch, js_name = set)]
    fn js_set(this: &JsRouteStore, path: &str, value: JsValue) -> Result<js_sys::Promise, JsValue>;

    /// Map SDK wrapper exposing `drawPath`, `placeMarker`, `fitBounds` and
    /// `setView`.
    pub type JsMapAdapter;

    #[wasm_bindgen(method, js_name = drawPath)]
    fn js_draw_path(this: &JsMapAdapter, path: JsValue, color: &str);

    #[wasm_bindgen(method, js_name = placeMarker)]
    fn js_place_marker(this: &JsMapAdapter, at: JsValue, label: &str, title: &str, color: &str);

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn js_fit_bounds(this: &JsMapAdapter, bounds: JsValue, padding: u32);

    #[wasm_bindgen(method, js_name = setView)]
    fn js_set_view(this: &JsMapAdapter, center: JsValue, zoom: u8);
}

/// Serialize into plain JS objects (not `Map`s) so the store and map SDKs
/// see ordinary JSON.
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn describe(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        s
    } else if let Some(e) = value.dyn_ref::<js_sys::Error>() {
        String::from(e.message())
    } else {
        format!("{value:?}")
    }
}

pub struct JsStore {
    inner: JsRouteStore,
}

impl JsStore {
    pub fn new(inner: JsRouteStore) -> Self {
        Self { inner }
    }
}

impl RouteStore for JsStore {
    fn is_connected(&self) -> bool {
        self.inner.js_is_connected()
    }

    async fn put(&self, path: &str, record: serde_json::Value) -> Result<(), StoreError> {
        let rejected = |message: String| StoreError::Rejected {
            path: path.to_string(),
            message,
        };
        let value = to_js(&record).map_err(|e| rejected(describe(&e)))?;
        let promise = self.inner.js_set(path, value).map_err(|e| rejected(describe(&e)))?;
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| rejected(describe(&e)))
    }
}

pub struct JsMap {
    inner: JsMapAdapter,
    kind: MapProviderKind,
}

impl JsMap {
    pub fn new(inner: JsMapAdapter, kind: MapProviderKind) -> Self {
        Self { inner, kind }
    }
}

impl MapProvider for JsMap {
    fn kind(&self) -> MapProviderKind {
        self.kind
    }

    fn draw_path(&mut self, path: &[LatLng], color: &str) {
        self.inner.js_draw_path(to_js(path).unwrap_or(JsValue::NULL), color);
    }

    fn place_marker(&mut self, at: LatLng, label: &str, title: &str, color: &str) {
        self.inner
            .js_place_marker(to_js(&at).unwrap_or(JsValue::NULL), label, title, color);
    }

    fn fit_bounds(&mut self, bounds: &Bounds, padding: u32) {
        self.inner.js_fit_bounds(to_js(bounds).unwrap_or(JsValue::NULL), padding);
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.inner.js_set_view(to_js(&center).unwrap_or(JsValue::NULL), zoom);
    }
}
