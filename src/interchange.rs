//! Moves routes between KML text, the map, and the persistence store.

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use wasm_bindgen::prelude::wasm_bindgen;

use crate::error::{InterchangeError, KmlError, StoreError};
use crate::generator::{KML_MIME_TYPE, generate_kml, route_file_name};
use crate::map::{self, MapProvider};
use crate::options::{ExportOptions, ImportOptions, PersistenceOptions};
use crate::parser::parse_kml;
use crate::route_types::*;
use crate::store::{RouteStore, SystemRouteRecord, to_system_records};

pub const EXPORT_ALL_TITLE: &str = "Exported Punjab Transport Routes";
pub const EXPORT_ALL_FILE_NAME: &str = "punjab_transport_routes.kml";

/// Identifies one file load. Only the most recent ticket may complete.
#[wasm_bindgen]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    file_name: Option<String>,
}

/// Counts shown to the user after a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub routes: usize,
    pub loose_stops: usize,
    pub placemarks: usize,
    pub skipped: usize,
    pub message: String,
}

impl From<&ParsedDocument> for ImportSummary {
    fn from(doc: &ParsedDocument) -> Self {
        Self {
            routes: doc.routes.len(),
            loose_stops: doc.loose_stops.len(),
            placemarks: doc.placemark_count,
            skipped: doc.skipped_placemarks,
            message: doc.summary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LoadOutcome {
    /// The document replaced the active collection.
    Loaded(ImportSummary),
    /// The document parsed but held nothing usable; previous state kept.
    NoUsableRoutes(ImportSummary),
    /// A newer load started before this one completed; nothing changed.
    Superseded,
}

/// KML text ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmlDownload {
    pub file_name: String,
    pub mime_type: String,
    pub content: String,
}

impl KmlDownload {
    fn new(file_name: String, content: String) -> Self {
        Self {
            file_name,
            mime_type: KML_MIME_TYPE.to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    pub route_id: String,
    pub route_name: String,
    pub message: String,
}

/// Result of a batch of independent store writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub saved: Vec<String>,
    pub failed: Vec<WriteFailure>,
}

impl SaveReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && !self.saved.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("Saved {} of {} routes", self.saved.len(), self.attempted())
    }
}

/// Owns the routes of the currently loaded KML file.
///
/// All mutation goes through `&mut self`; embed in a mutex to share it.
#[derive(Debug, Default)]
pub struct RouteInterchange {
    routes: RouteCollection,
    loose_stops: Vec<LooseStop>,
    file_name: Option<String>,
    import_options: ImportOptions,
    generation: u64,
}

impl RouteInterchange {
    pub fn new(import_options: ImportOptions) -> Self {
        Self {
            import_options,
            ..Default::default()
        }
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub fn loose_stops(&self) -> &[LooseStop] {
        &self.loose_stops
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Start a load, superseding any load still in flight.
    pub fn begin_load(&mut self, file_name: Option<&str>) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
            file_name: file_name.map(str::to_string),
        }
    }

    /// Finish a load started with [`begin_load`](Self::begin_load).
    ///
    /// On a parse error the active collection is left untouched.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        kml: &str,
    ) -> Result<LoadOutcome, KmlError> {
        if ticket.generation != self.generation {
            log::debug!("Ignoring superseded load {}", ticket.generation);
            return Ok(LoadOutcome::Superseded);
        }

        let doc = parse_kml(kml, &self.import_options).inspect_err(|e| {
            log::error!("Failed to parse KML file: {e}");
        })?;
        let summary = ImportSummary::from(&doc);

        if doc.is_empty() {
            log::warn!("No valid routes found in KML file ({})", summary.message);
            return Ok(LoadOutcome::NoUsableRoutes(summary));
        }

        self.routes = doc.routes;
        self.loose_stops = doc.loose_stops;
        self.file_name = ticket.file_name;
        log::info!(
            "Loaded {} routes from {}",
            summary.routes,
            self.file_name.as_deref().unwrap_or("KML text")
        );
        Ok(LoadOutcome::Loaded(summary))
    }

    /// Parse `kml` and make it the active collection.
    pub fn load_from_text(
        &mut self,
        kml: &str,
        file_name: Option<&str>,
    ) -> Result<LoadOutcome, KmlError> {
        let ticket = self.begin_load(file_name);
        self.complete_load(ticket, kml)
    }

    /// Drop the active collection.
    pub fn clear(&mut self) {
        self.routes = RouteCollection::default();
        self.loose_stops.clear();
        self.file_name = None;
    }

    pub fn export_to_text(
        routes: &RouteCollection,
        opts: &ExportOptions,
    ) -> Result<String, KmlError> {
        generate_kml(routes, opts)
    }

    /// The whole active collection as a download.
    pub fn export_current(&self) -> Result<KmlDownload, InterchangeError> {
        if self.routes.is_empty() {
            return Err(InterchangeError::NoUsableRoutes);
        }
        let content = Self::export_to_text(&self.routes, &ExportOptions::titled(EXPORT_ALL_TITLE))?;
        Ok(KmlDownload::new(EXPORT_ALL_FILE_NAME.to_string(), content))
    }

    /// One route of the active collection as a download named after it.
    pub fn export_route(&self, index: usize) -> Result<KmlDownload, InterchangeError> {
        let route = self.routes.get(index).ok_or(InterchangeError::RouteNotFound(index))?;
        let single = RouteCollection::new(vec![route.clone()]);
        let content = Self::export_to_text(&single, &ExportOptions::titled(route.name.clone()))?;
        Ok(KmlDownload::new(route_file_name(&route.name), content))
    }

    /// Store records for the active collection, stamped with the current time.
    pub fn persistence_records(&self, opts: &PersistenceOptions) -> Vec<SystemRouteRecord> {
        let mut opts = opts.clone();
        if opts.kml_file_name.is_none() {
            opts.kml_file_name = self.file_name.clone();
        }
        to_system_records(&self.routes, &opts, Utc::now())
    }

    /// Write every route with stops to the store.
    ///
    /// Writes are independent: a failed write is reported and the others
    /// still land. The active collection is cleared only when all succeed.
    pub async fn save_to_store<S: RouteStore>(
        &mut self,
        store: &S,
        opts: &PersistenceOptions,
    ) -> Result<SaveReport, InterchangeError> {
        if !store.is_connected() {
            log::error!("Database not connected, nothing saved");
            return Err(InterchangeError::PersistenceUnavailable);
        }

        let records = self.persistence_records(opts);
        if records.is_empty() {
            return Err(InterchangeError::NoUsableRoutes);
        }

        let report = write_records(store, &records).await;
        if report.all_succeeded() {
            self.clear();
        }
        Ok(report)
    }

    pub fn show_on_map<M: MapProvider>(&self, map: &mut M) -> usize {
        map::show_routes(map, &self.routes)
    }

    pub fn focus_route<M: MapProvider>(
        &self,
        map: &mut M,
        index: usize,
    ) -> Result<(), InterchangeError> {
        let route = self.routes.get(index).ok_or(InterchangeError::RouteNotFound(index))?;
        if map::focus_route(map, route) {
            Ok(())
        } else {
            Err(InterchangeError::RouteNotFound(index))
        }
    }
}

/// Write each record to its own path and wait for all of them.
pub async fn write_records<S: RouteStore>(store: &S, records: &[SystemRouteRecord]) -> SaveReport {
    let writes = records.iter().map(|record| async move {
        let path = record.path();
        let outcome = match serde_json::to_value(record) {
            Ok(value) => store.put(&path, value).await,
            Err(e) => Err(StoreError::Encode {
                id: record.id.clone(),
                message: e.to_string(),
            }),
        };
        (record, outcome)
    });

    let mut report = SaveReport::default();
    for (record, outcome) in join_all(writes).await {
        match outcome {
            Ok(()) => {
                log::info!("Route saved to store: {}", record.id);
                report.saved.push(record.id.clone());
            }
            Err(e) => {
                log::error!("Error saving route {} to store: {e}", record.id);
                report.failed.push(WriteFailure {
                    route_id: record.id.clone(),
                    route_name: record.route_name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    log::info!("{}", report.summary());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapProviderKind;
    use crate::map::tests::{Call, RecordingMap};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory store that rejects writes for routes whose name contains
    /// `reject`.
    #[derive(Default)]
    struct MemoryStore {
        offline: bool,
        reject: Option<String>,
        data: RefCell<BTreeMap<String, serde_json::Value>>,
    }

    impl RouteStore for MemoryStore {
        fn is_connected(&self) -> bool {
            !self.offline
        }

        async fn put(&self, path: &str, record: serde_json::Value) -> Result<(), StoreError> {
            let name = record["routeName"].as_str().unwrap_or_default();
            if self.reject.as_deref().is_some_and(|r| name.contains(r)) {
                return Err(StoreError::Rejected {
                    path: path.to_string(),
                    message: "permission denied".to_string(),
                });
            }
            self.data.borrow_mut().insert(path.to_string(), record);
            Ok(())
        }
    }

    const TWO_ROUTES: &str = r#"<kml><Document>
  <Placemark><name>Route A</name><LineString><coordinates>76.78,30.74 76.80,30.75</coordinates></LineString></Placemark>
  <Placemark><name>Route B</name><LineString><coordinates>75.85,30.90 75.86,30.91 75.87,30.92</coordinates></LineString></Placemark>
</Document></kml>"#;

    fn loaded() -> RouteInterchange {
        let mut svc = RouteInterchange::default();
        svc.load_from_text(TWO_ROUTES, Some("lines.kml")).unwrap();
        svc
    }

    #[test]
    fn test_load_replaces_collection() {
        let mut svc = loaded();
        assert_eq!(svc.routes().len(), 2);
        assert_eq!(svc.file_name(), Some("lines.kml"));

        let one = r#"<kml><Placemark><name>Only</name><LineString><coordinates>1,1 2,2</coordinates></LineString></Placemark></kml>"#;
        let outcome = svc.load_from_text(one, None).unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded(ref s) if s.routes == 1));
        assert_eq!(svc.routes().len(), 1);
        assert_eq!(svc.routes().get(0).unwrap().name, "Only");
    }

    #[test]
    fn test_failed_load_keeps_previous() {
        let mut svc = loaded();
        let err = svc.load_from_text("<kml><Placemark></kml>", None);
        assert!(matches!(err, Err(KmlError::MalformedDocument { .. })));
        assert_eq!(svc.routes().len(), 2);
        assert_eq!(svc.file_name(), Some("lines.kml"));
    }

    #[test]
    fn test_empty_document_is_a_warning() {
        let mut svc = loaded();
        let outcome = svc
            .load_from_text("<kml><Placemark><name>x</name></Placemark></kml>", None)
            .unwrap();
        match outcome {
            LoadOutcome::NoUsableRoutes(summary) => {
                assert_eq!(summary.message, "0 of 1 placemarks imported");
            }
            other => panic!("Expected NoUsableRoutes, got {other:?}"),
        }
        assert_eq!(svc.routes().len(), 2);
    }

    #[test]
    fn test_superseded_load_is_ignored() {
        let mut svc = RouteInterchange::default();
        let first = svc.begin_load(Some("old.kml"));
        let second = svc.begin_load(Some("new.kml"));

        assert_eq!(svc.complete_load(first, TWO_ROUTES).unwrap(), LoadOutcome::Superseded);
        assert!(svc.routes().is_empty());

        let outcome = svc.complete_load(second, TWO_ROUTES).unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
        assert_eq!(svc.file_name(), Some("new.kml"));
    }

    #[test]
    fn test_export_current() {
        let svc = loaded();
        let download = svc.export_current().unwrap();
        assert_eq!(download.file_name, "punjab_transport_routes.kml");
        assert_eq!(download.mime_type, "application/vnd.google-earth.kml+xml");
        assert!(download.content.contains("<name>Exported Punjab Transport Routes</name>"));

        assert!(matches!(
            RouteInterchange::default().export_current(),
            Err(InterchangeError::NoUsableRoutes)
        ));
    }

    #[test]
    fn test_export_route() {
        let svc = loaded();
        let download = svc.export_route(1).unwrap();
        assert_eq!(download.file_name, "route_b.kml");
        assert_eq!(download.content.matches("<LineString>").count(), 1);
        assert!(matches!(svc.export_route(7), Err(InterchangeError::RouteNotFound(7))));
    }

    #[test]
    fn test_export_is_deterministic() {
        let svc = loaded();
        let opts = ExportOptions::default();
        let a = RouteInterchange::export_to_text(svc.routes(), &opts).unwrap();
        let b = RouteInterchange::export_to_text(svc.routes(), &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip_through_service() {
        let svc = loaded();
        let opts = ExportOptions::titled("Trip");
        let kml = RouteInterchange::export_to_text(svc.routes(), &opts).unwrap();
        let mut other = RouteInterchange::default();
        other.load_from_text(&kml, None).unwrap();

        assert_eq!(other.routes().len(), svc.routes().len());
        for (a, b) in svc.routes().iter().zip(other.routes()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.stops.len(), b.stops.len());
            for (x, y) in a.stops.iter().zip(&b.stops) {
                assert!((x.point.latitude - y.point.latitude).abs() < 1e-6);
                assert!((x.point.longitude - y.point.longitude).abs() < 1e-6);
                assert_eq!(x.name, y.name);
            }
        }
    }

    #[test]
    fn test_records_use_loaded_file_name() {
        let svc = loaded();
        let records = svc.persistence_records(&PersistenceOptions::default());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kml_file_name == "lines.kml"));
    }

    #[tokio::test]
    async fn test_save_all() {
        let mut svc = loaded();
        let store = MemoryStore::default();
        let report = svc.save_to_store(&store, &PersistenceOptions::default()).await.unwrap();

        assert_eq!(report.saved.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.summary(), "Saved 2 of 2 routes");
        let data = store.data.borrow();
        assert_eq!(data.len(), 2);
        assert!(data.keys().all(|k| k.starts_with("routes/KML_Imported/kml_import_")));
        assert!(svc.routes().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let mut svc = loaded();
        let store = MemoryStore {
            reject: Some("Route B".to_string()),
            ..Default::default()
        };
        let report = svc.save_to_store(&store, &PersistenceOptions::default()).await.unwrap();

        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].route_name, "Route B");
        assert!(report.failed[0].message.contains("permission denied"));
        assert_eq!(store.data.borrow().len(), 1);
        // not everything landed, so the routes stay loaded for a retry
        assert_eq!(svc.routes().len(), 2);
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let mut svc = loaded();
        let store = MemoryStore {
            offline: true,
            ..Default::default()
        };
        let result = svc.save_to_store(&store, &PersistenceOptions::default()).await;
        assert!(matches!(result, Err(InterchangeError::PersistenceUnavailable)));
        assert!(store.data.borrow().is_empty());
        assert_eq!(svc.routes().len(), 2);
    }

    #[tokio::test]
    async fn test_save_nothing_loaded() {
        let mut svc = RouteInterchange::default();
        let result = svc
            .save_to_store(&MemoryStore::default(), &PersistenceOptions::default())
            .await;
        assert!(matches!(result, Err(InterchangeError::NoUsableRoutes)));
    }

    #[test]
    fn test_map_display() {
        let svc = loaded();
        let mut map = RecordingMap::new(MapProviderKind::Leaflet);
        assert_eq!(svc.show_on_map(&mut map), 2);
        let paths = map.calls.iter().filter(|c| matches!(c, Call::Path(..))).count();
        assert_eq!(paths, 2);

        let mut map = RecordingMap::new(MapProviderKind::GoogleMaps);
        svc.focus_route(&mut map, 0).unwrap();
        assert!(matches!(map.calls[0], Call::Fit(_, 0)));
        assert!(svc.focus_route(&mut map, 5).is_err());
    }

    #[test]
    fn test_clear() {
        let mut svc = loaded();
        svc.clear();
        assert!(svc.routes().is_empty());
        assert!(svc.file_name().is_none());
    }
}
