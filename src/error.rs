use wasm_bindgen::JsValue;

/// Errors from reading or writing KML.
#[derive(Debug, thiserror::Error)]
pub enum KmlError {
    #[error("Malformed KML document at byte {position}: {reason}")]
    MalformedDocument { position: u64, reason: String },

    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),

    #[error("Failed to write KML: {0}")]
    Write(#[from] std::io::Error),
}

impl KmlError {
    pub(crate) fn malformed(position: u64, reason: impl std::fmt::Display) -> Self {
        Self::MalformedDocument {
            position,
            reason: reason.to_string(),
        }
    }
}

/// A single write rejected by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Write to '{path}' rejected: {message}")]
    Rejected { path: String, message: String },

    #[error("Could not encode record '{id}': {message}")]
    Encode { id: String, message: String },
}

/// Errors surfaced by the route interchange service.
#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error(transparent)]
    Kml(#[from] KmlError),

    #[error("No valid routes found")]
    NoUsableRoutes,

    #[error("Route {0} not found")]
    RouteNotFound(usize),

    #[error("Persistence store is not connected")]
    PersistenceUnavailable,
}

impl From<KmlError> for JsValue {
    fn from(e: KmlError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

impl From<InterchangeError> for JsValue {
    fn from(e: InterchangeError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
