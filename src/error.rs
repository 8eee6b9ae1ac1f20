use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryLoadError {
    #[error("boundary asset {file} unavailable (HTTP {status})")]
    Unavailable { file: String, status: u16 },

    #[error("failed to read boundary asset {file}: {message}")]
    Transport { file: String, message: String },

    #[error("boundary asset {file} is malformed: {message}")]
    Malformed { file: String, message: String },

    #[error("{primary}; fallback city {fallback_city} also failed: {fallback}")]
    FallbackFailed {
        primary: Box<BoundaryLoadError>,
        fallback_city: String,
        fallback: Box<BoundaryLoadError>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsFetchError {
    #[error("stats request failed: {0}")]
    Transport(String),

    #[error("stats endpoint responded with HTTP {0}")]
    Status(u16),

    #[error("stats response could not be decoded: {0}")]
    Decode(String),
}

/// The session loop has stopped and no longer accepts events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("map session has stopped")]
pub struct SessionClosed;
