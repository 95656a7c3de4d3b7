//! Error taxonomy for a sweep run.
//!
//! Only [`SweepError::FetchList`] and [`SweepError::Setup`] are fatal. Every
//! other variant is raised inside a single room's task and is handled at that
//! room's boundary by the orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    /// The room list could not be read. Aborts the run.
    #[error("failed to fetch room list: {0}")]
    FetchList(String),

    /// The scrape request never produced a response (connect, DNS, body read).
    #[error("scrape request for room {room_id} failed: {message}")]
    ScrapeCall { room_id: String, message: String },

    /// The scrape endpoint answered with a non-success status or a body that
    /// is not a JSON object.
    #[error("scrape response for room {room_id} rejected (status {status}): {detail}")]
    ScrapeResponse {
        room_id: String,
        status: u16,
        detail: String,
    },

    #[error("scrape request for room {room_id} timed out after {secs:.1}s")]
    ScrapeTimeout { room_id: String, secs: f64 },

    #[error("upsert for room {room_id} failed: {message}")]
    StoreUpsert { room_id: String, message: String },

    /// Collaborators could not be constructed (database pool, HTTP client).
    #[error("setup failed: {0}")]
    Setup(String),
}

impl SweepError {
    /// Whether this error ends the whole run rather than a single room.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SweepError::FetchList(_) | SweepError::Setup(_))
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SweepError::FetchList(_) => "fetch_list",
            SweepError::ScrapeCall { .. } => "scrape_call",
            SweepError::ScrapeResponse { .. } => "scrape_response",
            SweepError::ScrapeTimeout { .. } => "scrape_timeout",
            SweepError::StoreUpsert { .. } => "store_upsert",
            SweepError::Setup(_) => "setup",
        }
    }
}
