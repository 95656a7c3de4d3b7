//! Scrape endpoint client.
//!
//! - [`ScrapeClient`]: async seam the orchestrator calls once per room
//! - [`HttpScrapeClient`]: `POST {"room_id": ...}` to the configured endpoint
//!
//! A non-2xx status is an error whose detail is the response body (compact
//! JSON when it parses, truncated text otherwise). A 2xx body must be a JSON
//! object.

use crate::error::SweepError;
use crate::models::{RoomId, ScrapeResult};
use crate::utils::truncate_for_log;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

const DETAIL_MAX_BYTES: usize = 500;

/// Fetches scraped attributes for one room.
///
/// Implementations are shared by every task in a batch, so `scrape` takes
/// `&self` and must tolerate concurrent calls.
pub trait ScrapeClient {
    async fn scrape(&self, room_id: &RoomId) -> Result<ScrapeResult, SweepError>;
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    room_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpScrapeClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpScrapeClient {
    pub fn new(endpoint: Url) -> Result<Self, SweepError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SweepError::Setup(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ScrapeClient for HttpScrapeClient {
    #[instrument(level = "debug", skip_all, fields(room_id = %room_id))]
    async fn scrape(&self, room_id: &RoomId) -> Result<ScrapeResult, SweepError> {
        let t0 = Instant::now();
        let call_error = |e: reqwest::Error| SweepError::ScrapeCall {
            room_id: room_id.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ScrapeRequest {
                room_id: room_id.as_str(),
            })
            .send()
            .await
            .map_err(call_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(call_error)?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Scrape endpoint responded"
        );

        if !status.is_success() {
            let detail = error_detail(&body);
            warn!(status = status.as_u16(), %detail, "Scrape endpoint returned an error status");
            return Err(SweepError::ScrapeResponse {
                room_id: room_id.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| SweepError::ScrapeResponse {
                room_id: room_id.to_string(),
                status: status.as_u16(),
                detail: format!("invalid JSON body: {e}"),
            })?;

        ScrapeResult::from_value(value).ok_or_else(|| SweepError::ScrapeResponse {
            room_id: room_id.to_string(),
            status: status.as_u16(),
            detail: "expected a JSON object".to_string(),
        })
    }
}

/// Render an error response body for inclusion in the error message.
fn error_detail(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(json) => truncate_for_log(&json.to_string(), DETAIL_MAX_BYTES),
        Err(_) => truncate_for_log(&String::from_utf8_lossy(body), DETAIL_MAX_BYTES),
    }
}
