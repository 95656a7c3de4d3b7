//! Bounded-concurrency batch orchestrator.
//!
//! A run reads the room list once, splits it into contiguous batches of
//! `concurrency_limit` rooms, and processes the batches strictly one after
//! another. Inside a batch every room is scraped and stored concurrently and
//! the batch is joined in full before the next one starts, so at most
//! `concurrency_limit` rooms are ever in flight.
//!
//! # Failure handling
//!
//! | Where | Effect |
//! |-------|--------|
//! | Listing rooms | Fatal; returned to the caller, nothing processed |
//! | Scrape call / response / timeout | Room marked `failed = true` |
//! | Success upsert | Demoted to a failure and marked `failed = true` |
//! | Failure upsert | Logged and dropped |
//!
//! Each room increments the processed counter exactly once, whatever the
//! outcome.

use crate::error::SweepError;
use crate::models::{ItemOutcome, RoomId, RunSummary, ScrapeResult};
use crate::scrape::ScrapeClient;
use crate::store::{ResultStore, RoomSource};
use crate::utils::round_secs;
use chrono::Utc;
use futures::future::join_all;
use std::num::NonZeroUsize;
use std::slice::Chunks;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Batch size, and therefore the cap on concurrently processed rooms.
    pub concurrency_limit: NonZeroUsize,
    /// Per-scrape deadline. A room that exceeds it fails on its own; the
    /// rest of its batch is unaffected.
    pub item_timeout: Option<Duration>,
}

/// Split `rooms` into contiguous, order-preserving batches of at most `limit`.
pub fn partition(rooms: &[RoomId], limit: NonZeroUsize) -> Chunks<'_, RoomId> {
    rooms.chunks(limit.get())
}

pub struct Orchestrator<'a, S, C, R> {
    source: &'a S,
    client: &'a C,
    store: &'a R,
    config: OrchestratorConfig,
}

impl<'a, S, C, R> Orchestrator<'a, S, C, R>
where
    S: RoomSource,
    C: ScrapeClient,
    R: ResultStore,
{
    pub fn new(source: &'a S, client: &'a C, store: &'a R, config: OrchestratorConfig) -> Self {
        Self {
            source,
            client,
            store,
            config,
        }
    }

    /// Process every room once and report the totals.
    ///
    /// Returns an error only when the room list cannot be read.
    #[instrument(level = "info", skip_all, fields(concurrency_limit = self.config.concurrency_limit.get()))]
    pub async fn run(&self) -> Result<RunSummary, SweepError> {
        let started_at = Utc::now();
        let t0 = Instant::now();

        let rooms = self.source.list_rooms().await.inspect_err(|e| {
            error!(error = %e, kind = e.kind(), "Could not read the room list; aborting");
        })?;

        let total_rooms = rooms.len();
        info!(total_rooms, "Found rooms to process");
        if rooms.is_empty() {
            info!("No rooms to process");
            return Ok(RunSummary::empty(started_at, round_secs(t0.elapsed())));
        }

        let limit = self.config.concurrency_limit;
        let batches = total_rooms.div_ceil(limit.get());
        let processed = AtomicUsize::new(0);
        let mut succeeded = 0;
        let mut failed = 0;
        let mut unflagged_failures = 0;

        for (index, batch) in partition(&rooms, limit).enumerate() {
            info!(
                batch = index + 1,
                of = batches,
                size = batch.len(),
                "Processing batch"
            );

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|room_id| self.process_room(room_id, &processed)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    ItemOutcome::Succeeded => succeeded += 1,
                    ItemOutcome::Failed { marked } => {
                        failed += 1;
                        if !marked {
                            unflagged_failures += 1;
                        }
                    }
                }
            }
        }

        let elapsed = t0.elapsed();
        let summary = RunSummary {
            started_at,
            total_rooms,
            processed_count: processed.load(Ordering::SeqCst),
            succeeded,
            failed,
            unflagged_failures,
            batches,
            elapsed_seconds: round_secs(elapsed),
        };
        info!(
            total_rooms = summary.total_rooms,
            processed = summary.processed_count,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unflagged_failures = summary.unflagged_failures,
            elapsed_secs = summary.elapsed_seconds,
            "Processing complete"
        );
        Ok(summary)
    }

    /// Scrape and store one room. Never fails; errors become the outcome.
    async fn process_room(&self, room_id: &RoomId, processed: &AtomicUsize) -> ItemOutcome {
        let outcome = match self.scrape_and_store(room_id).await {
            Ok(()) => {
                info!(%room_id, "Room processed successfully");
                ItemOutcome::Succeeded
            }
            Err(e) => {
                error!(%room_id, kind = e.kind(), error = %e, "Room failed");
                ItemOutcome::Failed {
                    marked: self.mark_failed(room_id).await,
                }
            }
        };
        processed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn scrape_and_store(&self, room_id: &RoomId) -> Result<(), SweepError> {
        let result = self.scrape(room_id).await?;
        self.store.upsert_success(room_id, &result).await
    }

    async fn scrape(&self, room_id: &RoomId) -> Result<ScrapeResult, SweepError> {
        let Some(limit) = self.config.item_timeout else {
            return self.client.scrape(room_id).await;
        };
        tokio::time::timeout(limit, self.client.scrape(room_id))
            .await
            .unwrap_or_else(|_| {
                Err(SweepError::ScrapeTimeout {
                    room_id: room_id.to_string(),
                    secs: limit.as_secs_f64(),
                })
            })
    }

    /// Best-effort failure flag. Returns whether the write landed.
    async fn mark_failed(&self, room_id: &RoomId) -> bool {
        match self.store.upsert_failure(room_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%room_id, error = %e, "Could not record failure state");
                false
            }
        }
    }
}
