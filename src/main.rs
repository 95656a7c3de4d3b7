//! # Room Sweep
//!
//! Reads every room id from a Postgres view, asks a scraping service about
//! each room, and upserts the answer into the rooms table. Rooms that cannot
//! be scraped or stored are flagged with `failed = true` instead.
//!
//! ## Usage
//!
//! ```sh
//! room_sweep --database-url postgres://localhost/app -c 4
//! ```
//!
//! ## Architecture
//!
//! 1. **Listing**: one query against the rooms view
//! 2. **Batching**: contiguous batches of `--concurrency-limit` rooms, run in order
//! 3. **Processing**: each room in a batch is scraped and stored concurrently
//! 4. **Summary**: totals and elapsed time logged once at the end
//!
//! The process exits non-zero only when setup fails or the room list cannot
//! be read. Individual room failures never change the exit code.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod models;
mod orchestrator;
mod scrape;
mod store;
mod utils;

use cli::Cli;
use error::SweepError;
use models::RunSummary;
use orchestrator::Orchestrator;
use scrape::HttpScrapeClient;
use store::PgRoomStore;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal; variables may come from the real environment
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    log_dotenv(&dotenv);

    let args = Cli::parse();
    info!(
        endpoint = %args.scrape_endpoint,
        concurrency_limit = args.concurrency_limit.get(),
        view = %args.rooms_view,
        table = %args.rooms_table,
        "room_sweep starting up"
    );

    match run(&args).await {
        Ok(summary) => {
            info!(
                processed = summary.processed_count,
                secs = %format!("{:.2}", summary.elapsed_seconds),
                "Run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                kind = e.kind(),
                fatal = e.is_fatal(),
                error = %e,
                "Fatal error in main process"
            );
            ExitCode::FAILURE
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: &Cli) -> Result<RunSummary, SweepError> {
    let store = PgRoomStore::connect(&args.store_config()).await?;
    let client = HttpScrapeClient::new(args.scrape_endpoint.clone())?;
    debug!(endpoint = %client.endpoint(), "Scrape client ready");

    // The same store is both the room source and the result sink
    Orchestrator::new(&store, &client, &store, args.orchestrator_config())
        .run()
        .await
}

/// Report how `.env` loading went. Returns `true` when a file was present but
/// could not be applied in full.
fn log_dotenv(result: &Result<PathBuf, dotenvy::Error>) -> bool {
    match result {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded environment file");
            false
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            warn!(error = %e, "Could not load .env; variables after the bad line were not applied");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_dotenv_is_quiet() {
        let missing = Err(dotenvy::Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "no .env",
        )));
        assert!(!log_dotenv(&missing));
        assert!(!log_dotenv(&Ok(PathBuf::from(".env"))));
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let malformed = Err(dotenvy::Error::LineParse("SCRAPE_ENDPOINT http://x".into(), 16));
        assert!(log_dotenv(&malformed));

        let unreadable = Err(dotenvy::Error::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "denied",
        )));
        assert!(log_dotenv(&unreadable));
    }
}
