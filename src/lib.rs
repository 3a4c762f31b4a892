//! Daily service-session tracking against the 500-hour completion threshold.
//!
//! [`SessionAccrualTracker`] owns the open/close cycle of a day's session and
//! the accrued-hours view rebuilt from the owner's record history, which lives
//! in a remote [`RecordStore`].

pub mod auth;
pub mod console;
pub mod error;
pub mod models;
pub mod settings;
pub mod store;
pub mod tracker;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;

pub use auth::AuthContext;
pub use error::{TrackerError, TrackerResult, TransportError, ValidationError};
pub use models::{Activity, EvidenceFile, EvidenceUpload, NewRecord, ServiceRecord};
pub use settings::Settings;
pub use store::{HttpRecordStore, RecordStore};
pub use tracker::{
    ServiceProgress, SessionAccrualTracker, SessionSnapshot, SessionStatus, TrackerEvent,
    COMPLETION_THRESHOLD_HOURS,
};

const ENABLE_LOGS: bool = true;

pub fn run() {
    utils::logging::init();
    log::info!("service-hours starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log_error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(serve()) {
        log_error!("{err:#}");
        eprintln!("service-hours: {err:#}");
        std::process::exit(1);
    }
}

async fn serve() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let auth = AuthContext::from_env()
        .context("SERVICE_HOURS_USER and SERVICE_HOURS_TOKEN must name the signed-in user")?;
    let store = HttpRecordStore::new(&settings)?;
    log::info!("Record store at {}", store.records_url());

    let tracker = SessionAccrualTracker::new(Arc::new(store), Some(auth));
    tracker.subscribe(Arc::new(|event: &TrackerEvent| {
        log::debug!("{}: {:?}", event.name(), event);
    }));

    match tracker.load_history().await {
        Ok(records) => log::info!(
            "History ready: {} records, {}",
            records.len(),
            tracker.progress().await.describe_total()
        ),
        Err(err) => log::warn!("Starting without history: {err}"),
    }

    let input = BufReader::new(tokio::io::stdin());
    console::run_console(&tracker, input, tokio::io::stdout()).await
}
