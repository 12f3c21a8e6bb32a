//! Start-up bookkeeping performed on the item store before it is served

use super::store::ItemStore;
use crate::core::errors::StorageError;
use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const CRASH_REPORTER_ID_KEY: &str = "crashReporter.guid";
pub const INSTALLATION_ID_KEY: &str = "storage.installationId";
pub const FIRST_SESSION_DATE_KEY: &str = "telemetry.firstSessionDate";
pub const LAST_SESSION_DATE_KEY: &str = "telemetry.lastSessionDate";
pub const CURRENT_SESSION_DATE_KEY: &str = "telemetry.currentSessionDate";

/// Run every start-up step. Each step fails independently: a failure is logged and
/// the remaining steps still run.
pub fn initialize_store(store: &dyn ItemStore) {
    let steps: [(&str, fn(&dyn ItemStore) -> Result<(), StorageError>); 4] = [
        ("crash reporter id", ensure_crash_reporter_id),
        ("installation id", ensure_installation_id),
        ("first session date", ensure_first_session_date),
        ("session dates", rotate_session_dates),
    ];

    for (name, step) in steps {
        if let Err(e) = step(store) {
            error!("Storage initialization step '{}' failed: {}", name, e);
        }
    }

    info!("Item store initialized");
}

fn ensure_crash_reporter_id(store: &dyn ItemStore) -> Result<(), StorageError> {
    if store.get(CRASH_REPORTER_ID_KEY).is_none() {
        store.set(CRASH_REPORTER_ID_KEY, &Uuid::new_v4().to_string())?;
        debug!("Generated crash reporter id");
    }
    Ok(())
}

fn ensure_installation_id(store: &dyn ItemStore) -> Result<(), StorageError> {
    if store.get(INSTALLATION_ID_KEY).is_none() {
        let id = Uuid::new_v4().to_string();
        store.set(INSTALLATION_ID_KEY, &id)?;
        debug!("Generated installation id {}", id);
    }
    Ok(())
}

fn ensure_first_session_date(store: &dyn ItemStore) -> Result<(), StorageError> {
    if store.get(FIRST_SESSION_DATE_KEY).is_none() {
        store.set(FIRST_SESSION_DATE_KEY, &session_timestamp())?;
    }
    Ok(())
}

fn rotate_session_dates(store: &dyn ItemStore) -> Result<(), StorageError> {
    if let Some(previous) = store.get(CURRENT_SESSION_DATE_KEY) {
        store.set(LAST_SESSION_DATE_KEY, &previous)?;
    }
    store.set(CURRENT_SESSION_DATE_KEY, &session_timestamp())
}

fn session_timestamp() -> String {
    Utc::now().to_rfc2822()
}
