use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Every database operation, reads included, goes through the broker: one
/// serialized connection per call and one line in the store's event log.
pub struct DbBroker {
    store: Store,
    events_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DbBroker {
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
            events_path: store.events_path(),
        }
    }

    /// Run `f` against a fresh connection to the store database and record the outcome.
    pub fn with_conn<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, error::RosterError>
    where
        F: FnOnce(&Connection) -> Result<R, error::RosterError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        // A poisoned lock only means another op panicked; the guard data is ().
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = self
            .store
            .db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::open_store(&self.store)?;

        debug!(op = op_name, db = %db_id, "brokered op start");
        let result = f(&conn);

        let (status, detail) = match &result {
            Ok(_) => ("success", None),
            Err(e) => {
                warn!(op = op_name, error = %e, "brokered op failed");
                ("error", Some(e.to_string()))
            }
        };
        // The op has already committed or failed; its result stands either way.
        if let Err(log_err) = self.log_event(actor, op_name, &db_id, status, detail) {
            warn!(op = op_name, error = %log_err, "event log write failed");
        }

        result
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        db_id: &str,
        status: &str,
        detail: Option<String>,
    ) -> Result<(), error::RosterError> {
        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
            detail,
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)?;
        Ok(())
    }

    /// All recorded events, oldest first. Unparseable lines are skipped.
    pub fn read_events(&self) -> Result<Vec<BrokerEvent>, error::RosterError> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.events_path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<BrokerEvent>(line).ok())
            .collect())
    }
}
