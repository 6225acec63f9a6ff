//! Timestamp, event id and JSON envelope helpers.

use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Unix-epoch seconds with a `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// Inverse of [`now_epoch_z`]; `None` for anything not shaped like `<digits>Z`.
pub fn parse_epoch_z(ts: &str) -> Option<u64> {
    ts.strip_suffix('Z')?.parse::<u64>().ok()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Envelope for `--format json` output. Keys from `payload` are merged in at top level.
pub fn command_envelope(cmd: &str, status: &str, payload: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": ENVELOPE_VERSION,
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), payload.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
