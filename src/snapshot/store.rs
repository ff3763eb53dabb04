//! Atomic writer: temp file, fsync, rename into place, with a monotonic
//! `.seq` suffix when two cycles collide on the same `HHMMSS` (§4.4).
//!
//! Grounded in the teacher's `db::run_db_writer` -- a single component that
//! owns all writes to one persistent tree -- re-expressed over the
//! filesystem instead of a SQLite connection.

use crate::errors::EngineResult;
use crate::snapshot::SnapshotKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { root: data_dir.into().join("snapshots").join("dynamic") }
    }

    /// Writes `value` as JSON under `kind/key/event_day/HHMMSS[.seq].json`
    /// and returns the final path. Never overwrites an existing file.
    pub fn write<T: Serialize>(&self, kind: SnapshotKind, key: &str, event_day: NaiveDate, fetch_time: DateTime<Utc>, value: &T) -> EngineResult<PathBuf> {
        let dir = self.root.join(kind.dir_name()).join(key).join(event_day.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&dir)?;

        let stem = fetch_time.format("%H%M%S").to_string();
        let final_path = first_available_path(&dir, &stem);

        let body = serde_json::to_vec_pretty(value).map_err(crate::errors::EngineError::from)?;
        atomic_write(&dir, &final_path, &body)?;
        Ok(final_path)
    }
}

/// Finds the first non-existing `{stem}.json` or `{stem}.{seq}.json` path in
/// `dir`. Snapshot files are never rewritten, so an existing name always
/// means a true collision, not a retry.
fn first_available_path(dir: &Path, stem: &str) -> PathBuf {
    let bare = dir.join(format!("{stem}.json"));
    if !bare.exists() {
        return bare;
    }
    let mut seq = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}.{seq}.json"));
        if !candidate.exists() {
            return candidate;
        }
        seq += 1;
    }
}

fn atomic_write(dir: &Path, final_path: &Path, body: &[u8]) -> EngineResult<()> {
    use std::io::Write;

    let tmp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(body)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, final_path)?;
    Ok(())
}
