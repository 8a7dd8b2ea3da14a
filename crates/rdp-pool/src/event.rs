//! Append-only audit trail of pool state transitions
//!
//! Every add/claim/release/expire transition appends one line to the event
//! file. The trail is write-only from the engine's point of view: nothing in
//! the core reads it back, and an append failure must never fail the pool
//! operation that produced the event; it is logged and dropped.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::record::now_millis;

/// Kind of state transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Claimed,
    Released,
    Expired,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Claimed => "CLAIMED",
            EventKind::Released => "RELEASED",
            EventKind::Expired => "EXPIRED",
        }
    }
}

/// File-backed event sink. The mutex serializes concurrent appends so lines
/// never interleave.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one `[<unix_ms>] <KIND> <details>` line.
    pub async fn append(&self, kind: EventKind, details: &str) {
        let line = format!("[{}] {} {}\n", now_millis(), kind.label(), details);

        let _guard = self.lock.lock().await;
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to append pool event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("rdp_pool_log.txt"));

        log.append(EventKind::Added, "ip=10.0.0.1").await;
        log.append(EventKind::Claimed, "ip=10.0.0.1 lease_id=lease_1")
            .await;

        let contents = tokio::fs::read_to_string(dir.path().join("rdp_pool_log.txt"))
            .await
            .unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ADDED ip=10.0.0.1"), "got: {}", lines[0]);
        assert!(
            lines[1].contains("CLAIMED ip=10.0.0.1 lease_id=lease_1"),
            "got: {}",
            lines[1]
        );
        // Timestamp prefix
        assert!(lines[0].starts_with('['));
    }

    #[tokio::test]
    async fn append_to_unwritable_path_does_not_panic() {
        let log = EventLog::new(PathBuf::from("/nonexistent/dir/rdp_pool_log.txt"));
        // Swallowed with a warning; the operation must not fail
        log.append(EventKind::Expired, "ip=10.0.0.1").await;
    }

    #[test]
    fn kind_labels() {
        assert_eq!(EventKind::Added.label(), "ADDED");
        assert_eq!(EventKind::Claimed.label(), "CLAIMED");
        assert_eq!(EventKind::Released.label(), "RELEASED");
        assert_eq!(EventKind::Expired.label(), "EXPIRED");
    }
}
