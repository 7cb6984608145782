//! System-wide flow audit stream.
//!
//! Every turn across all sessions is mirrored here. The stream preserves
//! arrival order per session and makes no cross-session ordering guarantee:
//! the pipeline's send is non-blocking, and a background task drains the
//! channel into the CSV export. A bounded in-memory tail per session feeds
//! loop/anomaly analysis without re-reading the file.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use mesa_core::turn::FlowLogEntry;

/// Append-only audit stream with a CSV export.
pub struct FlowAuditStream {
    seq: AtomicU64,
    tx: UnboundedSender<FlowLogEntry>,
    tail: Arc<RwLock<HashMap<String, VecDeque<FlowLogEntry>>>>,
    tail_cap: usize,
}

impl FlowAuditStream {
    /// Starts the stream and its writer task. `csv_path: None` keeps the
    /// stream memory-only (tests, ephemeral deploys).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(csv_path: Option<PathBuf>, tail_cap: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(csv_path, rx));

        Self {
            seq: AtomicU64::new(0),
            tx,
            tail: Arc::new(RwLock::new(HashMap::new())),
            tail_cap,
        }
    }

    /// Reserves the next global sequence number (1-based).
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Appends one entry: the in-memory tail is updated immediately, the
    /// CSV mirror completes whenever the writer task catches up.
    pub async fn append(&self, entry: FlowLogEntry) {
        {
            let mut tail = self.tail.write().await;
            let ring = tail.entry(entry.session_key.clone()).or_default();
            ring.push_back(entry.clone());
            while ring.len() > self.tail_cap {
                ring.pop_front();
            }
        }

        if self.tx.send(entry).is_err() {
            tracing::warn!(target: "flow_audit", "Writer task gone, CSV mirror lost an entry");
        }
    }

    /// The most recent `n` entries for one session, oldest first.
    pub async fn recent(&self, session_key: &str, n: usize) -> Vec<FlowLogEntry> {
        let tail = self.tail.read().await;
        match tail.get(session_key) {
            Some(ring) => {
                let skip = ring.len().saturating_sub(n);
                ring.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

/// Drains the channel into the CSV file. Writer failures are logged and
/// the stream keeps running — the audit mirror is best-effort by design.
async fn run_writer(csv_path: Option<PathBuf>, mut rx: UnboundedReceiver<FlowLogEntry>) {
    let mut file = match csv_path {
        Some(path) => match open_csv(&path).await {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::error!(
                    target: "flow_audit",
                    "Cannot open audit CSV {path:?}, mirror disabled: {err:#}"
                );
                None
            }
        },
        None => None,
    };

    while let Some(entry) = rx.recv().await {
        let Some(out) = file.as_mut() else { continue };
        let mut row = entry.csv_row();
        row.push('\n');
        if let Err(err) = out.write_all(row.as_bytes()).await {
            tracing::error!(target: "flow_audit", "Audit CSV write failed: {err}");
        }
    }
}

async fn open_csv(path: &PathBuf) -> anyhow::Result<fs::File> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create audit log directory")?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .context("Failed to open audit CSV")?;

    // Fresh file gets the header row.
    if file.metadata().await.map(|m| m.len()).unwrap_or(0) == 0 {
        file.write_all(format!("{}\n", FlowLogEntry::CSV_HEADER).as_bytes())
            .await
            .context("Failed to write audit CSV header")?;
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mesa_core::stage::Stage;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(seq: u64, session: &str) -> FlowLogEntry {
        FlowLogEntry {
            seq,
            at: Utc::now(),
            session_key: session.to_string(),
            stage_before: Stage::AskProblem,
            input: "mi compu no enciende".to_string(),
            trigger: "describe_problem".to_string(),
            reply: "Entiendo".to_string(),
            stage_after: Stage::AskDevice,
            action: "advanced".to_string(),
            duration_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_sequence_numbers_are_strictly_increasing() {
        let stream = FlowAuditStream::new(None, 8);
        let a = stream.next_seq();
        let b = stream.next_seq();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn test_recent_returns_bounded_tail_in_order() {
        let stream = FlowAuditStream::new(None, 3);
        for seq in 1..=5 {
            stream.append(entry(seq, "sess-1")).await;
        }
        stream.append(entry(99, "sess-2")).await;

        let tail = stream.recent("sess-1", 10).await;
        let seqs: Vec<u64> = tail.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);

        let last_two = stream.recent("sess-1", 2).await;
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].seq, 4);

        assert!(stream.recent("unknown", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_csv_mirror_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("flow-audit.csv");
        let stream = FlowAuditStream::new(Some(path.clone()), 8);

        stream.append(entry(1, "sess-1")).await;
        stream.append(entry(2, "sess-1")).await;

        // The mirror is eventually ordered; give the writer task a moment.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], FlowLogEntry::CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,"));
        assert!(lines[2].starts_with("2,"));
    }
}
