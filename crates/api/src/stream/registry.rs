use std::collections::HashMap;

use chrono::Utc;
use testu_core::milestone::{single_line, Milestone};
use testu_core::types::{JobId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing event lines to a status stream.
pub type StreamSender = mpsc::UnboundedSender<String>;

/// Receiver half, drained by the SSE response body.
pub type StreamReceiver = mpsc::UnboundedReceiver<String>;

/// One job's status stream.
struct StreamEntry {
    sender: StreamSender,
    /// Receiver held back until the requester connects; events sent in the
    /// meantime are buffered in the channel.
    parked: Option<StreamReceiver>,
    /// When the entry was reserved or last attached.
    opened_at: Timestamp,
}

/// Maps job identifiers to the requester connection waiting on them.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sending to a job without an entry, or
/// to a requester that has gone away, is a no-op.
pub struct StreamRegistry {
    streams: RwLock<HashMap<JobId, StreamEntry>>,
}

impl StreamRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Create the entry for a newly submitted job before its requester
    /// connects, queueing the "received" milestone.
    pub async fn reserve(&self, job_id: &str) {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(received(job_id));
        let entry = StreamEntry {
            sender: tx,
            parked: Some(rx),
            opened_at: Utc::now(),
        };
        let replaced = self
            .streams
            .write()
            .await
            .insert(job_id.to_string(), entry);
        if replaced.is_some() {
            tracing::warn!(job_id, "Status stream reserved twice; previous entry dropped");
        }
    }

    /// Attach a requester connection and return the receiver its response
    /// body drains.
    ///
    /// A reserved entry hands over its buffered receiver. Otherwise a new
    /// channel replaces any existing entry (the latest connection wins)
    /// and starts with the "received" milestone.
    pub async fn open(&self, job_id: &str) -> StreamReceiver {
        let mut streams = self.streams.write().await;
        attach_locked(&mut streams, job_id)
    }

    /// Like [`open`](Self::open), but only for a job that already has an
    /// entry or that the caller knows to be live. The check and the insert
    /// happen under one lock, so an entry closed concurrently is not
    /// recreated for an unknown job.
    pub async fn attach(&self, job_id: &str, job_live: bool) -> Option<StreamReceiver> {
        let mut streams = self.streams.write().await;
        if !job_live && !streams.contains_key(job_id) {
            return None;
        }
        Some(attach_locked(&mut streams, job_id))
    }

    /// Write one event line to the job's stream.
    ///
    /// Returns whether the line was delivered. A stream whose requester
    /// has disconnected is removed.
    pub async fn relay(&self, job_id: &str, text: &str) -> bool {
        let line = single_line(text);
        let delivered = {
            let streams = self.streams.read().await;
            match streams.get(job_id) {
                Some(entry) => entry.sender.send(line).is_ok(),
                None => {
                    tracing::trace!(job_id, "No status stream; event dropped");
                    return false;
                }
            }
        };
        if !delivered {
            tracing::debug!(job_id, "Requester disconnected; event dropped");
            self.prune_closed(job_id).await;
        }
        delivered
    }

    /// Relay a milestone.
    pub async fn notify(&self, job_id: &str, milestone: &Milestone) -> bool {
        let delivered = self.relay(job_id, &milestone.to_string()).await;
        tracing::debug!(job_id, milestone = milestone.kind(), delivered, "Milestone relayed");
        delivered
    }

    /// End the job's stream. Buffered events are still delivered before
    /// the response body finishes. Returns whether an entry existed.
    pub async fn close(&self, job_id: &str) -> bool {
        let removed = self.streams.write().await.remove(job_id).is_some();
        if removed {
            tracing::info!(job_id, "Status stream closed");
        }
        removed
    }

    /// Whether the job has an entry, attached or not.
    pub async fn is_registered(&self, job_id: &str) -> bool {
        self.streams.read().await.contains_key(job_id)
    }

    /// Remove entries opened before `cutoff` unless `live` says their job
    /// is still waiting or assigned. Returns how many were removed.
    pub async fn expire(&self, cutoff: Timestamp, live: impl Fn(&str) -> bool) -> usize {
        let mut streams = self.streams.write().await;
        let before = streams.len();
        streams.retain(|job_id, entry| entry.opened_at >= cutoff || live(job_id));
        let removed = before - streams.len();
        if removed > 0 {
            tracing::info!(removed, "Expired orphaned status streams");
        }
        removed
    }

    /// Return the current number of entries.
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Close every stream.
    ///
    /// Used during graceful shutdown so long-lived responses finish and
    /// the server can drain.
    pub async fn shutdown_all(&self) {
        let mut streams = self.streams.write().await;
        let count = streams.len();
        streams.clear();
        tracing::info!(count, "Closed all status streams");
    }

    async fn prune_closed(&self, job_id: &str) {
        let mut streams = self.streams.write().await;
        if streams
            .get(job_id)
            .is_some_and(|entry| entry.sender.is_closed())
        {
            streams.remove(job_id);
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn attach_locked(streams: &mut HashMap<JobId, StreamEntry>, job_id: &str) -> StreamReceiver {
    if let Some(entry) = streams.get_mut(job_id) {
        if let Some(rx) = entry.parked.take() {
            entry.opened_at = Utc::now();
            tracing::info!(job_id, "Status stream attached");
            return rx;
        }
        tracing::warn!(job_id, "Status stream reopened; previous connection dropped");
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(received(job_id));
    streams.insert(
        job_id.to_string(),
        StreamEntry {
            sender: tx,
            parked: None,
            opened_at: Utc::now(),
        },
    );
    tracing::info!(job_id, "Status stream opened");
    rx
}

fn received(job_id: &str) -> String {
    Milestone::Received {
        job_id: job_id.to_string(),
    }
    .to_string()
}
