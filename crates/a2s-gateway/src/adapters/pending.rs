//! Correlation table - the async-to-sync bridge between a waiting HTTP request
//! and the webhook that eventually completes it.
//!
//! Flow:
//! 1. Bridge generates a CallbackId
//! 2. Bridge calls `register()` to get a [`WaitHandle`]
//! 3. Bridge dispatches the outbound request carrying the CallbackId
//! 4. Callback receiver calls `deliver()` when the webhook arrives
//! 5. Bridge awaits the handle, bounded by the target deadline
//!
//! Every operation holds the DashMap shard lock for the key across its
//! check and its mutation, so `deliver` and `remove` on the same id are
//! totally ordered.

use crate::domain::correlation::CallbackId;
use crate::domain::error::BridgeError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Who delivered a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySource {
    /// Peer address of the callback request, when known
    pub remote_addr: Option<SocketAddr>,
    /// `User-Agent` header of the callback request
    pub user_agent: Option<String>,
    /// When the callback arrived
    pub received_at: DateTime<Utc>,
}

impl DeliverySource {
    pub fn new(remote_addr: Option<SocketAddr>, user_agent: Option<String>) -> Self {
        Self {
            remote_addr,
            user_agent,
            received_at: Utc::now(),
        }
    }

    /// Source with no peer information (in-process deliveries, tests)
    pub fn unknown() -> Self {
        Self::new(None, None)
    }
}

/// Payload handed from the receiver to the waiting bridge
#[derive(Debug)]
pub struct Delivery {
    /// Callback ID this delivery is for
    pub callback_id: CallbackId,
    /// Raw callback body, unparsed
    pub payload: Bytes,
    /// Who delivered it
    pub source: DeliverySource,
    /// Time between registration and delivery
    pub wait_time: Duration,
}

/// Result of waiting on a [`WaitHandle`]
#[derive(Debug)]
pub enum WaitOutcome {
    /// A callback was delivered before the deadline
    Delivered(Delivery),
    /// The deadline elapsed first
    TimedOut,
    /// The signal was dropped without a delivery. Only possible if the entry
    /// was removed by someone other than the owning handle.
    Abandoned,
}

/// One outstanding bridge
struct PendingWait {
    /// Single-fire signal; `None` once a delivery has been accepted
    sender: Option<oneshot::Sender<Delivery>>,
    /// When the wait was registered
    created_at: Instant,
    /// Target request id (for logging)
    request_id: String,
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct TableStats {
    /// Total waits registered
    pub total_registered: AtomicU64,
    /// Total deliveries accepted
    pub total_delivered: AtomicU64,
    /// Deliveries rejected (unknown, already fulfilled or abandoned)
    pub total_rejected: AtomicU64,
    /// Total entries removed
    pub total_removed: AtomicU64,
}

/// Mapping from callback ID to pending wait.
///
/// Shared by all concurrent bridge and receiver invocations.
#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<CallbackId, PendingWait>,
    stats: TableStats,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending wait for `callback_id`.
    ///
    /// Fails with [`BridgeError::DuplicateId`] if the id is already present.
    /// The returned handle removes the entry when dropped.
    pub fn register(
        &self,
        callback_id: CallbackId,
        request_id: &str,
    ) -> Result<WaitHandle<'_>, BridgeError> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(callback_id) {
            Entry::Occupied(_) => return Err(BridgeError::DuplicateId(callback_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingWait {
                    sender: Some(tx),
                    created_at: Instant::now(),
                    request_id: request_id.to_string(),
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            callback_id = %callback_id,
            request_id = request_id,
            "Registered pending wait"
        );

        Ok(WaitHandle {
            table: self,
            callback_id,
            receiver: rx,
        })
    }

    /// Hand a callback payload to the matching pending wait.
    ///
    /// Returns false if no wait exists for the id, if it was already
    /// fulfilled, or if its owner has gone away. Only the first delivery for
    /// an id can succeed.
    pub fn deliver(&self, callback_id: &CallbackId, payload: Bytes, source: DeliverySource) -> bool {
        let Some(mut wait) = self.pending.get_mut(callback_id) else {
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(callback_id = %callback_id, "Callback for unknown or expired id");
            return false;
        };

        let Some(sender) = wait.sender.take() else {
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                callback_id = %callback_id,
                request_id = %wait.request_id,
                "Callback for already fulfilled id"
            );
            return false;
        };

        let wait_time = wait.created_at.elapsed();
        let delivery = Delivery {
            callback_id: *callback_id,
            payload,
            source,
            wait_time,
        };

        // Sent while the shard guard is held, so a concurrent remove() either
        // runs before this (we saw no entry) or after the send completed.
        match sender.send(delivery) {
            Ok(()) => {
                self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    callback_id = %callback_id,
                    request_id = %wait.request_id,
                    wait_time_ms = wait_time.as_millis(),
                    "Delivered callback"
                );
                true
            }
            Err(_) => {
                // Receiver dropped: the bridge request went away
                self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    callback_id = %callback_id,
                    request_id = %wait.request_id,
                    "Pending wait receiver dropped"
                );
                false
            }
        }
    }

    /// Remove the entry for `callback_id`. Idempotent.
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&self, callback_id: &CallbackId) -> bool {
        if self.pending.remove(callback_id).is_some() {
            self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Snapshot of the currently pending callback ids
    pub fn list_pending(&self) -> Vec<CallbackId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if a callback ID is pending
    pub fn is_pending(&self, callback_id: &CallbackId) -> bool {
        self.pending.contains_key(callback_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    /// Counters as JSON (admin endpoint)
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::json!({
            "registered": self.stats.total_registered.load(Ordering::Relaxed),
            "delivered": self.stats.total_delivered.load(Ordering::Relaxed),
            "rejected": self.stats.total_rejected.load(Ordering::Relaxed),
            "removed": self.stats.total_removed.load(Ordering::Relaxed),
        })
    }
}

/// Owning side of a pending wait.
///
/// Dropping the handle removes the table entry, so the entry cannot outlive
/// the request that registered it even if that request is cancelled.
pub struct WaitHandle<'a> {
    table: &'a CorrelationTable,
    callback_id: CallbackId,
    receiver: oneshot::Receiver<Delivery>,
}

impl WaitHandle<'_> {
    /// Suspend until a delivery arrives or `deadline` elapses.
    ///
    /// When the deadline fires the entry is removed first and the channel is
    /// checked once more: a delivery that got in before the removal wins,
    /// anything later finds no entry. So the caller sees exactly one of
    /// delivery or timeout.
    pub async fn wait(mut self, deadline: Duration) -> WaitOutcome {
        match tokio::time::timeout(deadline, &mut self.receiver).await {
            Ok(Ok(delivery)) => WaitOutcome::Delivered(delivery),
            Ok(Err(_)) => {
                warn!(
                    callback_id = %self.callback_id,
                    "Pending wait signal dropped without delivery"
                );
                WaitOutcome::Abandoned
            }
            Err(_) => {
                self.table.remove(&self.callback_id);
                match self.receiver.try_recv() {
                    Ok(delivery) => WaitOutcome::Delivered(delivery),
                    Err(_) => WaitOutcome::TimedOut,
                }
            }
        }
    }
}

impl Drop for WaitHandle<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.callback_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn payload(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[tokio::test]
    async fn test_register_and_deliver() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();

        let handle = table.register(id, "t1").unwrap();
        assert!(table.is_pending(&id));
        assert_eq!(table.len(), 1);

        assert!(table.deliver(&id, payload(r#"{"b":2}"#), DeliverySource::unknown()));

        match handle.wait(Duration::from_secs(5)).await {
            WaitOutcome::Delivered(d) => {
                assert_eq!(d.callback_id, id);
                assert_eq!(&d.payload[..], br#"{"b":2}"#);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_register_is_rejected() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();

        let _handle = table.register(id, "t1").unwrap();
        assert!(matches!(
            table.register(id, "t1"),
            Err(BridgeError::DuplicateId(dup)) if dup == id
        ));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_unknown_id() {
        let table = CorrelationTable::new();
        assert!(!table.deliver(&CallbackId::new(), payload("{}"), DeliverySource::unknown()));
        assert!(table.is_empty());
        assert_eq!(table.stats().total_rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_first_delivery_wins() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();
        let handle = table.register(id, "t1").unwrap();

        assert!(table.deliver(&id, payload("1"), DeliverySource::unknown()));
        assert!(!table.deliver(&id, payload("2"), DeliverySource::unknown()));

        match handle.wait(Duration::from_secs(1)).await {
            WaitOutcome::Delivered(d) => assert_eq!(&d.payload[..], b"1"),
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_and_removes_entry() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();
        let handle = table.register(id, "t1").unwrap();

        let outcome = handle.wait(Duration::from_secs(1)).await;
        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(!table.is_pending(&id));

        // Late delivery finds nothing
        assert!(!table.deliver(&id, payload("{}"), DeliverySource::unknown()));
    }

    #[tokio::test]
    async fn test_dropped_handle_removes_entry() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();

        {
            let _handle = table.register(id, "t1").unwrap();
            assert!(table.is_pending(&id));
        }

        assert!(!table.is_pending(&id));
        assert!(!table.deliver(&id, payload("{}"), DeliverySource::unknown()));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();
        let handle = table.register(id, "t1").unwrap();

        assert!(table.remove(&id));
        assert!(!table.remove(&id));
        drop(handle);
        assert_eq!(table.stats().total_removed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_list_pending_is_snapshot() {
        let table = CorrelationTable::new();
        let a = CallbackId::new();
        let b = CallbackId::new();
        let _ha = table.register(a, "t1").unwrap();
        let hb = table.register(b, "t2").unwrap();

        let snapshot = table.list_pending();
        drop(hb);

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&a) && snapshot.contains(&b));
        assert_eq!(table.list_pending(), vec![a]);
    }

    #[tokio::test]
    async fn test_wait_abandoned_when_entry_removed_externally() {
        let table = CorrelationTable::new();
        let id = CallbackId::new();
        let handle = table.register(id, "t1").unwrap();

        table.remove(&id);
        assert!(matches!(
            handle.wait(Duration::from_secs(1)).await,
            WaitOutcome::Abandoned
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let table = CorrelationTable::new();
        let id1 = CallbackId::new();
        let id2 = CallbackId::new();

        let _h1 = table.register(id1, "t1").unwrap();
        let h2 = table.register(id2, "t1").unwrap();
        assert_eq!(table.stats().total_registered.load(Ordering::Relaxed), 2);

        table.deliver(&id1, payload("{}"), DeliverySource::unknown());
        assert_eq!(table.stats().total_delivered.load(Ordering::Relaxed), 1);

        drop(h2);
        let json = table.stats_json();
        assert_eq!(json["removed"], 1);
    }

    /// Fire a delivery and the deadline at the same instant many times.
    /// Each round must settle on exactly one outcome and leave the table empty.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delivery_racing_deadline_has_single_outcome() {
        let table = Arc::new(CorrelationTable::new());

        for _ in 0..300 {
            let id = CallbackId::new();
            let waiter = {
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    let handle = table.register(id, "race").unwrap();
                    handle.wait(Duration::from_millis(1)).await
                })
            };

            // Spin until the waiter has registered, then race it
            while !table.is_pending(&id) && !waiter.is_finished() {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_micros(900)).await;
            let delivered = table.deliver(&id, payload("{}"), DeliverySource::unknown());

            let outcome = waiter.await.unwrap();
            match outcome {
                WaitOutcome::Delivered(_) => assert!(delivered, "delivery observed but not acknowledged"),
                WaitOutcome::TimedOut => assert!(!delivered, "acknowledged delivery was lost"),
                WaitOutcome::Abandoned => panic!("waiter abandoned"),
            }
            assert!(!table.is_pending(&id));
        }

        assert!(table.is_empty());
    }

    /// Two callbacks for the same id land at once. Exactly one is accepted
    /// and the waiter receives that one.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_have_single_winner() {
        let table = Arc::new(CorrelationTable::new());
        let rounds = 300;

        for round in 0..rounds {
            let id = CallbackId::new();
            let handle = table.register(id, "race").unwrap();

            let deliver = |body: &'static str| {
                let table = Arc::clone(&table);
                tokio::spawn(async move { table.deliver(&id, payload(body), DeliverySource::unknown()) })
            };
            let (first, second) = (deliver("a"), deliver("b"));
            let (a, b) = (first.await.unwrap(), second.await.unwrap());
            assert!(a ^ b, "round {round}: a={a} b={b}");

            match handle.wait(Duration::from_secs(1)).await {
                WaitOutcome::Delivered(d) => {
                    let expected: &[u8] = if a { b"a" } else { b"b" };
                    assert_eq!(&d.payload[..], expected);
                }
                other => panic!("round {round}: expected delivery, got {other:?}"),
            }
            assert!(!table.is_pending(&id));
        }

        assert!(table.is_empty());
        assert_eq!(table.stats().total_delivered.load(Ordering::Relaxed), rounds);
        assert_eq!(table.stats().total_rejected.load(Ordering::Relaxed), rounds);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_events_name_request_id_field() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_target(true)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let table = CorrelationTable::new();
            let id = CallbackId::new();
            let _handle = table.register(id, "t1").unwrap();
            assert!(table.deliver(&id, payload("{}"), DeliverySource::unknown()));
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let events: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event["fields"]["request_id"], "t1");
            assert!(event["fields"].get("target").is_none());
            assert_eq!(event["target"], "a2s_gateway::adapters::pending");
        }
    }
}
