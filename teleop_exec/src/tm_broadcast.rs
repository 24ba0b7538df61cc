//! # Telemetry broadcaster
//!
//! Fans each telemetry record out to every registered sink. Delivery is best effort and at most
//! once: a sink that is full loses the record, a sink that is closed is removed, and neither
//! affects delivery to the others.
//!
//! The subscriber set is snapshotted before delivery so that sinks may subscribe or unsubscribe
//! from other threads while a broadcast is in progress.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, Receiver, SyncSender, TrySendError},
    Arc, Mutex, PoisonError,
};
use log::debug;

use crate::telemetry::TelemetryRecord;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which accepts telemetry records.
///
/// Implementations must not block.
pub trait TmSink: Send + Sync {
    fn deliver(&self, record: &TelemetryRecord) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The sink can't accept the record right now, the record is lost.
    #[error("The sink is full")]
    Full,

    /// The sink will never accept records again.
    #[error("The sink is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Identifies a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The set of telemetry subscribers.
#[derive(Default)]
pub struct TmBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn TmSink>>>,
    next_id: AtomicU64,
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of sinks which accepted the record
    pub delivered: usize,

    /// Number of sinks which were full and skipped
    pub skipped: usize,

    /// Number of sinks which were closed and have been removed
    pub dropped: usize,
}

/// A sink backed by a bounded channel.
pub struct ChannelSink {
    tx: SyncSender<TelemetryRecord>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TmBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink, returning the ID to unsubscribe it with.
    pub fn subscribe(&self, sink: Arc<dyn TmSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.lock().insert(id, sink);
        debug!("Telemetry subscriber {:?} added", id);

        id
    }

    /// Remove a sink. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn num_subscribers(&self) -> usize {
        self.lock().len()
    }

    /// Deliver a record to every subscriber.
    pub fn broadcast(&self, record: &TelemetryRecord) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        // Snapshot the set so the lock isn't held while delivering
        let sinks: Vec<(SubscriberId, Arc<dyn TmSink>)> = self
            .lock()
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();

        if sinks.is_empty() {
            return report;
        }

        let mut closed = Vec::new();

        for (id, sink) in sinks.iter() {
            match sink.deliver(record) {
                Ok(()) => report.delivered += 1,
                Err(SinkError::Full) => report.skipped += 1,
                Err(SinkError::Closed) => closed.push(*id),
            }
        }

        // Reconcile removals
        if !closed.is_empty() {
            let mut subs = self.lock();
            for id in closed {
                if subs.remove(&id).is_some() {
                    debug!("Telemetry subscriber {:?} closed, removed", id);
                    report.dropped += 1;
                }
            }
        }

        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Arc<dyn TmSink>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelSink {
    /// Create a sink and the receiver for the records it accepts.
    ///
    /// `capacity` records may be queued before the sink reports itself full.
    pub fn channel(capacity: usize) -> (Self, Receiver<TelemetryRecord>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx }, rx)
    }
}

impl TmSink for ChannelSink {
    fn deliver(&self, record: &TelemetryRecord) -> Result<(), SinkError> {
        self.tx.try_send(*record).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Closed,
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Utc::now(),
            battery_pct: 50.0,
            speed_mps: 0.0,
            throttle: 0.0,
            steering: 0.0,
            armed: false,
            estop: false,
        }
    }

    #[test]
    fn test_no_subscribers() {
        let b = TmBroadcaster::new();
        assert_eq!(b.broadcast(&record()), BroadcastReport::default());
    }

    #[test]
    fn test_full_sink_is_kept() {
        let b = TmBroadcaster::new();
        let (sink, rx) = ChannelSink::channel(1);
        b.subscribe(Arc::new(sink));

        assert_eq!(b.broadcast(&record()).delivered, 1);
        assert_eq!(b.broadcast(&record()).skipped, 1);
        assert_eq!(b.num_subscribers(), 1);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let b = TmBroadcaster::new();
        let (sink, _rx) = ChannelSink::channel(1);
        let id = b.subscribe(Arc::new(sink));

        assert!(b.unsubscribe(id));
        assert!(!b.unsubscribe(id));
        assert_eq!(b.num_subscribers(), 0);
    }
}
