//! Offline outbox: bounded FIFO of telemetry awaiting delivery.
//!
//! Records are buffered while the backend is unreachable and flushed
//! oldest-first by [`Outbox::drain`] once it is reachable again.
//!
//! Policies:
//! - **Full** — the *newest* record is rejected so already-buffered data
//!   survives.  Every rejection is returned as `OutboxError::Full` and
//!   counted.
//! - **Drain** — a record is removed *before* its publish attempt and
//!   released when the call returns, whatever the outcome.  Each record
//!   gets at most one attempt per drain; a failure stops the drain and
//!   leaves the remaining records queued for the next reachable
//!   transition.

use heapless::{Deque, String, Vec};
use log::{debug, info, warn};

use crate::app::ports::BackendPort;
use crate::config::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::error::{BackendError, OutboxError};

/// Backend topic identifier.
pub type Topic = String<MAX_TOPIC_LEN>;

/// Encoded record bytes.
pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// One buffered telemetry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    pub topic: Topic,
    pub payload: Payload,
    /// Monotonic time the record was buffered (ms).
    pub queued_at_ms: u64,
}

impl OutboxRecord {
    /// Build a record, copying `topic` and `payload` into fixed storage.
    pub fn new(topic: &str, payload: &[u8], queued_at_ms: u64) -> Result<Self, OutboxError> {
        let topic = Topic::try_from(topic).map_err(|_| OutboxError::PayloadTooLarge)?;
        let payload = Payload::from_slice(payload).map_err(|_| OutboxError::PayloadTooLarge)?;
        Ok(Self {
            topic,
            payload,
            queued_at_ms,
        })
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Records the backend accepted.
    pub published: usize,
    /// The error that stopped the drain, if any.  The record whose
    /// publish failed has been released.
    pub failed: Option<BackendError>,
    /// Records still buffered.
    pub remaining: usize,
}

/// Fixed-capacity outbox.
pub struct Outbox<const M: usize> {
    records: Deque<OutboxRecord, M>,
    rejected: u32,
}

impl<const M: usize> Default for Outbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const M: usize> Outbox<M> {
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            rejected: 0,
        }
    }

    /// Append a record.  Rejects it (and counts the rejection) when full.
    pub fn enqueue(&mut self, record: OutboxRecord) -> Result<(), OutboxError> {
        match self.records.push_back(record) {
            Ok(()) => {
                debug!("Outbox: buffered record ({}/{})", self.records.len(), M);
                Ok(())
            }
            Err(rejected) => {
                self.rejected = self.rejected.saturating_add(1);
                warn!(
                    "Outbox full ({}), rejected '{}' record (total rejected: {})",
                    M, rejected.topic, self.rejected
                );
                Err(OutboxError::Full)
            }
        }
    }

    /// Publish buffered records oldest-first, one attempt each, stopping
    /// at the first failure.
    ///
    /// Callers invoke this only while the backend is reachable.
    pub fn drain(&mut self, backend: &mut impl BackendPort) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(record) = self.records.pop_front() {
            match backend.publish(&record.topic, &record.payload) {
                Ok(()) => report.published += 1,
                Err(e) => {
                    warn!(
                        "Outbox: publish of '{}' failed ({}), stopping drain",
                        record.topic, e
                    );
                    report.failed = Some(e);
                    break;
                }
            }
        }

        report.remaining = self.records.len();
        info!(
            "Outbox drained: {} published, {} remaining",
            report.published, report.remaining
        );
        report
    }

    /// Oldest buffered record.
    pub fn front(&self) -> Option<&OutboxRecord> {
        self.records.front()
    }

    /// Buffered records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OutboxRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.is_full()
    }

    pub const fn capacity(&self) -> usize {
        M
    }

    /// Total records rejected because the outbox was full.
    pub fn rejected_count(&self) -> u32 {
        self.rejected
    }
}
