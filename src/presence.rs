//! Advisory presence overlay: which operator is looking at which step for
//! which patient. Purely for human coordination: publishes are
//! fire-and-forget, subscriptions are best-effort, and nothing here may
//! influence the sequencer. A dead channel changes nothing about the
//! workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::workflow::steps::ScreeningStep;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub operator: String,
    pub step: ScreeningStep,
    pub patient_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget presence sink. Implementations must never fail, block,
/// or make the caller wait; the controller calls [`publish`] and moves on.
///
/// [`publish`]: PresenceNotifier::publish
pub trait PresenceNotifier: Send + Sync {
    fn publish(&self, update: PresenceUpdate);
}

/// Presence over a `tokio` broadcast channel: every subscriber sees every
/// update that arrives while it is listening; nobody sees history, ordering
/// across operators is whatever the channel delivers, and lagging receivers
/// lose updates. All of that is acceptable for an advisory overlay.
#[derive(Debug, Clone)]
pub struct BroadcastPresence {
    tx: broadcast::Sender<PresenceUpdate>,
}

impl BroadcastPresence {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceUpdate> {
        self.tx.subscribe()
    }
}

impl PresenceNotifier for BroadcastPresence {
    fn publish(&self, update: PresenceUpdate) {
        // send() only errors when nobody is subscribed; an empty room is
        // not a failure for an advisory broadcast.
        if self.tx.send(update).is_err() {
            debug!("No presence subscribers; update dropped");
        }
    }
}

/// Notifier that discards everything. The workflow behaves identically with
/// this wired in, which is exactly the contract.
#[derive(Debug, Clone, Default)]
pub struct NoopPresence;

impl PresenceNotifier for NoopPresence {
    fn publish(&self, _update: PresenceUpdate) {}
}
