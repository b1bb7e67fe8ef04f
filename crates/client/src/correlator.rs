//! Command correlation
//!
//! Maps outstanding correlation ids to single-assignment result slots.
//! One lock guards the whole map, so registration, resolution, and the
//! disconnect sweep cannot interleave on the same id.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use hermes_core::ResponseEnvelope;

use crate::error::ClientError;

pub(crate) type CommandResult = Result<ResponseEnvelope, ClientError>;

#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<HashMap<String, oneshot::Sender<CommandResult>>>,
}

impl Correlator {
    /// Register a pending command and hand back its result slot.
    ///
    /// Ids are fresh uuids, so no id is registered twice while pending.
    pub fn register(&self, id: &str) -> oneshot::Receiver<CommandResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.to_string(), tx);
        rx
    }

    /// Complete a pending command. Returns false for unknown or late
    /// ids (no waiter: the response is dropped).
    pub fn resolve(&self, id: &str, envelope: ResponseEnvelope) -> bool {
        match self.pending.lock().remove(id) {
            Some(slot) => slot.send(Ok(envelope)).is_ok(),
            None => false,
        }
    }

    /// Fail a pending command. Returns false for unknown or late ids.
    pub fn reject(&self, id: &str, error: ClientError) -> bool {
        match self.pending.lock().remove(id) {
            Some(slot) => slot.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// Drop a pending command without completing it (timeout/cancel
    /// path). A response arriving afterwards finds no waiter.
    pub fn remove(&self, id: &str) {
        self.pending.lock().remove(id);
    }

    /// Reject every command pending at this instant, exactly once each.
    /// Commands registered after the sweep starts are unaffected.
    pub fn reject_all(&self, error: &ClientError) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        for (_, slot) in drained {
            let _ = slot.send(Err(error.clone()));
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
