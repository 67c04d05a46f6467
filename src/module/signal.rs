//! Completion signals
//!
//! One-shot, per-name broadcast primitives. Each registered module name owns a
//! signal that starts `Pending` and becomes `Satisfied` once that module's
//! enable callback has returned. The single writer is handed out by
//! [`CompletionSignalTable::take_writer`] and consumed by
//! [`CompletionWriter::satisfy`]; any number of [`CompletionWaiter`]s may wait.
//!
//! Dropping a writer without satisfying it abandons the signal: waiters are
//! woken with [`SignalAbandoned`] instead of waiting forever.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// The writer of a signal went away without satisfying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalAbandoned {
    pub name: String,
}

/// Observed state of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Writer still present (in the table or held by a task)
    Pending,
    /// Satisfied (terminal)
    Satisfied,
    /// Writer dropped without satisfying
    Abandoned,
}

struct Slot {
    rx: watch::Receiver<bool>,
    writer: Option<watch::Sender<bool>>,
}

impl Slot {
    fn pending() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            writer: Some(tx),
        }
    }

    fn state(&self) -> SignalState {
        if *self.rx.borrow() {
            SignalState::Satisfied
        } else if self.writer.is_some() || self.rx.has_changed().is_ok() {
            SignalState::Pending
        } else {
            SignalState::Abandoned
        }
    }
}

/// Concurrent mapping of module name to completion signal
#[derive(Default)]
pub struct CompletionSignalTable {
    slots: Mutex<HashMap<String, Slot>>,
}

impl CompletionSignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending signal for `name`, replacing any previous one
    pub fn arm(&self, name: &str) {
        debug!("Arming completion signal for {}", name);
        self.lock().insert(name.to_string(), Slot::pending());
    }

    /// Re-arm `name` if its previous writer was dropped unsatisfied
    ///
    /// Returns `true` when a fresh pending signal was installed.
    pub fn rearm_if_abandoned(&self, name: &str) -> bool {
        let mut slots = self.lock();
        match slots.get(name).map(Slot::state) {
            Some(SignalState::Abandoned) => {
                debug!("Re-arming abandoned completion signal for {}", name);
                slots.insert(name.to_string(), Slot::pending());
                true
            }
            _ => false,
        }
    }

    /// Take the single writer for `name`
    ///
    /// Returns `None` if there is no signal or its writer was already taken.
    pub fn take_writer(&self, name: &str) -> Option<CompletionWriter> {
        let mut slots = self.lock();
        let tx = slots.get_mut(name)?.writer.take()?;
        Some(CompletionWriter {
            name: name.to_string(),
            tx,
        })
    }

    /// Get a waiter for `name`
    pub fn waiter(&self, name: &str) -> Option<CompletionWaiter> {
        self.lock().get(name).map(|slot| CompletionWaiter {
            name: name.to_string(),
            rx: slot.rx.clone(),
        })
    }

    pub fn state(&self, name: &str) -> Option<SignalState> {
        self.lock().get(name).map(Slot::state)
    }

    /// Drop the signal for `name`
    pub fn remove(&self, name: &str) {
        self.lock().remove(name);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CompletionSignalTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_map()
            .entries(slots.iter().map(|(name, slot)| (name, slot.state())))
            .finish()
    }
}

/// Exclusive writer of one signal
#[derive(Debug)]
pub struct CompletionWriter {
    name: String,
    tx: watch::Sender<bool>,
}

impl CompletionWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transition the signal to `Satisfied` and wake every waiter
    pub fn satisfy(self) {
        debug!("Completion signal satisfied for {}", self.name);
        self.tx.send_replace(true);
    }
}

/// Reader side of one signal
#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    name: String,
    rx: watch::Receiver<bool>,
}

impl CompletionWaiter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the signal is satisfied
    pub async fn wait(mut self) -> Result<(), SignalAbandoned> {
        self.rx
            .wait_for(|satisfied| *satisfied)
            .await
            .map(|_| ())
            .map_err(|_| SignalAbandoned { name: self.name })
    }

    pub fn is_satisfied(&self) -> bool {
        *self.rx.borrow()
    }
}
