//! In-flight tracking per (command kind, session) with deferred acknowledgements

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::domain::entities::{CommandKey, CommandKind, SessionId};

/// How the execution that held back a pending acknowledgement ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Completed,
    Failed,
}

/// A postponed acknowledgement, invoked exactly once when flushed
pub type PendingAck = Box<dyn FnOnce(AckOutcome) + Send>;

/// Result of [`CommandDeferCoordinator::begin_or_defer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller now owns the execution window for the key
    Began { generation: u64 },
    /// An execution is in flight; the acknowledgement was queued behind it
    Deferred,
}

#[derive(Default)]
struct InFlightEntry {
    executing: bool,
    /// Stamp of the execution currently holding the window
    generation: u64,
    pending: Vec<PendingAck>,
}

impl InFlightEntry {
    fn is_idle(&self) -> bool {
        !self.executing && self.pending.is_empty()
    }
}

/// Tracks which command kinds are executing for which sessions.
///
/// Every check-then-act happens inside one critical section that never
/// awaits, so two triggers can never both observe "not in flight". Pending
/// acknowledgements are always invoked after the lock is released.
#[derive(Default)]
pub struct CommandDeferCoordinator {
    entries: Mutex<HashMap<CommandKey, InFlightEntry>>,
    generations: AtomicU64,
}

impl CommandDeferCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CommandKey, InFlightEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn is_in_flight(&self, kind: CommandKind, session_id: &SessionId) -> bool {
        self.lock()
            .get(&CommandKey::new(kind, session_id.clone()))
            .map(|entry| entry.executing)
            .unwrap_or(false)
    }

    /// Mark `kind` as executing for `session_id` and return the execution's generation.
    ///
    /// Callers check [`is_in_flight`](Self::is_in_flight) first, or use
    /// [`begin_or_defer`](Self::begin_or_defer) to do both atomically.
    pub fn begin_execution(&self, kind: CommandKind, session_id: &SessionId) -> u64 {
        let generation = self.next_generation();
        let mut entries = self.lock();
        let entry = entries.entry(CommandKey::new(kind, session_id.clone())).or_default();
        entry.executing = true;
        entry.generation = generation;
        generation
    }

    pub fn defer_pending_ack(&self, kind: CommandKind, session_id: &SessionId, ack: PendingAck) {
        self.lock()
            .entry(CommandKey::new(kind, session_id.clone()))
            .or_default()
            .pending
            .push(ack);
    }

    /// Begin execution when idle, otherwise queue `ack` behind the running one
    pub fn begin_or_defer(&self, kind: CommandKind, session_id: &SessionId, ack: PendingAck) -> Admission {
        let mut entries = self.lock();
        let entry = entries.entry(CommandKey::new(kind, session_id.clone())).or_default();
        if entry.executing {
            entry.pending.push(ack);
            Admission::Deferred
        } else {
            let generation = self.next_generation();
            entry.executing = true;
            entry.generation = generation;
            Admission::Began { generation }
        }
    }

    /// Clear the in-flight flag.
    ///
    /// With `should_flush` every pending acknowledgement runs in arrival
    /// order; without it they stay queued for a later flush.
    pub fn complete_execution(&self, kind: CommandKind, session_id: &SessionId, should_flush: bool) {
        let key = CommandKey::new(kind, session_id.clone());
        let flushed = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&key) else {
                return;
            };
            entry.executing = false;
            let flushed = if should_flush {
                std::mem::take(&mut entry.pending)
            } else {
                Vec::new()
            };
            if entry.is_idle() {
                entries.remove(&key);
            }
            flushed
        };
        run_acks(&key, flushed, AckOutcome::Completed);
    }

    /// Clear the in-flight flag and force-flush pending acknowledgements as failures
    pub fn abort_execution(&self, kind: CommandKind, session_id: &SessionId) {
        let key = CommandKey::new(kind, session_id.clone());
        let flushed = {
            let mut entries = self.lock();
            match entries.remove(&key) {
                Some(entry) => entry.pending,
                None => Vec::new(),
            }
        };
        run_acks(&key, flushed, AckOutcome::Failed);
    }

    /// Flush pending acknowledgements without touching the in-flight flag
    pub fn flush_pending(&self, kind: CommandKind, session_id: &SessionId, outcome: AckOutcome) {
        let key = CommandKey::new(kind, session_id.clone());
        let flushed = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&key) else {
                return;
            };
            let flushed = std::mem::take(&mut entry.pending);
            if entry.is_idle() {
                entries.remove(&key);
            }
            flushed
        };
        run_acks(&key, flushed, outcome);
    }

    /// Drop every entry of a destroyed session; waiting acknowledgements fail
    pub fn clear_session(&self, session_id: &SessionId) {
        let removed: Vec<(CommandKey, InFlightEntry)> = {
            let mut entries = self.lock();
            let keys: Vec<CommandKey> = entries
                .keys()
                .filter(|key| &key.session_id == session_id)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
                .collect()
        };
        for (key, entry) in removed {
            run_acks(&key, entry.pending, AckOutcome::Failed);
        }
    }

    /// Close the execution stamped `generation`.
    ///
    /// A no-op once that execution was superseded, e.g. after the session was
    /// cleared and the key began again.
    fn finish_generation(&self, key: &CommandKey, generation: u64, outcome: AckOutcome) {
        let flushed = {
            let mut entries = self.lock();
            let current = matches!(
                entries.get(key),
                Some(entry) if entry.executing && entry.generation == generation
            );
            if !current {
                tracing::debug!(command = %key, generation, "Ignoring end of a superseded execution");
                return;
            }
            entries.remove(key).map(|entry| entry.pending).unwrap_or_default()
        };
        run_acks(key, flushed, outcome);
    }

    pub fn pending_count(&self, kind: CommandKind, session_id: &SessionId) -> usize {
        self.lock()
            .get(&CommandKey::new(kind, session_id.clone()))
            .map(|entry| entry.pending.len())
            .unwrap_or(0)
    }

    /// Whether any state is tracked for the key
    pub fn is_tracked(&self, kind: CommandKind, session_id: &SessionId) -> bool {
        self.lock().contains_key(&CommandKey::new(kind, session_id.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Owns the execution window of one key and closes it exactly once.
///
/// Dropping an unfinished guard (a panicking or cancelled task) aborts the
/// execution, so a key can never stay in flight forever.
///
/// The guard only ever closes the execution it was created for: once the key
/// was cleared and began again, finishing a stale guard changes nothing.
pub struct ExecutionGuard {
    coordinator: Arc<CommandDeferCoordinator>,
    key: CommandKey,
    generation: u64,
    finished: bool,
}

impl ExecutionGuard {
    pub fn new(
        coordinator: Arc<CommandDeferCoordinator>,
        kind: CommandKind,
        session_id: SessionId,
        generation: u64,
    ) -> Self {
        Self {
            coordinator,
            key: CommandKey::new(kind, session_id),
            generation,
            finished: false,
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clear the in-flight flag and acknowledge everything that waited
    pub fn complete(mut self) {
        self.finished = true;
        self.coordinator
            .finish_generation(&self.key, self.generation, AckOutcome::Completed);
    }

    /// Clear the in-flight flag and fail everything that waited
    pub fn fail(mut self) {
        self.finished = true;
        self.coordinator
            .finish_generation(&self.key, self.generation, AckOutcome::Failed);
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(command = %self.key, "Execution dropped before completing");
            self.coordinator
                .finish_generation(&self.key, self.generation, AckOutcome::Failed);
        }
    }
}

/// An execution window handed over to a follow-up task such as a status refresh.
///
/// It completes only when both the follow-up and the command body succeeded;
/// a body that fails, panics or is dropped fails everything that waited.
pub struct ExecutionHandoff {
    guard: ExecutionGuard,
    body: oneshot::Receiver<bool>,
}

impl ExecutionHandoff {
    /// Wrap `guard`; the returned sender reports whether the body succeeded
    pub fn new(guard: ExecutionGuard) -> (Self, oneshot::Sender<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { guard, body: rx }, tx)
    }

    pub async fn finish(self, follow_up_succeeded: bool) {
        let body_succeeded = self.body.await.unwrap_or(false);
        if follow_up_succeeded && body_succeeded {
            self.guard.complete();
        } else {
            self.guard.fail();
        }
    }
}

fn run_acks(key: &CommandKey, acks: Vec<PendingAck>, outcome: AckOutcome) {
    if acks.is_empty() {
        return;
    }
    tracing::debug!(command = %key, count = acks.len(), ?outcome, "Flushing deferred acknowledgements");
    for ack in acks {
        ack(outcome);
    }
}
