//! Centralized deadlock detection and resolution.
//!
//! Each worker reports to the [`Coordinator`] whenever it blocks on a read or
//! a write. The run is deadlocked when all active workers are blocked. A
//! deadlock that involves a write-blocked worker is *artificial*: it is caused
//! by a bounded queue and is broken by growing that queue. A deadlock where
//! all workers wait on a read is *genuine*: no token will ever be produced
//! again, so the run is complete.

use std::fmt;

use tracing::{debug, info, warn};

use crate::loom_exports::debug_or_loom_assert;
use crate::loom_exports::sync::{Arc, Condvar, Mutex};
use crate::loom_exports::{lock, wait};
use crate::receiver::{Receiver, ReceiverId};
use crate::simulation::{DeadlockInfo, ExecutionError};
use crate::time::Time;

/// Block counters and receiver registry.
#[derive(Debug, Default)]
struct State {
    read_blocks: usize,
    active_workers: usize,
    /// Receivers on which a writer is currently waiting for room.
    write_blocked: Vec<Receiver>,
    /// All receivers of the run.
    receivers: Vec<Receiver>,
    completed: bool,
}

impl State {
    fn is_deadlocked(&self) -> bool {
        self.read_blocks + self.write_blocked.len() == self.active_workers
    }
}

struct Inner {
    state: Mutex<State>,
    /// Signalling primitive used to notify the run controller of any change
    /// of the counters.
    condvar: Condvar,
    completion_time: Option<Time>,
    max_queue_capacity: Option<usize>,
}

/// Outcome of a successful deadlock resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The capacity of a write-blocked receiver was increased.
    CapacityIncreased {
        /// The receiver that was grown.
        receiver: ReceiverId,
        /// Its new capacity.
        capacity: usize,
    },
    /// All workers were starved on reads: the run is complete and all
    /// receivers were terminated.
    Completed,
}

/// Handle to the shared block counters of a run.
///
/// The handle is cheaply cloneable; all clones refer to the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Creates a coordinator without workers.
    ///
    /// The maximum queue capacity bounds the growth of queues during the
    /// resolution of artificial deadlocks; `None` means unbounded.
    pub fn new(completion_time: Option<Time>, max_queue_capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                condvar: Condvar::new(),
                completion_time,
                max_queue_capacity,
            }),
        }
    }

    /// Returns the completion time of the run, if any.
    pub fn completion_time(&self) -> Option<Time> {
        self.inner.completion_time
    }

    /// Returns the maximum queue capacity, if any.
    pub fn max_queue_capacity(&self) -> Option<usize> {
        self.inner.max_queue_capacity
    }

    pub(crate) fn add_read_block(&self) {
        self.update(|state| state.read_blocks += 1);
    }

    pub(crate) fn remove_read_block(&self) {
        self.update(|state| {
            debug_or_loom_assert!(state.read_blocks > 0);
            state.read_blocks = state.read_blocks.saturating_sub(1);
        });
    }

    pub(crate) fn add_write_block(&self, receiver: &Receiver) {
        self.update(|state| state.write_blocked.push(receiver.clone()));
    }

    pub(crate) fn remove_write_block(&self, receiver: ReceiverId) {
        self.update(|state| {
            if let Some(idx) = state.write_blocked.iter().position(|r| r.id() == receiver) {
                state.write_blocked.swap_remove(idx);
            }
        });
    }

    pub(crate) fn register_worker(&self) {
        self.update(|state| state.active_workers += 1);
    }

    pub(crate) fn deregister_worker(&self) {
        self.update(|state| {
            debug_or_loom_assert!(state.active_workers > 0);
            state.active_workers = state.active_workers.saturating_sub(1);
        });
    }

    pub(crate) fn register_receiver(&self, receiver: Receiver) {
        lock(&self.inner.state).receivers.push(receiver);
    }

    /// Returns the number of workers blocked on a read.
    pub fn read_blocks(&self) -> usize {
        lock(&self.inner.state).read_blocks
    }

    /// Returns the number of workers blocked on a write.
    pub fn write_blocks(&self) -> usize {
        lock(&self.inner.state).write_blocked.len()
    }

    /// Returns the number of workers that have not finished yet.
    pub fn active_workers(&self) -> usize {
        lock(&self.inner.state).active_workers
    }

    /// Returns true if all active workers are blocked.
    pub fn check_deadlock(&self) -> bool {
        lock(&self.inner.state).is_deadlocked()
    }

    /// Blocks until all active workers are blocked or the run is complete.
    pub(crate) fn wait_for_deadlock(&self) {
        let mut state = lock(&self.inner.state);
        while !state.completed && !state.is_deadlocked() {
            state = wait(&self.inner.condvar, state);
        }
    }

    /// Waits for a deadlock and resolves it.
    pub fn fire(&self) -> Result<Resolution, ExecutionError> {
        self.wait_for_deadlock();

        self.resolve_deadlock()
    }

    /// Resolves a deadlock.
    ///
    /// If some workers are blocked on a write, the capacity of the smallest
    /// write-blocked queue is doubled (an empty capacity becomes 1). An error
    /// listing all write-blocked receivers is returned if the new capacity
    /// would exceed the maximum queue capacity.
    ///
    /// Otherwise the run is complete and all receivers are terminated.
    ///
    /// This must only be called while the run is deadlocked.
    pub fn resolve_deadlock(&self) -> Result<Resolution, ExecutionError> {
        let mut state = lock(&self.inner.state);
        if state.completed {
            return Ok(Resolution::Completed);
        }
        if state.write_blocked.is_empty() {
            state.completed = true;
            let receivers = state.receivers.clone();
            let workers = state.active_workers;
            drop(state);

            info!(workers, "read deadlock: run complete");
            for receiver in receivers {
                receiver.request_finish();
            }

            return Ok(Resolution::Completed);
        }

        // Receivers must not be locked while the coordinator lock is held.
        let write_blocked = state.write_blocked.clone();
        drop(state);

        let mut blocked: Vec<(Receiver, usize)> = write_blocked
            .into_iter()
            .map(|receiver| {
                let capacity = receiver.capacity().unwrap_or(usize::MAX);
                (receiver, capacity)
            })
            .collect();
        blocked.sort_by_key(|(receiver, capacity)| (*capacity, receiver.id()));

        let (receiver, capacity) = (&blocked[0].0, blocked[0].1);
        let new_capacity = match capacity {
            0 => Some(1),
            c => c.checked_mul(2),
        };
        let new_capacity = match (new_capacity, self.inner.max_queue_capacity) {
            (Some(c), Some(max)) if c <= max => c,
            (Some(c), None) => c,
            _ => {
                let infos = blocked
                    .iter()
                    .map(|(receiver, capacity)| DeadlockInfo {
                        receiver: receiver.info().clone(),
                        capacity: *capacity,
                    })
                    .collect();

                return Err(ExecutionError::Deadlock(infos));
            }
        };

        warn!(
            receiver = %receiver.info(),
            capacity,
            new_capacity,
            "write deadlock: increasing queue capacity"
        );
        receiver.grow_capacity(new_capacity);

        Ok(Resolution::CapacityIncreased {
            receiver: receiver.id(),
            capacity: new_capacity,
        })
    }

    /// Returns false once the run is complete.
    pub fn postfire(&self) -> bool {
        !lock(&self.inner.state).completed
    }

    /// Terminates all receivers and marks the run as complete.
    pub fn terminate_all(&self) {
        let mut state = lock(&self.inner.state);
        state.completed = true;
        let receivers = state.receivers.clone();
        drop(state);
        self.inner.condvar.notify_all();

        debug!("terminating all receivers");
        for receiver in receivers {
            receiver.request_finish();
        }
    }

    /// Drops the receiver handles held by the coordinator.
    ///
    /// Receivers hold a coordinator handle, so this breaks the reference
    /// cycle once the run is over.
    pub(crate) fn clear(&self) {
        let mut state = lock(&self.inner.state);
        state.receivers.clear();
        state.write_blocked.clear();
    }

    fn update<F: FnOnce(&mut State)>(&self, f: F) {
        let mut state = lock(&self.inner.state);
        f(&mut state);
        drop(state);

        self.inner.condvar.notify_all();
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);

        f.debug_struct("Coordinator")
            .field("read_blocks", &state.read_blocks)
            .field("write_blocks", &state.write_blocked.len())
            .field("active_workers", &state.active_workers)
            .field("completed", &state.completed)
            .finish_non_exhaustive()
    }
}
