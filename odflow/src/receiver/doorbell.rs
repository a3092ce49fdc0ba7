//! Wake-up signal shared by all receivers of one actor.

use std::fmt;

use crate::coordinator::Coordinator;
use crate::loom_exports::sync::{Condvar, Mutex};
use crate::loom_exports::{lock, wait};

/// State guarded by the doorbell lock.
#[derive(Debug, Default)]
struct State {
    /// Incremented each time a receiver of the actor changes in a way that
    /// may make one of its tokens eligible.
    generation: u64,
    /// Whether the actor is currently accounted as read-blocked.
    read_pending: bool,
}

/// A wake-up signal for the reader of a set of receivers.
///
/// The eligibility of a token depends on the state of all input receivers of
/// an actor, so the reader waits on a single signal rung by any of them.
///
/// A reader that waits is reported to the [`Coordinator`] as read-blocked.
/// The block is removed by whoever rings the doorbell, before the reader is
/// woken, so that the coordinator never observes a transient deadlock.
pub(crate) struct Doorbell {
    state: Mutex<State>,
    condvar: Condvar,
    coordinator: Coordinator,
}

impl Doorbell {
    pub(crate) fn new(coordinator: Coordinator) -> Self {
        Self {
            state: Mutex::new(State::default()),
            condvar: Condvar::new(),
            coordinator,
        }
    }

    /// Returns the current generation.
    ///
    /// The generation must be read before checking the receivers, and the
    /// same value must then be passed to [`Doorbell::wait`].
    pub(crate) fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Notifies the reader that a receiver changed.
    pub(crate) fn ring(&self) {
        let mut state = lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        if state.read_pending {
            state.read_pending = false;
            self.coordinator.remove_read_block();
        }
        drop(state);

        self.condvar.notify_all();
    }

    /// Blocks until the generation differs from `seen`.
    ///
    /// Returns immediately if the doorbell was rung since `seen` was read.
    pub(crate) fn wait(&self, seen: u64) {
        let mut state = lock(&self.state);
        if state.generation != seen {
            return;
        }

        state.read_pending = true;
        self.coordinator.add_read_block();

        while state.generation == seen {
            state = wait(&self.condvar, state);
        }
    }
}

impl fmt::Debug for Doorbell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doorbell").finish_non_exhaustive()
    }
}
