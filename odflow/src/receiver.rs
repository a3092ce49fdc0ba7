//! Time-stamped receivers with blocking reads and writes.
//!
//! A [`Receiver`] buffers the tokens flowing through one connection between
//! two actors. Writes block while the queue is full and reads block until a
//! token is *eligible*, i.e. until it is the most urgent token among all the
//! receivers of the reading actor. Both report their blocked state to the
//! [`Coordinator`] so that global deadlocks can be detected.

mod doorbell;
mod timed_queue;

use std::fmt;

use tracing::{debug, trace};

use crate::actor::ActorError;
use crate::coordinator::Coordinator;
use crate::loom_exports::sync::{Arc, Condvar, Mutex};
use crate::loom_exports::{lock, wait};
use crate::time::{Head, RcvrTimeTriple, Time, TimeKeeper};
use crate::token::Token;

pub(crate) use doorbell::Doorbell;
pub use timed_queue::{Event, QueueError, TimedQueueReceiver};

/// Unique identifier of a receiver within a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiverId(usize);

impl ReceiverId {
    pub(crate) const fn from_raw(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw index of the receiver.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of a receiver in the graph, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverInfo {
    /// Name of the actor reading from the receiver.
    pub actor: String,
    /// Input port of the actor.
    pub port: usize,
    /// Channel within the input port.
    pub channel: usize,
}

impl fmt::Display for ReceiverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in{}[{}]", self.actor, self.port, self.channel)
    }
}

/// State guarded by the receiver lock.
#[derive(Debug)]
struct State {
    queue: TimedQueueReceiver,
    terminated: bool,
    write_pending: bool,
}

/// Data shared between the writer, the reader and the coordinator.
struct Inner {
    info: ReceiverInfo,
    state: Mutex<State>,
    /// Signalling primitive used to notify a writer blocked on a full queue.
    space: Condvar,
    /// Signalling primitive used to notify the reading actor.
    doorbell: Arc<Doorbell>,
    coordinator: Coordinator,
    completion_time: Option<Time>,
}

/// A blocking receiver of time-stamped tokens.
///
/// This is a cheaply cloneable handle: the writing actor, the reading actor
/// and the coordinator all hold one.
#[derive(Clone)]
pub struct Receiver {
    id: ReceiverId,
    inner: Arc<Inner>,
}

impl Receiver {
    /// Creates a new receiver.
    ///
    /// A `None` capacity means that the queue is unbounded, and a `None`
    /// completion time means that time stamps are not bounded.
    pub(crate) fn new(
        id: ReceiverId,
        info: ReceiverInfo,
        priority: i32,
        capacity: Option<usize>,
        completion_time: Option<Time>,
        coordinator: Coordinator,
        doorbell: Arc<Doorbell>,
    ) -> Self {
        Self {
            id,
            inner: Arc::new(Inner {
                info,
                state: Mutex::new(State {
                    queue: TimedQueueReceiver::new(id, priority, capacity),
                    terminated: false,
                    write_pending: false,
                }),
                space: Condvar::new(),
                doorbell,
                coordinator,
                completion_time,
            }),
        }
    }

    /// Returns the identifier of the receiver.
    pub fn id(&self) -> ReceiverId {
        self.id
    }

    /// Returns the location of the receiver in the graph.
    pub fn info(&self) -> &ReceiverInfo {
        &self.inner.info
    }

    /// Appends a token, if necessary waiting until the queue has room.
    ///
    /// If the time stamp exceeds the completion time, the token is discarded
    /// and a terminate event is appended instead.
    ///
    /// An error is returned if the receiver was terminated, or if the time
    /// stamp is earlier than that of the previous token.
    pub fn put(&self, token: Token, time: Time) -> Result<(), ActorError> {
        let (token, time) = match self.inner.completion_time {
            Some(completion) if !time.is_inactive() && time > completion => {
                trace!(receiver = %self.inner.info, %time, "time stamp past completion time");

                (Token::Null, Time::INACTIVE)
            }
            _ => (token, time),
        };

        let mut state = lock(&self.inner.state);
        loop {
            if state.terminated {
                if state.write_pending {
                    state.write_pending = false;
                    self.inner.coordinator.remove_write_block(self.id);
                }
                return Err(ActorError::Terminated);
            }

            if state.queue.has_room() {
                let notification = state.queue.put(token, time)?;
                drop(state);

                if notification.is_some() {
                    self.inner.doorbell.ring();
                }

                return Ok(());
            }

            if !state.write_pending {
                debug!(receiver = %self.inner.info, "write blocked");
                state.write_pending = true;
                self.inner.coordinator.add_write_block(self);
            }
            state = wait(&self.inner.space, state);
        }
    }

    /// Pops the oldest token if it is eligible, without blocking.
    ///
    /// The token is eligible if the receiver time is not later than the next
    /// time of the time keeper and if, in case several receivers share that
    /// time, this receiver is the one to be read next: receivers holding a
    /// null token give way to the others, then the highest priority wins. The
    /// fresh state of this receiver is folded into the time keeper
    /// beforehand.
    ///
    /// An error is returned if the receiver was terminated or if its lane is
    /// finished, i.e. if its oldest event is a terminate event.
    pub fn try_get(&self, keeper: &mut TimeKeeper) -> Result<Option<Token>, ActorError> {
        let mut state = lock(&self.inner.state);
        if state.terminated {
            return Err(ActorError::Terminated);
        }

        keeper.update_rcvr_list(state.queue.triple());
        let rcvr_time = state.queue.rcvr_time();
        if rcvr_time.is_inactive() {
            return Err(ActorError::Terminated);
        }
        if !state.queue.has_token() || !self.is_eligible(&state.queue, keeper) {
            return Ok(None);
        }

        let token = state.queue.get(keeper)?;

        if state.write_pending {
            state.write_pending = false;
            self.inner.coordinator.remove_write_block(self.id);
            drop(state);
            self.inner.space.notify_all();
        }

        Ok(Some(token))
    }

    /// Pops the oldest token if it is an eligible null token, without
    /// blocking.
    ///
    /// Returns true if a null token was consumed.
    pub(crate) fn skip_null_token(&self, keeper: &mut TimeKeeper) -> Result<bool, ActorError> {
        let mut state = lock(&self.inner.state);
        if state.terminated || state.queue.head() != Head::Null {
            return Ok(false);
        }

        keeper.update_rcvr_list(state.queue.triple());
        if state.queue.rcvr_time().is_inactive() || !self.is_eligible(&state.queue, keeper) {
            return Ok(false);
        }
        state.queue.get(keeper)?;
        trace!(receiver = %self.inner.info, "null token consumed");

        if state.write_pending {
            state.write_pending = false;
            self.inner.coordinator.remove_write_block(self.id);
            drop(state);
            self.inner.space.notify_all();
        }

        Ok(true)
    }

    /// Pops the oldest token, if necessary waiting until it becomes eligible.
    ///
    /// See [`Receiver::try_get`] for the eligibility rule. Null tokens that
    /// hold back this receiver from the other receivers of the time keeper
    /// are consumed on the way. While waiting, the reading actor is reported
    /// to the coordinator as read-blocked.
    pub fn get(&self, keeper: &mut TimeKeeper) -> Result<Token, ActorError> {
        loop {
            let seen = self.inner.doorbell.generation();
            keeper.resort();
            if let Some(token) = self.try_get(keeper)? {
                return Ok(token);
            }
            if keeper.skip_null_token()? {
                continue;
            }
            self.inner.doorbell.wait(seen);
        }
    }

    /// Terminates the receiver and wakes up all waiting actors.
    ///
    /// All subsequent reads and writes fail with [`ActorError::Terminated`].
    /// A blocked writer or reader stops being accounted as blocked before
    /// this method returns.
    pub fn request_finish(&self) {
        let mut state = lock(&self.inner.state);
        if state.terminated {
            return;
        }
        state.terminated = true;
        // The writer is released now, not when it gets to run.
        if state.write_pending {
            state.write_pending = false;
            self.inner.coordinator.remove_write_block(self.id);
        }
        drop(state);

        self.inner.space.notify_all();
        self.inner.doorbell.ring();
    }

    /// Returns true if the receiver was terminated.
    pub fn is_terminated(&self) -> bool {
        lock(&self.inner.state).terminated
    }

    /// Increases the capacity of the queue and wakes up a blocked writer.
    ///
    /// This is used by the coordinator to resolve artificial deadlocks.
    pub(crate) fn grow_capacity(&self, capacity: usize) {
        let mut state = lock(&self.inner.state);
        state.queue.set_capacity(Some(capacity));
        if state.write_pending {
            state.write_pending = false;
            self.inner.coordinator.remove_write_block(self.id);
        }
        drop(state);

        self.inner.space.notify_all();
    }

    /// Returns true if a token can be appended without blocking.
    pub fn has_room(&self) -> bool {
        lock(&self.inner.state).queue.has_room()
    }

    /// Returns true if the queue holds at least one event.
    pub fn has_token(&self) -> bool {
        lock(&self.inner.state).queue.has_token()
    }

    /// Returns the capacity of the queue, or `None` if it is unbounded.
    pub fn capacity(&self) -> Option<usize> {
        lock(&self.inner.state).queue.capacity()
    }

    /// Returns the time of the newest event.
    pub fn last_time(&self) -> Time {
        lock(&self.inner.state).queue.last_time()
    }

    /// Returns the time of the oldest event, or the last time if empty.
    pub fn rcvr_time(&self) -> Time {
        lock(&self.inner.state).queue.rcvr_time()
    }

    /// Returns the static priority.
    pub fn priority(&self) -> i32 {
        lock(&self.inner.state).queue.priority()
    }

    /// Returns a snapshot of the receiver time and priority.
    pub fn triple(&self) -> RcvrTimeTriple {
        lock(&self.inner.state).queue.triple()
    }

    /// Returns the kind of the oldest event.
    pub(crate) fn head(&self) -> Head {
        lock(&self.inner.state).queue.head()
    }

    /// Checks the ordering rule for a receiver holding a token.
    ///
    /// On a tie the locks of the other tied receivers are taken while this
    /// receiver's lock is held. Only the reading actor nests receiver locks.
    fn is_eligible(&self, queue: &TimedQueueReceiver, keeper: &TimeKeeper) -> bool {
        let next_time = keeper.next_time();
        if !next_time.is_inactive() && queue.rcvr_time() > next_time {
            return false;
        }

        let own = queue.head();
        keeper
            .next_triple(|id| if id == self.id { own } else { keeper.head_of(id) })
            .is_some_and(|triple| triple.receiver() == self.id)
    }
}

impl PartialEq for Receiver {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("id", &self.id)
            .field("info", &self.inner.info)
            .finish_non_exhaustive()
    }
}
