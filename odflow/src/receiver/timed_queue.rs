//! Non-blocking FIFO queue of time-stamped tokens.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use crate::time::{Head, RcvrTimeTriple, Time, TimeKeeper, TimeRegression};
use crate::token::Token;

use super::ReceiverId;

/// A token together with its time stamp.
#[derive(Clone, Debug)]
pub struct Event {
    /// The token, possibly a null token.
    pub token: Token,
    /// The time stamp, or [`Time::INACTIVE`] for a terminate event.
    pub time: Time,
}

/// A bounded FIFO queue of time-stamped tokens attached to one connection.
///
/// The queue tracks the time of its newest event (the *last time*) and of its
/// oldest event (the *receiver time*). When the queue is empty, the receiver
/// time is the last time.
///
/// This type performs no synchronization: it is owned by a
/// [`Receiver`](super::Receiver) which guards it with its lock.
#[derive(Debug)]
pub struct TimedQueueReceiver {
    id: ReceiverId,
    queue: VecDeque<Event>,
    capacity: Option<usize>,
    last_time: Time,
    rcvr_time: Time,
    priority: i32,
}

impl TimedQueueReceiver {
    /// Creates an empty queue.
    ///
    /// A `None` capacity means that the queue is unbounded.
    pub fn new(id: ReceiverId, priority: i32, capacity: Option<usize>) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            capacity,
            last_time: Time::ZERO,
            rcvr_time: Time::ZERO,
            priority,
        }
    }

    /// Appends an event.
    ///
    /// If the queue was empty, the receiver time changes and a triple-update
    /// notification for the owning [`TimeKeeper`] is returned.
    ///
    /// An error is returned if the queue is full or if the time stamp is
    /// earlier than that of the newest event. The terminate sentinel is exempt
    /// from the latter check.
    pub fn put(
        &mut self,
        token: Token,
        time: Time,
    ) -> Result<Option<RcvrTimeTriple>, QueueError> {
        if !self.has_room() {
            return Err(QueueError::CapacityExceeded);
        }
        if time < self.last_time && !time.is_inactive() && !self.last_time.is_inactive() {
            return Err(QueueError::TimeRegression(TimeRegression {
                current: self.last_time,
                requested: time,
            }));
        }

        let was_empty = self.queue.is_empty();
        self.queue.push_back(Event { token, time });
        self.last_time = time;

        if was_empty {
            self.rcvr_time = time;

            return Ok(Some(self.triple()));
        }

        Ok(None)
    }

    /// Pops the oldest event and returns its token.
    ///
    /// The current time of the time keeper is set to the time stamp of the
    /// event. If that would move the time keeper backward, the event is left in
    /// the queue and an error is returned. The receiver time is then updated
    /// and always folded into the time keeper, even when the queue becomes
    /// empty.
    pub fn get(&mut self, keeper: &mut TimeKeeper) -> Result<Token, QueueError> {
        let time = self.queue.front().ok_or(QueueError::EmptyQueue)?.time;
        keeper.set_current_time(time)?;

        let event = self.queue.pop_front().ok_or(QueueError::EmptyQueue)?;
        self.rcvr_time = match self.queue.front() {
            Some(next) => next.time,
            None => self.last_time,
        };
        keeper.update_rcvr_list(self.triple());

        Ok(event.token)
    }

    /// Returns the identifier of the receiver owning this queue.
    pub fn id(&self) -> ReceiverId {
        self.id
    }

    /// Returns true if another event can be appended.
    pub fn has_room(&self) -> bool {
        match self.capacity {
            Some(capacity) => self.queue.len() < capacity,
            None => true,
        }
    }

    /// Returns true if the queue holds at least one event.
    pub fn has_token(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Returns true if the oldest event carries a null token.
    pub fn has_null_token(&self) -> bool {
        self.queue.front().is_some_and(|event| event.token.is_null())
    }

    /// Returns the kind of the oldest event.
    pub(crate) fn head(&self) -> Head {
        match self.queue.front() {
            None => Head::Empty,
            Some(event) if event.token.is_null() => Head::Null,
            Some(_) => Head::Data,
        }
    }

    /// Returns the number of queued events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the capacity, or `None` if the queue is unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Changes the capacity.
    ///
    /// Events already queued are never dropped, even if they exceed the new
    /// capacity.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    /// Returns the time of the newest event ever queued.
    pub fn last_time(&self) -> Time {
        self.last_time
    }

    /// Returns the time of the oldest queued event, or the last time if the
    /// queue is empty.
    pub fn rcvr_time(&self) -> Time {
        self.rcvr_time
    }

    /// Returns the static priority of the receiver.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns a snapshot of the receiver time and priority.
    pub fn triple(&self) -> RcvrTimeTriple {
        RcvrTimeTriple::new(self.id, self.rcvr_time, self.priority)
    }
}

/// An error returned by non-blocking queue operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is full.
    CapacityExceeded,
    /// The queue is empty.
    EmptyQueue,
    /// The operation would move a clock backward.
    TimeRegression(TimeRegression),
}

impl From<TimeRegression> for QueueError {
    fn from(e: TimeRegression) -> Self {
        Self::TimeRegression(e)
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("the queue is full"),
            Self::EmptyQueue => f.write_str("the queue is empty"),
            Self::TimeRegression(e) => e.fmt(f),
        }
    }
}

impl Error for QueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TimeRegression(e) => Some(e),
            _ => None,
        }
    }
}
