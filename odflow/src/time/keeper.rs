//! Per-actor time keeping.

use std::cmp::Ordering;

use crate::actor::ActorError;
use crate::receiver::{Receiver, ReceiverId};

use super::{Time, TimeRegression};

/// A snapshot of the time and priority of a receiver.
///
/// Triples are created whenever the state of a receiver changes and are
/// immediately folded into the [`TimeKeeper`] of the actor owning the
/// receiver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RcvrTimeTriple {
    receiver: ReceiverId,
    time: Time,
    priority: i32,
}

impl RcvrTimeTriple {
    /// Creates a new triple.
    pub fn new(receiver: ReceiverId, time: Time, priority: i32) -> Self {
        Self {
            receiver,
            time,
            priority,
        }
    }

    /// Returns the identifier of the receiver.
    pub fn receiver(&self) -> ReceiverId {
        self.receiver
    }

    /// Returns the receiver time at the moment of the snapshot.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Returns the static priority of the receiver.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Kind of the oldest event of a receiver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Head {
    Empty,
    Null,
    Data,
}

/// The time bookkeeping of a single actor.
///
/// A `TimeKeeper` keeps one [`RcvrTimeTriple`] per input receiver of its
/// actor, sorted by urgency: ascending receiver time, with terminated receivers
/// ([`Time::INACTIVE`]) placed after all others. Receivers that share the same
/// time keep their insertion order; ties are broken when reading, by priority.
///
/// An actor may consume a token from a receiver if that receiver has the
/// unique minimum receiver time or, when several receivers share the minimum,
/// if it has the highest priority among them.
///
/// The `TimeKeeper` also owns the actor's current time, i.e. the time of the
/// most recently consumed token, which never decreases except when it is reset
/// to [`Time::INACTIVE`] upon termination.
#[derive(Debug)]
pub struct TimeKeeper {
    rcvr_list: Vec<RcvrTimeTriple>,
    receivers: Vec<Receiver>,
    current_time: Time,
    output_time: Time,
}

impl TimeKeeper {
    /// Creates a time keeper without receivers, at time zero.
    pub fn new() -> Self {
        Self {
            rcvr_list: Vec::new(),
            receivers: Vec::new(),
            current_time: Time::ZERO,
            output_time: Time::ZERO,
        }
    }

    /// Registers an input receiver of the actor and inserts its triple.
    pub(crate) fn attach(&mut self, receiver: Receiver) {
        self.update_rcvr_list(receiver.triple());
        self.receivers.push(receiver);
    }

    /// Returns the input receivers registered with this time keeper.
    pub(crate) fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    /// Returns the current time of the actor.
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// Sets the current time of the actor.
    ///
    /// An error is returned if the time would decrease, unless the requested
    /// time is the terminate sentinel.
    pub fn set_current_time(&mut self, time: Time) -> Result<(), TimeRegression> {
        if time < self.current_time && !time.is_inactive() {
            return Err(TimeRegression {
                current: self.current_time,
                requested: time,
            });
        }
        self.current_time = time;

        Ok(())
    }

    /// Returns the time at which the actor emits its outputs, which is never
    /// earlier than its current time.
    pub fn output_time(&self) -> Time {
        if self.current_time.is_inactive() {
            return self.output_time;
        }

        self.output_time.max(self.current_time)
    }

    /// Moves the output time forward; earlier times are ignored.
    pub(crate) fn advance_output_time(&mut self, time: Time) {
        if !time.is_inactive() && time > self.output_time {
            self.output_time = time;
        }
    }

    /// Removes the triple of the receiver, if any, and re-inserts the new
    /// triple at its sorted position.
    pub fn update_rcvr_list(&mut self, triple: RcvrTimeTriple) {
        self.remove_receiver(triple.receiver);

        let idx = self
            .rcvr_list
            .iter()
            .position(|t| t.time.urgency_cmp(&triple.time) == Ordering::Greater)
            .unwrap_or(self.rcvr_list.len());
        self.rcvr_list.insert(idx, triple);
    }

    /// Removes the triple of the specified receiver, if any.
    pub fn remove_receiver(&mut self, receiver: ReceiverId) {
        if let Some(idx) = self.rcvr_list.iter().position(|t| t.receiver == receiver) {
            self.rcvr_list.remove(idx);
        }
    }

    /// Re-reads the triple of every registered receiver.
    ///
    /// Upstream actors only notify the reading actor that one of its
    /// receivers changed; the fresh state is folded in here, on the reader's
    /// own thread.
    pub fn resort(&mut self) {
        for idx in 0..self.receivers.len() {
            let triple = self.receivers[idx].triple();
            self.update_rcvr_list(triple);
        }
    }

    /// Returns the time of the most urgent receiver, or the current time if
    /// there are no receivers.
    pub fn next_time(&self) -> Time {
        match self.rcvr_list.first() {
            Some(triple) => triple.time,
            None => self.current_time,
        }
    }

    /// Returns true unless two or more receivers share the lowest time.
    pub fn has_min_rcvr_time(&self) -> bool {
        match self.rcvr_list.as_slice() {
            [first, second, ..] => first.time != second.time,
            _ => true,
        }
    }

    /// Returns the most urgent triple.
    pub fn first_triple(&self) -> Option<&RcvrTimeTriple> {
        self.rcvr_list.first()
    }

    /// Returns, among the leading triples that share the time of the first
    /// triple, the one with the highest priority.
    ///
    /// The scan stops at the first later or terminated triple. If several
    /// triples have the same priority, the first one is returned.
    pub fn highest_priority_triple(&self) -> Option<&RcvrTimeTriple> {
        let first = self.rcvr_list.first()?;
        let mut best = first;

        for triple in &self.rcvr_list[1..] {
            if triple.time.is_inactive() || triple.time != first.time {
                break;
            }
            if triple.priority > best.priority {
                best = triple;
            }
        }

        Some(best)
    }

    /// Returns the triple of the receiver to be read next.
    ///
    /// With a unique minimum time this is the first triple. Otherwise, among
    /// the triples sharing the minimum time, receivers whose oldest event is
    /// a null token give way to all other receivers, and the highest priority
    /// wins within each group. An empty receiver does not give way since it
    /// may still receive a data token at that time.
    pub(crate) fn next_triple(
        &self,
        head: impl Fn(ReceiverId) -> Head,
    ) -> Option<&RcvrTimeTriple> {
        let first = self.rcvr_list.first()?;
        if self.has_min_rcvr_time() || first.time.is_inactive() {
            return Some(first);
        }

        let rank = |triple: &RcvrTimeTriple| {
            (head(triple.receiver) != Head::Null, triple.priority)
        };
        let mut best = (rank(first), first);
        for triple in &self.rcvr_list[1..] {
            if triple.time.is_inactive() || triple.time != first.time {
                break;
            }
            let key = rank(triple);
            if key > best.0 {
                best = (key, triple);
            }
        }

        Some(best.1)
    }

    /// Returns the kind of the oldest event of a registered receiver.
    ///
    /// This locks the receiver.
    pub(crate) fn head_of(&self, receiver: ReceiverId) -> Head {
        self.receivers
            .iter()
            .find(|r| r.id() == receiver)
            .map_or(Head::Empty, Receiver::head)
    }

    /// Consumes the null token at the head of the receiver to be read next,
    /// if it is eligible.
    ///
    /// Returns true if a null token was consumed. This lets a reader waiting
    /// on one receiver get past null tokens queued on the others.
    pub(crate) fn skip_null_token(&mut self) -> Result<bool, ActorError> {
        let Some(triple) = self.next_triple(|id| self.head_of(id)).copied() else {
            return Ok(false);
        };
        let Some(receiver) = self
            .receivers
            .iter()
            .find(|r| r.id() == triple.receiver)
            .cloned()
        else {
            return Ok(false);
        };

        receiver.skip_null_token(self)
    }

    /// Returns the triples in urgency order.
    pub fn triples(&self) -> &[RcvrTimeTriple] {
        &self.rcvr_list
    }

    /// Returns the number of receivers that are not terminated.
    pub fn active_channel_count(&self) -> usize {
        self.rcvr_list
            .iter()
            .filter(|t| !t.time.is_inactive())
            .count()
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}
