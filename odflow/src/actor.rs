//! Actor components.
//!
//! # Actor trait
//!
//! Every actor must implement the [`Actor`] trait. Each actor runs on its own
//! thread and repeatedly executes an iteration made of [`Actor::prefire()`],
//! [`Actor::fire()`] and [`Actor::postfire()`] until it decides to stop or
//! until its inputs are exhausted.
//!
//! All interactions with other actors go through the [`Context`] handed to
//! each method: reading time-stamped tokens from input ports, sending
//! time-stamped tokens to output ports and querying the actor's logical time.
//!
//! #### Examples
//!
//! A relay that forwards every token it receives, one time unit later:
//!
//! ```
//! use odflow::actor::{Actor, ActorError, Context};
//!
//! pub struct Delay;
//!
//! impl Actor for Delay {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         let input = cx.next_token()?;
//!         cx.broadcast_delayed(0, input.token, 1.0)
//!     }
//! }
//! ```
//!
//! # Reading tokens
//!
//! Reads block until the requested token is the most urgent one among all
//! input receivers of the actor, i.e. until it has the lowest time stamp or,
//! when several receivers share that time stamp, until its receiver has the
//! highest priority among those not holding a null token. This guarantees
//! that an actor observes its inputs in non-decreasing time order.
//!
//! Null tokens are never returned to the actor: they are consumed
//! transparently and only advance the actor's current time.
//!
//! # Termination
//!
//! Reads and writes fail with [`ActorError::Terminated`] when the run winds
//! down. This is the expected way for an actor to stop and it should simply
//! be propagated with `?`.

use std::error::Error;
use std::fmt;

use tracing::trace;

use crate::loom_exports::sync::Arc;
use crate::receiver::{Doorbell, QueueError, Receiver, ReceiverId};
use crate::time::{Time, TimeKeeper, TimeRegression};
use crate::token::Token;

/// Trait to be implemented by all actors.
pub trait Actor: Send + 'static {
    /// Performs actor initialization.
    ///
    /// This method is executed exactly once, on the actor's thread, before any
    /// actor begins iterating. Tokens sent from here must fit the initial
    /// capacity of the queues since no deadlock resolution takes place
    /// before all actors are initialized.
    ///
    /// The default implementation does nothing.
    fn initialize(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let _ = cx;

        Ok(())
    }

    /// Checks whether the actor should fire.
    ///
    /// Returning `false` ends the actor's execution. The default
    /// implementation returns `true`.
    fn prefire(&mut self, cx: &mut Context) -> Result<bool, ActorError> {
        let _ = cx;

        Ok(true)
    }

    /// Executes one iteration of the actor.
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError>;

    /// Concludes an iteration.
    ///
    /// Returning `false` ends the actor's execution. The default
    /// implementation returns `true`.
    fn postfire(&mut self, cx: &mut Context) -> Result<bool, ActorError> {
        let _ = cx;

        Ok(true)
    }

    /// Performs final actions once the actor has stopped.
    ///
    /// This method is called exactly once, after downstream actors have been
    /// notified of the termination, including when the actor failed.
    fn wrapup(&mut self, cx: &mut Context) {
        let _ = cx;
    }
}

/// A data token read by [`Context::next_token()`].
#[derive(Clone, Debug)]
pub struct Input {
    /// Input port on which the token was received.
    pub port: usize,
    /// Channel within the input port.
    pub channel: usize,
    /// Time stamp of the token.
    pub time: Time,
    /// The token.
    pub token: Token,
}

/// Execution context of an actor.
///
/// The context owns the actor's [`TimeKeeper`] and the handles of all its
/// input and output receivers. Ports and channels are identified by their
/// index, in the order in which the connections were made.
#[derive(Debug)]
pub struct Context {
    name: String,
    keeper: TimeKeeper,
    inputs: Vec<Vec<Receiver>>,
    outputs: Vec<Vec<Receiver>>,
    doorbell: Arc<Doorbell>,
    completion_time: Option<Time>,
}

impl Context {
    pub(crate) fn new(
        name: String,
        inputs: Vec<Vec<Receiver>>,
        outputs: Vec<Vec<Receiver>>,
        doorbell: Arc<Doorbell>,
        completion_time: Option<Time>,
    ) -> Self {
        let mut keeper = TimeKeeper::new();
        for receiver in inputs.iter().flatten() {
            keeper.attach(receiver.clone());
        }

        Self {
            name,
            keeper,
            inputs,
            outputs,
            doorbell,
            completion_time,
        }
    }

    /// Returns the name of the actor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current time of the actor, i.e. the time stamp of the last
    /// token it consumed.
    pub fn current_time(&self) -> Time {
        self.keeper.current_time()
    }

    /// Returns the time of the most urgent input receiver.
    pub fn next_time(&self) -> Time {
        self.keeper.next_time()
    }

    /// Returns the completion time of the run, if any.
    pub fn completion_time(&self) -> Option<Time> {
        self.completion_time
    }

    /// Returns the time keeper of the actor.
    pub fn time_keeper(&self) -> &TimeKeeper {
        &self.keeper
    }

    /// Returns the number of input ports.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Returns the number of channels of an input port, or 0 if the port does
    /// not exist.
    pub fn input_width(&self, port: usize) -> usize {
        self.inputs.get(port).map_or(0, Vec::len)
    }

    /// Returns the number of output ports.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Returns the number of channels of an output port, or 0 if the port
    /// does not exist.
    pub fn output_width(&self, port: usize) -> usize {
        self.outputs.get(port).map_or(0, Vec::len)
    }

    /// Returns true if the channel holds at least one token.
    ///
    /// The token may not be eligible yet, and may be a null token.
    pub fn has_token(&self, port: usize, channel: usize) -> bool {
        self.input(port, channel)
            .map(Receiver::has_token)
            .unwrap_or(false)
    }

    /// Reads the next data token of the first channel of an input port.
    pub fn get(&mut self, port: usize) -> Result<Token, ActorError> {
        self.get_channel(port, 0)
    }

    /// Reads the next data token of a channel, waiting until it is eligible.
    ///
    /// Null tokens queued on other input channels with earlier time stamps
    /// are consumed while waiting. [`ActorError::Terminated`] is returned once
    /// the lane of the channel is finished.
    pub fn get_channel(&mut self, port: usize, channel: usize) -> Result<Token, ActorError> {
        let receiver = self.input(port, channel)?.clone();

        loop {
            let seen = self.doorbell.generation();
            self.keeper.resort();

            if let Some(token) = receiver.try_get(&mut self.keeper)? {
                self.flush_null_tokens();
                if !token.is_null() {
                    return Ok(token);
                }
                continue;
            }
            if self.keeper.skip_null_token()? {
                self.flush_null_tokens();
                continue;
            }
            self.doorbell.wait(seen);
        }
    }

    /// Reads the next data token across all input ports.
    ///
    /// Tokens are read in time order; tokens with the same time stamp are
    /// read in decreasing order of receiver priority. Finished lanes are
    /// skipped. When all lanes are finished, the input receivers of the actor
    /// are terminated and [`ActorError::Terminated`] is returned.
    ///
    /// [`ActorError::NoInputs`] is returned if the actor has no input.
    pub fn next_token(&mut self) -> Result<Input, ActorError> {
        loop {
            let seen = self.doorbell.generation();
            self.keeper.resort();

            let triple = *self
                .keeper
                .next_triple(|id| self.keeper.head_of(id))
                .ok_or(ActorError::NoInputs)?;

            if triple.time().is_inactive() {
                trace!(actor = %self.name, "all input lanes are finished");
                self.finish_inputs();

                return Err(ActorError::Terminated);
            }

            let Some((port, channel, receiver)) = self.locate(triple.receiver()) else {
                // Triples only come from the actor's own inputs.
                self.keeper.remove_receiver(triple.receiver());
                continue;
            };
            match receiver.try_get(&mut self.keeper) {
                Ok(Some(token)) => {
                    self.flush_null_tokens();
                    if token.is_null() {
                        continue;
                    }

                    return Ok(Input {
                        port,
                        channel,
                        time: self.keeper.current_time(),
                        token,
                    });
                }
                Ok(None) => self.doorbell.wait(seen),
                // The lane finished after the receivers were sorted.
                Err(ActorError::Terminated) if !receiver.is_terminated() => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a token at the actor's output time.
    pub fn send(&mut self, port: usize, channel: usize, token: Token) -> Result<(), ActorError> {
        self.send_delayed(port, channel, token, 0.0)
    }

    /// Sends a token to all channels of an output port at the actor's output
    /// time.
    pub fn broadcast(&mut self, port: usize, token: Token) -> Result<(), ActorError> {
        self.broadcast_delayed(port, token, 0.0)
    }

    /// Sends a token with a time stamp delayed with respect to the actor's
    /// output time.
    ///
    /// The output time is the latest of the current time and of the time
    /// stamp of any token previously sent, so time stamps sent by an actor
    /// never decrease. A negative delay is an error.
    pub fn send_delayed(
        &mut self,
        port: usize,
        channel: usize,
        token: Token,
        delay: f64,
    ) -> Result<(), ActorError> {
        let receiver = self.output(port, channel)?.clone();
        let time = self.keeper.output_time().checked_add_delay(delay)?;

        self.keeper.advance_output_time(time);
        receiver.put(token, time)?;
        self.flush_null_tokens();

        Ok(())
    }

    /// Sends a token to all channels of an output port with a delayed time
    /// stamp.
    ///
    /// See [`Context::send_delayed()`].
    pub fn broadcast_delayed(
        &mut self,
        port: usize,
        token: Token,
        delay: f64,
    ) -> Result<(), ActorError> {
        let receivers = self
            .outputs
            .get(port)
            .ok_or(ActorError::NoSuchPort { port, channel: 0 })?
            .clone();
        let time = self.keeper.output_time().checked_add_delay(delay)?;

        self.keeper.advance_output_time(time);
        if let Some((last, others)) = receivers.split_last() {
            for receiver in others {
                receiver.put(token.clone(), time)?;
            }
            last.put(token, time)?;
        }
        self.flush_null_tokens();

        Ok(())
    }

    /// Moves the current time of the actor forward.
    ///
    /// This is mostly useful for actors without inputs, whose time does not
    /// advance otherwise. Downstream receivers are notified with null tokens.
    pub fn advance_time(&mut self, time: Time) -> Result<(), ActorError> {
        if time.is_inactive() {
            return Err(ActorError::InvalidTime(time.as_f64()));
        }
        self.keeper.set_current_time(time)?;
        self.flush_null_tokens();

        Ok(())
    }

    /// Sends a null token at the current time to every downstream receiver
    /// lagging behind.
    ///
    /// This lets downstream actors know that no token with an earlier time
    /// stamp will follow, so that they can consume tokens waiting on other
    /// inputs.
    pub(crate) fn flush_null_tokens(&self) {
        let now = self.keeper.current_time();
        if now.is_inactive() {
            return;
        }

        for receiver in self.outputs.iter().flatten() {
            let last_time = receiver.last_time();
            if last_time.is_inactive() || last_time >= now {
                continue;
            }

            trace!(receiver = %receiver.info(), time = %now, "null token");
            if let Err(e) = receiver.put(Token::Null, now) {
                trace!(receiver = %receiver.info(), "null token dropped: {}", e);
            }
        }
    }

    /// Sends a terminate event to every downstream receiver.
    pub(crate) fn notify_termination(&self) {
        for receiver in self.outputs.iter().flatten() {
            if let Err(e) = receiver.put(Token::Null, Time::INACTIVE) {
                trace!(receiver = %receiver.info(), "termination notice dropped: {}", e);
            }
        }
    }

    /// Terminates all input receivers.
    pub(crate) fn finish_inputs(&self) {
        for receiver in self.keeper.receivers() {
            receiver.request_finish();
        }
    }

    fn input(&self, port: usize, channel: usize) -> Result<&Receiver, ActorError> {
        self.inputs
            .get(port)
            .and_then(|receivers| receivers.get(channel))
            .ok_or(ActorError::NoSuchPort { port, channel })
    }

    fn output(&self, port: usize, channel: usize) -> Result<&Receiver, ActorError> {
        self.outputs
            .get(port)
            .and_then(|receivers| receivers.get(channel))
            .ok_or(ActorError::NoSuchPort { port, channel })
    }

    fn locate(&self, id: ReceiverId) -> Option<(usize, usize, Receiver)> {
        for (port, receivers) in self.inputs.iter().enumerate() {
            for (channel, receiver) in receivers.iter().enumerate() {
                if receiver.id() == id {
                    return Some((port, channel, receiver.clone()));
                }
            }
        }

        None
    }
}

/// An error returned by actor operations.
#[derive(Debug)]
pub enum ActorError {
    /// The receiver was terminated. This is the normal way for an actor to
    /// stop and it is not reported as a failure.
    Terminated,
    /// A clock would have moved backward.
    TimeRegression(TimeRegression),
    /// A token was sent with a negative delay.
    NegativeDelay(f64),
    /// A non-blocking write was attempted on a full queue.
    CapacityExceeded,
    /// A non-blocking read was attempted on an empty queue.
    EmptyQueue,
    /// A time stamp is not valid.
    InvalidTime(f64),
    /// The actor has no input port.
    NoInputs,
    /// The port or channel does not exist.
    NoSuchPort {
        /// Port index.
        port: usize,
        /// Channel index.
        channel: usize,
    },
    /// An error raised by the actor itself.
    Failure(Box<dyn Error + Send + Sync>),
}

impl ActorError {
    /// Creates an error for an actor-specific failure.
    pub fn failure(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Failure(error.into())
    }

    /// Returns true if this is [`ActorError::Terminated`].
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl From<QueueError> for ActorError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::CapacityExceeded => Self::CapacityExceeded,
            QueueError::EmptyQueue => Self::EmptyQueue,
            QueueError::TimeRegression(e) => Self::TimeRegression(e),
        }
    }
}

impl From<TimeRegression> for ActorError {
    fn from(e: TimeRegression) -> Self {
        Self::TimeRegression(e)
    }
}

impl fmt::Display for ActorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => f.write_str("the receiver was terminated"),
            Self::TimeRegression(e) => e.fmt(f),
            Self::NegativeDelay(delay) => write!(f, "negative delay: {}", delay),
            Self::CapacityExceeded => f.write_str("the queue is full"),
            Self::EmptyQueue => f.write_str("the queue is empty"),
            Self::InvalidTime(time) => write!(f, "invalid time stamp: {}", time),
            Self::NoInputs => f.write_str("the actor has no inputs"),
            Self::NoSuchPort { port, channel } => {
                write!(f, "no channel {} on port {}", channel, port)
            }
            Self::Failure(e) => e.fmt(f),
        }
    }
}

impl Error for ActorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TimeRegression(e) => Some(e),
            Self::Failure(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
