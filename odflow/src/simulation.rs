//! Dataflow run management.
//!
//! This module contains most notably the [`Simulation`] run controller and
//! the [`SimInit`] graph builder, as well as the errors that can terminate a
//! run.
//!
//! # Run lifecycle
//!
//! The lifecycle of a run typically comprises the following stages:
//!
//! 1. instantiation of a [`SimInit`] builder and migration of all actors to
//!    the builder with [`SimInit::add_actor()`],
//! 2. connection of the actors' output ports to input ports with
//!    [`SimInit::connect()`],
//! 3. configuration of the completion time and queue capacities,
//! 4. initialization of a [`Simulation`] instance with [`SimInit::init()`],
//!    which spawns one thread per actor,
//! 5. execution with [`Simulation::run()`], or step by step with
//!    [`Simulation::fire()`] and [`Simulation::postfire()`].
//!
//! # Deadlocks
//!
//! Actors only block when reading a token that is not yet eligible or when
//! writing to a full queue. When all actors are blocked, the run controller
//! resolves the deadlock:
//!
//! * if some actors are blocked on a write, the deadlock is *artificial* and
//!   the smallest full queue is grown; if the maximum queue capacity set
//!   with [`SimInit::with_max_queue_capacity()`] would be exceeded, the run
//!   fails with [`ExecutionError::Deadlock`],
//! * otherwise no token will ever be produced again: all receivers are
//!   terminated and the run completes.
//!
//! # Examples
//!
//! ```
//! use odflow::actor::{Actor, ActorError, Context};
//! use odflow::simulation::SimInit;
//! use odflow::time::Time;
//! use odflow::token::Token;
//!
//! struct Counter {
//!     count: u32,
//! }
//! impl Actor for Counter {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         self.count += 1;
//!         cx.send_delayed(0, 0, Token::new(self.count), 1.0)
//!     }
//! }
//!
//! struct Printer;
//! impl Actor for Printer {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         let input = cx.next_token()?;
//!         println!("{} at t={}", input.token.downcast_ref::<u32>().unwrap(), input.time);
//!         Ok(())
//!     }
//! }
//!
//! let mut bench = SimInit::new();
//! let counter = bench.add_actor(Counter { count: 0 }, "counter");
//! let printer = bench.add_actor(Printer, "printer");
//! bench.connect(counter, 0, printer, 0);
//!
//! let mut simu = bench
//!     .set_completion_time(Time::new(5.0).unwrap())
//!     .init()
//!     .unwrap();
//! simu.run().unwrap();
//! ```
mod sim_init;

pub use sim_init::{ActorId, SimInit};

use std::error::Error;
use std::fmt;
use std::io;
use std::thread::JoinHandle;

use tracing::debug;

use crate::actor::ActorError;
use crate::coordinator::{Coordinator, Resolution};
use crate::receiver::ReceiverInfo;
use crate::time::Time;
use crate::worker::Outcome;

/// Run controller of a dataflow graph.
///
/// A `Simulation` is created with [`SimInit::init()`]. Its actors are already
/// running on their own threads; the controller waits for global deadlocks
/// and resolves them until the run is complete.
///
/// Dropping a `Simulation` terminates all receivers and joins all actor
/// threads.
pub struct Simulation {
    coordinator: Coordinator,
    workers: Vec<(String, JoinHandle<Outcome>)>,
}

impl Simulation {
    pub(crate) fn new(coordinator: Coordinator, workers: Vec<(String, JoinHandle<Outcome>)>) -> Self {
        Self {
            coordinator,
            workers,
        }
    }

    /// Returns the completion time, if any.
    pub fn completion_time(&self) -> Option<Time> {
        self.coordinator.completion_time()
    }

    /// Returns the coordinator of the run.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Executes one top-level iteration: waits until all actors are blocked
    /// and resolves the deadlock.
    pub fn fire(&mut self) -> Result<Resolution, ExecutionError> {
        let resolution = self.coordinator.fire()?;
        debug!(?resolution, "deadlock resolved");

        Ok(resolution)
    }

    /// Returns false once the run is complete.
    pub fn postfire(&self) -> bool {
        self.coordinator.postfire()
    }

    /// Runs the graph until completion.
    ///
    /// An error is returned if a deadlock could not be resolved or, once all
    /// actors have stopped, if an actor failed or panicked. In the first case
    /// the run is aborted.
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        while self.postfire() {
            if let Err(e) = self.fire() {
                self.coordinator.terminate_all();
                // The deadlock is the primary error.
                let _ = self.wrapup();

                return Err(e);
            }
        }

        self.wrapup()
    }

    /// Terminates all receivers and joins all actor threads.
    ///
    /// The first actor failure or panic, in the order in which actors were
    /// added, is returned.
    pub fn wrapup(&mut self) -> Result<(), ExecutionError> {
        self.coordinator.terminate_all();

        let mut result = Ok(());
        for (actor, handle) in self.workers.drain(..) {
            let error = match handle.join() {
                Ok(Outcome::Completed) => continue,
                Ok(Outcome::Failed(error)) => ExecutionError::ActorFailure { actor, error },
                Ok(Outcome::Panicked(message)) => ExecutionError::Panic { actor, message },
                Err(_) => ExecutionError::Panic {
                    actor,
                    message: "actor thread panicked".to_owned(),
                },
            };
            if result.is_ok() {
                result = Err(error);
            }
        }
        self.coordinator.clear();

        result
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.wrapup();
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("coordinator", &self.coordinator)
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// A receiver involved in an unresolved deadlock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadlockInfo {
    /// Location of the receiver.
    pub receiver: ReceiverInfo,
    /// Capacity of its queue.
    pub capacity: usize,
}

impl fmt::Display for DeadlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (capacity {})", self.receiver, self.capacity)
    }
}

/// An error returned when a run fails.
#[derive(Debug)]
pub enum ExecutionError {
    /// All actors are blocked and the deadlock could not be resolved without
    /// exceeding the maximum queue capacity. The write-blocked receivers are
    /// listed.
    Deadlock(Vec<DeadlockInfo>),
    /// An actor returned an error.
    ActorFailure {
        /// Name of the actor.
        actor: String,
        /// The error.
        error: ActorError,
    },
    /// An actor panicked.
    Panic {
        /// Name of the actor.
        actor: String,
        /// The panic message.
        message: String,
    },
    /// An actor thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadlock(infos) => {
                f.write_str("unresolvable deadlock on receivers: ")?;
                for (idx, info) in infos.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(", ")?;
                    }
                    info.fmt(f)?;
                }

                Ok(())
            }
            Self::ActorFailure { actor, error } => {
                write!(f, "actor '{}' failed: {}", actor, error)
            }
            Self::Panic { actor, message } => {
                write!(f, "actor '{}' panicked: {}", actor, message)
            }
            Self::Spawn(e) => write!(f, "could not spawn actor thread: {}", e),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ActorFailure { error, .. } => Some(error),
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}
