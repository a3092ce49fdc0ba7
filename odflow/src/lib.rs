//! An ordered dataflow (ODF) execution kernel.
//!
//! `odflow` runs a static graph of concurrent actors that exchange
//! time-stamped tokens. Each actor runs on its own thread and owns a logical
//! clock; tokens are buffered in per-connection receivers and each actor
//! consumes them in non-decreasing time order, breaking ties with static
//! receiver priorities. Since actors only block on reads and writes, a
//! central coordinator can detect when all actors are blocked, and either
//! resolve the deadlock by growing a full queue or conclude that the run is
//! complete.
//!
//! # A practical overview
//!
//! Running a dataflow graph involves three activities:
//!
//! 1. the implementation of [`Actor`](actor::Actor)s,
//! 2. the assembly of a graph with a [`SimInit`](simulation::SimInit) builder,
//!    performed by connecting output ports to input ports,
//! 3. the execution of the graph with a [`Simulation`](simulation::Simulation)
//!    run controller.
//!
//! ## Authoring actors
//!
//! An actor implements [`Actor::fire()`](actor::Actor::fire), which is called
//! repeatedly, and optionally the other methods of the actor iteration. All
//! inputs and outputs go through the [`Context`](actor::Context) handed to
//! the actor.
//!
//! Ports are designated by their index and may have several channels, one per
//! connection. A token sent on an output port is time-stamped with the output
//! time of the actor, optionally delayed:
//!
//! ```
//! use odflow::actor::{Actor, ActorError, Context};
//! use odflow::token::Token;
//!
//! /// Doubles its input and forwards it half a time unit later.
//! pub struct Doubler;
//!
//! impl Actor for Doubler {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         let input = cx.next_token()?;
//!         let value = input.token.into_value::<f64>().map_err(|_| {
//!             ActorError::failure("expected a floating point value")
//!         })?;
//!
//!         cx.broadcast_delayed(0, Token::new(2.0 * value), 0.5)
//!     }
//! }
//! ```
//!
//! ## Assembling and running a graph
//!
//! ```
//! # use odflow::actor::{Actor, ActorError, Context};
//! # use odflow::token::Token;
//! # pub struct Doubler;
//! # impl Actor for Doubler {
//! #     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//! #         let input = cx.next_token()?;
//! #         let value = input.token.into_value::<f64>().unwrap();
//! #         cx.broadcast_delayed(0, Token::new(2.0 * value), 0.5)
//! #     }
//! # }
//! use std::sync::{Arc, Mutex};
//!
//! use odflow::simulation::SimInit;
//! use odflow::time::Time;
//!
//! struct Source;
//! impl Actor for Source {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         cx.send_delayed(0, 0, Token::new(1.0f64), 1.0)
//!     }
//! }
//!
//! struct Sink(Arc<Mutex<Vec<(f64, f64)>>>);
//! impl Actor for Sink {
//!     fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
//!         let input = cx.next_token()?;
//!         let value = *input.token.downcast_ref::<f64>().unwrap();
//!         self.0.lock().unwrap().push((input.time.as_f64(), value));
//!
//!         Ok(())
//!     }
//! }
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//!
//! let mut bench = SimInit::new();
//! let source = bench.add_actor(Source, "source");
//! let doubler = bench.add_actor(Doubler, "doubler");
//! let sink = bench.add_actor(Sink(received.clone()), "sink");
//! bench.connect(source, 0, doubler, 0);
//! bench.connect(doubler, 0, sink, 0);
//!
//! let mut simu = bench
//!     .set_completion_time(Time::new(3.0).unwrap())
//!     .init()
//!     .unwrap();
//! simu.run().unwrap();
//!
//! assert_eq!(*received.lock().unwrap(), vec![(1.5, 2.0), (2.5, 2.0)]);
//! ```
//!
//! # Ordering guarantees
//!
//! For a given actor, tokens are consumed in non-decreasing time-stamp order
//! across all of its inputs. Tokens with the same time stamp are consumed in
//! decreasing order of receiver priority. Nothing is guaranteed about the
//! wall-clock order of operations performed by distinct actors.
//!
//! Actors that have no data to send but whose time advanced inform downstream
//! actors with *null tokens*, so that they never wait on an input that will
//! only receive later tokens. Null tokens are handled by the kernel and never
//! returned to actors.
//!
//! # Termination
//!
//! An actor stops when its `prefire` or `postfire` method returns `false`,
//! when its time passes the completion time, when all of its inputs are
//! exhausted or when the run completes. Downstream actors are then sent a
//! terminate event, so that termination propagates along the graph.
//!
//! # Modules documentation
//!
//! * the [`actor`] module provides the [`Actor`](actor::Actor) trait and the
//!   actor execution [`Context`](actor::Context),
//! * the [`simulation`] module contains the graph builder and run controller,
//! * the [`receiver`] module contains the time-stamped queues,
//! * the [`coordinator`] module contains deadlock detection and resolution,
//! * the [`time`] module deals with logical time and time keeping,
//! * the [`token`] module defines the tokens exchanged by actors.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod actor;
pub mod coordinator;
mod loom_exports;
pub mod receiver;
pub mod simulation;
pub mod time;
pub mod token;
mod worker;
