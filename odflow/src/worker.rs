//! Thread-per-actor execution.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_utils::sync::WaitGroup;
use tracing::{debug, error, info_span};

use crate::actor::{Actor, ActorError, Context};
use crate::coordinator::Coordinator;

/// How a worker ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The actor stopped on its own or was terminated.
    Completed,
    /// The actor returned an error.
    Failed(ActorError),
    /// The actor panicked.
    Panicked(String),
}

/// An actor together with its execution context.
pub(crate) struct Worker {
    actor: Box<dyn Actor>,
    cx: Context,
    coordinator: Coordinator,
}

impl Worker {
    /// Creates a worker.
    ///
    /// The worker must have been registered with the coordinator beforehand
    /// so that the count of active workers cannot drop to the number of
    /// blocked workers before all workers have started.
    pub(crate) fn new(actor: Box<dyn Actor>, cx: Context, coordinator: Coordinator) -> Self {
        Self {
            actor,
            cx,
            coordinator,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.cx.name()
    }

    /// Runs the worker on a new thread named after the actor.
    ///
    /// The actor is initialized right away but only starts iterating once
    /// all clones of `start` have been dropped or waited on.
    pub(crate) fn spawn(self, start: WaitGroup) -> io::Result<JoinHandle<Outcome>> {
        let name = self.cx.name().to_owned();

        thread::Builder::new().name(name.clone()).spawn(move || {
            let span = info_span!("actor", name = %name);
            let _enter = span.enter();

            self.run(start)
        })
    }

    fn run(mut self, start: WaitGroup) -> Outcome {
        debug!("worker started");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(start)));
        let mut outcome = match result {
            Ok(Ok(())) | Ok(Err(ActorError::Terminated)) => Outcome::Completed,
            Ok(Err(e)) => {
                error!(error = %e, "actor failed");
                Outcome::Failed(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(message = %message, "actor panicked");
                Outcome::Panicked(message)
            }
        };

        debug!(time = %self.cx.current_time(), "notifying termination");
        self.cx.notify_termination();
        self.cx.finish_inputs();

        let wrapup = panic::catch_unwind(AssertUnwindSafe(|| self.actor.wrapup(&mut self.cx)));
        if let Err(payload) = wrapup {
            let message = panic_message(payload.as_ref());
            error!(message = %message, "actor panicked during wrapup");
            if matches!(outcome, Outcome::Completed) {
                outcome = Outcome::Panicked(message);
            }
        }

        self.coordinator.deregister_worker();
        debug!("worker stopped");

        outcome
    }

    fn execute(&mut self, start: WaitGroup) -> Result<(), ActorError> {
        self.actor.initialize(&mut self.cx)?;
        start.wait();

        loop {
            if self.is_past_completion() {
                debug!(time = %self.cx.current_time(), "completion time reached");
                return Ok(());
            }
            if !self.actor.prefire(&mut self.cx)? {
                debug!("prefire returned false");
                return Ok(());
            }
            self.actor.fire(&mut self.cx)?;
            if !self.actor.postfire(&mut self.cx)? {
                debug!("postfire returned false");
                return Ok(());
            }
        }
    }

    /// Checks whether the current or output time of the actor has passed
    /// the completion time.
    fn is_past_completion(&self) -> bool {
        let Some(completion) = self.cx.completion_time() else {
            return false;
        };
        let keeper = self.cx.time_keeper();
        let current = keeper.current_time();

        (!current.is_inactive() && current > completion) || keeper.output_time() > completion
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
