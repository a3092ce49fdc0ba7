use std::fmt;

use crossbeam_utils::sync::WaitGroup;
use slab::Slab;
use tracing::debug;

use crate::actor::{Actor, Context};
use crate::coordinator::Coordinator;
use crate::loom_exports::sync::Arc;
use crate::receiver::{Doorbell, Receiver, ReceiverId, ReceiverInfo};
use crate::time::Time;
use crate::worker::Worker;

use super::{ExecutionError, Simulation};

/// Identifier of an actor added to a [`SimInit`] builder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActorId(usize);

/// An actor and its static wiring.
struct ActorSlot {
    actor: Box<dyn Actor>,
    name: String,
    inputs: Vec<Vec<ReceiverId>>,
    outputs: Vec<Vec<ReceiverId>>,
}

/// A connection, which becomes a receiver at initialization.
struct Connection {
    to: usize,
    port: usize,
    channel: usize,
    priority: Option<i32>,
}

/// Builder for a dataflow run.
pub struct SimInit {
    actors: Vec<ActorSlot>,
    connections: Slab<Connection>,
    completion_time: Option<Time>,
    queue_capacity: Option<usize>,
    max_queue_capacity: Option<usize>,
}

impl SimInit {
    /// Creates a builder without actors, with unbounded queues and no
    /// completion time.
    pub fn new() -> Self {
        Self {
            actors: Vec::new(),
            connections: Slab::new(),
            completion_time: None,
            queue_capacity: None,
            max_queue_capacity: None,
        }
    }

    /// Adds an actor to the graph.
    ///
    /// The `name` argument needs not be unique; it is used to name the actor
    /// thread and for logging and error reporting.
    pub fn add_actor(&mut self, actor: impl Actor, name: impl Into<String>) -> ActorId {
        let id = ActorId(self.actors.len());
        self.actors.push(ActorSlot {
            actor: Box::new(actor),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        });

        id
    }

    /// Connects an output port of an actor to an input port of another (or
    /// the same) actor.
    ///
    /// Each connection adds a channel to both ports. Channels are numbered in
    /// connection order, starting from 0.
    ///
    /// The receiver gets a default priority: the input receivers of an actor
    /// are numbered 0, 1, 2, ... by input port and then by channel, so that
    /// later ports and channels win ties between tokens with the same time
    /// stamp.
    ///
    /// # Panics
    ///
    /// This will panic if either actor was not added to this builder.
    pub fn connect(
        &mut self,
        from: ActorId,
        output_port: usize,
        to: ActorId,
        input_port: usize,
    ) -> ReceiverId {
        self.add_connection(from, output_port, to, input_port, None)
    }

    /// Connects two ports with an explicit receiver priority.
    ///
    /// A higher priority wins ties between tokens with the same time stamp.
    /// See [`SimInit::connect()`].
    pub fn connect_with_priority(
        &mut self,
        from: ActorId,
        output_port: usize,
        to: ActorId,
        input_port: usize,
        priority: i32,
    ) -> ReceiverId {
        self.add_connection(from, output_port, to, input_port, Some(priority))
    }

    /// Sets the completion time.
    ///
    /// Tokens sent with a later time stamp are replaced by terminate events
    /// and actors stop iterating once their time passes the completion time.
    pub fn set_completion_time(mut self, completion_time: Time) -> Self {
        self.completion_time = Some(completion_time);

        self
    }

    /// Sets the initial capacity of all queues.
    ///
    /// Queues are unbounded by default.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);

        self
    }

    /// Sets the capacity beyond which queues may not grow when resolving
    /// deadlocks.
    ///
    /// Queue growth is unbounded by default.
    pub fn with_max_queue_capacity(mut self, capacity: usize) -> Self {
        self.max_queue_capacity = Some(capacity);

        self
    }

    /// Builds the graph and starts one thread per actor.
    ///
    /// Each actor is initialized on its own thread; no actor iterates before
    /// all actors are initialized.
    pub fn init(self) -> Result<Simulation, ExecutionError> {
        let coordinator = Coordinator::new(self.completion_time, self.max_queue_capacity);
        let doorbells: Vec<_> = self
            .actors
            .iter()
            .map(|_| Arc::new(Doorbell::new(coordinator.clone())))
            .collect();

        let priorities = self.priorities();
        let mut receivers = Slab::with_capacity(self.connections.len());
        for (key, connection) in &self.connections {
            let id = ReceiverId::from_raw(key);
            let receiver = Receiver::new(
                id,
                ReceiverInfo {
                    actor: self.actors[connection.to].name.clone(),
                    port: connection.port,
                    channel: connection.channel,
                },
                priorities[key],
                self.queue_capacity,
                self.completion_time,
                coordinator.clone(),
                doorbells[connection.to].clone(),
            );
            coordinator.register_receiver(receiver.clone());
            receivers.insert(receiver);
        }

        let lookup = |ids: &Vec<Vec<ReceiverId>>| -> Vec<Vec<Receiver>> {
            ids.iter()
                .map(|port| {
                    port.iter()
                        .map(|id| receivers[id.as_usize()].clone())
                        .collect()
                })
                .collect()
        };

        let workers: Vec<_> = self
            .actors
            .into_iter()
            .zip(doorbells)
            .map(|(slot, doorbell)| {
                let cx = Context::new(
                    slot.name,
                    lookup(&slot.inputs),
                    lookup(&slot.outputs),
                    doorbell,
                    self.completion_time,
                );

                Worker::new(slot.actor, cx, coordinator.clone())
            })
            .collect();

        // All workers must be registered _before_ spawning the threads to make
        // sure that the count of active workers does not fall to the count of
        // blocked workers before all workers are started.
        for _ in 0..workers.len() {
            coordinator.register_worker();
        }

        let start = WaitGroup::new();
        let mut handles = Vec::with_capacity(workers.len());
        let mut unspawned = workers.len();
        for worker in workers {
            let name = worker.name().to_owned();
            match worker.spawn(start.clone()) {
                Ok(handle) => {
                    handles.push((name, handle));
                    unspawned -= 1;
                }
                Err(e) => {
                    for _ in 0..unspawned {
                        coordinator.deregister_worker();
                    }
                    drop(start);
                    // Dropping the simulation terminates and joins the
                    // workers already spawned.
                    drop(Simulation::new(coordinator, handles));

                    return Err(ExecutionError::Spawn(e));
                }
            }
        }
        drop(start);
        debug!(actors = handles.len(), "all actors started");

        Ok(Simulation::new(coordinator, handles))
    }

    fn add_connection(
        &mut self,
        from: ActorId,
        output_port: usize,
        to: ActorId,
        input_port: usize,
        priority: Option<i32>,
    ) -> ReceiverId {
        assert!(from.0 < self.actors.len(), "unknown source actor");
        assert!(to.0 < self.actors.len(), "unknown destination actor");

        let inputs = &mut self.actors[to.0].inputs;
        if inputs.len() <= input_port {
            inputs.resize_with(input_port + 1, Vec::new);
        }
        let channel = inputs[input_port].len();

        let key = self.connections.insert(Connection {
            to: to.0,
            port: input_port,
            channel,
            priority,
        });
        let id = ReceiverId::from_raw(key);
        self.actors[to.0].inputs[input_port].push(id);

        let outputs = &mut self.actors[from.0].outputs;
        if outputs.len() <= output_port {
            outputs.resize_with(output_port + 1, Vec::new);
        }
        outputs[output_port].push(id);

        id
    }

    /// Computes the priority of each receiver, indexed by receiver key.
    fn priorities(&self) -> Vec<i32> {
        let mut priorities = vec![0; self.connections.len()];
        for slot in &self.actors {
            for (rank, id) in slot.inputs.iter().flatten().enumerate() {
                let key = id.as_usize();
                let default = i32::try_from(rank).unwrap_or(i32::MAX);
                priorities[key] = self.connections[key].priority.unwrap_or(default);
            }
        }

        priorities
    }
}

impl Default for SimInit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("actors", &self.actors.len())
            .field("connections", &self.connections.len())
            .field("completion_time", &self.completion_time)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_queue_capacity", &self.max_queue_capacity)
            .finish_non_exhaustive()
    }
}
