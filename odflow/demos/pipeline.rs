//! Example: two sensors sampled at different rates, merged and averaged.
//!
//! This example demonstrates in particular:
//!
//! * actors without inputs driving time with delayed sends,
//! * merging of several inputs in time order with `next_token`,
//! * bounded queues and deadlock resolution,
//! * the completion time,
//! * logging with `tracing` (set `RUST_LOG=odflow=debug` to see the kernel
//!   at work).
//!
//! ```text
//!  ┌──────────┐
//!  │  Fast    ├──────┐     ┌──────────┐     ┌──────────┐
//!  │  sensor  │      └────►│          │     │          │
//!  └──────────┘ (0.5 s)    │ Averager ├────►│ Display  │
//!  ┌──────────┐      ┌────►│          │     │          │
//!  │  Slow    ├──────┘     └──────────┘     └──────────┘
//!  │  sensor  │ (2 s)
//!  └──────────┘
//! ```

use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use odflow::actor::{Actor, ActorError, Context};
use odflow::simulation::{ExecutionError, SimInit};
use odflow::time::Time;
use odflow::token::Token;

/// A sensor producing a sawtooth signal at a fixed period.
struct Sensor {
    period: f64,
    amplitude: f64,
    phase: f64,
}

impl Actor for Sensor {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        self.phase = (self.phase + 0.1) % 1.0;

        cx.send_delayed(0, 0, Token::new(self.phase * self.amplitude), self.period)
    }
}

/// Sliding average over the last `window` samples, whatever their source.
struct Averager {
    window: usize,
    samples: Vec<f64>,
}

impl Actor for Averager {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        let sample = input
            .token
            .into_value::<f64>()
            .map_err(|_| ActorError::failure("sensor samples must be f64"))?;

        self.samples.push(sample);
        if self.samples.len() > self.window {
            self.samples.remove(0);
        }
        let average = self.samples.iter().sum::<f64>() / self.samples.len() as f64;

        cx.broadcast(0, Token::new((input.port, average)))
    }
}

/// Collects the averages.
struct Display {
    averages: Arc<Mutex<Vec<(Time, usize, f64)>>>,
}

impl Actor for Display {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        let (port, average) = *input
            .token
            .downcast_ref::<(usize, f64)>()
            .ok_or_else(|| ActorError::failure("unexpected token"))?;

        self.averages
            .lock()
            .unwrap()
            .push((input.time, port, average));

        Ok(())
    }
}

fn main() -> Result<(), ExecutionError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_names(true)
        .init();

    // ---------------
    // Bench assembly.
    // ---------------

    let averages = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let fast = bench.add_actor(
        Sensor {
            period: 0.5,
            amplitude: 1.0,
            phase: 0.0,
        },
        "fast sensor",
    );
    let slow = bench.add_actor(
        Sensor {
            period: 2.0,
            amplitude: 10.0,
            phase: 0.5,
        },
        "slow sensor",
    );
    let averager = bench.add_actor(
        Averager {
            window: 4,
            samples: Vec::new(),
        },
        "averager",
    );
    let display = bench.add_actor(
        Display {
            averages: averages.clone(),
        },
        "display",
    );
    bench.connect(fast, 0, averager, 0);
    // The slow sensor wins ties.
    bench.connect(slow, 0, averager, 1);
    bench.connect(averager, 0, display, 0);

    // Small queues force the fast sensor to block until the queues are grown.
    let mut simu = bench
        .set_completion_time(Time::new(10.0).unwrap())
        .with_queue_capacity(1)
        .with_max_queue_capacity(64)
        .init()?;

    // ----------
    // Execution.
    // ----------

    simu.run()?;

    let averages = averages.lock().unwrap();
    for (time, port, average) in averages.iter() {
        let source = if *port == 0 { "fast" } else { "slow" };
        println!("t={:>5}  {:<4}  average={:.3}", time.as_f64(), source, average);
    }

    // 20 fast samples and 5 slow samples up to t=10.
    assert_eq!(averages.len(), 25);
    assert!(averages.windows(2).all(|w| w[0].0 <= w[1].0));

    Ok(())
}
