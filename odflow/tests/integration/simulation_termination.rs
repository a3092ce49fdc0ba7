//! Termination propagation and completion time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use odflow::actor::{Actor, ActorError, Context};
use odflow::simulation::SimInit;
use odflow::time::Time;
use odflow::token::Token;

/// Forwards tokens with a delay and records their time stamps.
struct Echo {
    seen: Arc<Mutex<Vec<f64>>>,
    primed: bool,
}
impl Actor for Echo {
    fn initialize(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        if self.primed {
            cx.send(0, 0, Token::new(()))?;
        }

        Ok(())
    }
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        self.seen.lock().unwrap().push(input.time.as_f64());

        cx.broadcast_delayed(0, input.token, 1.0)
    }
}

/// A token circulating in a cycle stops at the completion time.
#[test]
fn cycle_stops_at_completion_time() {
    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let a = bench.add_actor(
        Echo {
            seen: seen_a.clone(),
            primed: true,
        },
        "a",
    );
    let b = bench.add_actor(
        Echo {
            seen: seen_b.clone(),
            primed: false,
        },
        "b",
    );
    bench.connect(a, 0, b, 0);
    bench.connect(b, 0, a, 0);

    let mut simu = bench
        .set_completion_time(Time::new(5.0).unwrap())
        .init()
        .unwrap();
    assert_eq!(simu.completion_time(), Time::new(5.0));
    simu.run().unwrap();

    assert_eq!(*seen_a.lock().unwrap(), vec![1.0, 3.0, 5.0]);
    assert_eq!(*seen_b.lock().unwrap(), vec![0.0, 2.0, 4.0]);
}

/// An actor stopping on its own terminates its downstream actors, and each
/// actor is wrapped up exactly once.
#[test]
fn termination_propagates_downstream() {
    struct Limited {
        remaining: usize,
    }
    impl Actor for Limited {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            self.remaining -= 1;
            cx.send_delayed(0, 0, Token::new(self.remaining), 2.0)
        }
        fn postfire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
            Ok(self.remaining > 0)
        }
    }

    struct Counted {
        received: Arc<AtomicUsize>,
        wrapups: Arc<AtomicUsize>,
    }
    impl Actor for Counted {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            let input = cx.next_token()?;
            self.received.fetch_add(1, Ordering::Relaxed);

            cx.broadcast(0, input.token)
        }
        fn wrapup(&mut self, _: &mut Context) {
            self.wrapups.fetch_add(1, Ordering::Relaxed);
        }
    }

    let received = Arc::new(AtomicUsize::new(0));
    let wrapups = Arc::new(AtomicUsize::new(0));

    let mut bench = SimInit::new();
    let source = bench.add_actor(Limited { remaining: 4 }, "source");
    let mut upstream = source;
    for idx in 0..3 {
        let stage = bench.add_actor(
            Counted {
                received: received.clone(),
                wrapups: wrapups.clone(),
            },
            format!("stage{}", idx),
        );
        bench.connect(upstream, 0, stage, 0);
        upstream = stage;
    }

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    assert_eq!(received.load(Ordering::Relaxed), 3 * 4);
    assert_eq!(wrapups.load(Ordering::Relaxed), 3);
}

/// An actor with several inputs only stops once all its lanes are finished.
#[test]
fn actor_completes_when_all_lanes_finish() {
    struct Once(f64);
    impl Actor for Once {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.send_delayed(0, 0, Token::new(self.0), self.0)
        }
        fn postfire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
            Ok(false)
        }
    }

    struct Sum(Arc<Mutex<f64>>);
    impl Actor for Sum {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            let input = cx.next_token()?;
            *self.0.lock().unwrap() += input.token.into_value::<f64>().unwrap();

            Ok(())
        }
    }

    let sum = Arc::new(Mutex::new(0.0));

    let mut bench = SimInit::new();
    let early = bench.add_actor(Once(1.0), "early");
    let late = bench.add_actor(Once(20.0), "late");
    let adder = bench.add_actor(Sum(sum.clone()), "adder");
    bench.connect(early, 0, adder, 0);
    bench.connect(late, 0, adder, 1);

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    assert_eq!(*sum.lock().unwrap(), 21.0);
}
