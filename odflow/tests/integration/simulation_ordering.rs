//! Time and priority ordering of token consumption.

use std::sync::{Arc, Mutex};

use odflow::actor::{Actor, ActorError, Context};
use odflow::simulation::SimInit;
use odflow::time::Time;
use odflow::token::Token;

/// Sends an increasing counter, one time unit apart.
struct Counter {
    count: u32,
}
impl Actor for Counter {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        self.count += 1;
        cx.send_delayed(0, 0, Token::new(self.count), 1.0)
    }
}

/// Sends a token with the specified label at each of the specified times.
struct Emitter {
    label: char,
    times: Vec<f64>,
    next: usize,
}
impl Emitter {
    fn new(label: char, times: &[f64]) -> Self {
        Self {
            label,
            times: times.to_vec(),
            next: 0,
        }
    }
}
impl Actor for Emitter {
    fn prefire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
        Ok(self.next < self.times.len())
    }
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let time = Time::new(self.times[self.next]).unwrap();
        self.next += 1;

        cx.advance_time(time)?;
        cx.send(0, 0, Token::new(self.label))
    }
}

/// Forwards all tokens without delay.
struct Relay;
impl Actor for Relay {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        cx.broadcast(0, input.token)
    }
}

/// Records the time and value of all tokens.
struct Recorder<T> {
    records: Arc<Mutex<Vec<(f64, T)>>>,
}
impl<T: Clone + Send + 'static> Actor for Recorder<T> {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        let value = input.token.downcast_ref::<T>().unwrap().clone();
        self.records
            .lock()
            .unwrap()
            .push((input.time.as_f64(), value));

        Ok(())
    }
}

#[test]
fn pipeline_with_completion_time() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let counter = bench.add_actor(Counter { count: 0 }, "counter");
    let relay = bench.add_actor(Relay, "relay");
    let sink = bench.add_actor(
        Recorder::<u32> {
            records: records.clone(),
        },
        "sink",
    );
    bench.connect(counter, 0, relay, 0);
    bench.connect(relay, 0, sink, 0);

    let mut simu = bench
        .set_completion_time(Time::new(10.0).unwrap())
        .init()
        .unwrap();
    simu.run().unwrap();

    let expected: Vec<_> = (1..=10).map(|i| (i as f64, i)).collect();
    assert_eq!(*records.lock().unwrap(), expected);
    assert!(!simu.postfire());
}

#[test]
fn priority_breaks_time_ties() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let a = bench.add_actor(Emitter::new('a', &[1.0, 3.0, 5.0]), "a");
    let b = bench.add_actor(Emitter::new('b', &[1.0, 2.0, 5.0]), "b");
    let merge = bench.add_actor(
        Recorder::<char> {
            records: records.clone(),
        },
        "merge",
    );
    // Input port 1 gets the higher default priority.
    bench.connect(a, 0, merge, 0);
    bench.connect(b, 0, merge, 1);

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    assert_eq!(
        *records.lock().unwrap(),
        vec![
            (1.0, 'b'),
            (1.0, 'a'),
            (2.0, 'b'),
            (3.0, 'a'),
            (5.0, 'b'),
            (5.0, 'a')
        ]
    );
}

#[test]
fn explicit_priority_overrides_default() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let a = bench.add_actor(Emitter::new('a', &[1.0, 2.0]), "a");
    let b = bench.add_actor(Emitter::new('b', &[1.0, 2.0]), "b");
    let merge = bench.add_actor(
        Recorder::<char> {
            records: records.clone(),
        },
        "merge",
    );
    bench.connect_with_priority(a, 0, merge, 0, 10);
    bench.connect(b, 0, merge, 1);

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    assert_eq!(
        *records.lock().unwrap(),
        vec![(1.0, 'a'), (1.0, 'b'), (2.0, 'a'), (2.0, 'b')]
    );
}

#[test]
fn time_is_monotonic_per_actor() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let a = bench.add_actor(Emitter::new('a', &[0.5, 4.0, 4.0, 9.0]), "a");
    let b = bench.add_actor(Emitter::new('b', &[2.0, 3.0, 8.5]), "b");
    let c = bench.add_actor(Emitter::new('c', &[0.0, 7.0]), "c");
    let merge = bench.add_actor(
        Recorder::<char> {
            records: records.clone(),
        },
        "merge",
    );
    bench.connect(a, 0, merge, 0);
    bench.connect(b, 0, merge, 0);
    bench.connect(c, 0, merge, 1);

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 9);
    assert!(records.windows(2).all(|w| w[0].0 <= w[1].0));
}

/// Sends a single token after the specified delay.
struct Single<T> {
    value: T,
    delay: f64,
}
impl<T: Clone + Send + std::fmt::Debug + 'static> Actor for Single<T> {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        cx.send_delayed(0, 0, Token::new(self.value.clone()), self.delay)
    }
    fn postfire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
        Ok(false)
    }
}

/// Reads by port while another port holds an earlier null token.
#[test]
fn read_by_port_skips_null_tokens_on_other_ports() {
    /// Announces time 1 with a null token, then sends a token at time 3.
    struct Late;
    impl Actor for Late {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.advance_time(Time::new(1.0).unwrap())?;
            cx.send_delayed(0, 0, Token::new('b'), 2.0)
        }
        fn postfire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
            Ok(false)
        }
    }

    struct Zip {
        records: Arc<Mutex<Vec<(f64, char)>>>,
    }
    impl Actor for Zip {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            for port in 0..2 {
                let value = cx.get(port)?.into_value::<char>().unwrap();
                self.records
                    .lock()
                    .unwrap()
                    .push((cx.current_time().as_f64(), value));
            }

            Ok(())
        }
    }

    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let a = bench.add_actor(
        Single {
            value: 'a',
            delay: 2.0,
        },
        "a",
    );
    let b = bench.add_actor(Late, "b");
    let zip = bench.add_actor(
        Zip {
            records: records.clone(),
        },
        "zip",
    );
    bench.connect(a, 0, zip, 0);
    bench.connect(b, 0, zip, 1);

    let mut simu = bench.init().unwrap();
    simu.run().unwrap();

    assert_eq!(*records.lock().unwrap(), vec![(2.0, 'a'), (3.0, 'b')]);
}

/// A feedback delay announcing its first output time with a null token does
/// not hold back a data token with the same time stamp on a lower-priority
/// port.
#[test]
fn data_token_is_not_held_back_by_tied_null_token() {
    struct FeedbackDelay;
    impl Actor for FeedbackDelay {
        fn initialize(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.send_delayed(0, 0, Token::Null, 1.0)
        }
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            let input = cx.next_token()?;
            cx.broadcast_delayed(0, input.token, 1.0)
        }
    }

    struct Merge {
        records: Arc<Mutex<Vec<(f64, i32)>>>,
    }
    impl Actor for Merge {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            let input = cx.next_token()?;
            let value = *input.token.downcast_ref::<i32>().unwrap();
            self.records
                .lock()
                .unwrap()
                .push((input.time.as_f64(), value));

            cx.broadcast(0, input.token)
        }
    }

    let records = Arc::new(Mutex::new(Vec::new()));

    let mut bench = SimInit::new();
    let src = bench.add_actor(
        Single {
            value: 7i32,
            delay: 1.0,
        },
        "src",
    );
    let merge = bench.add_actor(
        Merge {
            records: records.clone(),
        },
        "merge",
    );
    let delay = bench.add_actor(FeedbackDelay, "delay");
    bench.connect(src, 0, merge, 0);
    bench.connect(delay, 0, merge, 1);
    bench.connect(merge, 0, delay, 0);

    let mut simu = bench
        .set_completion_time(Time::new(20.0).unwrap())
        .init()
        .unwrap();
    simu.run().unwrap();

    let expected: Vec<_> = (1..=20).map(|k| (k as f64, 7)).collect();
    assert_eq!(*records.lock().unwrap(), expected);
}
