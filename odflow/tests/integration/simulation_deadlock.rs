//! Deadlock detection and resolution.

use std::sync::{Arc, Mutex};

use odflow::actor::{Actor, ActorError, Context};
use odflow::coordinator::Resolution;
use odflow::receiver::ReceiverInfo;
use odflow::simulation::{DeadlockInfo, ExecutionError, SimInit};
use odflow::time::Time;
use odflow::token::Token;

/// Sends 3 tokens at t=1 on port 0, then 1 token at t=2 on port 1.
struct Burst;
impl Actor for Burst {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        cx.advance_time(Time::new(1.0).unwrap())?;
        for _ in 0..3 {
            cx.send(0, 0, Token::new('x'))?;
        }
        cx.advance_time(Time::new(2.0).unwrap())?;
        cx.send(1, 0, Token::new('y'))
    }
    fn postfire(&mut self, _: &mut Context) -> Result<bool, ActorError> {
        Ok(false)
    }
}

/// Records all tokens.
struct Join {
    records: Arc<Mutex<Vec<char>>>,
}
impl Actor for Join {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        let value = input.token.into_value::<char>().unwrap();
        self.records.lock().unwrap().push(value);

        Ok(())
    }
}

fn burst_bench(records: &Arc<Mutex<Vec<char>>>) -> SimInit {
    let mut bench = SimInit::new();
    let burst = bench.add_actor(Burst, "burst");
    let join = bench.add_actor(
        Join {
            records: records.clone(),
        },
        "join",
    );
    bench.connect(burst, 0, join, 0);
    bench.connect(burst, 1, join, 1);

    bench
}

/// While `join` waits for the higher-priority port 1, `burst` fills port 0.
#[test]
fn artificial_deadlock_grows_queue() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut simu = burst_bench(&records)
        .with_queue_capacity(1)
        .init()
        .unwrap();

    let mut increases = 0;
    while simu.postfire() {
        match simu.fire().unwrap() {
            Resolution::CapacityIncreased { .. } => increases += 1,
            Resolution::Completed => {}
        }
    }
    simu.wrapup().unwrap();

    assert!(increases >= 2);
    assert_eq!(*records.lock().unwrap(), vec!['x', 'x', 'x', 'y']);
}

#[test]
fn artificial_deadlock_exceeding_max_capacity() {
    let records = Arc::new(Mutex::new(Vec::new()));

    let mut simu = burst_bench(&records)
        .with_queue_capacity(1)
        .with_max_queue_capacity(2)
        .init()
        .unwrap();

    match simu.run() {
        Err(ExecutionError::Deadlock(infos)) => {
            assert_eq!(
                infos,
                vec![DeadlockInfo {
                    receiver: ReceiverInfo {
                        actor: "join".into(),
                        port: 0,
                        channel: 0
                    },
                    capacity: 2
                }]
            );
        }
        _ => panic!("deadlock not detected"),
    }
    assert!(records.lock().unwrap().is_empty());
}

/// Two relays in a cycle without any initial token.
#[test]
fn read_deadlock_in_cycle_completes() {
    struct Relay;
    impl Actor for Relay {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            let input = cx.next_token()?;
            cx.broadcast_delayed(0, input.token, 1.0)
        }
    }

    let mut bench = SimInit::new();
    let a = bench.add_actor(Relay, "a");
    let b = bench.add_actor(Relay, "b");
    bench.connect(a, 0, b, 0);
    bench.connect(b, 0, a, 0);

    let mut simu = bench.init().unwrap();
    assert_eq!(simu.fire().unwrap(), Resolution::Completed);
    assert!(!simu.postfire());
    simu.wrapup().unwrap();
}

#[test]
fn graph_without_actors_completes() {
    let mut simu = SimInit::new().init().unwrap();

    simu.run().unwrap();
    assert_eq!(simu.coordinator().active_workers(), 0);
}
