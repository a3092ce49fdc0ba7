//! Actor error and panic reporting.

use odflow::actor::{Actor, ActorError, Context};
use odflow::simulation::{ExecutionError, SimInit};
use odflow::time::Time;
use odflow::token::Token;

/// Sends a countdown, one time unit apart.
struct Countdown {
    count: usize,
}
impl Actor for Countdown {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        self.count = self.count.saturating_sub(1);
        cx.send_delayed(0, 0, Token::new(self.count), 1.0)
    }
}

/// Reports the countdown reaching zero in the specified way.
enum Trap {
    Error,
    Panic,
}
impl Actor for Trap {
    fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
        let input = cx.next_token()?;
        if input.token.into_value::<usize>().unwrap() != 0 {
            return Ok(());
        }

        match self {
            Trap::Error => Err(ActorError::failure("countdown expired")),
            Trap::Panic => panic!("test message"),
        }
    }
}

fn countdown_bench(trap: Trap) -> SimInit {
    const INIT_COUNTDOWN: usize = 5;

    let mut bench = SimInit::new();
    let countdown = bench.add_actor(
        Countdown {
            count: INIT_COUNTDOWN,
        },
        "countdown",
    );
    let trap = bench.add_actor(trap, "trap");
    bench.connect(countdown, 0, trap, 0);

    bench
}

#[test]
fn actor_failure_is_reported() {
    let mut simu = countdown_bench(Trap::Error).init().unwrap();

    match simu.run() {
        Err(ExecutionError::ActorFailure { actor, error }) => {
            assert_eq!(actor, "trap");
            assert_eq!(error.to_string(), "countdown expired");
        }
        _ => panic!("actor failure not reported"),
    }
}

#[test]
fn actor_panic_is_reported() {
    let mut simu = countdown_bench(Trap::Panic).init().unwrap();

    match simu.run() {
        Err(ExecutionError::Panic { actor, message }) => {
            assert_eq!(actor, "trap");
            assert_eq!(message, "test message");
        }
        _ => panic!("actor panic not reported"),
    }
}

#[test]
fn time_regression_is_fatal() {
    struct Rewind;
    impl Actor for Rewind {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.advance_time(Time::new(3.0).unwrap())?;
            cx.advance_time(Time::new(2.0).unwrap())
        }
    }

    let mut bench = SimInit::new();
    bench.add_actor(Rewind, "rewind");
    let mut simu = bench.init().unwrap();

    match simu.run() {
        Err(ExecutionError::ActorFailure {
            actor,
            error: ActorError::TimeRegression(e),
        }) => {
            assert_eq!(actor, "rewind");
            assert_eq!(e.current, Time::new(3.0).unwrap());
            assert_eq!(e.requested, Time::new(2.0).unwrap());
        }
        _ => panic!("time regression not reported"),
    }
}

#[test]
fn negative_delay_is_fatal() {
    struct Hasty;
    impl Actor for Hasty {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.broadcast_delayed(0, Token::new(()), -1.0)
        }
    }

    struct Idle;
    impl Actor for Idle {
        fn fire(&mut self, cx: &mut Context) -> Result<(), ActorError> {
            cx.next_token().map(|_| ())
        }
    }

    let mut bench = SimInit::new();
    let hasty = bench.add_actor(Hasty, "hasty");
    let idle = bench.add_actor(Idle, "idle");
    bench.connect(hasty, 0, idle, 0);
    let mut simu = bench.init().unwrap();

    match simu.run() {
        Err(ExecutionError::ActorFailure {
            error: ActorError::NegativeDelay(delay),
            ..
        }) => assert_eq!(delay, -1.0),
        _ => panic!("negative delay not reported"),
    }
}
