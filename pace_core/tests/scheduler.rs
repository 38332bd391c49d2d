use std::sync::atomic::AtomicBool;
use std::time::Duration;

use pace_core::{Scheduler, StopReason};
use pace_traits::clock::test_clock::TestClock;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn targets_stay_on_the_period_grid_despite_run_time() {
    let clock = TestClock::new();
    let inner = clock.clone();
    let mut sched: Scheduler<(), TestClock> = Scheduler::new(clock.clone())
        .with_poll_interval(Duration::from_millis(500))
        .with_max_firings(5);
    sched.register("slow", secs(10), move |_: &mut ()| {
        inner.advance(secs(3));
        Ok(())
    });

    let summary = sched.run_until(&mut (), &AtomicBool::new(false)).unwrap();
    assert_eq!(summary.reason, StopReason::MaxFirings);
    assert_eq!(summary.firings, 5);

    let log = sched.fire_log("slow").unwrap();
    let origin = log[0].target;
    for (k, f) in log.iter().enumerate() {
        assert_eq!(f.target, origin + secs(10) * k as u32);
        // Never starts before its target, and lateness stays under one poll.
        let late = f.started - f.target;
        assert!(late < Duration::from_millis(500), "firing {k} late by {late:?}");
    }
}

#[test]
fn first_poll_fires_everything_in_registration_order() {
    let clock = TestClock::new();
    let mut order: Vec<&'static str> = Vec::new();
    let mut sched: Scheduler<Vec<&'static str>, TestClock> = Scheduler::new(clock);
    sched.register("lagoons", secs(1800), |o: &mut Vec<&'static str>| {
        o.push("lagoons");
        Ok(())
    });
    sched.register("turbidostats", secs(600), |o: &mut Vec<&'static str>| {
        o.push("turbidostats");
        Ok(())
    });
    assert_eq!(sched.poll_once(&mut order).unwrap(), 2);
    assert_eq!(order, ["lagoons", "turbidostats"]);
    assert_eq!(sched.poll_once(&mut order).unwrap(), 0);
}

#[test]
fn periods_interleave_over_an_hour() {
    let clock = TestClock::new();
    let mut counts = (0usize, 0usize);
    let mut sched: Scheduler<(usize, usize), TestClock> = Scheduler::new(clock.clone());
    sched.register("lagoons", secs(1800), |c: &mut (usize, usize)| {
        c.0 += 1;
        Ok(())
    });
    sched.register("turbidostats", secs(600), |c: &mut (usize, usize)| {
        c.1 += 1;
        Ok(())
    });
    // Poll every second for just under an hour.
    for _ in 0..3599 {
        sched.poll_once(&mut counts).unwrap();
        clock.advance(secs(1));
    }
    assert_eq!(counts, (2, 6));
}

#[test]
fn simulate_overrides_every_period() {
    let clock = TestClock::new();
    let mut sched: Scheduler<usize, TestClock> =
        Scheduler::new(clock.clone()).simulate(Duration::from_secs(1));
    sched.register("long", secs(3600), |n: &mut usize| {
        *n += 1;
        Ok(())
    });
    let mut n = 0;
    sched.poll_once(&mut n).unwrap();
    let first = sched.next_fire("long").unwrap();
    assert_eq!(first, clock.origin() + secs(1));
    clock.advance(secs(1));
    sched.poll_once(&mut n).unwrap();
    assert_eq!(n, 2);
}

#[test]
fn shutdown_flag_stops_before_firing() {
    let clock = TestClock::new();
    let mut sched: Scheduler<usize, TestClock> = Scheduler::new(clock);
    sched.register("r", secs(1), |n: &mut usize| {
        *n += 1;
        Ok(())
    });
    let mut n = 0;
    let summary = sched.run_until(&mut n, &AtomicBool::new(true)).unwrap();
    assert_eq!(summary.reason, StopReason::Shutdown);
    assert_eq!(n, 0);
}

#[test]
fn failing_routine_ends_the_run_with_its_name() {
    let clock = TestClock::new();
    let mut sched: Scheduler<(), TestClock> = Scheduler::new(clock);
    sched.register("service_turbidostats", secs(600), |_: &mut ()| {
        Err(eyre::eyre!("reader offline"))
    });
    let err = sched.run_until(&mut (), &AtomicBool::new(false)).unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("service_turbidostats"), "{text}");
    assert!(text.contains("reader offline"), "{text}");
    assert_eq!(sched.firings(), 0);
}

#[test]
fn idle_polls_sleep_on_the_clock() {
    let clock = TestClock::new();
    let mut sched: Scheduler<usize, TestClock> = Scheduler::new(clock.clone())
        .with_poll_interval(Duration::from_millis(200))
        .with_max_firings(2);
    sched.register("r", secs(2), |n: &mut usize| {
        *n += 1;
        Ok(())
    });
    let mut n = 0;
    sched.run_until(&mut n, &AtomicBool::new(false)).unwrap();
    assert_eq!(n, 2);
    // Second firing waits for the period through ten idle sleeps.
    assert_eq!(clock.offset(), secs(2));
}
