// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use axisboard::board::BoardRevision;
use axisboard::error::SyncError;
use axisboard::sync::{
    achievable_skew, board_phases, start_synchronously, Phase, GUARANTEES, MAX_COUNTERS,
};

use common::{Counting, Op, OpLog, SimClock, SimCounter};

const P: u32 = 3500;

fn setup() -> (Rc<SimClock>, OpLog) {
    let clock = Rc::new(SimClock::default());
    clock.advance(1_000);
    (clock, Rc::new(RefCell::new(Vec::new())))
}

fn center(id: usize, clock: &Rc<SimClock>, log: &OpLog) -> SimCounter {
    SimCounter::new(id, clock, log, P, Counting::Center { repetition: 0 })
}

// ---------------------------------------------------------------------------
// Phase alignment
// ---------------------------------------------------------------------------

#[test]
fn first_count_is_the_preload() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log);
    let mut b = center(1, &clock, &log);

    let mut phases = [Phase::new(&mut a, 0), Phase::new(&mut b, P / 2)];
    start_synchronously(&mut phases, 0).unwrap();

    let t0 = a.started_at().unwrap();
    assert_eq!(b.started_at(), Some(t0));
    assert_eq!(a.count_at(t0), 0);
    assert_eq!(b.count_at(t0), (P / 2) as u64);
}

#[test]
fn offsets_hold_after_ten_thousand_periods() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log);
    let mut b = center(1, &clock, &log);
    // Same full cycle as the center-aligned pair.
    let mut c = SimCounter::new(2, &clock, &log, 2 * P - 1, Counting::Up);

    let mut phases = [
        Phase::new(&mut a, 0),
        Phase::new(&mut b, P / 2),
        Phase::new(&mut c, P / 2),
    ];
    let report = start_synchronously(&mut phases, 0).unwrap();
    assert_eq!(report.counters, 3);
    assert_eq!(report.skew, 0);

    let cycle = 2 * P as u64;
    let t0 = a.started_at().unwrap();
    for t in [
        t0 + 10_000 * cycle,
        t0 + 10_000 * cycle + 1_234,
        t0 + 123_456 * cycle + 3_499,
    ] {
        let pa = a.phase_at(t);
        let pb = b.phase_at(t);
        let pc = c.phase_at(t);
        assert_eq!((pb + cycle - pa) % cycle, (P / 2) as u64);
        assert_eq!((pc + cycle - pa) % cycle, (P / 2) as u64);
    }

    assert_eq!(a.count_at(t0 + 10_000 * cycle + 1_234), 1_234);
}

#[test]
fn enable_latency_gives_constant_skew() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log).with_latency(2);
    let mut b = center(1, &clock, &log).with_latency(3);
    let mut c = center(2, &clock, &log).with_latency(3);

    let mut phases = [
        Phase::new(&mut a, 0),
        Phase::new(&mut b, P / 2),
        Phase::new(&mut c, P / 2),
    ];
    assert_eq!(achievable_skew(&phases), 6);
    let report = start_synchronously(&mut phases, 16).unwrap();
    assert_eq!(report.skew, 6);

    let ta = a.started_at().unwrap();
    let tc = c.started_at().unwrap();
    assert_eq!(tc - ta, 6);

    // The skew shifts the offset once and never grows.
    let cycle = 2 * P as u64;
    let early = (b.phase_at(tc) + cycle - a.phase_at(tc)) % cycle;
    let late_t = tc + 10_000 * cycle + 777;
    let late = (b.phase_at(late_t) + cycle - a.phase_at(late_t)) % cycle;
    assert_eq!(early, (P / 2 - 3) as u64);
    assert_eq!(early, late);
}

#[test]
fn every_preload_is_written_before_any_enable() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log);
    let mut b = center(1, &clock, &log);
    let mut c = center(2, &clock, &log);

    let mut phases = [
        Phase::new(&mut a, 10),
        Phase::new(&mut b, 20),
        Phase::new(&mut c, 30),
    ];
    start_synchronously(&mut phases, 0).unwrap();

    let ops = log.borrow();
    assert_eq!(
        *ops,
        vec![
            Op::Halt(0),
            Op::Halt(1),
            Op::Halt(2),
            Op::Preload(0, 10),
            Op::Preload(1, 20),
            Op::Preload(2, 30),
            Op::Commit(0),
            Op::Commit(1),
            Op::Commit(2),
        ]
    );
    assert!(a.is_running() && b.is_running() && c.is_running());
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn skew_beyond_tolerance_is_rejected_before_touching_hardware() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log).with_latency(10);
    let mut b = center(1, &clock, &log).with_latency(10);
    let mut c = center(2, &clock, &log).with_latency(10);

    let mut phases = [
        Phase::new(&mut a, 0),
        Phase::new(&mut b, 0),
        Phase::new(&mut c, 0),
    ];
    let err = start_synchronously(&mut phases, 5).unwrap_err();

    assert_eq!(
        err,
        SyncError::SkewExceeded {
            skew: 20,
            tolerance: 5
        }
    );
    assert!(log.borrow().is_empty());
    assert!(!a.is_running() && !b.is_running() && !c.is_running());
}

#[test]
fn counters_on_different_clocks_are_rejected() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log);
    let mut b = center(1, &clock, &log);
    let mut c = center(2, &clock, &log).with_tick_hz(108_000_000);

    let mut phases = [
        Phase::new(&mut a, 0),
        Phase::new(&mut b, 0),
        Phase::new(&mut c, 0),
    ];
    assert_eq!(
        start_synchronously(&mut phases, 16),
        Err(SyncError::ClockDomainMismatch { index: 2 })
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn preload_beyond_period_is_rejected() {
    let (clock, log) = setup();
    let mut a = center(0, &clock, &log);
    let mut b = center(1, &clock, &log);

    let mut phases = [Phase::new(&mut a, 0), Phase::new(&mut b, P + 1)];
    assert_eq!(
        start_synchronously(&mut phases, 16),
        Err(SyncError::PreloadOutOfRange {
            index: 1,
            preload: P + 1,
            period: P
        })
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn group_size_is_bounded() {
    let (clock, log) = setup();
    assert_eq!(start_synchronously(&mut [], 16), Err(SyncError::Empty));

    let mut counters: Vec<SimCounter> = (0..MAX_COUNTERS + 1)
        .map(|id| center(id, &clock, &log))
        .collect();
    let mut phases: Vec<Phase<'_>> = counters
        .iter_mut()
        .map(|c| Phase::new(c, 0))
        .collect();
    assert_eq!(
        start_synchronously(&mut phases, 16),
        Err(SyncError::TooManyCounters(MAX_COUNTERS + 1))
    );
}

// ---------------------------------------------------------------------------
// Board timing
// ---------------------------------------------------------------------------

#[test]
fn board_timing_keeps_alignment_and_reload_coincidence_only() {
    let timing = BoardRevision::V3_6.descriptor().timer_phases;
    let pwm = Counting::Center {
        repetition: timing.repetition,
    };

    let (clock, log) = setup();
    let mut tim1 = SimCounter::new(0, &clock, &log, timing.pwm_period, pwm);
    let mut tim8 = SimCounter::new(1, &clock, &log, timing.pwm_period, pwm);
    let mut tim13 = SimCounter::new(2, &clock, &log, timing.deadline_period(), Counting::Up);

    let mut phases = board_phases(&timing, &mut tim1, &mut tim8, &mut tim13);
    let report = start_synchronously(&mut phases, 0).unwrap();
    assert_eq!(report.guarantees, GUARANTEES);

    let p = timing.pwm_period as u64;
    let t0 = tim1.started_at().unwrap();
    let horizon = t0 + 10_000 * 2 * p;

    // Axis 0 leads axis 1 by the configured offset, forever.
    for t in [t0 + 1, t0 + 5_000 * 2 * p + 17, horizon] {
        let lead = (tim1.phase_at(t) + 2 * p - tim8.phase_at(t)) % (2 * p);
        assert_eq!(lead, (timing.axis0 - timing.axis1) as u64);
    }

    // Every deadline reload coincides with an axis-0 update, and vice versa.
    let axis0_updates = tim1.update_events(horizon);
    let deadline_reloads = tim13.update_events(horizon);
    assert!(!axis0_updates.is_empty());
    assert_eq!(axis0_updates, deadline_reloads);

    // Axis-1 updates do not fall halfway between axis-0 updates.
    assert!(!GUARANTEES.symmetric_update_interleaving);
    let axis1_updates = tim8.update_events(horizon + 3 * p);
    let update_period = (timing.repetition as u64 + 1) * p;
    for &u in &axis0_updates {
        let next = axis1_updates.iter().find(|&&v| v > u).copied().unwrap();
        assert_ne!(next - u, update_period / 2);
    }
}
