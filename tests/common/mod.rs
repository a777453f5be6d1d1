// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Host-side simulations shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use axisboard::board::{PinFunction, PinId, PinMux};
use axisboard::sync::{ClockDomain, PhaseCounter};

// ---------------------------------------------------------------------------
// Simulated timers
// ---------------------------------------------------------------------------

pub const CEN: u32 = 1;
pub const TICK_HZ: u32 = 216_000_000;

/// Free-running timer clock shared by every simulated counter.
#[derive(Default)]
pub struct SimClock {
    now: Cell<u64>,
}

impl SimClock {
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ticks: u64) {
        self.now.set(self.now.get() + ticks);
    }
}

/// Register access seen by the synchronizer, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Halt(usize),
    Preload(usize, u32),
    Commit(usize),
}

pub type OpLog = Rc<RefCell<Vec<Op>>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Counting {
    /// Counts 0..=arr..=0; an update event every `repetition + 1` extremes.
    Center { repetition: u32 },
    /// Counts 0..=arr and wraps.
    Up,
}

/// A timer that models counting analytically from its start tick.
pub struct SimCounter {
    id: usize,
    clock: Rc<SimClock>,
    log: OpLog,
    pub tick_hz: u32,
    pub arr: u32,
    pub counting: Counting,
    pub latency: u32,
    cr1: u32,
    cnt: u32,
    started_at: Option<u64>,
}

impl SimCounter {
    pub fn new(id: usize, clock: &Rc<SimClock>, log: &OpLog, arr: u32, counting: Counting) -> Self {
        Self {
            id,
            clock: clock.clone(),
            log: log.clone(),
            tick_hz: TICK_HZ,
            arr,
            counting,
            latency: 0,
            cr1: 0,
            cnt: 0,
            started_at: None,
        }
    }

    pub fn with_latency(mut self, latency: u32) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_tick_hz(mut self, tick_hz: u32) -> Self {
        self.tick_hz = tick_hz;
        self
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn is_running(&self) -> bool {
        self.cr1 & CEN != 0
    }

    /// Ticks in one full counting cycle.
    pub fn cycle(&self) -> u64 {
        match self.counting {
            Counting::Center { .. } => 2 * self.arr as u64,
            Counting::Up => self.arr as u64 + 1,
        }
    }

    /// Position within the counting cycle at absolute tick `t`.
    pub fn phase_at(&self, t: u64) -> u64 {
        let start = self.started_at.expect("counter not started");
        (self.cnt as u64 + (t - start)) % self.cycle()
    }

    /// Counter register value at absolute tick `t`.
    pub fn count_at(&self, t: u64) -> u64 {
        let phase = self.phase_at(t);
        match self.counting {
            Counting::Center { .. } if phase > self.arr as u64 => self.cycle() - phase,
            _ => phase,
        }
    }

    /// Absolute ticks of update events (reloads) up to and including `until`.
    pub fn update_events(&self, until: u64) -> Vec<u64> {
        let start = self.started_at.expect("counter not started");
        let cnt = self.cnt as u64;
        let arr = self.arr as u64;
        let mut events = Vec::new();
        match self.counting {
            Counting::Center { repetition } => {
                // The k-th extreme after start is reached k * arr - cnt ticks in.
                let mut k = 1;
                loop {
                    let t = start + k * arr - cnt;
                    if t > until {
                        break;
                    }
                    if k % (repetition as u64 + 1) == 0 {
                        events.push(t);
                    }
                    k += 1;
                }
            }
            Counting::Up => {
                let mut m = 1;
                loop {
                    let t = start + m * (arr + 1) - cnt;
                    if t > until {
                        break;
                    }
                    events.push(t);
                    m += 1;
                }
            }
        }
        events
    }
}

impl PhaseCounter for SimCounter {
    fn clock_domain(&self) -> ClockDomain {
        ClockDomain {
            tick_hz: self.tick_hz,
        }
    }

    fn period(&self) -> u32 {
        self.arr
    }

    fn enable_latency(&self) -> u32 {
        self.latency
    }

    fn halt(&mut self) {
        self.log.borrow_mut().push(Op::Halt(self.id));
        self.cr1 &= !CEN;
        self.started_at = None;
    }

    fn preload(&mut self, value: u32) {
        self.log.borrow_mut().push(Op::Preload(self.id, value));
        self.cnt = value;
    }

    fn enable_word(&self) -> u32 {
        self.cr1 | CEN
    }

    fn commit(&mut self, word: u32) {
        self.log.borrow_mut().push(Op::Commit(self.id));
        self.clock.advance(self.latency as u64);
        if word & CEN != 0 && self.started_at.is_none() {
            self.started_at = Some(self.clock.now());
        }
        self.cr1 = word;
    }
}

// ---------------------------------------------------------------------------
// Pin multiplexer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingMux {
    pub configured: Vec<(PinId, PinFunction)>,
}

impl RecordingMux {
    pub fn function_of(&self, pin: PinId) -> Option<PinFunction> {
        self.configured
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, f)| *f)
    }
}

impl PinMux for RecordingMux {
    fn configure(&mut self, pin: PinId, function: PinFunction) {
        self.configured.push((pin, function));
    }
}
