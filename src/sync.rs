// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Timer phase synchronizer.
//!
//! Starts a group of counters that share one clock so that each one's first count is its
//! preload value. Once running, the relative phase between any two counters is the difference of
//! their preloads (less the enable skew) and never drifts.
//!
//! Sequence:
//!
//! 1. Validate the group: shared clock domain, preloads inside their periods, and an enable skew
//!    within tolerance. Nothing is written if any check fails.
//! 2. With interrupts masked: halt every counter, write every preload, compute every enable word,
//!    then write the enable words back-to-back.
//!
//! ## Board timing
//!
//! On the board the group is the two PWM timers plus the control-deadline timer. The intended
//! relationship was:
//!
//! 1. axis-0 triangle leads axis-1 by 90°,
//! 2. axis-0 and axis-1 update events symmetrically interleaved,
//! 3. every deadline reload coincides with an axis-0 update event.
//!
//! Only (1) and (3) hold. The PWM timers update on every third extreme, so their update events
//! cannot also be interleaved symmetrically. See [`GUARANTEES`].

use heapless::Vec;

use crate::board::TimerPhases;
use crate::error::SyncError;

/// Largest group that can be started together.
pub const MAX_COUNTERS: usize = 4;

/// Clock feeding a counter. Counters are only comparable within one domain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockDomain {
    pub tick_hz: u32,
}

/// A hardware counter that can be started in phase with others.
pub trait PhaseCounter {
    fn clock_domain(&self) -> ClockDomain;

    /// Auto-reload value. Valid preloads are `0..=period`.
    fn period(&self) -> u32;

    /// Worst-case ticks between the previous enable write of a group and this counter's enable
    /// write taking effect.
    fn enable_latency(&self) -> u32;

    /// Stop counting.
    fn halt(&mut self);

    /// Write the counter register. Only called while halted.
    fn preload(&mut self, value: u32);

    /// Control-register word that starts the counter with its present configuration.
    fn enable_word(&self) -> u32;

    /// Write a word computed by [`enable_word`](PhaseCounter::enable_word).
    fn commit(&mut self, word: u32);
}

/// One member of a synchronized group.
pub struct Phase<'c> {
    pub counter: &'c mut dyn PhaseCounter,
    pub preload: u32,
}

impl<'c> Phase<'c> {
    pub fn new(counter: &'c mut dyn PhaseCounter, preload: u32) -> Self {
        Self { counter, preload }
    }
}

/// Timing relationships a synchronized start establishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Guarantees {
    /// Pairwise phase offsets equal the preload differences, with no drift.
    pub phase_alignment: bool,
    /// Reloads of counters whose periods are integer multiples coincide.
    pub reload_coincidence: bool,
    /// Update events of the PWM timers fall exactly halfway between each other.
    pub symmetric_update_interleaving: bool,
}

/// What [`start_synchronously`] establishes. Symmetric update interleaving is not provided.
pub const GUARANTEES: Guarantees = Guarantees {
    phase_alignment: true,
    reload_coincidence: true,
    symmetric_update_interleaving: false,
};

/// Outcome of a synchronized start.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncReport {
    pub counters: usize,
    /// Worst-case ticks between the first and the last counter starting.
    pub skew: u32,
    pub guarantees: Guarantees,
}

/// Worst-case start skew of `phases` enabled in order.
pub fn achievable_skew(phases: &[Phase<'_>]) -> u32 {
    phases
        .iter()
        .skip(1)
        .fold(0u32, |acc, p| acc.saturating_add(p.counter.enable_latency()))
}

fn validate(phases: &[Phase<'_>], tolerance: u32) -> Result<u32, SyncError> {
    let first = phases.first().ok_or(SyncError::Empty)?;
    if phases.len() > MAX_COUNTERS {
        return Err(SyncError::TooManyCounters(phases.len()));
    }

    let domain = first.counter.clock_domain();
    for (index, phase) in phases.iter().enumerate() {
        if phase.counter.clock_domain() != domain {
            return Err(SyncError::ClockDomainMismatch { index });
        }
        let period = phase.counter.period();
        if phase.preload > period {
            return Err(SyncError::PreloadOutOfRange {
                index,
                preload: phase.preload,
                period,
            });
        }
    }

    let skew = achievable_skew(phases);
    if skew > tolerance {
        return Err(SyncError::SkewExceeded { skew, tolerance });
    }
    Ok(skew)
}

/// Start every counter in `phases` at its preload value.
///
/// `tolerance` is the largest start skew, in ticks, the caller accepts. A group that cannot meet
/// it is rejected before any counter is touched.
pub fn start_synchronously(
    phases: &mut [Phase<'_>],
    tolerance: u32,
) -> Result<SyncReport, SyncError> {
    let skew = validate(phases, tolerance).map_err(|e| {
        error!("timer sync rejected: {}", e);
        e
    })?;

    critical_section::with(|_| {
        for phase in phases.iter_mut() {
            phase.counter.halt();
        }
        for phase in phases.iter_mut() {
            phase.counter.preload(phase.preload);
        }

        // Length checked in `validate`.
        let mut words: Vec<u32, MAX_COUNTERS> = Vec::new();
        for phase in phases.iter() {
            let _ = words.push(phase.counter.enable_word());
        }
        for (phase, word) in phases.iter_mut().zip(words) {
            phase.counter.commit(word);
        }
    });

    info!("{} timers started, skew {} ticks", phases.len(), skew);
    Ok(SyncReport {
        counters: phases.len(),
        skew,
        guarantees: GUARANTEES,
    })
}

/// The board's synchronized group: axis-0 PWM, axis-1 PWM, control deadline.
pub fn board_phases<'c>(
    timing: &TimerPhases,
    axis0: &'c mut dyn PhaseCounter,
    axis1: &'c mut dyn PhaseCounter,
    deadline: &'c mut dyn PhaseCounter,
) -> [Phase<'c>; 3] {
    [
        Phase::new(axis0, timing.axis0),
        Phase::new(axis1, timing.axis1),
        Phase::new(deadline, timing.deadline),
    ]
}
