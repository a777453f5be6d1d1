// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Conversion-complete event dispatcher.
//!
//! One [`ConversionDispatcher`] per ADC unit. On every conversion-complete interrupt it checks the
//! injected sequence, then the regular sequence. A sequence is serviced when its completion flag
//! and its interrupt enable are both set: the bound handler runs once, then only that sequence's
//! status flags are cleared. A flag whose interrupt is disabled is left alone.
//!
//! The dispatcher does not time its handlers. Callers that need to catch overruns wrap the entry
//! in a [`CycleBudget`].
//!
//! [`ConversionVector`] only holds its critical section while it reads or clears flags. Handlers
//! run with interrupts unmasked and may call back into the vector.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::OverrunError;
use crate::vectors::{InterruptHandler, Vector};

/// Conversion sequence kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceKind {
    /// Triggered by the PWM timer; time critical.
    Injected,
    /// Free-running, lower priority.
    Regular,
}

/// ADC unit number (1-based, as in the datasheet).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionUnit(pub u8);

/// Status and control bits of one sequence kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelDescriptor {
    pub kind: SequenceKind,
    /// Completion flag in the status register.
    pub flag: u32,
    /// Interrupt enable in the control register.
    pub enable: u32,
    /// Status flags cleared once the sequence has been serviced.
    pub clear: u32,
}

/// Status and interrupt-enable registers of an ADC unit.
pub trait ConversionFlags {
    const INJECTED: ChannelDescriptor;
    const REGULAR: ChannelDescriptor;

    fn status(&self) -> u32;

    fn interrupt_enable(&self) -> u32;

    /// Clear the status flags in `mask`. Every other flag keeps its value.
    fn clear(&mut self, mask: u32);
}

/// Consumer of conversion results.
pub trait ConversionHandler: Sync {
    fn on_conversion(&self, unit: ConversionUnit, kind: SequenceKind);
}

/// Handler that ignores every conversion.
pub struct Discard;

impl ConversionHandler for Discard {
    fn on_conversion(&self, _unit: ConversionUnit, _kind: SequenceKind) {}
}

/// Which sequences one dispatch entry serviced.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    pub injected: bool,
    pub regular: bool,
}

impl Serviced {
    #[inline]
    pub fn any(&self) -> bool {
        self.injected || self.regular
    }

    fn mark(&mut self, kind: SequenceKind) {
        match kind {
            SequenceKind::Injected => self.injected = true,
            SequenceKind::Regular => self.regular = true,
        }
    }
}

pub struct ConversionDispatcher<'a, F> {
    unit: ConversionUnit,
    flags: F,
    injected: &'a dyn ConversionHandler,
    regular: &'a dyn ConversionHandler,
}

impl<'a, F: ConversionFlags> ConversionDispatcher<'a, F> {
    /// Route both sequence kinds of `unit` to `handler`.
    pub fn new(unit: ConversionUnit, flags: F, handler: &'a dyn ConversionHandler) -> Self {
        Self {
            unit,
            flags,
            injected: handler,
            regular: handler,
        }
    }

    /// Route one sequence kind to its own handler.
    pub fn with_handler(mut self, kind: SequenceKind, handler: &'a dyn ConversionHandler) -> Self {
        match kind {
            SequenceKind::Injected => self.injected = handler,
            SequenceKind::Regular => self.regular = handler,
        }
        self
    }

    #[inline]
    pub fn unit(&self) -> ConversionUnit {
        self.unit
    }

    /// Service one interrupt entry. Injected first, then regular.
    pub fn dispatch(&mut self) -> Serviced {
        let mut serviced = Serviced::default();
        for kind in [SequenceKind::Injected, SequenceKind::Regular] {
            // Status is re-read per kind: the injected handler may take long enough for the
            // regular sequence to finish meanwhile.
            if let Some(handler) = self.ready(kind) {
                handler.on_conversion(self.unit, kind);
                self.acknowledge(kind);
                serviced.mark(kind);
            }
        }
        serviced
    }

    /// The handler due to run for `kind`: its completion flag and interrupt enable are both set.
    pub fn ready(&self, kind: SequenceKind) -> Option<&'a dyn ConversionHandler> {
        let channel = Self::channel(kind);
        let pending = self.flags.status() & channel.flag != 0;
        let enabled = self.flags.interrupt_enable() & channel.enable != 0;
        if !(pending && enabled) {
            return None;
        }
        Some(match kind {
            SequenceKind::Injected => self.injected,
            SequenceKind::Regular => self.regular,
        })
    }

    /// Clear the status flags of `kind` once its handler has run.
    pub fn acknowledge(&mut self, kind: SequenceKind) {
        self.flags.clear(Self::channel(kind).clear);
    }

    #[inline]
    fn channel(kind: SequenceKind) -> ChannelDescriptor {
        match kind {
            SequenceKind::Injected => F::INJECTED,
            SequenceKind::Regular => F::REGULAR,
        }
    }

    pub fn free(self) -> F {
        self.flags
    }
}

/// The conversion-complete vector: every unit's dispatcher, run in order.
pub struct ConversionVector<'a, F, const N: usize> {
    dispatchers: Mutex<RefCell<[ConversionDispatcher<'a, F>; N]>>,
}

impl<'a, F: ConversionFlags, const N: usize> ConversionVector<'a, F, N> {
    pub fn new(dispatchers: [ConversionDispatcher<'a, F>; N]) -> Self {
        Self {
            dispatchers: Mutex::new(RefCell::new(dispatchers)),
        }
    }

    /// Run every dispatcher once, returning what each serviced.
    ///
    /// Each handler is looked up inside a critical section and called outside it.
    pub fn dispatch_all(&self) -> [Serviced; N] {
        let mut serviced = [Serviced::default(); N];
        for (index, out) in serviced.iter_mut().enumerate() {
            for kind in [SequenceKind::Injected, SequenceKind::Regular] {
                let due = critical_section::with(|cs| {
                    let dispatchers = self.dispatchers.borrow_ref(cs);
                    let dispatcher = &dispatchers[index];
                    dispatcher
                        .ready(kind)
                        .map(|handler| (dispatcher.unit(), handler))
                });
                let Some((unit, handler)) = due else {
                    continue;
                };

                handler.on_conversion(unit, kind);

                critical_section::with(|cs| {
                    self.dispatchers.borrow_ref_mut(cs)[index].acknowledge(kind);
                });
                out.mark(kind);
            }
        }
        serviced
    }
}

impl<F: ConversionFlags + Send, const N: usize> InterruptHandler for ConversionVector<'_, F, N> {
    fn on_interrupt(&self) {
        self.dispatch_all();
    }
}

/// Cycle budget of one vector's handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleBudget {
    pub vector: Vector,
    pub budget: u32,
}

impl CycleBudget {
    pub const fn new(vector: Vector, budget: u32) -> Self {
        Self { vector, budget }
    }

    /// Check the cycles between two reads of a free-running 32-bit cycle counter.
    ///
    /// Handles the counter wrapping between `start` and `end`. Returns the elapsed cycles.
    pub fn check(&self, start: u32, end: u32) -> Result<u32, OverrunError> {
        let elapsed = end.wrapping_sub(start);
        if elapsed > self.budget {
            return Err(OverrunError {
                vector: self.vector,
                elapsed,
                budget: self.budget,
            });
        }
        Ok(elapsed)
    }
}
