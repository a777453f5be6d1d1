// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Interrupt vector bindings.
//!
//! Every vector the firmware uses has an entry; an entry nobody installed into behaves as a
//! no-op. ISRs only ever call [`SharedVectors::fire`].

use core::cell::RefCell;

use critical_section::Mutex;

/// Interrupt sources routed through the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Vector {
    /// Update event of the axis-0 PWM timer.
    Axis0Update,
    /// Update event of the axis-1 PWM timer.
    Axis1Update,
    /// End of conversion on any ADC unit.
    ConversionComplete,
    /// Shared SPI bus transfer complete.
    BusComplete,
    /// PWM input capture on TIM5. The firmware installs no handler for it yet.
    PwmCapture,
}

impl Vector {
    pub const COUNT: usize = 5;

    pub const ALL: [Vector; Vector::COUNT] = [
        Vector::Axis0Update,
        Vector::Axis1Update,
        Vector::ConversionComplete,
        Vector::BusComplete,
        Vector::PwmCapture,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Preemption priority. Lower numbers preempt higher ones.
    ///
    /// Conversion events preempt the motor tick and the bus completion; the bus completion never
    /// preempts either of them.
    pub const fn priority(self) -> u8 {
        match self {
            Vector::ConversionComplete => 0,
            Vector::Axis0Update | Vector::Axis1Update => 1,
            Vector::BusComplete => 2,
            Vector::PwmCapture => 3,
        }
    }

    /// Priority as written to the NVIC (upper four bits on STM32F7).
    #[inline]
    pub const fn nvic_priority(self) -> u8 {
        self.priority() << 4
    }
}

/// Body of an interrupt.
pub trait InterruptHandler: Sync {
    fn on_interrupt(&self);
}

/// Handler that does nothing.
pub struct NoOp;

impl InterruptHandler for NoOp {
    fn on_interrupt(&self) {}
}

/// Total map from [`Vector`] to handler.
pub struct VectorTable<'a> {
    handlers: [Option<&'a dyn InterruptHandler>; Vector::COUNT],
}

impl<'a> VectorTable<'a> {
    pub const fn new() -> Self {
        Self {
            handlers: [None; Vector::COUNT],
        }
    }

    /// Bind `handler` to `vector`, returning the previous binding.
    pub fn install(
        &mut self,
        vector: Vector,
        handler: &'a dyn InterruptHandler,
    ) -> Option<&'a dyn InterruptHandler> {
        self.handlers[vector.index()].replace(handler)
    }

    /// Restore the no-op binding.
    pub fn uninstall(&mut self, vector: Vector) -> Option<&'a dyn InterruptHandler> {
        self.handlers[vector.index()].take()
    }

    #[inline]
    pub fn is_bound(&self, vector: Vector) -> bool {
        self.handlers[vector.index()].is_some()
    }

    /// Handler bound to `vector`; the no-op handler if none was installed.
    pub fn handler(&self, vector: Vector) -> &'a dyn InterruptHandler {
        self.handlers[vector.index()].unwrap_or(&NoOp)
    }

    #[inline]
    pub fn fire(&self, vector: Vector) {
        self.handler(vector).on_interrupt();
    }
}

impl Default for VectorTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Vector table shared between the foreground and the ISRs.
pub struct SharedVectors<'a> {
    table: Mutex<RefCell<VectorTable<'a>>>,
}

impl<'a> SharedVectors<'a> {
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(RefCell::new(VectorTable::new())),
        }
    }

    pub fn install(&self, vector: Vector, handler: &'a dyn InterruptHandler) {
        critical_section::with(|cs| {
            self.table.borrow_ref_mut(cs).install(vector, handler);
        });
    }

    pub fn uninstall(&self, vector: Vector) {
        critical_section::with(|cs| {
            self.table.borrow_ref_mut(cs).uninstall(vector);
        });
    }

    pub fn is_bound(&self, vector: Vector) -> bool {
        critical_section::with(|cs| self.table.borrow_ref(cs).is_bound(vector))
    }

    /// Run the handler bound to `vector`.
    ///
    /// The lookup happens in a critical section; the handler itself runs with interrupts enabled
    /// so that higher-priority vectors can still preempt it.
    pub fn fire(&self, vector: Vector) {
        let handler = critical_section::with(|cs| self.table.borrow_ref(cs).handler(vector));
        handler.on_interrupt();
    }
}

impl Default for SharedVectors<'_> {
    fn default() -> Self {
        Self::new()
    }
}
