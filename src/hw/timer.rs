// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! PWM and control-deadline timers.
//!
//! TIM1 (axis 0) and TIM8 (axis 1) count center-aligned with a repetition counter, TIM13 counts
//! up and paces the control deadline. All three are started together through
//! [`crate::sync::start_synchronously`], so only the time base is configured here; output compare
//! channels belong to the motor driver.

use core::cell::RefCell;

use critical_section::Mutex;
use stm32f7xx_hal::pac;

use crate::sync::{ClockDomain, PhaseCounter};
use crate::vectors::InterruptHandler;

const CR1_CEN: u32 = 1 << 0;
const CR1_CMS_CENTER1: u32 = 0b01 << 5;
const CR1_ARPE: u32 = 1 << 7;
const DIER_UIE: u32 = 1 << 0;
const SR_UIF: u32 = 1 << 0;
const EGR_UG: u32 = 1 << 0;

/// Timer clock cycles between back-to-back enable writes on APB2 (TIM1, TIM8).
const APB2_ENABLE_LATENCY: u32 = 4;
/// Same, on APB1 (TIM13). The write crosses the slower bridge.
const APB1_ENABLE_LATENCY: u32 = 8;

// DBGMCU freeze registers.
const DBGMCU_APB1_FZ: *mut u32 = 0xE004_2008 as *mut u32;
const DBGMCU_APB2_FZ: *mut u32 = 0xE004_200C as *mut u32;
const DBG_TIM13_STOP: u32 = 1 << 7;
const DBG_TIM1_STOP: u32 = 1 << 0;
const DBG_TIM8_STOP: u32 = 1 << 1;

/// Timer whose update interrupt flag must be cleared by the ISR.
pub trait UpdateEvent {
    fn clear_update_flag(&mut self);
}

/// A timer configured for synchronized start.
pub struct PwmTimer<TIM> {
    tim: TIM,
    tick_hz: u32,
    latency: u32,
}

impl<TIM> PwmTimer<TIM> {
    /// Consume the wrapper and return the underlying timer peripheral.
    #[inline]
    pub fn free(self) -> TIM {
        self.tim
    }
}

macro_rules! center_aligned_timer {
    ($TIM:ty, $ctor:ident, $en:ident) => {
        impl PwmTimer<$TIM> {
            /// Configure as a center-aligned PWM time base. Counts `0..=period..=0` and raises an
            /// update event every `repetition + 1` extremes. Left halted.
            pub fn $ctor(tim: $TIM, period: u32, repetition: u8, tick_hz: u32) -> Self {
                let rcc = unsafe { &*pac::RCC::ptr() };
                rcc.apb2enr.modify(|_, w| w.$en().set_bit());

                // Disable counter while configuring
                tim.cr1.write(|w| unsafe { w.bits(0) });

                tim.psc.write(|w| unsafe { w.bits(0) });
                tim.arr.write(|w| unsafe { w.bits(period) });
                tim.rcr.write(|w| unsafe { w.bits(repetition as u32) });

                // Latch PSC/RCR, then drop the update flag the UG write raised
                tim.egr.write(|w| unsafe { w.bits(EGR_UG) });
                tim.sr.write(|w| unsafe { w.bits(!SR_UIF) });
                tim.dier.write(|w| unsafe { w.bits(DIER_UIE) });

                tim.cr1
                    .write(|w| unsafe { w.bits(CR1_CMS_CENTER1 | CR1_ARPE) });

                Self {
                    tim,
                    tick_hz,
                    latency: APB2_ENABLE_LATENCY,
                }
            }
        }

        impl UpdateEvent for PwmTimer<$TIM> {
            #[inline]
            fn clear_update_flag(&mut self) {
                // rc_w0: writing 1 leaves the other flags alone
                self.tim.sr.write(|w| unsafe { w.bits(!SR_UIF) });
            }
        }

        phase_counter!($TIM);
    };
}

macro_rules! phase_counter {
    ($TIM:ty) => {
        impl PhaseCounter for PwmTimer<$TIM> {
            fn clock_domain(&self) -> ClockDomain {
                ClockDomain {
                    tick_hz: self.tick_hz,
                }
            }

            fn period(&self) -> u32 {
                self.tim.arr.read().bits()
            }

            fn enable_latency(&self) -> u32 {
                self.latency
            }

            fn halt(&mut self) {
                self.tim
                    .cr1
                    .modify(|r, w| unsafe { w.bits(r.bits() & !CR1_CEN) });
            }

            fn preload(&mut self, value: u32) {
                self.tim.cnt.write(|w| unsafe { w.bits(value) });
            }

            fn enable_word(&self) -> u32 {
                self.tim.cr1.read().bits() | CR1_CEN
            }

            fn commit(&mut self, word: u32) {
                self.tim.cr1.write(|w| unsafe { w.bits(word) });
            }
        }
    };
}

center_aligned_timer!(pac::TIM1, tim1, tim1en);
center_aligned_timer!(pac::TIM8, tim8, tim8en);

impl PwmTimer<pac::TIM13> {
    /// Configure TIM13 as an up-counting time base wrapping every `period + 1` ticks. Its update
    /// interrupt stays disabled; the vector is shared with TIM8. Left halted.
    pub fn tim13(tim: pac::TIM13, period: u32, tick_hz: u32) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.tim13en().set_bit());

        tim.cr1.write(|w| unsafe { w.bits(0) });
        tim.psc.write(|w| unsafe { w.bits(0) });
        tim.arr.write(|w| unsafe { w.bits(period) });
        tim.egr.write(|w| unsafe { w.bits(EGR_UG) });
        tim.sr.write(|w| unsafe { w.bits(!SR_UIF) });
        tim.cr1.write(|w| unsafe { w.bits(CR1_ARPE) });

        Self {
            tim,
            tick_hz,
            latency: APB1_ENABLE_LATENCY,
        }
    }
}

phase_counter!(pac::TIM13);

/// Stop TIM1, TIM8 and TIM13 while the core is halted by a debugger, so a breakpoint never
/// leaves the power stage switching.
pub fn freeze_pwm_timers_on_debug_halt() {
    unsafe {
        let apb2 = core::ptr::read_volatile(DBGMCU_APB2_FZ);
        core::ptr::write_volatile(DBGMCU_APB2_FZ, apb2 | DBG_TIM1_STOP | DBG_TIM8_STOP);
        let apb1 = core::ptr::read_volatile(DBGMCU_APB1_FZ);
        core::ptr::write_volatile(DBGMCU_APB1_FZ, apb1 | DBG_TIM13_STOP);
    }
}

/// Update-event vector of one PWM timer: acknowledges the timer, then runs the axis handler.
pub struct UpdateVector<'a, T> {
    timer: Mutex<RefCell<T>>,
    handler: &'a dyn InterruptHandler,
}

impl<'a, T: UpdateEvent> UpdateVector<'a, T> {
    pub fn new(timer: T, handler: &'a dyn InterruptHandler) -> Self {
        Self {
            timer: Mutex::new(RefCell::new(timer)),
            handler,
        }
    }
}

impl<T: UpdateEvent + Send> InterruptHandler for UpdateVector<'_, T> {
    fn on_interrupt(&self) {
        critical_section::with(|cs| self.timer.borrow_ref_mut(cs).clear_update_flag());
        self.handler.on_interrupt();
    }
}
