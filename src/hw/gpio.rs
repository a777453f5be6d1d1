// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Runtime pin multiplexing for the board GPIOs.
//!
//! The HAL's typed pins fix each pin's mode at compile time; board GPIO modes come from the
//! binding table at runtime, so this writes the port registers directly.

use stm32f7xx_hal::pac;

use crate::board::{PinFunction, PinId, PinMux, Port, Pull};

/// Distance between GPIO port register blocks.
const PORT_STRIDE: usize = 0x400;

const MODE_INPUT: u32 = 0b00;
const MODE_ALTERNATE: u32 = 0b10;
const MODE_ANALOG: u32 = 0b11;

const PULL_NONE: u32 = 0b00;
const PULL_UP: u32 = 0b01;
const PULL_DOWN: u32 = 0b10;

const SPEED_HIGH: u32 = 0b10;

/// Applies [`PinFunction`]s to GPIOA..GPIOE.
pub struct GpioMux {
    _private: (),
}

impl GpioMux {
    /// Enable the clocks of every port a board GPIO can live on.
    pub fn new() -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.ahb1enr.modify(|_, w| {
            w.gpioaen()
                .set_bit()
                .gpioben()
                .set_bit()
                .gpiocen()
                .set_bit()
                .gpioden()
                .set_bit()
                .gpioeen()
                .set_bit()
        });
        Self { _private: () }
    }

    fn regs(port: Port) -> &'static pac::gpioa::RegisterBlock {
        let base = pac::GPIOA::ptr() as usize + port.index() * PORT_STRIDE;
        // GPIOA..GPIOE share one layout and sit PORT_STRIDE apart.
        unsafe { &*(base as *const pac::gpioa::RegisterBlock) }
    }
}

impl Default for GpioMux {
    fn default() -> Self {
        Self::new()
    }
}

fn pull_bits(pull: Pull) -> u32 {
    match pull {
        Pull::None => PULL_NONE,
        Pull::Up => PULL_UP,
        Pull::Down => PULL_DOWN,
    }
}

impl PinMux for GpioMux {
    fn configure(&mut self, pin: PinId, function: PinFunction) {
        let regs = Self::regs(pin.port);
        let n = pin.number as u32;
        let field2 = 0b11 << (2 * n);

        let (mode, pull, af) = match function {
            PinFunction::Input(pull) => (MODE_INPUT, pull_bits(pull), None),
            PinFunction::Analog => (MODE_ANALOG, PULL_NONE, None),
            PinFunction::Alternate(af) if af.open_drain() => (MODE_ALTERNATE, PULL_UP, Some(af)),
            PinFunction::Alternate(af) => (MODE_ALTERNATE, PULL_NONE, Some(af)),
        };

        // Other pins of the port may be touched from elsewhere
        critical_section::with(|_| unsafe {
            if let Some(af) = af {
                let code = (af.code & 0xF) as u32;
                if n < 8 {
                    let shift = 4 * n;
                    regs.afrl
                        .modify(|r, w| w.bits((r.bits() & !(0xF << shift)) | (code << shift)));
                } else {
                    let shift = 4 * (n - 8);
                    regs.afrh
                        .modify(|r, w| w.bits((r.bits() & !(0xF << shift)) | (code << shift)));
                }
                regs.otyper.modify(|r, w| {
                    if af.open_drain() {
                        w.bits(r.bits() | (1 << n))
                    } else {
                        w.bits(r.bits() & !(1 << n))
                    }
                });
                regs.ospeedr
                    .modify(|r, w| w.bits((r.bits() & !field2) | (SPEED_HIGH << (2 * n))));
            }

            regs.pupdr
                .modify(|r, w| w.bits((r.bits() & !field2) | (pull << (2 * n))));
            regs.moder
                .modify(|r, w| w.bits((r.bits() & !field2) | (mode << (2 * n))));
        });

        trace!("pin {} configured", pin);
    }
}
