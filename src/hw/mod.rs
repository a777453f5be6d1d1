// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! STM32F7 backends for the portable core.

pub mod adc;
pub mod gpio;
pub mod spi;
pub mod timer;
pub mod usart;

pub use adc::AdcFlags;
pub use gpio::GpioMux;
pub use spi::{ChipSelect, Spi3Port};
pub use timer::{freeze_pwm_timers_on_debug_halt, PwmTimer, UpdateEvent, UpdateVector};
pub use usart::Usart;
