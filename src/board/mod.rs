// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Board description and pin binding.
//!
//! - [`descriptor`]: per-revision data (GPIO tables, alternate functions, timer phases).
//! - [`config`]: runtime selection of optional peripherals and GPIO modes.
//! - [`binding`]: conflict-checked resolution of a configuration against a descriptor.

pub mod binding;
pub mod config;
pub mod descriptor;
pub mod modes;
pub mod pins;

pub use binding::{Binding, BindingTable, Claim, PinMux, Slot};
pub use config::{i2c_address, AxisConfig, BoardConfig, I2C_ADDRESS_STRAPS};
pub use descriptor::{
    AxisPins, BoardDescriptor, BoardRevision, TimerPhases, AXIS_COUNT, PWM_PERIOD_TICKS,
};
pub use modes::{AltFunction, GpioMode, Peripheral, PinFunction, Pull};
pub use pins::{PinId, Port, GPIO_COUNT};
