// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Runtime board configuration: which optional peripherals are enabled and what mode every
//! board GPIO is assigned.

use crate::board::descriptor::{BoardRevision, AXIS_COUNT};
use crate::board::modes::GpioMode;
use crate::board::pins::GPIO_COUNT;

/// Base I2C slave address; the low three bits come from the strap inputs.
const I2C_BASE_ADDRESS: u8 = 0xD << 3;

/// GPIOs read at bring-up to select the low bits of the I2C address.
pub const I2C_ADDRESS_STRAPS: [u8; 3] = [3, 4, 5];

/// I2C slave address for the given strap inputs (bit 0 = GPIO3, bit 1 = GPIO4, bit 2 = GPIO5).
#[inline]
pub const fn i2c_address(straps: u8) -> u8 {
    I2C_BASE_ADDRESS | (straps & 0x7)
}

/// Per-axis options that claim board pins.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisConfig {
    /// Use the axis' step/dir GPIOs as motion inputs.
    pub enable_step_dir: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardConfig {
    pub revision: BoardRevision,
    /// Requested mode per board GPIO. Index 0 is ignored.
    pub gpio_modes: [GpioMode; GPIO_COUNT],
    /// UART0 on GPIO1/GPIO2.
    pub enable_uart0: bool,
    /// CAN0 on GPIO15/GPIO16.
    pub enable_can0: bool,
    /// I2C0 on GPIO15/GPIO16, slave address strapped by GPIO3..GPIO5.
    pub enable_i2c0: bool,
    pub axes: [AxisConfig; AXIS_COUNT],
}

impl BoardConfig {
    /// Factory configuration for `revision`.
    ///
    /// UART0 is only available from v3.3 on; earlier boards leave GPIO1/GPIO2 as plain inputs.
    pub fn default_for(revision: BoardRevision) -> Self {
        let uart0 = revision.minor() >= 3;
        let uart_mode = if uart0 {
            GpioMode::Uart0
        } else {
            GpioMode::Digital
        };

        let gpio_modes = [
            GpioMode::Digital, // unused slot 0
            uart_mode,
            uart_mode,
            GpioMode::AnalogIn,
            GpioMode::AnalogIn,
            GpioMode::Digital,
            GpioMode::Digital,
            GpioMode::Digital,
            GpioMode::Digital,
            GpioMode::Enc0,
            GpioMode::Enc0,
            GpioMode::Digital,
            GpioMode::Enc1,
            GpioMode::Enc1,
            GpioMode::Digital,
            GpioMode::Can0,
            GpioMode::Can0,
        ];

        Self {
            revision,
            gpio_modes,
            enable_uart0: uart0,
            enable_can0: true,
            enable_i2c0: false,
            axes: [AxisConfig::default(); AXIS_COUNT],
        }
    }

    /// Assign `mode` to `gpio`. Numbers outside the board's GPIO range are ignored here and
    /// rejected by [`BindingTable::reassign`](crate::board::BindingTable::reassign).
    pub fn with_gpio_mode(mut self, gpio: u8, mode: GpioMode) -> Self {
        if let Some(slot) = self.gpio_modes.get_mut(gpio as usize) {
            *slot = mode;
        }
        self
    }

    pub fn with_uart0(mut self, enable: bool) -> Self {
        self.enable_uart0 = enable;
        self
    }

    pub fn with_can0(mut self, enable: bool) -> Self {
        self.enable_can0 = enable;
        self
    }

    pub fn with_i2c0(mut self, enable: bool) -> Self {
        self.enable_i2c0 = enable;
        self
    }

    /// Enable or disable step/dir inputs for `axis`. Out-of-range axes are ignored.
    pub fn with_step_dir(mut self, axis: usize, enable: bool) -> Self {
        if let Some(axis) = self.axes.get_mut(axis) {
            axis.enable_step_dir = enable;
        }
        self
    }

    /// Mode requested for `gpio`, if it is a board GPIO.
    #[inline]
    pub fn gpio_mode(&self, gpio: u8) -> Option<GpioMode> {
        self.gpio_modes.get(gpio as usize).copied()
    }
}
