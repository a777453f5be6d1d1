// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Operating modes a board GPIO can be assigned, and the pin functions they resolve to.

/// Number of modes that are routed through an alternate function (columns of the AF table).
pub const AF_MODES: usize = 10;

/// Operating mode requested for a board GPIO.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioMode {
    /// Floating digital input. Also the mode of an unused GPIO.
    Digital,
    DigitalPullUp,
    DigitalPullDown,
    AnalogIn,
    Uart0,
    Uart1,
    Uart2,
    Can0,
    I2c0,
    Spi0,
    Pwm0,
    Enc0,
    Enc1,
    Enc2,
}

impl GpioMode {
    /// Column of this mode in a board's alternate-function table, if it needs one.
    ///
    /// Columns: UART0 | UART1 | UART2 | CAN0 | I2C0 | SPI0 | PWM0 | ENC0 | ENC1 | ENC2
    pub const fn af_column(self) -> Option<usize> {
        match self {
            GpioMode::Uart0 => Some(0),
            GpioMode::Uart1 => Some(1),
            GpioMode::Uart2 => Some(2),
            GpioMode::Can0 => Some(3),
            GpioMode::I2c0 => Some(4),
            GpioMode::Spi0 => Some(5),
            GpioMode::Pwm0 => Some(6),
            GpioMode::Enc0 => Some(7),
            GpioMode::Enc1 => Some(8),
            GpioMode::Enc2 => Some(9),
            GpioMode::Digital
            | GpioMode::DigitalPullUp
            | GpioMode::DigitalPullDown
            | GpioMode::AnalogIn => None,
        }
    }
}

/// MCU peripheral an alternate function connects a pin to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    Uart4,
    Can1,
    I2c1,
    Tim3,
    Tim4,
    Tim5,
}

/// Alternate-function selector (the AFRL/AFRH nibble) for one pin and peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AltFunction {
    pub code: u8,
    pub peripheral: Peripheral,
}

impl AltFunction {
    pub const fn new(code: u8, peripheral: Peripheral) -> Self {
        Self { code, peripheral }
    }

    /// I2C lines are driven open-drain; everything else push-pull.
    #[inline]
    pub const fn open_drain(&self) -> bool {
        matches!(self.peripheral, Peripheral::I2c1)
    }
}

/// Internal pull resistor selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Electrical configuration a resolved binding asks the pin multiplexer for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    Input(Pull),
    Analog,
    Alternate(AltFunction),
}
