// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Physical pin identities and the numbered-GPIO tables of each board revision.
//!
//! Board GPIOs are numbered as printed on the PCB. GPIO 0 does not exist; its slot is kept so that
//! PCB labels and table indices match.

use core::fmt;

/// Number of entries in a GPIO table, including the unused slot 0.
pub const GPIO_COUNT: usize = 17;

/// GPIO port letter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

impl Port {
    /// Index of the port's register block (GPIOA = 0).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
        }
    }
}

/// A physical MCU pin, e.g. PB8.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: Port,
    pub number: u8,
}

impl PinId {
    pub const fn new(port: Port, number: u8) -> Self {
        Self { port, number }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.number)
    }
}

/// Map from board GPIO number to physical pin. `None` means not bonded out.
pub type GpioTable = [Option<PinId>; GPIO_COUNT];

const fn pin(port: Port, number: u8) -> Option<PinId> {
    Some(PinId::new(port, number))
}

/// Revisions 3.1 and 3.2.
pub(crate) const GPIOS_V3_1: GpioTable = [
    None,
    pin(Port::B, 2),
    pin(Port::A, 5),
    pin(Port::A, 4),
    pin(Port::A, 3),
    None,
    None,
    None,
    None,
    pin(Port::B, 4),  // ENC0_A
    pin(Port::B, 5),  // ENC0_B
    pin(Port::A, 15), // ENC0_Z
    pin(Port::B, 6),  // ENC1_A
    pin(Port::B, 7),  // ENC1_B
    pin(Port::B, 3),  // ENC1_Z
    pin(Port::B, 8),  // CAN_R
    pin(Port::B, 9),  // CAN_D
];

/// Revisions 3.3 and 3.4.
pub(crate) const GPIOS_V3_3: GpioTable = [
    None,
    pin(Port::A, 0),
    pin(Port::A, 1),
    pin(Port::A, 2),
    pin(Port::A, 3),
    pin(Port::B, 2),
    None,
    None,
    None,
    pin(Port::B, 4),  // ENC0_A
    pin(Port::B, 5),  // ENC0_B
    pin(Port::A, 15), // ENC0_Z
    pin(Port::B, 6),  // ENC1_A
    pin(Port::B, 7),  // ENC1_B
    pin(Port::B, 3),  // ENC1_Z
    pin(Port::B, 8),  // CAN_R
    pin(Port::B, 9),  // CAN_D
];

/// Revisions 3.5 and 3.6.
pub(crate) const GPIOS_V3_5: GpioTable = [
    None,
    pin(Port::A, 0),
    pin(Port::A, 1),
    pin(Port::A, 2),
    pin(Port::A, 3),
    pin(Port::C, 4),
    pin(Port::B, 2),
    pin(Port::A, 15),
    pin(Port::B, 3),
    pin(Port::B, 4),  // ENC0_A
    pin(Port::B, 5),  // ENC0_B
    pin(Port::C, 9),  // ENC0_Z
    pin(Port::B, 6),  // ENC1_A
    pin(Port::B, 7),  // ENC1_B
    pin(Port::C, 15), // ENC1_Z
    pin(Port::B, 8),  // CAN_R
    pin(Port::B, 9),  // CAN_D
];

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::*;

    #[test]
    fn pin_display_matches_datasheet_naming() {
        assert_eq!(PinId::new(Port::B, 8).to_string(), "PB8");
        assert_eq!(PinId::new(Port::A, 15).to_string(), "PA15");
    }

    #[test]
    fn slot_zero_is_never_bonded() {
        for table in [&GPIOS_V3_1, &GPIOS_V3_3, &GPIOS_V3_5] {
            assert!(table[0].is_none());
        }
    }
}
