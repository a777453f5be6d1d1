// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Peripheral binding table.
//!
//! Every logical request for a pin (a GPIO mode assignment, an axis' step/dir input, an enabled
//! peripheral) is turned into a [`Claim`]. Claims are checked against each other by physical pin:
//! two claims on one pin must ask for the same mode, otherwise the whole configuration is rejected
//! and nothing is granted.

use heapless::Vec;

use crate::board::config::{BoardConfig, I2C_ADDRESS_STRAPS};
use crate::board::descriptor::{BoardDescriptor, AXIS_COUNT};
use crate::board::modes::{GpioMode, PinFunction, Pull};
use crate::board::pins::{PinId, GPIO_COUNT};
use crate::error::{BindingError, ConfigurationConflict};

/// Upper bound on claims: one per GPIO, two per axis, and the peripheral claims.
const MAX_CLAIMS: usize = GPIO_COUNT + 2 * AXIS_COUNT + 2 + 2 + 5;

/// Logical owner of a pin claim.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    /// The mode assignment of a board GPIO.
    Gpio(u8),
    /// Step input of an axis.
    Step(u8),
    /// Direction input of an axis.
    Dir(u8),
    Uart0,
    Can0,
    I2c0,
}

/// A request for `gpio` to operate in `mode` on behalf of `slot`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Claim {
    pub slot: Slot,
    pub gpio: u8,
    pub mode: GpioMode,
}

/// A granted GPIO assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Binding {
    pub gpio: u8,
    pub pin: PinId,
    pub mode: GpioMode,
    pub function: PinFunction,
}

/// Applies resolved pin functions to the hardware.
pub trait PinMux {
    fn configure(&mut self, pin: PinId, function: PinFunction);
}

/// Resolved and conflict-free assignment of every board GPIO.
#[derive(Debug)]
pub struct BindingTable {
    descriptor: &'static BoardDescriptor,
    bindings: [Option<Binding>; GPIO_COUNT],
}

impl BindingTable {
    /// Resolve `config` against `descriptor`.
    ///
    /// Fails on the first conflict, on a mode the pin cannot provide, or on a claim for a GPIO
    /// that is not bonded out.
    pub fn resolve(
        descriptor: &'static BoardDescriptor,
        config: &BoardConfig,
    ) -> Result<Self, BindingError> {
        let claims = collect_claims(descriptor, config)?;
        check_conflicts(descriptor, &claims)?;

        let mut bindings = [None; GPIO_COUNT];
        for gpio in descriptor.gpio_numbers() {
            let Some(pin) = descriptor.pin(gpio) else {
                continue;
            };
            let mode = config.gpio_modes[gpio as usize];
            let function = function_for(descriptor, gpio, mode)?;
            bindings[gpio as usize] = Some(Binding {
                gpio,
                pin,
                mode,
                function,
            });
        }

        debug!("bindings resolved for {} claims", claims.len());
        Ok(Self {
            descriptor,
            bindings,
        })
    }

    /// Re-check the configuration with `gpio` switched to `mode`.
    ///
    /// On success both `self` and `config` are updated and the new binding is returned. On
    /// failure neither is touched.
    pub fn reassign(
        &mut self,
        config: &mut BoardConfig,
        gpio: u8,
        mode: GpioMode,
    ) -> Result<Option<Binding>, BindingError> {
        if gpio == 0 || gpio as usize >= GPIO_COUNT {
            return Err(BindingError::NoSuchGpio(gpio));
        }

        let candidate = config.with_gpio_mode(gpio, mode);
        let table = Self::resolve(self.descriptor, &candidate)?;
        *self = table;
        *config = candidate;
        Ok(self.binding(gpio).copied())
    }

    #[inline]
    pub fn descriptor(&self) -> &'static BoardDescriptor {
        self.descriptor
    }

    /// Granted binding of a board GPIO. `None` if the GPIO is not bonded out.
    #[inline]
    pub fn binding(&self, gpio: u8) -> Option<&Binding> {
        self.bindings.get(gpio as usize).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().flatten()
    }

    /// Push every binding to the pin multiplexer.
    pub fn apply(&self, mux: &mut dyn PinMux) {
        for binding in self.iter() {
            mux.configure(binding.pin, binding.function);
        }
    }
}

fn push_claim(
    claims: &mut Vec<Claim, MAX_CLAIMS>,
    descriptor: &BoardDescriptor,
    claim: Claim,
) -> Result<(), BindingError> {
    if descriptor.pin(claim.gpio).is_none() {
        // An unbonded GPIO left as a plain input asks nothing of the hardware.
        if matches!(claim.slot, Slot::Gpio(_)) && claim.mode == GpioMode::Digital {
            return Ok(());
        }
        return Err(BindingError::NoPhysicalPin {
            gpio: claim.gpio,
            slot: claim.slot,
        });
    }
    // Capacity covers every claim source.
    let _ = claims.push(claim);
    Ok(())
}

fn collect_claims(
    descriptor: &BoardDescriptor,
    config: &BoardConfig,
) -> Result<Vec<Claim, MAX_CLAIMS>, BindingError> {
    let mut claims = Vec::new();

    for (axis, (pins, axis_cfg)) in descriptor.axes.iter().zip(config.axes.iter()).enumerate() {
        if !axis_cfg.enable_step_dir {
            continue;
        }
        let axis = axis as u8;
        push_claim(
            &mut claims,
            descriptor,
            Claim {
                slot: Slot::Step(axis),
                gpio: pins.step_gpio,
                mode: GpioMode::Digital,
            },
        )?;
        push_claim(
            &mut claims,
            descriptor,
            Claim {
                slot: Slot::Dir(axis),
                gpio: pins.dir_gpio,
                mode: GpioMode::Digital,
            },
        )?;
    }

    if config.enable_uart0 {
        for gpio in [1, 2] {
            push_claim(
                &mut claims,
                descriptor,
                Claim {
                    slot: Slot::Uart0,
                    gpio,
                    mode: GpioMode::Uart0,
                },
            )?;
        }
    }

    if config.enable_can0 {
        for gpio in [15, 16] {
            push_claim(
                &mut claims,
                descriptor,
                Claim {
                    slot: Slot::Can0,
                    gpio,
                    mode: GpioMode::Can0,
                },
            )?;
        }
    }

    if config.enable_i2c0 {
        for gpio in I2C_ADDRESS_STRAPS {
            push_claim(
                &mut claims,
                descriptor,
                Claim {
                    slot: Slot::I2c0,
                    gpio,
                    mode: GpioMode::DigitalPullUp,
                },
            )?;
        }
        for gpio in [15, 16] {
            push_claim(
                &mut claims,
                descriptor,
                Claim {
                    slot: Slot::I2c0,
                    gpio,
                    mode: GpioMode::I2c0,
                },
            )?;
        }
    }

    // Mode assignments go last so that a conflict between two peripherals names both of them.
    for gpio in descriptor.gpio_numbers() {
        let mode = config.gpio_modes[gpio as usize];
        push_claim(
            &mut claims,
            descriptor,
            Claim {
                slot: Slot::Gpio(gpio),
                gpio,
                mode,
            },
        )?;
    }

    Ok(claims)
}

fn check_conflicts(descriptor: &BoardDescriptor, claims: &[Claim]) -> Result<(), BindingError> {
    for (i, first) in claims.iter().enumerate() {
        let Some(pin) = descriptor.pin(first.gpio) else {
            continue;
        };
        for second in &claims[i + 1..] {
            if descriptor.pin(second.gpio) != Some(pin) || second.mode == first.mode {
                continue;
            }
            let conflict = ConfigurationConflict {
                pin,
                first: first.slot,
                first_mode: first.mode,
                second: second.slot,
                second_mode: second.mode,
            };
            warn!(
                "pin conflict: {} wants {}, {} wants {}",
                first.slot, first.mode, second.slot, second.mode
            );
            return Err(conflict.into());
        }
    }
    Ok(())
}

fn function_for(
    descriptor: &BoardDescriptor,
    gpio: u8,
    mode: GpioMode,
) -> Result<PinFunction, BindingError> {
    let function = match mode {
        GpioMode::Digital => PinFunction::Input(Pull::None),
        GpioMode::DigitalPullUp => PinFunction::Input(Pull::Up),
        GpioMode::DigitalPullDown => PinFunction::Input(Pull::Down),
        GpioMode::AnalogIn => PinFunction::Analog,
        _ => PinFunction::Alternate(
            descriptor
                .alternate_function(gpio, mode)
                .ok_or(BindingError::Unsupported { gpio, mode })?,
        ),
    };
    Ok(function)
}
