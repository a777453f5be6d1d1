// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Board bring-up and the arming interlock.
//!
//! [`BringUp::run`] is called once at startup. It resolves the pin bindings, pushes them to the
//! pin multiplexer and starts the PWM timers in phase, and returns the resulting [`Board`]. Any
//! failure is latched in the board's [`Interlock`], which then refuses to arm the power stage
//! until the next bring-up.

use crate::board::{
    i2c_address, BindingTable, BoardConfig, BoardDescriptor, GpioMode, PinMux, GPIO_COUNT,
};
use crate::error::{ArmError, BindingError, BringUpError};
use crate::sync::{start_synchronously, Phase, SyncReport};

/// Default start-skew tolerance of the synchronized timers, in timer ticks.
pub const DEFAULT_SKEW_TOLERANCE: u32 = 16;

/// Gate between a successful bring-up and an enabled power stage.
#[derive(Debug, Default)]
pub struct Interlock {
    blocked: Option<BringUpError>,
    armed: bool,
}

impl Interlock {
    pub const fn new() -> Self {
        Self {
            blocked: None,
            armed: false,
        }
    }

    /// Record a failure and disarm. The first reason is kept.
    pub fn latch(&mut self, reason: BringUpError) {
        error!("interlock latched: {}", reason);
        if self.blocked.is_none() {
            self.blocked = Some(reason);
        }
        self.armed = false;
    }

    /// The latched failure, if any.
    #[inline]
    pub fn blocker(&self) -> Option<BringUpError> {
        self.blocked
    }

    pub fn arm(&mut self) -> Result<(), ArmError> {
        if let Some(reason) = self.blocked {
            return Err(ArmError { reason });
        }
        self.armed = true;
        Ok(())
    }

    #[inline]
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

/// A brought-up board.
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    descriptor: &'static BoardDescriptor,
    bindings: Option<BindingTable>,
    sync: Option<SyncReport>,
    interlock: Interlock,
}

impl Board {
    #[inline]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    #[inline]
    pub fn descriptor(&self) -> &'static BoardDescriptor {
        self.descriptor
    }

    /// Resolved bindings. `None` if binding failed.
    #[inline]
    pub fn bindings(&self) -> Option<&BindingTable> {
        self.bindings.as_ref()
    }

    /// Timer synchronization result. `None` if it failed or never ran.
    #[inline]
    pub fn sync_report(&self) -> Option<SyncReport> {
        self.sync
    }

    #[inline]
    pub fn interlock(&self) -> &Interlock {
        &self.interlock
    }

    /// `Ok` while nothing is latched.
    pub fn status(&self) -> Result<(), BringUpError> {
        match self.interlock.blocker() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// I2C0 slave address for the sampled strap inputs, if I2C0 is enabled.
    pub fn i2c_address(&self, straps: u8) -> Option<u8> {
        self.config.enable_i2c0.then(|| i2c_address(straps))
    }

    pub fn arm(&mut self) -> Result<(), ArmError> {
        self.interlock.arm().map_err(|e| {
            warn!("arm refused: {}", e.reason);
            e
        })
    }

    #[inline]
    pub fn disarm(&mut self) {
        self.interlock.disarm();
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.interlock.is_armed()
    }

    /// Change the mode of one GPIO at runtime.
    ///
    /// The whole configuration is re-checked. A conflict latches the interlock and disarms;
    /// other rejections leave the board untouched. On success the pin is reconfigured through
    /// `mux`. If bring-up never granted any bindings, every pin is pushed to `mux` once the
    /// configuration resolves. A failure latched at bring-up stays latched until the next
    /// bring-up, even once its cause is fixed.
    pub fn reassign_gpio(
        &mut self,
        gpio: u8,
        mode: GpioMode,
        mux: &mut dyn PinMux,
    ) -> Result<(), BindingError> {
        if gpio == 0 || gpio as usize >= GPIO_COUNT {
            return Err(BindingError::NoSuchGpio(gpio));
        }

        let result = match self.bindings.as_mut() {
            Some(table) => table.reassign(&mut self.config, gpio, mode).map(|binding| {
                if let Some(binding) = binding {
                    mux.configure(binding.pin, binding.function);
                }
            }),
            None => {
                let candidate = self.config.with_gpio_mode(gpio, mode);
                BindingTable::resolve(self.descriptor, &candidate).map(|table| {
                    // Nothing was pushed at bring-up.
                    table.apply(mux);
                    self.config = candidate;
                    self.bindings = Some(table);
                })
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e @ BindingError::Conflict(_)) => {
                self.interlock.latch(e.into());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Startup sequence for one board.
#[derive(Debug)]
pub struct BringUp {
    config: BoardConfig,
    skew_tolerance: u32,
}

impl BringUp {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            skew_tolerance: DEFAULT_SKEW_TOLERANCE,
        }
    }

    pub fn with_skew_tolerance(mut self, ticks: u32) -> Self {
        self.skew_tolerance = ticks;
        self
    }

    /// Bind pins, then start `counters` in phase.
    ///
    /// Timers are not started on a board whose pins failed to bind.
    pub fn run(self, mux: &mut dyn PinMux, counters: &mut [Phase<'_>]) -> Board {
        let descriptor = self.config.revision.descriptor();
        let mut interlock = Interlock::new();

        let bindings = match BindingTable::resolve(descriptor, &self.config) {
            Ok(table) => {
                table.apply(mux);
                Some(table)
            }
            Err(e) => {
                interlock.latch(e.into());
                None
            }
        };

        let sync = if bindings.is_some() {
            match start_synchronously(counters, self.skew_tolerance) {
                Ok(report) => Some(report),
                Err(e) => {
                    interlock.latch(e.into());
                    None
                }
            }
        } else {
            None
        };

        if interlock.blocker().is_none() {
            info!("board {} up", descriptor.revision);
        }

        Board {
            config: self.config,
            descriptor,
            bindings,
            sync,
            interlock,
        }
    }
}
