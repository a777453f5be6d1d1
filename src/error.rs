// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Error types for bring-up and the interrupt-driven core.
//!
//! Configuration and synchronization failures are fatal for arming: they are latched by the
//! [`Interlock`](crate::bringup::Interlock) and keep the power stage disabled. Bus faults only
//! ever reach the client whose transaction failed.

use core::fmt;

use crate::board::{GpioMode, PinId, Slot};
use crate::vectors::Vector;

/// Fault reported by the serial bus hardware for one transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Received byte was not read before the next one arrived.
    Overrun,
    /// Another master drove the bus.
    ModeFault,
    /// TI-mode frame format error.
    FrameFormat,
    /// CRC mismatch on a CRC-enabled transfer.
    Crc,
}

/// Failure result delivered to a transaction's completion client.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The hardware reported a fault during the transfer.
    Fault(BusFault),
    /// The hardware refused to start the transfer.
    Refused,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Fault(fault) => write!(f, "bus transfer fault: {:?}", fault),
            BusError::Refused => write!(f, "bus refused to start transfer"),
        }
    }
}

/// A transaction buffer that does not fit a bus frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Requested length exceeds [`MAX_FRAME`](crate::arbiter::MAX_FRAME).
    TooLong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLong(len) => write!(f, "frame of {} bytes is too long", len),
        }
    }
}

/// A queued transaction could not be withdrawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WithdrawError {
    /// The transaction has already been handed to the hardware.
    InFlight,
    /// No transaction with that ticket is pending (completed or never accepted).
    Unknown,
}

impl fmt::Display for WithdrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawError::InFlight => write!(f, "transaction already in flight"),
            WithdrawError::Unknown => write!(f, "no such pending transaction"),
        }
    }
}

/// Two requests claimed the same physical pin with different modes.
///
/// Neither claim is granted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationConflict {
    pub pin: PinId,
    pub first: Slot,
    pub first_mode: GpioMode,
    pub second: Slot,
    pub second_mode: GpioMode,
}

impl fmt::Display for ConfigurationConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pin {} claimed as {:?} by {:?} and as {:?} by {:?}",
            self.pin, self.first_mode, self.first, self.second_mode, self.second
        )
    }
}

/// Pin binding failures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindingError {
    Conflict(ConfigurationConflict),
    /// The pin behind `gpio` has no alternate function for `mode`.
    Unsupported { gpio: u8, mode: GpioMode },
    /// `gpio` is not a numbered board GPIO.
    NoSuchGpio(u8),
    /// `slot` needs `gpio`, which is not bonded out on this board revision.
    NoPhysicalPin { gpio: u8, slot: Slot },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::Conflict(conflict) => write!(f, "configuration conflict: {}", conflict),
            BindingError::Unsupported { gpio, mode } => {
                write!(f, "GPIO{} does not support mode {:?}", gpio, mode)
            }
            BindingError::NoSuchGpio(gpio) => write!(f, "no such GPIO: {}", gpio),
            BindingError::NoPhysicalPin { gpio, slot } => {
                write!(f, "GPIO{} needed by {:?} is not connected", gpio, slot)
            }
        }
    }
}

impl From<ConfigurationConflict> for BindingError {
    fn from(e: ConfigurationConflict) -> Self {
        BindingError::Conflict(e)
    }
}

/// Counter synchronization failures. All of them are fatal at bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError {
    /// No counters were given.
    Empty,
    /// More counters than [`MAX_COUNTERS`](crate::sync::MAX_COUNTERS).
    TooManyCounters(usize),
    /// Counter `index` runs from a different clock than counter 0.
    ClockDomainMismatch { index: usize },
    /// Counter `index` was given a preload beyond its period.
    PreloadOutOfRange { index: usize, preload: u32, period: u32 },
    /// The enable sequence cannot start all counters within `tolerance` ticks.
    SkewExceeded { skew: u32, tolerance: u32 },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Empty => write!(f, "no counters to synchronize"),
            SyncError::TooManyCounters(n) => write!(f, "too many counters: {}", n),
            SyncError::ClockDomainMismatch { index } => {
                write!(f, "counter {} is in a different clock domain", index)
            }
            SyncError::PreloadOutOfRange {
                index,
                preload,
                period,
            } => write!(
                f,
                "counter {} preload {} exceeds period {}",
                index, preload, period
            ),
            SyncError::SkewExceeded { skew, tolerance } => write!(
                f,
                "start skew of {} ticks exceeds tolerance of {} ticks",
                skew, tolerance
            ),
        }
    }
}

/// A dispatched handler ran past its cycle budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OverrunError {
    pub vector: Vector,
    pub elapsed: u32,
    pub budget: u32,
}

impl fmt::Display for OverrunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} handler took {} cycles (budget {})",
            self.vector, self.elapsed, self.budget
        )
    }
}

/// Reason a board failed to come up cleanly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    Binding(BindingError),
    Sync(SyncError),
}

impl fmt::Display for BringUpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BringUpError::Binding(e) => write!(f, "pin binding failed: {}", e),
            BringUpError::Sync(e) => write!(f, "timer synchronization failed: {}", e),
        }
    }
}

impl From<BindingError> for BringUpError {
    fn from(e: BindingError) -> Self {
        BringUpError::Binding(e)
    }
}

impl From<ConfigurationConflict> for BringUpError {
    fn from(e: ConfigurationConflict) -> Self {
        BringUpError::Binding(e.into())
    }
}

impl From<SyncError> for BringUpError {
    fn from(e: SyncError) -> Self {
        BringUpError::Sync(e)
    }
}

/// Arming was refused because bring-up latched a failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmError {
    pub reason: BringUpError,
}

impl fmt::Display for ArmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot arm: {}", self.reason)
    }
}
