// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # axisboard
//!
//! Peripheral arbitration and interrupt dispatch for a two-axis motor-control board, written in
//! Rust, targeting an STM32F777 MCU.
//!
//! The core is portable and runs on the host for testing; the register-level backend and the
//! firmware binary are behind the `stm32f777` feature.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`board`] | Board revisions, pin tables, runtime GPIO mode binding |
//! | [`arbiter`] | FIFO arbiter for the shared SPI bus |
//! | [`sync`] | Phase-locked start of the PWM and deadline timers |
//! | [`dispatch`] | ADC conversion-complete dispatch |
//! | [`vectors`] | Interrupt vector bindings and priorities |
//! | [`bringup`] | Startup sequence and the arming interlock |
//! | [`error`] | Error types |
//! | `hw` | STM32F7 register backends (`stm32f777` feature) |
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```bash
//! cargo test
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release --features stm32f777 --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod board;
pub mod bringup;
pub mod dispatch;
pub mod error;
pub mod sync;
pub mod vectors;

#[cfg(feature = "stm32f777")]
pub mod hw;
