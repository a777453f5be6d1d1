// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Debug console on a USART.
//!
//! The firmware prints its bring-up report and periodic bus statistics here. Lines end in CRLF.
//!
//! On the host, open the debug USB port with
//! ```text
//! $ screen /dev/tty.usbmodem* <baud_rate>
//! ```

use core::fmt::{self, Write};
use nb::block;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Serial, Tx},
};

use crate::arbiter::BusStats;
use crate::bringup::Board;

/// Transmit-only console.
pub struct Usart<U: Instance> {
    tx: Tx<U>,
}

impl<U: Instance> Usart<U> {
    pub fn new<PINS: Pins<U>>(serial: Serial<U, PINS>) -> Self {
        let (tx, _rx) = serial.split();
        Self { tx }
    }

    fn put(&mut self, s: &str) {
        for &b in s.as_bytes() {
            let _ = block!(self.tx.write(b));
        }
    }

    pub fn println(&mut self, s: &str) {
        self.put(s);
        self.put("\r\n");
    }

    /// Write formatted text and a CRLF terminator.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.write_fmt(args);
        self.put("\r\n");
    }

    /// Revision, timer start and interlock state of a freshly brought-up board.
    pub fn report_bring_up(&mut self, board: &Board) {
        let descriptor = board.descriptor();
        self.line(format_args!("board {:?}", descriptor.revision));
        self.line(format_args!(
            "thermistors on ADC channels {:?}",
            descriptor.thermistor_channels
        ));
        let _ = self.write_str("pwm inputs:");
        for gpio in descriptor.pwm_inputs.iter().flatten() {
            let _ = write!(self, " gpio{}", gpio);
        }
        self.put("\r\n");
        match board.sync_report() {
            Some(report) => self.line(format_args!(
                "timers: {} started, skew {} ticks",
                report.counters, report.skew
            )),
            None => self.println("timers: not started"),
        }
        match board.status() {
            Ok(()) => self.println("interlock: clear"),
            Err(reason) => self.line(format_args!("interlock: {}", reason)),
        }
    }

    pub fn report_bus(&mut self, stats: BusStats) {
        self.line(format_args!(
            "bus: {} ok, {} failed",
            stats.completed, stats.failed
        ));
    }

    /// Block until the last byte has left the shift register.
    pub fn flush(&mut self) {
        let _ = block!(self.tx.flush());
    }
}

impl<U: Instance> fmt::Write for Usart<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put(s);
        Ok(())
    }
}
