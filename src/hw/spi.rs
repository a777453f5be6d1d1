// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Interrupt-driven SPI3 port for the bus arbiter.
//!
//! - `Spi3Port` clocks one transaction at a time, one byte per RXNE interrupt, and reports the
//!   result to [`SpiArbiter::service`](crate::arbiter::SpiArbiter::service).
//! - `ChipSelect` is an active-low GPIO output for manual CS control, type-erased so devices on
//!   different pins fit in one array.

use stm32f7xx_hal::{
    gpio::{self, ErasedPin, Output, PinState, PushPull},
    pac,
};

use crate::arbiter::{DeviceId, SpiMode, SpiPort};
use crate::error::{BusError, BusFault};

// CR1
const CR1_CPHA: u32 = 1 << 0;
const CR1_CPOL: u32 = 1 << 1;
const CR1_MSTR: u32 = 1 << 2;
const CR1_BR_SHIFT: u32 = 3;
const CR1_SPE: u32 = 1 << 6;
const CR1_SSI: u32 = 1 << 8;
const CR1_SSM: u32 = 1 << 9;

// CR2
const CR2_ERRIE: u32 = 1 << 5;
const CR2_RXNEIE: u32 = 1 << 6;
const CR2_DS_8BIT: u32 = 0b0111 << 8;
const CR2_FRXTH: u32 = 1 << 12;

// SR
const SR_RXNE: u32 = 1 << 0;
const SR_CRCERR: u32 = 1 << 4;
const SR_MODF: u32 = 1 << 5;
const SR_OVR: u32 = 1 << 6;
const SR_BSY: u32 = 1 << 7;
const SR_FRE: u32 = 1 << 8;

/// Manual chip-select line, active-low.
pub struct ChipSelect {
    pin: ErasedPin<Output<PushPull>>,
}

impl ChipSelect {
    /// Create an active-low chip select and set to the inactive state (i.e., high).
    pub fn active_low<const P: char, const N: u8, MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        let mut pin = pin.into_push_pull_output();
        pin.set_state(PinState::High);
        Self { pin: pin.erase() }
    }

    /// Assert the chip select.
    #[inline]
    pub fn select(&mut self) {
        self.pin.set_low();
    }

    /// Deassert the chip select.
    #[inline]
    pub fn deselect(&mut self) {
        self.pin.set_high();
    }
}

/// Progress of the transfer on the wire.
struct Transfer {
    device: usize,
    sent: usize,
    received: usize,
}

/// SPI3 master with `N` chip selects. [`DeviceId`] indexes the chip selects.
pub struct Spi3Port<const N: usize> {
    spi: pac::SPI3,
    chip_selects: [ChipSelect; N],
    baud_bits: u32,
    transfer: Option<Transfer>,
}

impl<const N: usize> Spi3Port<N> {
    /// Take SPI3 with its SCK/MISO/MOSI pins already in alternate-function mode.
    ///
    /// `baud_divider` is the CR1 BR field: SCK = PCLK1 / 2^(baud_divider + 1).
    pub fn new(spi: pac::SPI3, chip_selects: [ChipSelect; N], baud_divider: u8) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.spi3en().set_bit());

        spi.cr1.write(|w| unsafe { w.bits(0) });
        spi.cr2.write(|w| unsafe { w.bits(CR2_DS_8BIT | CR2_FRXTH) });

        Self {
            spi,
            chip_selects,
            baud_bits: ((baud_divider & 0b111) as u32) << CR1_BR_SHIFT,
            transfer: None,
        }
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) {
        // DR must be accessed as a byte, or the FIFO packs two frames.
        let dr = &self.spi.dr as *const _ as *mut u8;
        unsafe { core::ptr::write_volatile(dr, byte) };
    }

    #[inline]
    fn read_byte(&mut self) -> u8 {
        let dr = &self.spi.dr as *const _ as *const u8;
        unsafe { core::ptr::read_volatile(dr) }
    }

    fn drain_rx(&mut self) {
        while self.spi.sr.read().bits() & SR_RXNE != 0 {
            let _ = self.read_byte();
        }
    }

    /// Deselect, mask interrupts and disable the peripheral.
    fn finish(&mut self, device: usize) {
        while self.spi.sr.read().bits() & SR_BSY != 0 {}
        self.chip_selects[device].deselect();
        self.spi
            .cr2
            .modify(|r, w| unsafe { w.bits(r.bits() & !(CR2_RXNEIE | CR2_ERRIE)) });
        self.spi
            .cr1
            .modify(|r, w| unsafe { w.bits(r.bits() & !CR1_SPE) });
        self.transfer = None;
    }

    fn fault(&mut self, sr: u32) -> Option<BusFault> {
        let fault = if sr & SR_OVR != 0 {
            BusFault::Overrun
        } else if sr & SR_MODF != 0 {
            BusFault::ModeFault
        } else if sr & SR_FRE != 0 {
            BusFault::FrameFormat
        } else if sr & SR_CRCERR != 0 {
            BusFault::Crc
        } else {
            return None;
        };

        // OVR and FRE clear on a DR read followed by an SR read, CRCERR on a zero write
        let _ = self.read_byte();
        let _ = self.spi.sr.read().bits();
        self.spi
            .sr
            .write(|w| unsafe { w.bits(!SR_CRCERR) });
        Some(fault)
    }
}

impl<const N: usize> SpiPort for Spi3Port<N> {
    fn start(&mut self, device: DeviceId, mode: SpiMode, tx: &[u8]) -> Result<(), BusError> {
        let index = device.0 as usize;
        if index >= N || tx.is_empty() || self.transfer.is_some() {
            return Err(BusError::Refused);
        }
        if self.spi.sr.read().bits() & SR_BSY != 0 {
            return Err(BusError::Refused);
        }

        let mut cr1 = CR1_MSTR | CR1_SSM | CR1_SSI | self.baud_bits;
        if mode.cpol() {
            cr1 |= CR1_CPOL;
        }
        if mode.cpha() {
            cr1 |= CR1_CPHA;
        }

        // Mode bits only change while SPE is clear
        self.spi.cr1.write(|w| unsafe { w.bits(cr1) });
        self.drain_rx();
        self.spi
            .cr2
            .write(|w| unsafe { w.bits(CR2_DS_8BIT | CR2_FRXTH | CR2_RXNEIE | CR2_ERRIE) });
        self.spi.cr1.write(|w| unsafe { w.bits(cr1 | CR1_SPE) });

        self.chip_selects[index].select();
        self.transfer = Some(Transfer {
            device: index,
            sent: 1,
            received: 0,
        });
        self.write_byte(tx[0]);
        Ok(())
    }

    fn poll(&mut self, tx: &[u8], rx: &mut [u8]) -> Option<Result<(), BusError>> {
        let (device, sent, received) = {
            let t = self.transfer.as_ref()?;
            (t.device, t.sent, t.received)
        };

        let sr = self.spi.sr.read().bits();
        if let Some(fault) = self.fault(sr) {
            self.finish(device);
            return Some(Err(BusError::Fault(fault)));
        }
        if sr & SR_RXNE == 0 {
            return None;
        }

        let byte = self.read_byte();
        if let Some(slot) = rx.get_mut(received) {
            *slot = byte;
        }
        let received = received + 1;

        let sent = match tx.get(sent) {
            Some(&next) => {
                self.write_byte(next);
                sent + 1
            }
            None => sent,
        };
        if let Some(t) = self.transfer.as_mut() {
            t.sent = sent;
            t.received = received;
        }

        if received >= tx.len() {
            self.finish(device);
            return Some(Ok(()));
        }
        None
    }
}
