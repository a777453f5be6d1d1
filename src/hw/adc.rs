// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! ADC completion flags for the conversion dispatcher, using direct PAC register access.
//!
//! ADC1/ADC2/ADC3 share one register layout. Each unit is powered up with its end-of-conversion
//! interrupts enabled; channel sequences and triggers are set up by the current-sense code.
//!
//! Example:
//! ```ignore
//! let adc2 = AdcFlags::adc2(dp.ADC2);
//! let dispatcher = ConversionDispatcher::new(ConversionUnit(2), adc2, &sense);
//! ```

use stm32f7xx_hal::pac;

use crate::dispatch::{ChannelDescriptor, ConversionFlags, SequenceKind};

// SR
const SR_EOC: u32 = 1 << 1;
const SR_JEOC: u32 = 1 << 2;
const SR_JSTRT: u32 = 1 << 3;
const SR_STRT: u32 = 1 << 4;

// CR1
const CR1_EOCIE: u32 = 1 << 5;
const CR1_JEOCIE: u32 = 1 << 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Unit {
    Adc1,
    Adc2,
    Adc3,
}

/// Status and interrupt-enable registers of one ADC unit.
pub struct AdcFlags {
    unit: Unit,
}

fn configure_common() {
    let common = unsafe { &*pac::ADC_COMMON::ptr() };

    // ADC prescaler: PCLK2 / 4
    common.ccr.modify(|_, w| w.adcpre().div4());
}

fn init_unit(adc: &pac::adc1::RegisterBlock) {
    // Power off to configure
    adc.cr2.modify(|_, w| w.adon().clear_bit());

    // 12-bit, end-of-conversion interrupts for both sequence kinds
    adc.cr1.modify(|_, w| w.res().bits(0b00));
    adc.cr1
        .modify(|r, w| unsafe { w.bits(r.bits() | CR1_EOCIE | CR1_JEOCIE) });

    // Stale flags from before reset must not look like a finished conversion
    adc.sr
        .write(|w| unsafe { w.bits(!(SR_EOC | SR_JEOC | SR_STRT | SR_JSTRT)) });

    // Power on
    adc.cr2.modify(|_, w| w.adon().set_bit());
}

impl AdcFlags {
    /// Initialize ADC1 and take over its flags.
    pub fn adc1(_adc1: pac::ADC1) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.adc1en().set_bit());
        Self::init(Unit::Adc1)
    }

    /// Initialize ADC2 and take over its flags.
    pub fn adc2(_adc2: pac::ADC2) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.adc2en().set_bit());
        Self::init(Unit::Adc2)
    }

    /// Initialize ADC3 and take over its flags.
    pub fn adc3(_adc3: pac::ADC3) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.adc3en().set_bit());
        Self::init(Unit::Adc3)
    }

    fn init(unit: Unit) -> Self {
        configure_common();
        let flags = Self { unit };
        init_unit(flags.regs());
        flags
    }

    #[inline]
    fn regs(&self) -> &'static pac::adc1::RegisterBlock {
        // The constructors consumed the peripheral, so this is the only handle.
        unsafe {
            match self.unit {
                Unit::Adc1 => &*pac::ADC1::ptr(),
                Unit::Adc2 => &*pac::ADC2::ptr(),
                Unit::Adc3 => &*pac::ADC3::ptr(),
            }
        }
    }
}

impl ConversionFlags for AdcFlags {
    const INJECTED: ChannelDescriptor = ChannelDescriptor {
        kind: SequenceKind::Injected,
        flag: SR_JEOC,
        enable: CR1_JEOCIE,
        clear: SR_JSTRT | SR_JEOC,
    };

    const REGULAR: ChannelDescriptor = ChannelDescriptor {
        kind: SequenceKind::Regular,
        flag: SR_EOC,
        enable: CR1_EOCIE,
        clear: SR_STRT | SR_EOC,
    };

    #[inline]
    fn status(&self) -> u32 {
        self.regs().sr.read().bits()
    }

    #[inline]
    fn interrupt_enable(&self) -> u32 {
        self.regs().cr1.read().bits()
    }

    #[inline]
    fn clear(&mut self, mask: u32) {
        // rc_w0: zeros clear, ones leave the flag as it is
        self.regs().sr.write(|w| unsafe { w.bits(!mask) });
    }
}
