// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

#![no_main]
#![no_std]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use panic_halt as _;
use static_cell::StaticCell;

use hal::{
    pac::{self, interrupt, Interrupt},
    prelude::*,
    serial::{Config, Serial},
};
use stm32f7xx_hal as hal;

use axisboard::arbiter::{
    DeviceId, Requester, SpiArbiter, SpiMode, SubmitError, Transaction, TransferClient,
};
use axisboard::board::{BoardConfig, BoardRevision};
use axisboard::bringup::BringUp;
use axisboard::dispatch::{
    ConversionDispatcher, ConversionHandler, ConversionUnit, ConversionVector, SequenceKind,
};
use axisboard::error::BusError;
use axisboard::hw::{
    freeze_pwm_timers_on_debug_halt, AdcFlags, ChipSelect, GpioMux, PwmTimer, Spi3Port,
    UpdateVector, Usart,
};
use axisboard::sync::board_phases;
use axisboard::vectors::{InterruptHandler, SharedVectors, Vector};

const REVISION: BoardRevision = BoardRevision::V3_6;

/// Transactions that may wait for the bus.
const BUS_QUEUE: usize = 8;
/// SPI3 clock: PCLK1 / 16.
const SPI_BAUD_DIVIDER: u8 = 0b011;

/// Gate-driver status register 1 read (address 0, read bit set).
const GATE_STATUS_READ: [u8; 2] = [0x80, 0x00];
/// Main-loop spins between gate-driver polls.
const POLL_INTERVAL: u32 = 1_000_000;

type Bus = SpiArbiter<'static, Spi3Port<2>, BUS_QUEUE>;
type Adcs = ConversionVector<'static, AdcFlags, 3>;
type Axis0Update = UpdateVector<'static, PwmTimer<pac::TIM1>>;
type Axis1Update = UpdateVector<'static, PwmTimer<pac::TIM8>>;

static VECTORS: SharedVectors<'static> = SharedVectors::new();

static BUS: StaticCell<Bus> = StaticCell::new();
static ADCS: StaticCell<Adcs> = StaticCell::new();
static AXIS0_UPDATE: StaticCell<Axis0Update> = StaticCell::new();
static AXIS1_UPDATE: StaticCell<Axis1Update> = StaticCell::new();

/// Event counters standing in for the per-axis control loop.
struct AxisTick {
    updates: AtomicU32,
}

impl InterruptHandler for AxisTick {
    fn on_interrupt(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}

static AXIS_TICKS: [AxisTick; 2] = [
    AxisTick {
        updates: AtomicU32::new(0),
    },
    AxisTick {
        updates: AtomicU32::new(0),
    },
];

/// Counts finished conversions per sequence kind.
struct SenseCounter {
    injected: AtomicU32,
    regular: AtomicU32,
}

impl ConversionHandler for SenseCounter {
    fn on_conversion(&self, _unit: ConversionUnit, kind: SequenceKind) {
        let counter = match kind {
            SequenceKind::Injected => &self.injected,
            SequenceKind::Regular => &self.regular,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

static VBUS_SENSE: SenseCounter = SenseCounter {
    injected: AtomicU32::new(0),
    regular: AtomicU32::new(0),
};

static CURRENT_SENSE: SenseCounter = SenseCounter {
    injected: AtomicU32::new(0),
    regular: AtomicU32::new(0),
};

/// Keeps the last status word of each gate driver.
struct GateDriverStatus {
    words: [AtomicU32; 2],
    faults: AtomicU32,
}

impl TransferClient for GateDriverStatus {
    fn transfer_complete(&self, transaction: Transaction<'_>, result: Result<(), BusError>) {
        let Some(word) = self.words.get(transaction.device().0 as usize) else {
            return;
        };
        match result {
            Ok(()) => {
                let rx = transaction.rx();
                let value = rx.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                word.store(value, Ordering::Relaxed);
            }
            Err(_) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

static GATE_STATUS: GateDriverStatus = GateDriverStatus {
    words: [AtomicU32::new(0), AtomicU32::new(0)],
    faults: AtomicU32::new(0),
};

fn poll_gate_drivers(bus: &Bus) {
    for device in 0..2u8 {
        let Ok(txn) = Transaction::new(
            Requester(device),
            DeviceId(device),
            &GATE_STATUS_READ,
            &GATE_STATUS,
        ) else {
            continue;
        };
        match bus.submit(txn.with_mode(SpiMode::Mode1)) {
            Ok(_) | Err(SubmitError::QueueFull(_)) => {}
            Err(_) => {
                GATE_STATUS.faults.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[entry]
fn main() -> ! {
    // Peripherals
    let (Some(dp), Some(mut cp)) = (pac::Peripherals::take(), cortex_m::Peripherals::take())
    else {
        loop {
            cortex_m::asm::nop();
        }
    };

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.freeze();

    // GPIO
    let gpioa = dp.GPIOA.split();
    let gpioc = dp.GPIOC.split();

    // USART1 (DBG)
    let tx = gpioa.pa9.into_alternate::<7>();
    let rx = gpioa.pa10.into_alternate::<7>();
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(dp.USART1, (tx, rx), &clocks, usart_cfg);
    let mut usart = Usart::new(serial);

    usart.println("axisboard bring-up");

    // Timers
    let timing = REVISION.descriptor().timer_phases;
    let mut tim1 = PwmTimer::tim1(
        dp.TIM1,
        timing.pwm_period,
        timing.repetition as u8,
        clocks.timclk2().raw(),
    );
    let mut tim8 = PwmTimer::tim8(
        dp.TIM8,
        timing.pwm_period,
        timing.repetition as u8,
        clocks.timclk2().raw(),
    );
    let mut tim13 = PwmTimer::tim13(dp.TIM13, timing.deadline_period(), clocks.timclk1().raw());
    freeze_pwm_timers_on_debug_halt();

    // Bring-up
    let config = BoardConfig::default_for(REVISION);
    let mut mux = GpioMux::new();
    let mut phases = board_phases(&timing, &mut tim1, &mut tim8, &mut tim13);
    let mut board = BringUp::new(config).run(&mut mux, &mut phases);

    usart.report_bring_up(&board);

    // SPI3: SCK PC10, MISO PC11, MOSI PC12; gate drivers on PC13/PC14
    let _sck = gpioc.pc10.into_alternate::<6>();
    let _miso = gpioc.pc11.into_alternate::<6>();
    let _mosi = gpioc.pc12.into_alternate::<6>();
    let chip_selects = [
        ChipSelect::active_low(gpioc.pc13),
        ChipSelect::active_low(gpioc.pc14),
    ];
    let port = Spi3Port::new(dp.SPI3, chip_selects, SPI_BAUD_DIVIDER);
    let bus: &'static Bus = BUS.init(SpiArbiter::new(port));

    // ADC1 senses bus voltage, ADC2/ADC3 sample phase currents
    let adcs: &'static Adcs = ADCS.init(ConversionVector::new([
        ConversionDispatcher::new(ConversionUnit(1), AdcFlags::adc1(dp.ADC1), &VBUS_SENSE),
        ConversionDispatcher::new(ConversionUnit(2), AdcFlags::adc2(dp.ADC2), &CURRENT_SENSE),
        ConversionDispatcher::new(ConversionUnit(3), AdcFlags::adc3(dp.ADC3), &CURRENT_SENSE),
    ]));

    let axis0: &'static Axis0Update = AXIS0_UPDATE.init(UpdateVector::new(tim1, &AXIS_TICKS[0]));
    let axis1: &'static Axis1Update = AXIS1_UPDATE.init(UpdateVector::new(tim8, &AXIS_TICKS[1]));

    VECTORS.install(Vector::ConversionComplete, adcs);
    VECTORS.install(Vector::Axis0Update, axis0);
    VECTORS.install(Vector::Axis1Update, axis1);
    VECTORS.install(Vector::BusComplete, bus);
    // PwmCapture has no consumer yet. TIM5 is routed so a capture handler only needs installing.

    let irqs = [
        (Interrupt::ADC, Vector::ConversionComplete),
        (Interrupt::TIM1_UP_TIM10, Vector::Axis0Update),
        (Interrupt::TIM8_UP_TIM13, Vector::Axis1Update),
        (Interrupt::SPI3, Vector::BusComplete),
        (Interrupt::TIM5, Vector::PwmCapture),
    ];
    for (irq, vector) in irqs {
        unsafe {
            cp.NVIC.set_priority(irq, vector.nvic_priority());
            NVIC::unmask(irq);
        }
    }

    match board.arm() {
        Ok(()) => usart.println("armed"),
        Err(e) => usart.line(format_args!("{}", e)),
    }
    usart.flush();

    let mut spins: u32 = 0;
    loop {
        spins = spins.wrapping_add(1);
        if spins % POLL_INTERVAL == 0 {
            poll_gate_drivers(bus);
            usart.report_bus(bus.stats());
            usart.line(format_args!(
                "axis ticks {}/{}, vbus {}, current {}, gate faults {}",
                AXIS_TICKS[0].updates.load(Ordering::Relaxed),
                AXIS_TICKS[1].updates.load(Ordering::Relaxed),
                VBUS_SENSE.regular.load(Ordering::Relaxed),
                CURRENT_SENSE.injected.load(Ordering::Relaxed),
                GATE_STATUS.faults.load(Ordering::Relaxed),
            ));
        }
        cortex_m::asm::nop();
    }
}

#[interrupt]
fn ADC() {
    VECTORS.fire(Vector::ConversionComplete);
}

#[interrupt]
fn TIM1_UP_TIM10() {
    VECTORS.fire(Vector::Axis0Update);
}

#[interrupt]
fn TIM8_UP_TIM13() {
    VECTORS.fire(Vector::Axis1Update);
}

#[interrupt]
fn SPI3() {
    VECTORS.fire(Vector::BusComplete);
}

#[interrupt]
fn TIM5() {
    VECTORS.fire(Vector::PwmCapture);
}
