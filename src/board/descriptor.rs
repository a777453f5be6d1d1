// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Tagged board descriptors.
//!
//! Everything that differs between board revisions lives in a [`BoardDescriptor`] value. The
//! revision is picked at init time, so one image can carry every descriptor.

use crate::board::modes::{AltFunction, GpioMode, Peripheral, AF_MODES};
use crate::board::pins::{GpioTable, PinId, GPIO_COUNT, GPIOS_V3_1, GPIOS_V3_3, GPIOS_V3_5};

/// Number of motor axes on the board.
pub const AXIS_COUNT: usize = 2;

/// PWM timer half-period in timer ticks (center-aligned auto-reload value).
pub const PWM_PERIOD_TICKS: u32 = 3500;

/// Alternate-function table, indexed by `[gpio][mode column]`.
pub type AfTable = [[Option<AltFunction>; AF_MODES]; GPIO_COUNT];

/// Hardware revision of the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardRevision {
    V3_1,
    V3_2,
    V3_3,
    V3_4,
    V3_5,
    V3_6,
}

impl BoardRevision {
    pub const ALL: [BoardRevision; 6] = [
        BoardRevision::V3_1,
        BoardRevision::V3_2,
        BoardRevision::V3_3,
        BoardRevision::V3_4,
        BoardRevision::V3_5,
        BoardRevision::V3_6,
    ];

    /// Minor hardware version (the `x` in v3.x).
    pub const fn minor(self) -> u8 {
        match self {
            BoardRevision::V3_1 => 1,
            BoardRevision::V3_2 => 2,
            BoardRevision::V3_3 => 3,
            BoardRevision::V3_4 => 4,
            BoardRevision::V3_5 => 5,
            BoardRevision::V3_6 => 6,
        }
    }

    pub fn descriptor(self) -> &'static BoardDescriptor {
        match self {
            BoardRevision::V3_1 => &V3_1,
            BoardRevision::V3_2 => &V3_2,
            BoardRevision::V3_3 => &V3_3,
            BoardRevision::V3_4 => &V3_4,
            BoardRevision::V3_5 => &V3_5,
            BoardRevision::V3_6 => &V3_6,
        }
    }
}

/// Step/direction input pins of one axis, as board GPIO numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisPins {
    pub step_gpio: u8,
    pub dir_gpio: u8,
}

/// Preload values for the phase-locked timers, in timer ticks.
///
/// Both PWM timers count center-aligned with the same period. The axis-0 timer leads the axis-1
/// timer by `pwm_period / 2 - 128` ticks, roughly 90° of the triangle less a margin for the
/// current sampling window. The control-deadline timer starts with the axis-0 preload so that its
/// reloads coincide with axis-0 update events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerPhases {
    pub pwm_period: u32,
    /// Repetition counter of the PWM timers: one update event every `repetition + 1` extremes.
    pub repetition: u32,
    pub axis0: u32,
    pub axis1: u32,
    pub deadline: u32,
}

impl TimerPhases {
    /// Auto-reload value of the control-deadline timer. It counts up and wraps once per PWM
    /// update event.
    pub const fn deadline_period(&self) -> u32 {
        self.pwm_period * (self.repetition + 1) - 1
    }
}

/// Everything that distinguishes one board revision from another.
#[derive(Debug)]
pub struct BoardDescriptor {
    pub revision: BoardRevision,
    gpios: &'static GpioTable,
    alternate_functions: &'static AfTable,
    /// Step/dir inputs per axis.
    pub axes: [AxisPins; AXIS_COUNT],
    /// ADC channel of each axis' inverter thermistor.
    pub thermistor_channels: [u8; AXIS_COUNT],
    /// GPIO feeding each PWM-input capture channel, if any.
    pub pwm_inputs: [Option<u8>; 4],
    pub timer_phases: TimerPhases,
}

impl BoardDescriptor {
    /// Physical pin behind a board GPIO number.
    #[inline]
    pub fn pin(&self, gpio: u8) -> Option<PinId> {
        self.gpios.get(gpio as usize).copied().flatten()
    }

    /// Alternate function `gpio` needs to operate in `mode`.
    ///
    /// `None` both for modes without an alternate function and for unsupported combinations.
    pub fn alternate_function(&self, gpio: u8, mode: GpioMode) -> Option<AltFunction> {
        let column = mode.af_column()?;
        self.alternate_functions
            .get(gpio as usize)
            .and_then(|row| row[column])
    }

    /// Iterate over every board GPIO number (slot 0 excluded).
    pub fn gpio_numbers(&self) -> impl Iterator<Item = u8> {
        1..GPIO_COUNT as u8
    }
}

const __: Option<AltFunction> = None;
const UART4: Option<AltFunction> = Some(AltFunction::new(8, Peripheral::Uart4));
const CAN1: Option<AltFunction> = Some(AltFunction::new(9, Peripheral::Can1));
const I2C1: Option<AltFunction> = Some(AltFunction::new(4, Peripheral::I2c1));
const TIM3: Option<AltFunction> = Some(AltFunction::new(2, Peripheral::Tim3));
const TIM4: Option<AltFunction> = Some(AltFunction::new(2, Peripheral::Tim4));
const TIM5: Option<AltFunction> = Some(AltFunction::new(2, Peripheral::Tim5));

//  UART0  UART1 UART2 CAN0  I2C0  SPI0  PWM0  ENC0  ENC1  ENC2
const AF_V3_1: AfTable = [
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, TIM5, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, TIM3, __, __],
    [__, __, __, __, __, __, __, TIM3, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, I2C1, __, __, __, TIM4, __],
    [__, __, __, __, I2C1, __, __, __, TIM4, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, CAN1, I2C1, __, __, __, __, __],
    [__, __, __, CAN1, I2C1, __, __, __, __, __],
];

const AF_V3_3: AfTable = [
    [__, __, __, __, __, __, __, __, __, __],
    [UART4, __, __, __, __, __, TIM5, __, __, __],
    [UART4, __, __, __, __, __, TIM5, __, __, __],
    [__, __, __, __, __, __, TIM5, __, __, __],
    [__, __, __, __, __, __, TIM5, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, TIM3, __, __],
    [__, __, __, __, __, __, __, TIM3, __, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, __, I2C1, __, __, __, TIM4, __],
    [__, __, __, __, I2C1, __, __, __, TIM4, __],
    [__, __, __, __, __, __, __, __, __, __],
    [__, __, __, CAN1, I2C1, __, __, __, __, __],
    [__, __, __, CAN1, I2C1, __, __, __, __, __],
];

const TIMER_PHASES: TimerPhases = TimerPhases {
    pwm_period: PWM_PERIOD_TICKS,
    repetition: 2,
    axis0: PWM_PERIOD_TICKS / 2 - 128,
    axis1: 0,
    deadline: PWM_PERIOD_TICKS / 2 - 128,
};

const AXIS0_PINS: AxisPins = AxisPins {
    step_gpio: 1,
    dir_gpio: 2,
};

const AXIS1_PINS_EARLY: AxisPins = AxisPins {
    step_gpio: 3,
    dir_gpio: 4,
};

const AXIS1_PINS: AxisPins = AxisPins {
    step_gpio: 7,
    dir_gpio: 8,
};

const PWM_INPUTS_EARLY: [Option<u8>; 4] = [None, None, None, Some(4)];
const PWM_INPUTS: [Option<u8>; 4] = [Some(1), Some(2), Some(3), Some(4)];

static V3_1: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_1,
    gpios: &GPIOS_V3_1,
    alternate_functions: &AF_V3_1,
    axes: [AXIS0_PINS, AXIS1_PINS_EARLY],
    thermistor_channels: [15, 1],
    pwm_inputs: PWM_INPUTS_EARLY,
    timer_phases: TIMER_PHASES,
};

static V3_2: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_2,
    gpios: &GPIOS_V3_1,
    alternate_functions: &AF_V3_1,
    axes: [AXIS0_PINS, AXIS1_PINS_EARLY],
    thermistor_channels: [15, 1],
    pwm_inputs: PWM_INPUTS_EARLY,
    timer_phases: TIMER_PHASES,
};

static V3_3: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_3,
    gpios: &GPIOS_V3_3,
    alternate_functions: &AF_V3_3,
    axes: [AXIS0_PINS, AXIS1_PINS_EARLY],
    thermistor_channels: [15, 4],
    pwm_inputs: PWM_INPUTS,
    timer_phases: TIMER_PHASES,
};

static V3_4: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_4,
    gpios: &GPIOS_V3_3,
    alternate_functions: &AF_V3_3,
    axes: [AXIS0_PINS, AXIS1_PINS_EARLY],
    thermistor_channels: [15, 4],
    pwm_inputs: PWM_INPUTS,
    timer_phases: TIMER_PHASES,
};

static V3_5: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_5,
    gpios: &GPIOS_V3_5,
    alternate_functions: &AF_V3_3,
    axes: [AXIS0_PINS, AXIS1_PINS],
    thermistor_channels: [15, 4],
    pwm_inputs: PWM_INPUTS,
    timer_phases: TIMER_PHASES,
};

static V3_6: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::V3_6,
    gpios: &GPIOS_V3_5,
    alternate_functions: &AF_V3_3,
    axes: [AXIS0_PINS, AXIS1_PINS],
    thermistor_channels: [15, 4],
    pwm_inputs: PWM_INPUTS,
    timer_phases: TIMER_PHASES,
};
