/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Register map of the three-output Si5351A.

/// 7-bit I²C address with the A0 pin pulled low.
pub const ADDRESS: u8 = 0b0110_0000;

/// Largest fractional denominator the 20-bit P3 field can carry.
pub const FRAC_DENOM: u32 = 0xFFFFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Register {
    DeviceStatus = 0,
    Clk0 = 16,
    Clk1 = 17,
    Clk2 = 18,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
    }
}

bitflags! {
    pub(crate) struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub(crate) struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
    }
}

bitflags! {
    pub(crate) struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

impl CrystalLoad {
    pub(crate) fn bits(&self) -> u8 {
        (CrystalLoadBits::RESERVED
            | match *self {
                CrystalLoad::_6 => CrystalLoadBits::CL_6,
                CrystalLoad::_8 => CrystalLoadBits::CL_8,
                CrystalLoad::_10 => CrystalLoadBits::CL_10,
            })
        .bits()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PLL {
    A,
    B,
}

impl PLL {
    /// First of the eight MSNx parameter registers.
    pub fn base_addr(&self) -> u8 {
        match *self {
            PLL::A => 26,
            PLL::B => 34,
        }
    }

    fn source_bits(&self) -> ClockControlBits {
        match *self {
            PLL::A => ClockControlBits::empty(),
            PLL::B => ClockControlBits::MS_SRC,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
}

impl ClockOutput {
    pub(crate) fn register(self) -> Register {
        match self {
            ClockOutput::Clk0 => Register::Clk0,
            ClockOutput::Clk1 => Register::Clk1,
            ClockOutput::Clk2 => Register::Clk2,
        }
    }

    /// First of the eight MSx parameter registers feeding this output.
    pub fn multisynth_addr(&self) -> u8 {
        match *self {
            ClockOutput::Clk0 => 42,
            ClockOutput::Clk1 => 50,
            ClockOutput::Clk2 => 58,
        }
    }

    pub(crate) fn ix(&self) -> usize {
        *self as usize
    }
}

/// Output drive strength, register code 0..3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveStrength {
    _2 = 0,
    _4,
    _6,
    _8,
}

impl DriveStrength {
    /// Takes the low two bits of a raw power level.
    pub fn from_bits(level: u8) -> Self {
        match level & ClockControlBits::CLK_DRV_MASK.bits() {
            0 => DriveStrength::_2,
            1 => DriveStrength::_4,
            2 => DriveStrength::_6,
            _ => DriveStrength::_8,
        }
    }

    pub fn bits(&self) -> u8 {
        *self as u8
    }
}

/// R divider stage behind a multisynth, as a power-of-two shift.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl OutputDivider {
    pub fn from_shift(shift: u8) -> Option<OutputDivider> {
        match shift {
            0 => Some(OutputDivider::Div1),
            1 => Some(OutputDivider::Div2),
            2 => Some(OutputDivider::Div4),
            3 => Some(OutputDivider::Div8),
            4 => Some(OutputDivider::Div16),
            5 => Some(OutputDivider::Div32),
            6 => Some(OutputDivider::Div64),
            7 => Some(OutputDivider::Div128),
            _ => None,
        }
    }

    pub fn shift(&self) -> u8 {
        *self as u8
    }

    /// R_DIV field as it sits in the third parameter byte.
    pub fn bits(&self) -> u8 {
        self.shift() << 4
    }

    pub fn denominator(&self) -> u32 {
        1 << self.shift()
    }
}

/// Control byte for an output that is driven from `pll`'s multisynth.
pub(crate) fn clock_control(drive: DriveStrength, pll: PLL) -> u8 {
    (ClockControlBits::MS_INT | ClockControlBits::CLK_SRC_MS | pll.source_bits()).bits()
        | drive.bits()
}

/// Control byte for a powered down output.
pub(crate) fn clock_disabled() -> u8 {
    ClockControlBits::CLK_PDN.bits()
}

/// Strobe value that resets both PLLs.
pub(crate) fn pll_reset_both() -> u8 {
    (PLLResetBits::PLLA_RST | PLLResetBits::PLLB_RST).bits()
}
