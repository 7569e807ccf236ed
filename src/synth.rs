/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Divider search and the three-output controller.
//!
//! CLK0 runs from PLL A, CLK1 and CLK2 share PLL B. Each PLL is run
//! fractionally so that an even integer multisynth divider lands exactly on
//! the requested frequency. CLK2 rides on whatever PLL B was tuned to for
//! CLK1, with a fractional multisynth, unless CLK1 is off.

use crate::codec::RegisterBus;
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::registers::{
    clock_control, pll_reset_both, ClockOutput, CrystalLoad, DeviceStatusBits, DriveStrength,
    OutputDivider, Register, ADDRESS, FRAC_DENOM, PLL,
};
use crate::Error;

/// Upper VCO frequency the integer divider search aims for.
pub const MAX_PLL_FREQ: u32 = 900_000_000;

pub const MIN_MS_DIVIDER: u32 = 6;
pub const MAX_MS_DIVIDER: u32 = 900;

/// What an output's multisynth is currently programmed with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputState {
    Disabled,
    /// A bus error cut programming short; the next request rewrites it.
    Unknown,
    Integer {
        divider: u32,
        r_div: OutputDivider,
    },
    Fractional {
        divider: u32,
        numerator: u32,
        denominator: u32,
        r_div: OutputDivider,
    },
}

/// Picks an even multisynth divider and the smallest R divider that keep the
/// VCO at or below [`MAX_PLL_FREQ`].
///
/// Returns `None` when `freq` is too high for a divider of 6, or too low for
/// the largest R divider.
pub fn find_int_divider(freq: u32) -> Option<(u32, OutputDivider)> {
    if freq == 0 {
        return None;
    }
    let mut divider = MAX_PLL_FREQ / freq;
    if divider < MIN_MS_DIVIDER {
        return None;
    }
    let mut shift = 0;
    while divider > MAX_MS_DIVIDER {
        shift += 1;
        divider >>= 1;
    }
    divider &= !1;

    OutputDivider::from_shift(shift).map(|r_div| (divider, r_div))
}

/// VCO frequency that puts `freq` out of a `divider`/`r_div` chain.
pub fn pll_frequency(freq: u32, divider: u32, r_div: OutputDivider) -> u64 {
    divider as u64 * freq as u64 * r_div.denominator() as u64
}

/// Multiplier and numerator (over [`FRAC_DENOM`]) that take the crystal to
/// `pll_freq`. `xtal_freq` is in tenths of a hertz.
///
/// Operation order matters: both quotients truncate.
pub fn pll_coefficients(pll_freq: u64, xtal_freq: u32) -> (u32, u32) {
    let xtal = xtal_freq as u64;
    let mult = pll_freq * 10 / xtal;
    let num = (pll_freq - mult * xtal / 10) * FRAC_DENOM as u64 * 10 / xtal;
    (mult as u32, num as u32)
}

/// Fractional divider from a fixed `pll_freq` down to `freq`, growing the R
/// divider until the integer part fits.
///
/// Returns `(divider, numerator, r_div)`, numerator over [`FRAC_DENOM`].
pub fn find_shared_divider(pll_freq: u64, freq: u32) -> Option<(u32, u32, OutputDivider)> {
    if freq == 0 {
        return None;
    }
    let mut divider = pll_freq / freq as u64;
    if divider < MIN_MS_DIVIDER as u64 {
        return None;
    }
    let mut scaled = freq as u64;
    let mut shift = 0;
    while divider > MAX_MS_DIVIDER as u64 {
        shift += 1;
        scaled <<= 1;
        divider >>= 1;
    }
    let num = (pll_freq % scaled) * FRAC_DENOM as u64 / scaled;

    let r_div = OutputDivider::from_shift(shift)?;
    Some((divider as u32, num as u32, r_div))
}

/// Si5351A driver for outputs CLK0..CLK2.
pub struct Si5351Device<I2C> {
    bus: RegisterBus<I2C>,
    /// Tenths of a hertz, zero until set.
    xtal_freq: u32,
    freq: [u32; 3],
    drive: [DriveStrength; 3],
    state: [OutputState; 3],
    /// Written only when CLK1 is retuned.
    pll_b_freq: u64,
}

pub trait Si5351 {
    fn setup(
        &mut self,
        drive0: DriveStrength,
        drive1: DriveStrength,
        drive2: DriveStrength,
    ) -> Result<(), Error>;
    fn set_crystal_load(&mut self, xtal_load: CrystalLoad) -> Result<(), Error>;
    fn set_xtal_freq(&mut self, freq: u32, reset_pll: bool) -> Result<(), Error>;
    fn set_freq(&mut self, f0: u32, f1: u32, f2: u32) -> Result<(), Error>;
    fn disable_output(&mut self, clk: ClockOutput) -> Result<(), Error>;

    fn frequency(&self, clk: ClockOutput) -> u32;
    fn output_state(&self, clk: ClockOutput) -> OutputState;
    fn pll_b_frequency(&self) -> u64;
}

impl<I2C, E> Si5351Device<I2C>
where
    I2C: Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral. The crystal frequency is
    /// unset and nothing is written until [`Si5351::setup`].
    pub fn new(i2c: I2C, address_bit: bool) -> Self {
        Si5351Device {
            bus: RegisterBus::new(i2c, ADDRESS | if address_bit { 1 } else { 0 }),
            xtal_freq: 0,
            freq: [0; 3],
            drive: [DriveStrength::_2; 3],
            state: [OutputState::Disabled; 3],
            pll_b_freq: 0,
        }
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    /// Powers `clk` down unless it already is.
    fn power_down(&mut self, clk: ClockOutput) -> Result<(), Error> {
        if self.state[clk.ix()] == OutputState::Disabled {
            return Ok(());
        }
        self.disable_output(clk)
    }

    /// Requests in `previous` that differ from the current ones are rolled
    /// back, and their outputs marked for a full rewrite.
    fn forget_partial_update(&mut self, previous: [u32; 3]) {
        for ix in 0..3 {
            if self.freq[ix] != previous[ix] {
                self.freq[ix] = previous[ix];
                self.state[ix] = OutputState::Unknown;
            }
        }
    }

    fn retune(&mut self, f0: u32, f1: u32, f2: u32) -> Result<(), Error> {
        let mut need_reset_pll = false;
        let freq1_changed = f1 != self.freq[1];

        if f0 != self.freq[0] {
            self.freq[0] = f0;
            self.update_freq0(&mut need_reset_pll)?;
        }
        if freq1_changed || f2 != self.freq[2] {
            self.freq[1] = f1;
            self.freq[2] = f2;
            self.update_freq12(freq1_changed, &mut need_reset_pll)?;
        }
        if need_reset_pll {
            self.reset_pll()?;
        }

        Ok(())
    }

    fn recompute_all(&mut self, reset_pll: bool) -> Result<(), Error> {
        let mut need_reset_pll = false;
        self.update_freq0(&mut need_reset_pll)?;
        self.update_freq12(true, &mut need_reset_pll)?;
        if reset_pll {
            self.reset_pll()?;
        }
        Ok(())
    }

    fn reset_pll(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!("si5351: PLL reset");
        self.bus.write_register(Register::PLLReset, pll_reset_both())
    }

    /// Tunes `pll` so that `divider`/`r_div` yield `freq`, returns the VCO
    /// frequency.
    fn program_pll(
        &mut self,
        pll: PLL,
        freq: u32,
        divider: u32,
        r_div: OutputDivider,
    ) -> Result<u64, Error> {
        let pll_freq = pll_frequency(freq, divider, r_div);
        let (mult, num) = pll_coefficients(pll_freq, self.xtal_freq);
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "si5351: PLL {} = {} Hz, {} + {}/{}",
            pll,
            pll_freq,
            mult,
            num,
            FRAC_DENOM
        );
        self.bus.setup_pll(pll, mult, num, FRAC_DENOM)?;
        Ok(pll_freq)
    }

    /// Reprograms an integer multisynth only if it differs from what is
    /// already there. Returns whether a PLL reset is owed.
    fn program_output_int(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        divider: u32,
        r_div: OutputDivider,
    ) -> Result<bool, Error> {
        let wanted = OutputState::Integer { divider, r_div };
        if self.state[clk.ix()] == wanted {
            return Ok(false);
        }
        #[cfg(feature = "defmt")]
        defmt::debug!("si5351: {} divider {} / {}", clk, divider, r_div);
        self.bus.setup_multisynth_int(clk, divider, r_div)?;
        self.bus
            .write_register(clk.register(), clock_control(self.drive[clk.ix()], pll))?;
        self.state[clk.ix()] = wanted;
        Ok(true)
    }

    fn update_freq0(&mut self, need_reset_pll: &mut bool) -> Result<(), Error> {
        let freq = self.freq[0];
        if freq == 0 {
            return self.power_down(ClockOutput::Clk0);
        }
        if self.xtal_freq == 0 {
            return Ok(());
        }

        let (divider, r_div) = match find_int_divider(freq) {
            Some(d) => d,
            None => return self.power_down(ClockOutput::Clk0),
        };
        self.program_pll(PLL::A, freq, divider, r_div)?;
        if self.program_output_int(ClockOutput::Clk0, PLL::A, divider, r_div)? {
            *need_reset_pll = true;
        }

        Ok(())
    }

    fn update_freq12(&mut self, freq1_changed: bool, need_reset_pll: &mut bool) -> Result<(), Error> {
        let (freq1, freq2) = (self.freq[1], self.freq[2]);

        if freq1 == 0 {
            self.power_down(ClockOutput::Clk1)?;
        }
        if freq2 == 0 {
            self.power_down(ClockOutput::Clk2)?;
        }
        if self.xtal_freq == 0 {
            return Ok(());
        }

        if freq1 != 0 {
            if freq1_changed {
                let (divider, r_div) = match find_int_divider(freq1) {
                    Some(d) => d,
                    // CLK2 is left as it was
                    None => return self.power_down(ClockOutput::Clk1),
                };
                let pll_freq = self.program_pll(PLL::B, freq1, divider, r_div)?;
                if self.program_output_int(ClockOutput::Clk1, PLL::B, divider, r_div)? {
                    *need_reset_pll = true;
                }
                self.pll_b_freq = pll_freq;
            }

            if freq2 != 0 {
                self.update_shared_freq2(freq2)?;
            }
        } else if freq2 != 0 {
            self.update_direct_freq2(freq2, need_reset_pll)?;
        }

        Ok(())
    }

    /// CLK2 off PLL B as tuned for CLK1. Not cached: PLL B may have moved.
    ///
    /// The control byte goes out when CLK2 enters shared mode, not when CLK1's
    /// divider changes, so a CLK2 that was switched off comes back on.
    fn update_shared_freq2(&mut self, freq: u32) -> Result<(), Error> {
        let (divider, numerator, r_div) = match find_shared_divider(self.pll_b_freq, freq) {
            Some(d) => d,
            None => return self.power_down(ClockOutput::Clk2),
        };
        let denominator = if numerator != 0 { FRAC_DENOM } else { 1 };

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "si5351: Clk2 divider {} + {}/{} / {}",
            divider,
            numerator,
            denominator,
            r_div
        );
        self.bus
            .setup_multisynth(ClockOutput::Clk2, divider, numerator, denominator, r_div)?;

        let was_shared = matches!(self.state[2], OutputState::Fractional { .. });
        self.state[2] = OutputState::Fractional {
            divider,
            numerator,
            denominator,
            r_div,
        };
        if !was_shared {
            self.bus.write_register(
                ClockOutput::Clk2.register(),
                clock_control(self.drive[2], PLL::B),
            )?;
        }

        Ok(())
    }

    /// CLK2 owns PLL B while CLK1 is off.
    fn update_direct_freq2(&mut self, freq: u32, need_reset_pll: &mut bool) -> Result<(), Error> {
        let (divider, r_div) = match find_int_divider(freq) {
            Some(d) => d,
            None => return self.power_down(ClockOutput::Clk2),
        };
        self.program_pll(PLL::B, freq, divider, r_div)?;

        let wanted = OutputState::Integer { divider, r_div };
        if self.state[2] != wanted {
            self.bus
                .setup_multisynth_int(ClockOutput::Clk2, divider, r_div)?;
            // strobed right away, on top of the batched one
            self.reset_pll()?;
            self.bus.write_register(
                ClockOutput::Clk2.register(),
                clock_control(self.drive[2], PLL::B),
            )?;
            self.state[2] = wanted;
            *need_reset_pll = true;
        }

        Ok(())
    }
}

impl<I2C, E> Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    pub fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error> {
        Ok(DeviceStatusBits::from_bits_truncate(
            self.bus.read_register(Register::DeviceStatus)?,
        ))
    }
}

impl<I2C, E> Si5351 for Si5351Device<I2C>
where
    I2C: Write<Error = E>,
{
    /// Stores drive strengths and powers every output down. Requested
    /// frequencies are forgotten so the next [`set_freq`](Si5351::set_freq)
    /// programs from scratch.
    fn setup(
        &mut self,
        drive0: DriveStrength,
        drive1: DriveStrength,
        drive2: DriveStrength,
    ) -> Result<(), Error> {
        self.drive = [drive0, drive1, drive2];
        self.freq = [0; 3];
        for &clk in [ClockOutput::Clk0, ClockOutput::Clk1, ClockOutput::Clk2].iter() {
            self.disable_output(clk)?;
        }
        Ok(())
    }

    fn set_crystal_load(&mut self, xtal_load: CrystalLoad) -> Result<(), Error> {
        self.bus
            .write_register(Register::CrystalLoad, xtal_load.bits())
    }

    /// `freq` is in tenths of a hertz (25 MHz is `250_000_000`). Every output
    /// is recomputed; the PLL reset strobe is only sent when `reset_pll`.
    /// After a bus error, call it again to reprogram everything.
    fn set_xtal_freq(&mut self, freq: u32, reset_pll: bool) -> Result<(), Error> {
        if freq == 0 {
            return Err(Error::InvalidParameter);
        }
        self.xtal_freq = freq;

        let result = self.recompute_all(reset_pll);
        if result.is_err() {
            self.state = [OutputState::Unknown; 3];
        }

        result
    }

    /// Retunes only the outputs whose frequency changed; zero turns an
    /// output off.
    ///
    /// On a bus error the new requests are dropped, so repeating the call
    /// programs them again.
    fn set_freq(&mut self, f0: u32, f1: u32, f2: u32) -> Result<(), Error> {
        let previous = self.freq;
        let result = self.retune(f0, f1, f2);
        if result.is_err() {
            self.forget_partial_update(previous);
        }
        result
    }

    /// Powers `clk` down and forgets its divider. The requested frequency
    /// is kept.
    fn disable_output(&mut self, clk: ClockOutput) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!("si5351: {} off", clk);
        self.bus.disable_output(clk)?;
        self.state[clk.ix()] = OutputState::Disabled;
        Ok(())
    }

    fn frequency(&self, clk: ClockOutput) -> u32 {
        self.freq[clk.ix()]
    }

    fn output_state(&self, clk: ClockOutput) -> OutputState {
        self.state[clk.ix()]
    }

    fn pll_b_frequency(&self) -> u64 {
        self.pll_b_freq
    }
}
