/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Packing of `a + b/c` dividers into the P1/P2/P3 parameter words and the
//! register writes that carry them to the chip.

use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::registers::{clock_disabled, ClockOutput, OutputDivider, Register, PLL};
use crate::Error;

/// The three parameter words of a PLL or multisynth divider.
///
/// P1 holds the integer part scaled by 128 (offset by 512), P2 the scaled
/// fractional remainder and P3 the fractional denominator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParameterWords {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

impl ParameterWords {
    /// Encodes `a + b/c`. `c` must be at least 1.
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        let t = 128 * b / c;
        ParameterWords {
            p1: (128 * a).wrapping_add(t).wrapping_sub(512),
            p2: 128 * b - c * t,
            p3: c,
        }
    }

    /// Integer mode: P2 = 0, P3 = 1.
    pub fn integer(a: u32) -> Self {
        ParameterWords::new(a, 0, 1)
    }

    /// Byte image of the eight consecutive parameter registers.
    pub fn to_bytes(&self, r_div: OutputDivider) -> [u8; 8] {
        let (p1, p2, p3) = (self.p1, self.p2, self.p3);
        [
            ((p3 >> 8) & 0xFF) as u8,
            (p3 & 0xFF) as u8,
            ((p1 >> 16) & 0x03) as u8 | r_div.bits(),
            ((p1 >> 8) & 0xFF) as u8,
            (p1 & 0xFF) as u8,
            (((p3 >> 12) & 0xF0) | ((p2 >> 16) & 0x0F)) as u8,
            ((p2 >> 8) & 0xFF) as u8,
            (p2 & 0xFF) as u8,
        ]
    }

    /// Reverses [`to_bytes`](Self::to_bytes), dropping the R divider bits.
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        let p3 = ((bytes[5] as u32 & 0xF0) << 12) | ((bytes[0] as u32) << 8) | bytes[1] as u32;
        let p1 = ((bytes[2] as u32 & 0x03) << 16) | ((bytes[3] as u32) << 8) | bytes[4] as u32;
        let p2 = ((bytes[5] as u32 & 0x0F) << 16) | ((bytes[6] as u32) << 8) | bytes[7] as u32;
        ParameterWords { p1, p2, p3 }
    }

    /// Recovers `(a, b, c)`. Unique only for proper fractions (`b < c`).
    pub fn ratio(&self) -> (u32, u32, u32) {
        let scaled = self.p1 + 512;
        let t = scaled % 128;
        (scaled / 128, (self.p2 + self.p3 * t) / 128, self.p3)
    }
}

fn i2c_error<E>(_: E) -> Error {
    Error::CommunicationError
}

/// Thin framing layer over the I²C bus.
pub(crate) struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> RegisterBus<I2C>
where
    I2C: Write<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        RegisterBus { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    #[cfg(test)]
    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn write_register(&mut self, reg: Register, byte: u8) -> Result<(), Error> {
        self.write_addr(reg.addr(), byte)
    }

    fn write_addr(&mut self, addr: u8, byte: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[addr, byte])
            .map_err(i2c_error)
    }

    fn write_burst(&mut self, base: u8, params: [u8; 8]) -> Result<(), Error> {
        self.i2c
            .write(
                self.address,
                &[
                    base, params[0], params[1], params[2], params[3], params[4], params[5],
                    params[6], params[7],
                ],
            )
            .map_err(i2c_error)
    }

    /// Programs the feedback multisynth of `pll` with `a + b/c`, `a` in 15..=90.
    pub fn setup_pll(&mut self, pll: PLL, a: u32, b: u32, c: u32) -> Result<(), Error> {
        let params = ParameterWords::new(a, b, c).to_bytes(OutputDivider::Div1);
        self.write_burst(pll.base_addr(), params)
    }

    /// Programs an output multisynth with an even integer divider in 6..=900.
    pub fn setup_multisynth_int(
        &mut self,
        clk: ClockOutput,
        divider: u32,
        r_div: OutputDivider,
    ) -> Result<(), Error> {
        let params = ParameterWords::integer(divider).to_bytes(r_div);
        self.write_burst(clk.multisynth_addr(), params)
    }

    /// Programs an output multisynth with `a + b/c`, one register at a time.
    pub fn setup_multisynth(
        &mut self,
        clk: ClockOutput,
        a: u32,
        b: u32,
        c: u32,
        r_div: OutputDivider,
    ) -> Result<(), Error> {
        let base = clk.multisynth_addr();
        let params = ParameterWords::new(a, b, c).to_bytes(r_div);
        for (offset, &byte) in params.iter().enumerate() {
            self.write_addr(base + offset as u8, byte)?;
        }
        Ok(())
    }

    /// Powers the output down.
    pub fn disable_output(&mut self, clk: ClockOutput) -> Result<(), Error> {
        self.write_register(clk.register(), clock_disabled())
    }
}

impl<I2C, E> RegisterBus<I2C>
where
    I2C: WriteRead<Error = E>,
{
    pub fn read_register(&mut self, reg: Register) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg.addr()], &mut buffer)
            .map_err(i2c_error)?;
        Ok(buffer[0])
    }
}
