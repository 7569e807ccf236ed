/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic Rust driver for the three-output [Si5351A], based on the
[`embedded-hal`] traits.

## The Device

The Silicon Labs [Si5351A] is an any-frequency CMOS clock generator. This
driver runs CLK0 from PLL A and CLK1/CLK2 from PLL B. PLLs are tuned
fractionally against the crystal while CLK0 and CLK1 use even integer
multisynth dividers; CLK2 gets a fractional multisynth off whatever PLL B is
doing for CLK1.

The device has an I²C interface.

## Usage

Instantiate the device on an I²C bus and power every output down:

```ignore
# extern crate si5351a;
use si5351a::{DriveStrength, Si5351, Si5351Device};

# fn main() -> Result<(), si5351a::Error> {
# let i2c: I2C = initialize_i2c();
let mut clock = Si5351Device::new(i2c, false);
clock.setup(DriveStrength::_8, DriveStrength::_8, DriveStrength::_2)?;
# Ok(())
# }
```

Tell it the crystal frequency, in tenths of a hertz:

```ignore
clock.set_xtal_freq(250_000_000, false)?;
```

And set all three outputs at once. Only outputs whose frequency changed are
touched, zero turns an output off:

```ignore
clock.set_freq(14_175_000, 7_030_000, 0)?;
```

A frequency that cannot be reached leaves its output off; check
[`Si5351::output_state`] to find out.

With the `defmt` feature every register update is logged at debug level.

[Si5351A]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
*/
#![deny(warnings)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use core::fmt;

mod codec;
mod registers;
mod synth;

pub use crate::codec::ParameterWords;
pub use crate::registers::{
    ClockOutput, CrystalLoad, DeviceStatusBits, DriveStrength, OutputDivider, ADDRESS, FRAC_DENOM,
    PLL,
};
pub use crate::synth::{
    find_int_divider, find_shared_divider, pll_coefficients, pll_frequency, OutputState, Si5351,
    Si5351Device, MAX_MS_DIVIDER, MAX_PLL_FREQ, MIN_MS_DIVIDER,
};

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    CommunicationError,
    InvalidParameter,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CommunicationError => write!(f, "Communication Error"),
            Error::InvalidParameter => write!(f, "Invalid Parameter"),
        }
    }
}
