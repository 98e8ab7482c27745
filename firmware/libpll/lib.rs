#![no_std]

#[macro_use]
extern crate log;

#[cfg(test)]
extern crate std;

use core::fmt;

pub mod rational;
pub mod axi_clkgen;
pub mod a10_fpll;
pub mod xcvr;
pub mod hmc7044;
pub mod adf4382;
pub mod ad9517;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NoSolution,
    OutOfRange { what: &'static str, value: u64, min: u64, max: u64 },
    InvalidDivider { what: &'static str, value: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::NoSolution =>
                write!(f, "no divider setting reaches the requested frequency"),
            &Error::OutOfRange { what, value, min, max } =>
                write!(f, "{} {} out of range [{}, {}]", what, value, min, max),
            &Error::InvalidDivider { what, value } =>
                write!(f, "invalid {} divider {}", what, value),
        }
    }
}

pub(crate) fn div_round_up(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

pub(crate) fn div_round_closest(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

pub(crate) fn abs_diff(a: u64, b: u64) -> u64 {
    if a > b { a - b } else { b - a }
}
