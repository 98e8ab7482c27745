#![no_std]

extern crate byteorder;
#[macro_use]
extern crate log;
extern crate embedded_hal;
extern crate pll;
extern crate board_noos;
#[cfg(test)]
extern crate std;

use core::convert::Infallible;
use core::fmt;

use board_noos::config;

pub mod axi_clkgen;
pub mod altera_a10_fpll;
pub mod xilinx_xcvr;
pub mod hmc7044;
pub mod adf4382;
pub mod ad9517;
pub mod adxl355;
pub mod i2c_eeprom;
pub mod clocking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E = Infallible> {
    Bus(E),
    InvalidId { what: &'static str, expected: u32, found: u32 },
    ReadWriteCheck { wrote: u8, read: u8 },
    Timeout(&'static str),
    NotLocked,
    InvalidArgument(&'static str),
    Pll(pll::Error),
    Config(config::Error<E>),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::Bus(ref err) =>
                write!(f, "bus error: {:?}", err),
            &Error::InvalidId { what, expected, found } =>
                write!(f, "invalid {} 0x{:x}, expected 0x{:x}", what, found, expected),
            &Error::ReadWriteCheck { wrote, read } =>
                write!(f, "read/write check failed: wrote 0x{:02x}, read 0x{:02x}", wrote, read),
            &Error::Timeout(what) =>
                write!(f, "timeout waiting for {}", what),
            &Error::NotLocked =>
                write!(f, "PLL not locked"),
            &Error::InvalidArgument(what) =>
                write!(f, "invalid argument: {}", what),
            &Error::Pll(ref err) =>
                write!(f, "{}", err),
            &Error::Config(ref err) =>
                write!(f, "config: {}", err),
        }
    }
}

impl<E> From<pll::Error> for Error<E> {
    fn from(err: pll::Error) -> Error<E> {
        Error::Pll(err)
    }
}

impl<E> From<config::Error<E>> for Error<E> {
    fn from(err: config::Error<E>) -> Error<E> {
        Error::Config(err)
    }
}

impl Error<Infallible> {
    /// Lifts an error from a memory-mapped driver into a bus driver's error type.
    pub fn widen<E>(self) -> Error<E> {
        match self {
            Error::Bus(never) => match never {},
            Error::InvalidId { what, expected, found } =>
                Error::InvalidId { what: what, expected: expected, found: found },
            Error::ReadWriteCheck { wrote, read } => Error::ReadWriteCheck { wrote: wrote, read: read },
            Error::Timeout(what) => Error::Timeout(what),
            Error::NotLocked => Error::NotLocked,
            Error::InvalidArgument(what) => Error::InvalidArgument(what),
            Error::Pll(err) => Error::Pll(err),
            Error::Config(err) => Error::Config(err.map_storage(|never| match never {})),
        }
    }
}

/// Memory-mapped drivers cannot see bus errors and use the default.
pub type Result<T, E = Infallible> = core::result::Result<T, Error<E>>;
