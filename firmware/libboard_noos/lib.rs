#![no_std]

extern crate byteorder;
#[macro_use]
extern crate log;
extern crate embedded_hal;
#[cfg(any(test, feature = "mock"))]
extern crate std;

pub mod regmap;
pub mod mmio;
pub mod clock;
pub mod logger;
pub mod config;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
