#![cfg_attr(not(test), no_std)]
//! Polled SPI master driver for the ATmega328P that moves data in 24-bit words.
//!
//! ```ignore
//! use spi24::{atmega328p, Config, SpiWordDriver};
//!
//! let bus = unsafe { atmega328p::bus() };
//! let mut dac = SpiWordDriver::new(&bus, 9);
//! dac.configure(Config::default());
//!
//! dac.begin_transaction();
//! let reply = dac.transfer_word24(0x12_3456);
//! dac.end_transaction();
//! ```
//!
//! The engine configuration lives in hardware and is shared by every driver on a
//! [`SpiBus24`]; the last [`SpiWordDriver::configure`] call wins.

// This must go FIRST so that all the other modules see its macros.
mod fmt;

pub mod atmega328p;
pub mod gpio;
pub mod regs;
pub mod spi;

#[cfg(test)]
mod mock;

pub use spi::{
    mode_from_bits, ClockDivider, Config, Error, Mode, SpiBus24, SpiWordDriver, MODE_0, MODE_1, MODE_2, MODE_3,
    WORD24_MASK,
};
