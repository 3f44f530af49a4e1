//! ATmega328P binding
//!
//! Maps the register surface onto SPCR/SPSR/SPDR and [`LineControl`] onto the DDRx/PORTx
//! registers, using Arduino digital pin numbers (D0..D13, A0..A5 as 14..19).
//!
//! Addresses are data-memory addresses (I/O address + 0x20).

use core::ptr;

use crate::gpio::{Direction, Level, LineControl};
use crate::regs::{ControlRegister, DataRegister, Spcr, Spsr, StatusRegister};
use crate::spi::SpiBus24;

const SPCR: *mut u8 = 0x4C as *mut u8;
const SPSR: *mut u8 = 0x4D as *mut u8;
const SPDR: *mut u8 = 0x4E as *mut u8;

/// The SPI engine registers.
pub struct Spi {
    _private: (),
}

impl Spi {
    /// # Safety
    ///
    /// Only one `Spi` may exist, and nothing else may touch the SPI registers.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl ControlRegister for Spi {
    #[inline]
    fn write_control(&mut self, value: Spcr) {
        unsafe { ptr::write_volatile(SPCR, value.0) }
    }
}

impl StatusRegister for Spi {
    #[inline]
    fn read_status(&self) -> Spsr {
        Spsr(unsafe { ptr::read_volatile(SPSR) })
    }

    #[inline]
    fn write_status(&mut self, value: Spsr) {
        unsafe { ptr::write_volatile(SPSR, value.0) }
    }
}

impl DataRegister for Spi {
    #[inline]
    fn read_data(&mut self) -> u8 {
        unsafe { ptr::read_volatile(SPDR) }
    }

    #[inline]
    fn write_data(&mut self, value: u8) {
        unsafe { ptr::write_volatile(SPDR, value) }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    B,
    C,
    D,
}

impl Port {
    const fn ddr(self) -> *mut u8 {
        match self {
            Self::B => 0x24 as *mut u8,
            Self::C => 0x27 as *mut u8,
            Self::D => 0x2A as *mut u8,
        }
    }

    const fn port(self) -> *mut u8 {
        match self {
            Self::B => 0x25 as *mut u8,
            Self::C => 0x28 as *mut u8,
            Self::D => 0x2B as *mut u8,
        }
    }
}

/// Port and bit of an Arduino digital pin number.
pub const fn port_bit(pin: u8) -> Option<(Port, u8)> {
    match pin {
        0..=7 => Some((Port::D, pin)),
        8..=13 => Some((Port::B, pin - 8)),
        14..=19 => Some((Port::C, pin - 14)),
        _ => None,
    }
}

/// Read-modify-write of one register bit. Interrupt handlers may share the port register.
unsafe fn modify_bit(reg: *mut u8, bit: u8, set: bool) {
    critical_section::with(|_| {
        let v = ptr::read_volatile(reg);
        let v = if set { v | (1 << bit) } else { v & !(1 << bit) };
        ptr::write_volatile(reg, v);
    })
}

/// Digital pins, addressed by Arduino pin number.
pub struct Pins {
    _private: (),
}

impl Pins {
    /// # Safety
    ///
    /// Only one `Pins` may exist. Other code writing DDRx/PORTx must do so inside a critical section.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl LineControl for Pins {
    fn set_line_direction(&mut self, line: u8, direction: Direction) {
        match port_bit(line) {
            Some((port, bit)) => unsafe { modify_bit(port.ddr(), bit, direction == Direction::Output) },
            None => trace!("atmega328p: ignoring direction of unknown pin {}", line),
        }
    }

    fn set_line_level(&mut self, line: u8, level: Level) {
        match port_bit(line) {
            Some((port, bit)) => unsafe { modify_bit(port.port(), bit, level.into()) },
            None => trace!("atmega328p: ignoring level of unknown pin {}", line),
        }
    }
}

/// Bus handle over the on-chip SPI engine and digital pins.
///
/// # Safety
///
/// Same as [`Spi::steal`] and [`Pins::steal`].
pub unsafe fn bus() -> SpiBus24<Spi, Pins> {
    SpiBus24::new(Spi::steal(), Pins::steal())
}
