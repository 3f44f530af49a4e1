//! SPI engine register surface
//!
//! The engine is driven through three 8-bit locations: control (SPCR), status (SPSR) and
//! data (SPDR). The driver only talks to them through the traits below, so the same
//! configuration and transfer logic runs against the real memory-mapped registers
//! ([`crate::atmega328p::Spi`]) or an in-memory fake.

/// SPCR, SPI control register.
///
/// Configuration always writes the whole word, so the driver never reads it back.
pub trait ControlRegister {
    fn write_control(&mut self, value: Spcr);
}

/// SPSR, SPI status register.
pub trait StatusRegister {
    fn read_status(&self) -> Spsr;
    fn write_status(&mut self, value: Spsr);

    #[inline]
    fn modify_status(&mut self, f: impl FnOnce(&mut Spsr)) {
        let mut sr = self.read_status();
        f(&mut sr);
        self.write_status(sr);
    }
}

/// SPDR, SPI data register.
///
/// Writing starts a byte shift. Reading returns the byte shifted in during the last exchange,
/// and on real hardware also clears SPIF when it follows a status read, hence `&mut self`.
pub trait DataRegister {
    fn read_data(&mut self) -> u8;
    fn write_data(&mut self, value: u8);
}

/// Full register surface of one SPI engine.
pub trait Registers: ControlRegister + StatusRegister + DataRegister {}

impl<T: ControlRegister + StatusRegister + DataRegister> Registers for T {}

macro_rules! bit_field {
    ($get:ident, $set:ident, $bit:expr) => {
        #[inline(always)]
        pub const fn $get(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }
        #[inline(always)]
        pub fn $set(&mut self, val: bool) {
            self.0 = (self.0 & !(1 << $bit)) | ((val as u8) << $bit);
        }
    };
}

/// SPI control register value.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Spcr(pub u8);

impl Spcr {
    pub const SPIE: u8 = 7;
    pub const SPE: u8 = 6;
    pub const DORD: u8 = 5;
    pub const MSTR: u8 = 4;
    pub const CPOL: u8 = 3;
    pub const CPHA: u8 = 2;
    pub const SPR1: u8 = 1;
    pub const SPR0: u8 = 0;

    bit_field!(spie, set_spie, Self::SPIE);
    bit_field!(spe, set_spe, Self::SPE);
    bit_field!(dord, set_dord, Self::DORD);
    bit_field!(mstr, set_mstr, Self::MSTR);
    bit_field!(cpol, set_cpol, Self::CPOL);
    bit_field!(cpha, set_cpha, Self::CPHA);

    /// Clock rate select, SPR1:SPR0.
    #[inline(always)]
    pub const fn spr(&self) -> u8 {
        self.0 & 0x03
    }
    #[inline(always)]
    pub fn set_spr(&mut self, val: u8) {
        self.0 = (self.0 & !0x03) | (val & 0x03);
    }
}

impl core::fmt::Debug for Spcr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Spcr")
            .field("spie", &self.spie())
            .field("spe", &self.spe())
            .field("dord", &self.dord())
            .field("mstr", &self.mstr())
            .field("cpol", &self.cpol())
            .field("cpha", &self.cpha())
            .field("spr", &self.spr())
            .finish()
    }
}

/// SPI status register value.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Spsr(pub u8);

impl Spsr {
    pub const SPIF: u8 = 7;
    pub const WCOL: u8 = 6;
    pub const SPI2X: u8 = 0;

    bit_field!(spif, set_spif, Self::SPIF);
    bit_field!(wcol, set_wcol, Self::WCOL);
    bit_field!(spi2x, set_spi2x, Self::SPI2X);
}

impl core::fmt::Debug for Spsr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Spsr")
            .field("spif", &self.spif())
            .field("wcol", &self.wcol())
            .field("spi2x", &self.spi2x())
            .finish()
    }
}
