//! SPI, Serial Peripheral Interface, in 24-bit words

/*
Master mode only, full-duplex, MSB first
One byte shift per data register write, completion signalled by SPIF
Four base clock rates (SPR1:0), halved by SPI2X for four more
Clock polarity and phase set by CPOL/CPHA
No error detection beyond the write collision flag, which the driver ignores
A 24-bit word is three byte exchanges, most significant byte first
*/

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex;
pub use embedded_hal::spi::{Mode, Phase, Polarity, MODE_0, MODE_1, MODE_2, MODE_3};

use crate::gpio::{self, Direction, Level, LineControl};
use crate::regs::{Registers, Spcr};

/// Mask of the significant bits of a 24-bit word.
pub const WORD24_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// SPIF was not observed within the poll budget of a bounded transfer.
    Timeout,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => f.write_str("SPI byte exchange did not complete"),
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        match *self {
            Self::Timeout => embedded_hal::spi::ErrorKind::Other,
        }
    }
}

/// SCK rate, as a divisor of the CPU clock.
///
/// The discriminant is the raw 3-bit divider value: bit 2 selects SPI2X, bits 1:0 go to SPR1:0.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivider {
    Div4 = 0,
    Div16 = 1,
    Div64 = 2,
    Div128 = 3,
    Div2 = 4,
    Div8 = 5,
    Div32 = 6,
    /// SPR 11 with SPI2X set, which lands on the same rate as [`ClockDivider::Div64`].
    Div64X2 = 7,
}

impl ClockDivider {
    /// Decode a raw divider value. Bits above bit 2 are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Div4,
            1 => Self::Div16,
            2 => Self::Div64,
            3 => Self::Div128,
            4 => Self::Div2,
            5 => Self::Div8,
            6 => Self::Div32,
            _ => Self::Div64X2,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// SPR1:SPR0 field.
    #[inline]
    pub const fn spr(self) -> u8 {
        self.bits() & 0x03
    }

    /// SPI2X modifier.
    #[inline]
    pub const fn double_speed(self) -> bool {
        self.bits() & 0x04 != 0
    }

    /// Effective divisor of the CPU clock.
    pub const fn ratio(self) -> u32 {
        let base = match self.spr() {
            0 => 4,
            1 => 16,
            2 => 64,
            _ => 128,
        };
        if self.double_speed() {
            base / 2
        } else {
            base
        }
    }
}

/// Decode a standard SPI mode number: bit 1 is CPOL, bit 0 is CPHA. Higher bits are ignored,
/// so SPCR-positioned values (`0x04`, `0x08`, `0x0C`) decode as mode 0.
pub const fn mode_from_bits(bits: u8) -> Mode {
    match bits & 0x03 {
        0 => MODE_0,
        1 => MODE_1,
        2 => MODE_2,
        _ => MODE_3,
    }
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub mode: Mode,
    pub clock: ClockDivider,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: MODE_0,
            clock: ClockDivider::Div16,
        }
    }
}

impl Config {
    pub const fn new(mode: Mode, clock: ClockDivider) -> Self {
        Self { mode, clock }
    }

    /// Build a config from a raw mode number (0..=3) and a raw divider value (0..=7).
    pub const fn from_raw(mode: u8, clock_divider: u8) -> Self {
        Self::new(mode_from_bits(mode), ClockDivider::from_bits(clock_divider))
    }

    // CPHA
    fn raw_phase(&self) -> bool {
        match self.mode.phase {
            Phase::CaptureOnSecondTransition => true,
            Phase::CaptureOnFirstTransition => false,
        }
    }

    // CPOL
    fn raw_polarity(&self) -> bool {
        match self.mode.polarity {
            Polarity::IdleLow => false,
            Polarity::IdleHigh => true,
        }
    }

    /// SPCR value for this config: enabled, master, MSB first, no interrupt.
    pub fn control_word(&self) -> Spcr {
        let mut w = Spcr::default();
        w.set_spe(true);
        w.set_mstr(true);
        w.set_cpol(self.raw_polarity());
        w.set_cpha(self.raw_phase());
        w.set_spr(self.clock.spr());
        w
    }

    /// SCK frequency produced for a given CPU clock.
    pub const fn sck_frequency(&self, f_cpu: u32) -> u32 {
        f_cpu / self.clock.ratio()
    }
}

#[inline]
fn word24_to_bytes(value: u32) -> [u8; 3] {
    let [_, hi, mid, lo] = value.to_be_bytes();
    [hi, mid, lo]
}

#[inline]
fn word24_from_bytes([hi, mid, lo]: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, hi, mid, lo])
}

struct BusState<R, G> {
    regs: R,
    lines: G,
    active: Option<Config>,
    /// A bounded exchange timed out while its byte was still shifting.
    abandoned: bool,
}

impl<R: Registers, G: LineControl> BusState<R, G> {
    fn configure(&mut self, config: Config) {
        // SS is the engine's own slave-select. Left as an input it can be pulled low and kick the
        // engine out of master mode, so it is always an output here.
        self.lines.set_line_direction(gpio::SS, Direction::Output);
        self.lines.set_line_direction(gpio::MOSI, Direction::Output);
        self.lines.set_line_direction(gpio::SCK, Direction::Output);

        let cr = config.control_word();
        self.regs.write_control(cr);
        self.regs.modify_status(|w| w.set_spi2x(config.clock.double_speed()));

        if self.active.is_some_and(|prev| prev != config) {
            debug!("spi24: engine reconfigured, previous mode replaced");
        }
        self.active = Some(config);
        debug!(
            "spi24: SPCR={:#x} SPI2X={}",
            cr.0,
            config.clock.double_speed()
        );
    }

    #[inline]
    fn start_byte(&mut self, byte: u8) {
        self.regs.write_data(byte);
    }

    #[inline]
    fn poll_byte(&mut self) -> nb::Result<u8, Infallible> {
        if self.regs.read_status().spif() {
            Ok(self.regs.read_data())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    // A byte left shifting by a timed-out exchange still sets SPIF, and a data write before
    // that makes the engine drop the new byte (WCOL). Wait it out and consume its SPIF first.
    fn drain_abandoned(&mut self) {
        if self.abandoned {
            let _ = nb::block!(self.poll_byte());
            self.abandoned = false;
            trace!("spi24: abandoned byte drained");
        }
    }

    fn try_drain_abandoned(&mut self, max_polls: u32) -> Result<(), Error> {
        if !self.abandoned {
            return Ok(());
        }
        for _ in 0..max_polls {
            if self.poll_byte().is_ok() {
                self.abandoned = false;
                trace!("spi24: abandoned byte drained");
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Blocking byte exchange. Spins on SPIF with no upper bound.
    fn transfer_byte(&mut self, byte: u8) -> u8 {
        self.drain_abandoned();
        self.start_byte(byte);
        match nb::block!(self.poll_byte()) {
            Ok(rx) => rx,
            Err(never) => match never {},
        }
    }

    fn try_transfer_byte(&mut self, byte: u8, max_polls: u32) -> Result<u8, Error> {
        self.try_drain_abandoned(max_polls)?;
        self.start_byte(byte);
        for _ in 0..max_polls {
            if let Ok(rx) = self.poll_byte() {
                return Ok(rx);
            }
        }
        trace!("spi24: no SPIF after {} polls, tx={:#x}", max_polls, byte);
        self.abandoned = true;
        Err(Error::Timeout)
    }

    fn transfer_word24(&mut self, value: u32) -> u32 {
        let rx = word24_to_bytes(value).map(|b| self.transfer_byte(b));
        word24_from_bytes(rx)
    }

    fn try_transfer_word24(&mut self, value: u32, max_polls: u32) -> Result<u32, Error> {
        let mut rx = [0u8; 3];
        for (slot, b) in rx.iter_mut().zip(word24_to_bytes(value)) {
            *slot = self.try_transfer_byte(b, max_polls)?;
        }
        Ok(word24_from_bytes(rx))
    }
}

/// Shared handle to the SPI engine.
///
/// The engine configuration is global: whichever driver configures last defines the mode and
/// clock for every driver on this bus. [`SpiBus24::active_config`] reports the config currently
/// written to the engine.
pub struct SpiBus24<R, G> {
    state: Mutex<RefCell<BusState<R, G>>>,
}

impl<R, G> SpiBus24<R, G> {
    /// Wrap a register surface and the platform's line control. Does not touch the hardware.
    pub const fn new(regs: R, lines: G) -> Self {
        Self {
            state: Mutex::new(RefCell::new(BusState {
                regs,
                lines,
                active: None,
                abandoned: false,
            })),
        }
    }

    /// Last configuration written to the engine, if any.
    pub fn active_config(&self) -> Option<Config> {
        critical_section::with(|cs| self.state.borrow_ref(cs).active)
    }

    /// Give back the register surface and line control.
    pub fn release(self) -> (R, G) {
        let state = self.state.into_inner().into_inner();
        (state.regs, state.lines)
    }

    fn lock<T>(&self, f: impl FnOnce(&mut BusState<R, G>) -> T) -> T {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            f(&mut *state)
        })
    }
}

impl<R: Registers, G: LineControl> SpiBus24<R, G> {
    /// Configure the engine pins and registers. Chip-select lines are left alone.
    pub fn configure(&self, config: Config) {
        self.lock(|s| s.configure(config))
    }
}

/// 24-bit word driver for one peripheral, addressed by its chip-select line.
pub struct SpiWordDriver<'b, R, G> {
    bus: &'b SpiBus24<R, G>,
    chip_select: u8,
}

impl<'b, R, G> SpiWordDriver<'b, R, G> {
    /// Create a driver. Does not touch the hardware.
    pub const fn new(bus: &'b SpiBus24<R, G>, chip_select: u8) -> Self {
        Self { bus, chip_select }
    }
}

impl<'b, R: Registers, G: LineControl> SpiWordDriver<'b, R, G> {
    /// Set up the chip-select line (output, deasserted) and configure the shared engine.
    ///
    /// Reconfiguring with different settings changes the mode for every driver on the bus.
    pub fn configure(&mut self, config: Config) {
        let cs_line = self.chip_select;
        self.bus.lock(|s| {
            s.lines.set_line_level(cs_line, Level::High);
            s.lines.set_line_direction(cs_line, Direction::Output);
            s.configure(config);
        })
    }

    /// [`SpiWordDriver::configure`] from a raw mode number and raw divider value.
    ///
    /// `mode` is the standard mode number 0..=3 (bit 1 CPOL, bit 0 CPHA), not a value already
    /// shifted into SPCR position: 0x04, 0x08 and 0x0C all decode as mode 0. Only the low two
    /// bits of `mode` and the low three bits of `clock_divider` are used.
    pub fn configure_raw(&mut self, mode: u8, clock_divider: u8) {
        self.configure(Config::from_raw(mode, clock_divider))
    }

    /// Assert chip-select (drive it low).
    pub fn begin_transaction(&mut self) {
        self.set_chip_select(Level::Low)
    }

    /// Deassert chip-select (drive it high).
    pub fn end_transaction(&mut self) {
        self.set_chip_select(Level::High)
    }

    fn set_chip_select(&mut self, level: Level) {
        let cs_line = self.chip_select;
        self.bus.lock(|s| s.lines.set_line_level(cs_line, level))
    }

    /// Run `f` with chip-select asserted, deasserting it afterwards.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.begin_transaction();
        let out = f(self);
        self.end_transaction();
        out
    }

    /// Send the low 24 bits of `value`, MSB first, discarding what comes back.
    ///
    /// Chip-select is not touched. Blocks until all three bytes have shifted out.
    pub fn transmit_word24(&mut self, value: u32) {
        self.bus.lock(|s| {
            s.transfer_word24(value);
        })
    }

    /// Exchange the low 24 bits of `value`, MSB first, and return the 24 bits received.
    ///
    /// Chip-select is not touched. Blocks until all three bytes have shifted; a stuck engine
    /// blocks forever.
    pub fn transfer_word24(&mut self, value: u32) -> u32 {
        self.bus.lock(|s| s.transfer_word24(value))
    }

    /// [`SpiWordDriver::transmit_word24`] with at most `max_polls` SPIF polls per byte.
    pub fn try_transmit_word24(&mut self, value: u32, max_polls: u32) -> Result<(), Error> {
        self.try_transfer_word24(value, max_polls).map(|_| ())
    }

    /// [`SpiWordDriver::transfer_word24`] with at most `max_polls` SPIF polls per byte.
    ///
    /// On timeout no further bytes of the word are sent. The byte still shifting is drained at
    /// the start of the next exchange on this bus, so later transfers stay in step; a bounded
    /// exchange that cannot drain it within `max_polls` times out again without sending.
    pub fn try_transfer_word24(&mut self, value: u32, max_polls: u32) -> Result<u32, Error> {
        self.bus.lock(|s| s.try_transfer_word24(value, max_polls))
    }
}
