//! In-memory stand-ins for the engine registers and the platform's line control.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use crate::gpio::{Direction, Level, LineControl};
use crate::regs::{ControlRegister, DataRegister, Spcr, Spsr, StatusRegister};

struct EngineState {
    control: Spcr,
    status: Spsr,
    control_writes: Vec<Spcr>,
    sent: Vec<u8>,
    shift_in: u8,
    respond: fn(u8) -> u8,
    completion_delay: usize,
    countdown: usize,
    stall_after: Option<usize>,
    status_reads: usize,
}

/// Fake SPI engine. Each data write completes after `completion_delay` status polls, with the
/// peripheral answering through `respond`. A data write while a byte is still shifting is
/// dropped and sets WCOL, as on the ATmega328P. Clones share state.
#[derive(Clone)]
pub struct FakeEngine(Rc<RefCell<EngineState>>);

impl FakeEngine {
    pub fn responding(respond: fn(u8) -> u8) -> Self {
        Self(Rc::new(RefCell::new(EngineState {
            control: Spcr::default(),
            status: Spsr::default(),
            control_writes: Vec::new(),
            sent: Vec::new(),
            shift_in: 0,
            respond,
            completion_delay: 0,
            countdown: 0,
            stall_after: None,
            status_reads: 0,
        })))
    }

    pub fn echo() -> Self {
        Self::responding(|b| b)
    }

    /// Report SPIF only after `polls` unsuccessful status reads per byte.
    pub fn delay_completion(&self, polls: usize) {
        self.0.borrow_mut().completion_delay = polls;
    }

    /// Complete the first `bytes` exchanges, then never set SPIF again.
    pub fn stall_after(&self, bytes: usize) {
        self.0.borrow_mut().stall_after = Some(bytes);
    }

    pub fn sent(&self) -> Vec<u8> {
        self.0.borrow().sent.clone()
    }

    pub fn control(&self) -> Spcr {
        self.0.borrow().control
    }

    pub fn control_writes(&self) -> Vec<Spcr> {
        self.0.borrow().control_writes.clone()
    }

    pub fn status(&self) -> Spsr {
        self.0.borrow().status
    }

    pub fn status_reads(&self) -> usize {
        self.0.borrow().status_reads
    }
}

impl ControlRegister for FakeEngine {
    fn write_control(&mut self, value: Spcr) {
        let mut st = self.0.borrow_mut();
        st.control = value;
        st.control_writes.push(value);
    }
}

impl StatusRegister for FakeEngine {
    fn read_status(&self) -> Spsr {
        let mut st = self.0.borrow_mut();
        st.status_reads += 1;
        if st.countdown > 0 {
            st.countdown -= 1;
            let mut sr = st.status;
            sr.set_spif(false);
            return sr;
        }
        st.status
    }

    // Only SPI2X is writable.
    fn write_status(&mut self, value: Spsr) {
        self.0.borrow_mut().status.set_spi2x(value.spi2x());
    }
}

impl DataRegister for FakeEngine {
    fn read_data(&mut self) -> u8 {
        let mut st = self.0.borrow_mut();
        st.status.set_spif(false);
        st.shift_in
    }

    fn write_data(&mut self, value: u8) {
        let mut st = self.0.borrow_mut();
        if st.countdown > 0 {
            st.status.set_wcol(true);
            return;
        }
        st.sent.push(value);
        if st.stall_after.is_some_and(|n| st.sent.len() > n) {
            st.status.set_spif(false);
            return;
        }
        st.shift_in = (st.respond)(value);
        st.countdown = st.completion_delay;
        st.status.set_spif(true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Direction(u8, Direction),
    Level(u8, Level),
}

impl LineEvent {
    pub fn line(&self) -> u8 {
        match *self {
            Self::Direction(line, _) | Self::Level(line, _) => line,
        }
    }
}

/// Fake line control that records every call. Clones share the log.
#[derive(Clone, Default)]
pub struct FakeLines(Rc<RefCell<Vec<LineEvent>>>);

impl FakeLines {
    pub fn events(&self) -> Vec<LineEvent> {
        self.0.borrow().clone()
    }

    /// Every level written to `line`, oldest first.
    pub fn levels(&self, line: u8) -> Vec<Level> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match *e {
                LineEvent::Level(l, level) if l == line => Some(level),
                _ => None,
            })
            .collect()
    }

    pub fn level(&self, line: u8) -> Option<Level> {
        self.levels(line).last().copied()
    }

    pub fn direction(&self, line: u8) -> Option<Direction> {
        self.0.borrow().iter().rev().find_map(|e| match *e {
            LineEvent::Direction(l, dir) if l == line => Some(dir),
            _ => None,
        })
    }
}

impl LineControl for FakeLines {
    fn set_line_direction(&mut self, line: u8, direction: Direction) {
        self.0.borrow_mut().push(LineEvent::Direction(line, direction));
    }

    fn set_line_level(&mut self, line: u8, level: Level) {
        self.0.borrow_mut().push(LineEvent::Level(line, level));
    }
}
