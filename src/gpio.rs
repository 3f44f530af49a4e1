//! GPIO
//!
//! The driver does not own a GPIO implementation. It drives the chip-select line and the
//! engine's own pins through [`LineControl`], which the platform provides.

/// Arduino digital pin of the engine's hardware slave-select (PB2).
///
/// Must be an output while the engine runs as master, whatever line is used as chip-select.
pub const SS: u8 = 10;
/// Arduino digital pin of MOSI (PB3).
pub const MOSI: u8 = 11;
/// Arduino digital pin of MISO (PB4).
pub const MISO: u8 = 12;
/// Arduino digital pin of SCK (PB5).
pub const SCK: u8 = 13;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(val: bool) -> Self {
        match val {
            true => Self::High,
            false => Self::Low,
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        match level {
            Level::Low => false,
            Level::High => true,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

/// Digital line control, addressed by line id.
pub trait LineControl {
    fn set_line_direction(&mut self, line: u8, direction: Direction);
    fn set_line_level(&mut self, line: u8, level: Level);
}

impl<T: LineControl + ?Sized> LineControl for &mut T {
    #[inline]
    fn set_line_direction(&mut self, line: u8, direction: Direction) {
        (**self).set_line_direction(line, direction)
    }

    #[inline]
    fn set_line_level(&mut self, line: u8, level: Level) {
        (**self).set_line_level(line, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bool_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(bool::from(Level::High));
        assert!(!bool::from(Level::Low));
    }

    #[derive(Default)]
    struct LastCall(Option<(u8, Direction, Level)>);

    impl LineControl for LastCall {
        fn set_line_direction(&mut self, line: u8, direction: Direction) {
            self.0 = Some((line, direction, Level::Low));
        }

        fn set_line_level(&mut self, line: u8, level: Level) {
            self.0 = Some((line, Direction::Output, level));
        }
    }

    #[test]
    fn borrowed_line_control_forwards() {
        fn drive<L: LineControl>(mut lines: L, line: u8) {
            lines.set_line_direction(line, Direction::Output);
            lines.set_line_level(line, Level::High);
        }

        let mut owner = LastCall::default();
        drive(&mut owner, SS);
        assert_eq!(owner.0, Some((SS, Direction::Output, Level::High)));
    }
}
