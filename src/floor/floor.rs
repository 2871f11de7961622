/**
 * Floor label codec.
 *
 * Floors are identified by textual labels: `B99` down in the basement up to
 * `999` at the top, with no floor `0`. Internally a floor is a signed
 * integer where basements are negative (`B1` is -1), so range checks and
 * ordering are plain integer comparisons. Stepping between floors skips the
 * forbidden zero: one floor up from `B1` is `1`.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use std::fmt;
use thiserror::Error;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::shared::Direction;

/***************************************/
/*             Constants               */
/***************************************/
const LOWEST_BASEMENT: i16 = -99;
const HIGHEST_FLOOR: i16 = 999;

/***************************************/
/*               Errors                */
/***************************************/
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FloorError {
    #[error("empty floor label")]
    Empty,
    #[error("invalid floor label {0:?}")]
    Invalid(String),
    #[error("floor out of range")]
    OutOfRange,
}

/***************************************/
/*             Public API              */
/***************************************/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Floor(i16);

impl Floor {
    /// Parses a floor label. Accepts `B1`..`B99` and `1`..`999`; rejects
    /// everything else, including `0`, leading zeros and trailing garbage.
    pub fn parse(label: &str) -> Result<Floor, FloorError> {
        if label.is_empty() {
            return Err(FloorError::Empty);
        }

        if let Some(digits) = label.strip_prefix('B') {
            let number = parse_digits(digits).ok_or_else(|| FloorError::Invalid(label.to_string()))?;
            if number < 1 || number > -LOWEST_BASEMENT {
                return Err(FloorError::OutOfRange);
            }
            Ok(Floor(-number))
        } else {
            let number = parse_digits(label).ok_or_else(|| FloorError::Invalid(label.to_string()))?;
            if number < 1 || number > HIGHEST_FLOOR {
                return Err(FloorError::OutOfRange);
            }
            Ok(Floor(number))
        }
    }

    /// The adjacent floor in the given direction. Crossing ground level
    /// jumps the gap between `B1` and `1`; stepping past `B99` or `999`
    /// is an error rather than a wrap.
    pub fn step(self, direction: Direction) -> Result<Floor, FloorError> {
        let next = match direction {
            Direction::Up if self.0 == -1 => 1,
            Direction::Up => self.0 + 1,
            Direction::Down if self.0 == 1 => -1,
            Direction::Down => self.0 - 1,
        };
        if next < LOWEST_BASEMENT || next > HIGHEST_FLOOR {
            return Err(FloorError::OutOfRange);
        }
        Ok(Floor(next))
    }

    /// Direction of travel from this floor toward `destination`, or `None`
    /// when already there.
    pub fn toward(self, destination: Floor) -> Option<Direction> {
        if destination > self {
            Some(Direction::Up)
        } else if destination < self {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "B{}", -self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/***************************************/
/*           Local functions           */
/***************************************/

// Strict decimal parse: digits only, no sign, no leading zero.
fn parse_digits(text: &str) -> Option<i16> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}
