/***************************************/
/*       Public data structures        */
/***************************************/
use std::fmt;

/// Phase of the door/motion cycle. The textual form is what the control
/// block stores and what travels in STATUS frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorStatus {
    Opening,
    Open,
    Closing,
    Closed,
    Between,
}

impl DoorStatus {
    pub fn as_str(&self) -> &'static str {
        match *self {
            DoorStatus::Opening => "Opening",
            DoorStatus::Open => "Open",
            DoorStatus::Closing => "Closing",
            DoorStatus::Closed => "Closed",
            DoorStatus::Between => "Between",
        }
    }

    pub fn parse(text: &str) -> Option<DoorStatus> {
        match text {
            "Opening" => Some(DoorStatus::Opening),
            "Open" => Some(DoorStatus::Open),
            "Closing" => Some(DoorStatus::Closing),
            "Closed" => Some(DoorStatus::Closed),
            "Between" => Some(DoorStatus::Between),
            _ => None,
        }
    }
}

impl fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of travel for single-floor steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn parse(text: &str) -> Option<Direction> {
        match text {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
