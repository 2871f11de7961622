/**
 * Typed forms of the wire vocabulary.
 *
 * Frames are space-separated ASCII tokens. `Message` renders and parses the
 * exact wire text; verbs this build does not know are preserved as
 * `Unknown` so a session can skip them, while a known verb with malformed
 * arguments is a hard parse error.
 *
 * # Frames
 * - `CAR <name> <low> <high>`:     car registers with the controller.
 * - `STATUS <status> <cur> <dst>`: periodic car heartbeat.
 * - `INDIVIDUAL SERVICE`:          car's last frame before a service-mode
 *                                  disconnect.
 * - `EMERGENCY`:                   car's last frame before an emergency
 *                                  disconnect.
 * - `FLOOR <label>`:               controller sets a car's destination.
 * - `CALL <src> <dst>`:            call client requests a pickup.
 * - `CAR <name>`:                  controller's dispatch answer.
 * - `UNAVAILABLE`:                 no car can serve the request.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use std::fmt;
use thiserror::Error;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::floor::{Floor, FloorError};
use crate::shared::DoorStatus;

/***************************************/
/*               Errors                */
/***************************************/
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed {verb} frame: {text:?}")]
    Malformed { verb: &'static str, text: String },
    #[error("bad floor label in frame: {0}")]
    Floor(#[from] FloorError),
}

/***************************************/
/*       Public data structures        */
/***************************************/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Session-opening registration, car to controller.
    Car {
        name: String,
        lowest: Floor,
        highest: Floor,
    },
    /// Periodic heartbeat, car to controller.
    Status {
        status: DoorStatus,
        current: Floor,
        destination: Floor,
    },
    /// Final frame before a voluntary disconnect.
    IndividualService,
    /// Final frame before an emergency disconnect.
    Emergency,
    /// Destination command, controller to car.
    Floor(Floor),
    /// Dispatch request, call client to controller.
    Call { source: Floor, destination: Floor },
    /// Dispatch answer naming the assigned car.
    Dispatched { name: String },
    /// Dispatch answer when no car qualifies.
    Unavailable,
    /// A verb this build does not recognise; kept verbatim so the session
    /// can ignore it.
    Unknown(String),
}

impl Message {
    pub fn parse(text: &str) -> Result<Message, MessageError> {
        let tokens: Vec<&str> = text.split(' ').collect();
        match (tokens[0], tokens.len()) {
            ("CAR", 2) => Ok(Message::Dispatched {
                name: tokens[1].to_string(),
            }),
            ("CAR", 4) => Ok(Message::Car {
                name: tokens[1].to_string(),
                lowest: Floor::parse(tokens[2])?,
                highest: Floor::parse(tokens[3])?,
            }),
            ("CAR", _) => Err(malformed("CAR", text)),
            ("STATUS", 4) => Ok(Message::Status {
                status: DoorStatus::parse(tokens[1]).ok_or_else(|| malformed("STATUS", text))?,
                current: Floor::parse(tokens[2])?,
                destination: Floor::parse(tokens[3])?,
            }),
            ("STATUS", _) => Err(malformed("STATUS", text)),
            ("INDIVIDUAL", 2) if tokens[1] == "SERVICE" => Ok(Message::IndividualService),
            ("EMERGENCY", 1) => Ok(Message::Emergency),
            ("FLOOR", 2) => Ok(Message::Floor(Floor::parse(tokens[1])?)),
            ("FLOOR", _) => Err(malformed("FLOOR", text)),
            ("CALL", 3) => Ok(Message::Call {
                source: Floor::parse(tokens[1])?,
                destination: Floor::parse(tokens[2])?,
            }),
            ("CALL", _) => Err(malformed("CALL", text)),
            ("UNAVAILABLE", 1) => Ok(Message::Unavailable),
            _ => Ok(Message::Unknown(text.to_string())),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Car {
                name,
                lowest,
                highest,
            } => write!(f, "CAR {} {} {}", name, lowest, highest),
            Message::Status {
                status,
                current,
                destination,
            } => write!(f, "STATUS {} {} {}", status, current, destination),
            Message::IndividualService => f.write_str("INDIVIDUAL SERVICE"),
            Message::Emergency => f.write_str("EMERGENCY"),
            Message::Floor(floor) => write!(f, "FLOOR {}", floor),
            Message::Call {
                source,
                destination,
            } => write!(f, "CALL {} {}", source, destination),
            Message::Dispatched { name } => write!(f, "CAR {}", name),
            Message::Unavailable => f.write_str("UNAVAILABLE"),
            Message::Unknown(text) => f.write_str(text),
        }
    }
}

/***************************************/
/*           Local functions           */
/***************************************/

fn malformed(verb: &'static str, text: &str) -> MessageError {
    MessageError::Malformed {
        verb,
        text: text.to_string(),
    }
}
