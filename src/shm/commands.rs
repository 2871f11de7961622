/**
 * Button and mode operations injected into a car's control block.
 *
 * This is the library side of the `internal` tool: parse one operation
 * word, then apply it to an attached block under the lock. Every
 * precondition failure leaves the block untouched and surfaces as an
 * error whose text is the operator-facing diagnostic.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use thiserror::Error;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::floor::Floor;
use crate::shared::{Direction, DoorStatus};
use crate::shm::ControlBlock;

/***************************************/
/*               Errors                */
/***************************************/
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("Operation only allowed in service mode.")]
    NotInServiceMode,
    #[error("Operation not allowed while elevator is moving.")]
    Moving,
    #[error("Operation not allowed while doors are open.")]
    DoorsOpen,
    #[error("Cannot move {direction} from floor {floor}.")]
    AtLimit { direction: Direction, floor: Floor },
    #[error("Unable to read the current floor.")]
    BadFloor,
}

/***************************************/
/*       Public data structures        */
/***************************************/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Close,
    Stop,
    ServiceOn,
    ServiceOff,
    Step(Direction),
}

impl Operation {
    pub fn parse(text: &str) -> Option<Operation> {
        match text {
            "open" => Some(Operation::Open),
            "close" => Some(Operation::Close),
            "stop" => Some(Operation::Stop),
            "service_on" => Some(Operation::ServiceOn),
            "service_off" => Some(Operation::ServiceOff),
            "up" => Some(Operation::Step(Direction::Up)),
            "down" => Some(Operation::Step(Direction::Down)),
            _ => None,
        }
    }

    /// Applies the operation under the block's lock. The guard broadcasts
    /// on drop, so every successful mutation wakes the car's loops.
    pub fn apply(self, block: &ControlBlock) -> Result<(), OperationError> {
        let mut guard = block.lock();
        match self {
            Operation::Open => guard.set_open_button(true),
            Operation::Close => guard.set_close_button(true),
            Operation::Stop => guard.set_emergency_stop(true),
            Operation::ServiceOn => {
                guard.set_individual_service_mode(true);
                guard.set_emergency_mode(false);
                guard.set_emergency_stop(false);
            }
            Operation::ServiceOff => guard.set_individual_service_mode(false),
            Operation::Step(direction) => {
                if !guard.individual_service_mode() {
                    return Err(OperationError::NotInServiceMode);
                }
                match guard.status() {
                    Some(DoorStatus::Between) => return Err(OperationError::Moving),
                    Some(DoorStatus::Closed) => {}
                    _ => return Err(OperationError::DoorsOpen),
                }
                let current = guard.current_floor().ok_or(OperationError::BadFloor)?;
                let next = current.step(direction).map_err(|_| OperationError::AtLimit {
                    direction,
                    floor: current,
                })?;
                guard.set_destination_floor(next);
            }
        }
        Ok(())
    }
}
