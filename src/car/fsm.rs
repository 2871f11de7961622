/**
 * Drives the car's door and motion logic.
 *
 * The `CarFsm` (Finite State Machine) owns the operation loop of a car
 * process. Each tick acquires the control block's lock, reads the door
 * phase and the button/mode flags, and advances the machine; the lock is
 * released across every paced sleep so external processes can mutate the
 * block while doors move and the car travels.
 *
 * # Fields
 * - `block`:            Handle to the car's process-shared control block.
 * - `lowest_floor`:     Bottom of the range this car serves.
 * - `highest_floor`:    Top of the range this car serves.
 * - `delay`:            Pace of every door phase, travel step and idle wait.
 * - `fsm_terminate_rx`: Receives a signal to terminate the operation loop.
 *
 * # Modes
 * Normal operation runs the full automatic cycle: travel one floor per
 * `delay`, open on arrival, dwell, close. Individual service mode turns
 * door automation off (buttons only) and restricts travel to the
 * single-floor trips the technician requests. Emergency mode halts all
 * motion; door buttons keep working so passengers can be released, and the
 * mode is only left through an explicit `service_on`.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use crossbeam_channel as cbc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::floor::Floor;
use crate::shared::{Direction, DoorStatus};
use crate::shm::{BlockGuard, ControlBlock};

/***************************************/
/*             Public API              */
/***************************************/
pub struct CarFsm {
    block: Arc<ControlBlock>,
    lowest_floor: Floor,
    highest_floor: Floor,
    delay: Duration,
    fsm_terminate_rx: cbc::Receiver<()>,
}

impl CarFsm {
    pub fn new(
        block: Arc<ControlBlock>,
        lowest_floor: Floor,
        highest_floor: Floor,
        delay: Duration,
        fsm_terminate_rx: cbc::Receiver<()>,
    ) -> CarFsm {
        CarFsm {
            block,
            lowest_floor,
            highest_floor,
            delay,
            fsm_terminate_rx,
        }
    }

    pub fn run(self) {
        info!("operation loop running");
        loop {
            if self.should_stop() || self.tick() {
                break;
            }
        }
        info!("operation loop stopped");
    }

    // One decision of the machine. Returns true when the loop must stop.
    fn tick(&self) -> bool {
        let mut guard = self.block.lock();

        // The stop button latches emergency mode and abandons any trip.
        if guard.emergency_stop() && !guard.emergency_mode() {
            guard.set_emergency_mode(true);
            if let Some(current) = guard.current_floor() {
                guard.set_destination_floor(current);
            }
            warn!("emergency stop engaged");
        }

        match guard.status() {
            Some(DoorStatus::Closed) => self.on_closed(guard),
            Some(DoorStatus::Opening) => self.on_opening(guard),
            Some(DoorStatus::Open) => self.on_open(guard),
            Some(DoorStatus::Closing) => self.on_closing(guard),
            Some(DoorStatus::Between) => self.on_between(guard),
            None => {
                // A foreign writer scribbled over the phase text
                error!("control block status is garbled, resetting to Closed");
                guard.set_status(DoorStatus::Closed);
                false
            }
        }
    }

    fn on_closed(&self, mut guard: BlockGuard<'_>) -> bool {
        if guard.open_button() {
            guard.set_open_button(false);
            guard.set_status(DoorStatus::Opening);
            return false;
        }
        if guard.close_button() {
            // Doors are already closed; consume the stray press
            guard.set_close_button(false);
        }
        if guard.overload() {
            // An overloaded car must let someone out
            guard.set_status(DoorStatus::Opening);
            return false;
        }

        if !guard.emergency_mode() {
            if let (Some(current), Some(destination)) =
                (guard.current_floor(), guard.destination_floor())
            {
                if destination < self.lowest_floor || destination > self.highest_floor {
                    guard.set_destination_floor(current);
                } else if let Some(direction) = current.toward(destination) {
                    if guard.individual_service_mode()
                        && current.step(direction).ok() != Some(destination)
                    {
                        // Service trips are exactly one floor; a farther
                        // destination is stale state from before the mode
                        // change
                        guard.set_destination_floor(current);
                    } else {
                        guard.set_status(DoorStatus::Between);
                        drop(guard);
                        return self.travel(direction);
                    }
                }
            }
        }

        // Idle: sleep on the condvar until something changes
        guard.wait(self.delay);
        false
    }

    // One floor of travel. Entered with status already Between and the
    // lock released; the in-flight step always completes in the direction
    // it started, a destination written meanwhile is honoured afterwards.
    fn travel(&self, direction: Direction) -> bool {
        if self.pause() {
            return true;
        }

        let mut guard = self.block.lock();
        let (Some(current), Some(destination)) =
            (guard.current_floor(), guard.destination_floor())
        else {
            guard.set_status(DoorStatus::Closed);
            return false;
        };

        match current.step(direction) {
            Ok(next) => {
                guard.set_current_floor(next);
                let arrived = next == destination;
                if arrived && !guard.individual_service_mode() && !guard.emergency_mode() {
                    guard.set_status(DoorStatus::Opening);
                } else {
                    guard.set_status(DoorStatus::Closed);
                }
            }
            Err(_) => {
                // Cannot step past the end of the building; park here
                guard.set_destination_floor(current);
                guard.set_status(DoorStatus::Closed);
            }
        }
        false
    }

    fn on_opening(&self, guard: BlockGuard<'_>) -> bool {
        drop(guard);
        if self.pause() {
            return true;
        }
        let mut guard = self.block.lock();
        if guard.status() == Some(DoorStatus::Opening) {
            guard.set_status(DoorStatus::Open);
        }
        false
    }

    fn on_open(&self, mut guard: BlockGuard<'_>) -> bool {
        if guard.open_button() {
            // Open wins over a simultaneous close; the doors hold open
            guard.set_open_button(false);
            if guard.close_button() {
                guard.set_close_button(false);
            }
            return false;
        }
        if guard.close_button() {
            guard.set_close_button(false);
            if !guard.overload() {
                guard.set_status(DoorStatus::Closing);
            }
            return false;
        }
        if guard.individual_service_mode() || guard.emergency_mode() {
            // Door automation is off; wait for a button press
            guard.wait(self.delay);
            return false;
        }
        if guard.door_obstruction() || guard.overload() {
            guard.wait(self.delay);
            return false;
        }

        // Dwell, then close if nothing intervened
        drop(guard);
        if self.pause() {
            return true;
        }
        let mut guard = self.block.lock();
        if guard.open_button() {
            guard.set_open_button(false);
            if guard.close_button() {
                guard.set_close_button(false);
            }
            return false;
        }
        if guard.individual_service_mode() || guard.emergency_mode() {
            return false;
        }
        if guard.door_obstruction() || guard.overload() {
            return false;
        }
        if guard.close_button() {
            guard.set_close_button(false);
        }
        guard.set_status(DoorStatus::Closing);
        false
    }

    fn on_closing(&self, mut guard: BlockGuard<'_>) -> bool {
        if guard.door_obstruction() || guard.overload() {
            // Re-open immediately; the cycle retries once the way is clear
            guard.set_status(DoorStatus::Opening);
            return false;
        }
        if guard.open_button() {
            guard.set_open_button(false);
            guard.set_status(DoorStatus::Opening);
            return false;
        }

        drop(guard);
        if self.pause() {
            return true;
        }
        let mut guard = self.block.lock();
        if guard.door_obstruction() || guard.overload() || guard.open_button() {
            if guard.open_button() {
                guard.set_open_button(false);
            }
            guard.set_status(DoorStatus::Opening);
            return false;
        }
        guard.set_status(DoorStatus::Closed);
        false
    }

    // Only seen when a previous run died mid-step; finish the move.
    fn on_between(&self, mut guard: BlockGuard<'_>) -> bool {
        let direction = match (guard.current_floor(), guard.destination_floor()) {
            (Some(current), Some(destination)) => current.toward(destination),
            _ => None,
        };
        match direction {
            Some(direction) => {
                drop(guard);
                self.travel(direction)
            }
            None => {
                guard.set_status(DoorStatus::Closed);
                false
            }
        }
    }

    fn should_stop(&self) -> bool {
        matches!(
            self.fsm_terminate_rx.try_recv(),
            Ok(()) | Err(cbc::TryRecvError::Disconnected)
        )
    }

    // Paced sleep that doubles as the termination point. Returns true when
    // the loop must stop.
    fn pause(&self) -> bool {
        match self.fsm_terminate_rx.recv_timeout(self.delay) {
            Ok(()) | Err(cbc::RecvTimeoutError::Disconnected) => true,
            Err(cbc::RecvTimeoutError::Timeout) => false,
        }
    }
}
