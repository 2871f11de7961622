/*
 * Unit tests for the car state machine
 *
 * The unit tests follows the Arrange, Act, Assert pattern. Each test runs
 * a real operation loop against its own control block and observes the
 * door cycle through the block, the same way external processes do.
 */

/***************************************/
/*             Unit tests              */
/***************************************/
#[cfg(test)]
mod fsm_tests {
    use crate::car::CarFsm;
    use crate::floor::Floor;
    use crate::shared::DoorStatus::{Between, Closed, Open, Opening};
    use crate::shm::{BlockGuard, ControlBlock};
    use crossbeam_channel::{unbounded, Sender};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread::{sleep, spawn, JoinHandle};
    use std::time::{Duration, Instant};

    static NEXT_SEGMENT: AtomicU32 = AtomicU32::new(0);

    const DELAY: Duration = Duration::from_millis(50);
    const PATIENCE: Duration = Duration::from_secs(5);

    fn floor(label: &str) -> Floor {
        Floor::parse(label).unwrap()
    }

    fn setup_fsm(lowest: &str, highest: &str) -> (Arc<ControlBlock>, Sender<()>, JoinHandle<()>) {
        // Arrange a car on its own uniquely named block
        let name = format!(
            "testfsm{}{}",
            std::process::id(),
            NEXT_SEGMENT.fetch_add(1, Ordering::Relaxed)
        );
        let block = Arc::new(ControlBlock::create(&name, floor(lowest)).unwrap());
        let (fsm_terminate_tx, fsm_terminate_rx) = unbounded::<()>();
        let fsm = CarFsm::new(
            Arc::clone(&block),
            floor(lowest),
            floor(highest),
            DELAY,
            fsm_terminate_rx,
        );
        let fsm_thread = spawn(move || fsm.run());
        (block, fsm_terminate_tx, fsm_thread)
    }

    fn wait_until<F>(block: &ControlBlock, predicate: F) -> bool
    where
        F: Fn(&BlockGuard) -> bool,
    {
        let deadline = Instant::now() + PATIENCE;
        while Instant::now() < deadline {
            if predicate(&block.lock()) {
                return true;
            }
            sleep(Duration::from_millis(5));
        }
        false
    }

    fn teardown(terminate_tx: Sender<()>, fsm_thread: JoinHandle<()>) {
        terminate_tx.send(()).unwrap();
        fsm_thread.join().unwrap();
    }

    #[test]
    fn test_open_button_cycles_the_doors() {
        // Arrange
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");

        // Act: press open
        block.lock().set_open_button(true);

        // Assert: doors open, then close again on their own
        assert!(wait_until(&block, |g| g.status() == Some(Open)));
        assert!(wait_until(&block, |g| g.status() == Some(Closed)));
        assert!(!block.lock().open_button());

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_car_travels_and_opens_on_arrival() {
        // Arrange a car parked at 1
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "10");

        // Act: a destination three floors up, as a FLOOR command would set
        block.lock().set_destination_floor(floor("3"));

        // Assert: the car walks up one floor at a time, opens at the
        // destination, and ends parked with the doors closed
        assert!(wait_until(&block, |g| g.current_floor() == Some(floor("3"))
            && g.status() == Some(Open)));
        assert!(wait_until(&block, |g| g.status() == Some(Closed)));
        assert_eq!(block.lock().destination_floor(), Some(floor("3")));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_destination_outside_the_served_range_is_reset() {
        // Arrange a car serving 1..5
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");

        // Act: a foreign writer aims past the top of the range
        block.lock().set_destination_floor(floor("9"));

        // Assert: the trip is refused and the destination snaps back
        assert!(wait_until(&block, |g| g.destination_floor() == Some(floor("1"))));
        assert_eq!(block.lock().current_floor(), Some(floor("1")));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_obstruction_reopens_the_doors() {
        // Arrange open doors with an obstruction in them
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        block.lock().set_open_button(true);
        assert!(wait_until(&block, |g| g.status() == Some(Open)));
        block.lock().set_door_obstruction(true);

        // Act: ask the doors to close anyway
        block.lock().set_close_button(true);

        // Assert: they bounce back open and never reach Closed
        assert!(wait_until(&block, |g| g.status() == Some(Open) && !g.close_button()));
        sleep(DELAY * 4);
        assert_ne!(block.lock().status(), Some(Closed));

        // Act: clear the obstruction
        block.lock().set_door_obstruction(false);

        // Assert: the normal cycle finishes
        assert!(wait_until(&block, |g| g.status() == Some(Closed)));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_overload_holds_the_doors_open() {
        // Arrange an overloaded car with open doors
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        block.lock().set_open_button(true);
        assert!(wait_until(&block, |g| g.status() == Some(Open)));
        block.lock().set_overload(true);

        // Act / Assert: close is inhibited while the overload lasts
        block.lock().set_close_button(true);
        assert!(wait_until(&block, |g| !g.close_button()));
        sleep(DELAY * 4);
        assert_eq!(block.lock().status(), Some(Open));

        // Act / Assert: clearing the overload releases the doors
        block.lock().set_overload(false);
        assert!(wait_until(&block, |g| g.status() == Some(Closed)));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_open_wins_over_a_simultaneous_close() {
        // Arrange a service-mode car holding its doors open, so nothing
        // closes them automatically
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        {
            let mut guard = block.lock();
            guard.set_individual_service_mode(true);
            guard.set_open_button(true);
        }
        assert!(wait_until(&block, |g| g.status() == Some(Open)));

        // Act: both buttons at once
        {
            let mut guard = block.lock();
            guard.set_open_button(true);
            guard.set_close_button(true);
        }

        // Assert: both presses are consumed and the doors hold open
        assert!(wait_until(&block, |g| !g.open_button() && !g.close_button()));
        sleep(DELAY * 4);
        assert_eq!(block.lock().status(), Some(Open));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_service_mode_moves_one_floor_with_closed_doors() {
        // Arrange a service-mode car at 1
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        block.lock().set_individual_service_mode(true);

        // Act: one floor up, as internal's up command writes it
        block.lock().set_destination_floor(floor("2"));

        // Assert: the car arrives and the doors stay closed
        assert!(wait_until(&block, |g| g.current_floor() == Some(floor("2"))
            && g.status() == Some(Closed)));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_service_mode_discards_a_stale_far_destination() {
        // Arrange a service-mode car at 1 with a leftover trip to 4
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        {
            let mut guard = block.lock();
            guard.set_individual_service_mode(true);
            guard.set_destination_floor(floor("4"));
        }

        // Assert: the multi-floor trip is discarded, the car stays put
        assert!(wait_until(&block, |g| g.destination_floor() == Some(floor("1"))));
        assert_eq!(block.lock().current_floor(), Some(floor("1")));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_emergency_stop_halts_the_car() {
        // Arrange a car on a long trip
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "10");
        block.lock().set_destination_floor(floor("8"));
        assert!(wait_until(&block, |g| g.current_floor() >= Some(floor("3"))));

        // Act: the stop button
        block.lock().set_emergency_stop(true);

        // Assert: emergency latches, the trip is abandoned, any in-flight
        // step settles, and the car stops where it is
        assert!(wait_until(&block, |g| g.emergency_mode()));
        assert!(wait_until(&block, |g| g.status() == Some(Closed)
            && g.destination_floor() == g.current_floor()));
        let parked_at = block.lock().current_floor();
        sleep(DELAY * 4);
        assert_eq!(block.lock().current_floor(), parked_at);

        // Assert: door buttons still work so passengers can get out
        block.lock().set_open_button(true);
        assert!(wait_until(&block, |g| g.status() == Some(Open)));
        sleep(DELAY * 4);
        assert_eq!(block.lock().status(), Some(Open));

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_emergency_survives_until_service_on() {
        // Arrange an emergency-latched car
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        block.lock().set_emergency_stop(true);
        assert!(wait_until(&block, |g| g.emergency_mode()));

        // Act / Assert: only service_on clears the latch
        {
            let mut guard = block.lock();
            guard.set_individual_service_mode(true);
            guard.set_emergency_mode(false);
            guard.set_emergency_stop(false);
        }
        sleep(DELAY * 2);
        assert!(!block.lock().emergency_mode());

        teardown(terminate_tx, fsm_thread);
    }

    #[test]
    fn test_between_is_never_left_standing() {
        // A block that claims to be mid-step, as after a crash
        let (block, terminate_tx, fsm_thread) = setup_fsm("1", "5");
        {
            let mut guard = block.lock();
            guard.set_status(Between);
            guard.set_destination_floor(floor("2"));
        }

        // The loop finishes the move and settles
        assert!(wait_until(&block, |g| g.current_floor() == Some(floor("2"))));
        assert!(wait_until(&block, |g| {
            matches!(g.status(), Some(Closed) | Some(Open) | Some(Opening))
        }));

        teardown(terminate_tx, fsm_thread);
    }
}
