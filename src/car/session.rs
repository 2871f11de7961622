/**
 * Maintains the car's TCP session with the controller.
 *
 * The `CarSession` runs the network loop of a car process as an explicit
 * two-state machine. Disconnected, it retries the controller endpoint
 * every `delay` unless an override mode holds it offline. Connected, it
 * registers the car, then serves two independent flows: a monotonic ticker
 * paces STATUS heartbeats, and a named reader thread feeds inbound frames
 * into a channel so command intake never blocks the heartbeat.
 *
 * # Fields
 * - `block`:            Handle to the car's process-shared control block.
 * - `name`:             Car name sent in the registration frame.
 * - `lowest_floor`:     Bottom of the served range, for FLOOR validation.
 * - `highest_floor`:    Top of the served range.
 * - `delay`:            STATUS cadence and reconnect pacing.
 * - `endpoint`:         Controller address, normally 127.0.0.1:3000.
 * - `net_terminate_rx`: Receives a signal to terminate the network loop.
 *
 * Entering individual service or emergency mode ends the session with a
 * single INDIVIDUAL SERVICE or EMERGENCY frame; reconnection stays
 * suppressed until the modes clear. A dead or misbehaving peer just drops
 * the session back to Disconnected, never the process.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use crossbeam_channel as cbc;
use log::{debug, info, warn};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::Builder;
use std::time::Duration;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::floor::Floor;
use crate::protocol::{recv_frame, send_frame, Message};
use crate::shared::DoorStatus;
use crate::shm::ControlBlock;

/***************************************/
/*             Public API              */
/***************************************/
pub struct CarSession {
    block: Arc<ControlBlock>,
    name: String,
    lowest_floor: Floor,
    highest_floor: Floor,
    delay: Duration,
    endpoint: String,
    net_terminate_rx: cbc::Receiver<()>,
}

impl CarSession {
    pub fn new(
        block: Arc<ControlBlock>,
        name: String,
        lowest_floor: Floor,
        highest_floor: Floor,
        delay: Duration,
        endpoint: String,
        net_terminate_rx: cbc::Receiver<()>,
    ) -> CarSession {
        CarSession {
            block,
            name,
            lowest_floor,
            highest_floor,
            delay,
            endpoint,
            net_terminate_rx,
        }
    }

    pub fn run(self) {
        info!("network loop running");
        loop {
            // Disconnected: modes hold the car offline, otherwise retry
            if self.should_stop() {
                break;
            }
            let (service, emergency) = self.modes();
            if service || emergency {
                if self.pause() {
                    break;
                }
                continue;
            }

            let stream = match TcpStream::connect(&self.endpoint) {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("controller unreachable at {}: {}", self.endpoint, e);
                    if self.pause() {
                        break;
                    }
                    continue;
                }
            };

            info!("connected to controller at {}", self.endpoint);
            if self.connected(stream) {
                break;
            }
            info!("disconnected from controller");
            if self.pause() {
                break;
            }
        }
        info!("network loop stopped");
    }

    // One Connected session over an established stream. Returns true when
    // the loop must stop.
    fn connected(&self, stream: TcpStream) -> bool {
        let mut writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                warn!("failed to clone controller stream: {}", e);
                return false;
            }
        };

        // Register before anything else
        let hello = Message::Car {
            name: self.name.clone(),
            lowest: self.lowest_floor,
            highest: self.highest_floor,
        };
        if send_frame(&mut writer, &hello.to_string()).is_err() {
            return false;
        }

        // Reader thread: inbound frames become channel messages; any frame
        // error ends the flow and thereby the session
        let (inbound_tx, inbound_rx) = cbc::unbounded::<String>();
        let mut reader_stream = match stream.try_clone() {
            Ok(reader_stream) => reader_stream,
            Err(e) => {
                warn!("failed to clone controller stream: {}", e);
                return false;
            }
        };
        let reader = Builder::new()
            .name("controller_rx".into())
            .spawn(move || {
                while let Ok(frame) = recv_frame(&mut reader_stream) {
                    if inbound_tx.send(frame).is_err() {
                        break;
                    }
                }
            })
            .unwrap();

        let ticker = cbc::tick(self.delay);
        let mut farewell = None;
        let mut terminated = false;

        loop {
            cbc::select! {
                recv(self.net_terminate_rx) -> _ => {
                    terminated = true;
                    break;
                }
                recv(inbound_rx) -> frame => {
                    match frame {
                        Ok(frame) => {
                            if !self.handle_frame(&frame) {
                                break;
                            }
                        }
                        Err(_) => {
                            // Reader is gone: peer closed or frame error
                            break;
                        }
                    }
                }
                recv(ticker) -> _ => {
                    let (service, emergency) = self.modes();
                    if service {
                        farewell = Some(Message::IndividualService);
                        break;
                    }
                    if emergency {
                        farewell = Some(Message::Emergency);
                        break;
                    }
                    if send_frame(&mut writer, &self.status_frame()).is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(message) = farewell {
            info!("leaving controller session: {}", message);
            let _ = send_frame(&mut writer, &message.to_string());
        }

        let _ = stream.shutdown(Shutdown::Both);
        drop(inbound_rx);
        let _ = reader.join();
        terminated
    }

    // Applies one inbound frame. Returns false when the session must end.
    fn handle_frame(&self, frame: &str) -> bool {
        match Message::parse(frame) {
            Ok(Message::Floor(floor)) => {
                if floor < self.lowest_floor || floor > self.highest_floor {
                    debug!("ignoring FLOOR {} outside the served range", floor);
                    return true;
                }
                let mut guard = self.block.lock();
                guard.set_destination_floor(floor);
                true
            }
            Ok(Message::Unknown(text)) => {
                // Reserved for future use
                debug!("ignoring unrecognised controller frame {:?}", text);
                true
            }
            Ok(other) => {
                debug!("ignoring out-of-place controller frame {}", other);
                true
            }
            Err(e) => {
                warn!("bad controller frame, dropping the session: {}", e);
                false
            }
        }
    }

    fn modes(&self) -> (bool, bool) {
        let guard = self.block.lock();
        (guard.individual_service_mode(), guard.emergency_mode())
    }

    fn status_frame(&self) -> String {
        let guard = self.block.lock();
        Message::Status {
            status: guard.status().unwrap_or(DoorStatus::Closed),
            current: guard.current_floor().unwrap_or(self.lowest_floor),
            destination: guard.destination_floor().unwrap_or(self.lowest_floor),
        }
        .to_string()
    }

    fn should_stop(&self) -> bool {
        matches!(
            self.net_terminate_rx.try_recv(),
            Ok(()) | Err(cbc::TryRecvError::Disconnected)
        )
    }

    fn pause(&self) -> bool {
        match self.net_terminate_rx.recv_timeout(self.delay) {
            Ok(()) | Err(cbc::RecvTimeoutError::Disconnected) => true,
            Err(cbc::RecvTimeoutError::Timeout) => false,
        }
    }
}
