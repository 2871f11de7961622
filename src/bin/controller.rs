/**
 * Mock controller.
 *
 * Accepts car registrations and CALL requests on the controller port and
 * honours the wire contract: cars get their dispatch commands forwarded,
 * callers get `CAR <name>` or `UNAVAILABLE`. The dispatch policy is the
 * simplest thing that works, the first registered car whose range covers
 * both floors wins; the registry stamps every registration with a
 * monotonically increasing index so that choice does not drift with map
 * iteration order or car churn.
 */

/* 3rd party libraries */
use crossbeam_channel as cbc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::Builder;

/* Custom libraries */
use elevate::config;
use elevate::floor::Floor;
use elevate::protocol::{recv_frame, send_frame, Message};
use elevate::unwrap_or_exit;

struct CarEntry {
    lowest: Floor,
    highest: Floor,
    registered_at: u64,
    command_tx: cbc::Sender<String>,
}

impl CarEntry {
    fn covers(&self, floor: Floor) -> bool {
        self.lowest <= floor && floor <= self.highest
    }
}

/// Fleet roster in registration order. A car that re-registers gets a
/// fresh index and counts as newly arrived.
struct Registry {
    cars: HashMap<String, CarEntry>,
    next_registration: u64,
}

impl Registry {
    fn new() -> Registry {
        Registry {
            cars: HashMap::new(),
            next_registration: 0,
        }
    }

    fn register(
        &mut self,
        name: String,
        lowest: Floor,
        highest: Floor,
        command_tx: cbc::Sender<String>,
    ) {
        let registered_at = self.next_registration;
        self.next_registration += 1;
        self.cars.insert(
            name,
            CarEntry {
                lowest,
                highest,
                registered_at,
                command_tx,
            },
        );
    }

    fn remove(&mut self, name: &str) {
        self.cars.remove(name);
    }

    // Answers a CALL: the earliest-registered car covering both floors is
    // sent to the pickup floor, nobody qualifying means UNAVAILABLE.
    fn dispatch(&self, source: Floor, destination: Floor) -> Message {
        self.cars
            .iter()
            .filter(|(_, entry)| entry.covers(source) && entry.covers(destination))
            .min_by_key(|(_, entry)| entry.registered_at)
            .map(|(name, entry)| {
                let _ = entry.command_tx.send(Message::Floor(source).to_string());
                Message::Dispatched { name: name.clone() }
            })
            .unwrap_or(Message::Unavailable)
    }
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn main() {
    env_logger::init();
    let config = config::load_config();

    let listener = unwrap_or_exit!(TcpListener::bind(("0.0.0.0", config.controller.port)));
    info!("controller listening on port {}", config.controller.port);

    let registry: SharedRegistry = Arc::new(Mutex::new(Registry::new()));
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("accept failed: {}", e);
                continue;
            }
        };
        let registry = Arc::clone(&registry);
        Builder::new()
            .name("client".into())
            .spawn(move || handle_client(stream, registry))
            .unwrap();
    }
}

// The opening frame decides what kind of peer this is.
fn handle_client(mut stream: TcpStream, registry: SharedRegistry) {
    let first = match recv_frame(&mut stream) {
        Ok(first) => first,
        Err(_) => return,
    };
    match Message::parse(&first) {
        Ok(Message::Car {
            name,
            lowest,
            highest,
        }) => car_session(stream, name, lowest, highest, registry),
        Ok(Message::Call {
            source,
            destination,
        }) => answer_call(stream, source, destination, &registry),
        _ => warn!("unexpected opening frame {:?}", first),
    }
}

fn car_session(
    mut stream: TcpStream,
    name: String,
    lowest: Floor,
    highest: Floor,
    registry: SharedRegistry,
) {
    info!("car {} registered for {}..{}", name, lowest, highest);
    let (command_tx, command_rx) = cbc::unbounded::<String>();
    registry
        .lock()
        .unwrap()
        .register(name.clone(), lowest, highest, command_tx);

    // Forward queued dispatch commands to the car
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            warn!("failed to clone car stream: {}", e);
            registry.lock().unwrap().remove(&name);
            return;
        }
    };
    let forwarder = Builder::new()
        .name("car_tx".into())
        .spawn(move || {
            while let Ok(frame) = command_rx.recv() {
                if send_frame(&mut writer, &frame).is_err() {
                    break;
                }
            }
        })
        .unwrap();

    // Drain heartbeats until the car leaves
    loop {
        match recv_frame(&mut stream) {
            Ok(frame) => match Message::parse(&frame) {
                Ok(Message::Status { .. }) => {}
                Ok(Message::IndividualService) | Ok(Message::Emergency) => {
                    info!("car {} withdrew: {}", name, frame);
                }
                _ => debug!("ignoring frame from car {}: {:?}", name, frame),
            },
            Err(_) => break,
        }
    }

    // Removing the entry drops the command channel, which ends the
    // forwarder thread
    registry.lock().unwrap().remove(&name);
    let _ = stream.shutdown(Shutdown::Both);
    let _ = forwarder.join();
    info!("car {} disconnected", name);
}

fn answer_call(mut stream: TcpStream, source: Floor, destination: Floor, registry: &SharedRegistry) {
    let reply = registry.lock().unwrap().dispatch(source, destination);

    info!("CALL {} {} answered with {}", source, destination, reply);
    let _ = send_frame(&mut stream, &reply.to_string());
    let _ = stream.shutdown(Shutdown::Both);
}

/*
 * Unit tests for the controller registry
 *
 * The unit tests follows the Arrange, Act, Assert pattern.
 */

/***************************************/
/*             Unit tests              */
/***************************************/
