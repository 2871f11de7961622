/* 3rd party libraries */
use clap::Parser;
use std::net::TcpStream;

/* Custom libraries */
use elevate::config;
use elevate::floor::Floor;
use elevate::protocol::{recv_frame, send_frame, Message};
use elevate::unwrap_or_exit;

#[derive(Parser)]
#[clap(name = "call", about = "Requests a car for a trip between two floors")]
struct Args {
    /// Pickup floor, B99..999
    source_floor: String,
    /// Destination floor, B99..999
    destination_floor: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let (source, destination) = match (
        Floor::parse(&args.source_floor),
        Floor::parse(&args.destination_floor),
    ) {
        (Ok(source), Ok(destination)) => (source, destination),
        _ => {
            eprintln!("Invalid floor(s) specified.");
            std::process::exit(1);
        }
    };
    if source == destination {
        eprintln!("You are already on that floor!");
        std::process::exit(1);
    }

    let config = config::load_config();
    let mut stream = match TcpStream::connect(config.controller.endpoint()) {
        Ok(stream) => stream,
        Err(_) => {
            eprintln!("Unable to connect to elevator system.");
            std::process::exit(1);
        }
    };

    let request = Message::Call {
        source,
        destination,
    };
    unwrap_or_exit!(send_frame(&mut stream, &request.to_string()));
    let reply = unwrap_or_exit!(recv_frame(&mut stream));

    match Message::parse(&reply) {
        Ok(Message::Dispatched { name }) => println!("Car {} is arriving.", name),
        Ok(Message::Unavailable) => {
            println!("Sorry, no car is available to take this request.")
        }
        _ => println!("Received unexpected response from controller: {}", reply),
    }
}
