/* 3rd party libraries */
use clap::Parser;

/* Custom libraries */
use elevate::shm::{ControlBlock, Operation};
use elevate::unwrap_or_exit;

#[derive(Parser)]
#[clap(
    name = "internal",
    about = "Injects button presses and mode changes into a running car"
)]
struct Args {
    /// Car name
    name: String,
    /// One of: open, close, stop, service_on, service_off, up, down
    operation: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let operation = match Operation::parse(&args.operation) {
        Some(operation) => operation,
        None => {
            eprintln!("Invalid operation.");
            std::process::exit(1);
        }
    };

    let block = match ControlBlock::attach(&args.name) {
        Ok(block) => block,
        Err(_) => {
            eprintln!("Unable to access car {}.", args.name);
            std::process::exit(1);
        }
    };

    unwrap_or_exit!(operation.apply(&block));
}
