/* 3rd party libraries */
use clap::Parser;
use crossbeam_channel as cbc;
use log::info;
use signal_hook::consts::SIGINT;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::Builder;
use std::time::Duration;

/* Custom libraries */
use elevate::car::{CarFsm, CarSession};
use elevate::config;
use elevate::floor::Floor;
use elevate::shm::ControlBlock;
use elevate::unwrap_or_exit;

#[derive(Parser)]
#[clap(name = "car", about = "Elevator car daemon")]
struct Args {
    /// Car name; the control block is published at /car<name>
    name: String,
    /// Lowest floor served, B99..999
    lowest_floor: String,
    /// Highest floor served, B99..999
    highest_floor: String,
    /// Pace of door phases, travel steps and heartbeats, in milliseconds
    delay_ms: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.delay_ms == 0 {
        eprintln!("Delay must be a positive integer.");
        std::process::exit(1);
    }
    let lowest_floor = unwrap_or_exit!(Floor::parse(&args.lowest_floor));
    let highest_floor = unwrap_or_exit!(Floor::parse(&args.highest_floor));
    if lowest_floor > highest_floor {
        eprintln!("Lowest floor must not be above the highest floor.");
        std::process::exit(1);
    }
    let delay = Duration::from_millis(args.delay_ms);
    let config = config::load_config();

    // SIGINT requests shutdown; SIGPIPE must surface as write errors in
    // the network loop rather than kill the process
    let shutdown = Arc::new(AtomicBool::new(false));
    let _ = unwrap_or_exit!(signal_hook::flag::register(SIGINT, Arc::clone(&shutdown)));
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };

    // The creating handle owns /car<name> and unlinks it on drop
    let block = Arc::new(unwrap_or_exit!(ControlBlock::create(
        &args.name,
        lowest_floor
    )));

    // Initialize channels
    let (fsm_terminate_tx, fsm_terminate_rx) = cbc::unbounded::<()>();
    let (net_terminate_tx, net_terminate_rx) = cbc::unbounded::<()>();

    // Start the operation loop
    let fsm = CarFsm::new(
        Arc::clone(&block),
        lowest_floor,
        highest_floor,
        delay,
        fsm_terminate_rx,
    );
    let fsm_thread = Builder::new()
        .name("operation".into())
        .spawn(move || fsm.run())
        .unwrap();

    // Start the network loop
    let session = CarSession::new(
        Arc::clone(&block),
        args.name.clone(),
        lowest_floor,
        highest_floor,
        delay,
        config.controller.endpoint(),
        net_terminate_rx,
    );
    let net_thread = Builder::new()
        .name("session".into())
        .spawn(move || session.run())
        .unwrap();

    info!(
        "car {} serving {}..{} every {}ms",
        args.name, lowest_floor, highest_floor, args.delay_ms
    );

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("car {} shutting down", args.name);
    let _ = fsm_terminate_tx.send(());
    let _ = net_terminate_tx.send(());
    let _ = fsm_thread.join();
    let _ = net_thread.join();
}
