//! Example Server
//!
//! Allocates a FIFO and counts the wake tokens clients send, until a
//! period of silence ends the session.

use jack_fifo::{ErrorKind, FifoConfig, JackFifo};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    let server_name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "default".to_string());
    let idle_secs: u64 = std::env::args()
        .nth(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let mut server = JackFifo::server(FifoConfig::default());
    if let Err(e) = server.allocate(&name, &server_name, 0) {
        eprintln!("[Server] Failed to allocate FIFO: {}", e);
        std::process::exit(1);
    }

    if let Some(path) = server.name() {
        println!("[Server] Listening on {}", path.display());
    }
    println!("[Server] Exits after {}s without a signal", idle_secs);

    let start_time = Instant::now();
    let mut wakeups = 0u64;
    let mut last_wakeup = Instant::now();

    loop {
        match server.timed_wait(Duration::from_millis(100)) {
            Ok(()) => {
                wakeups += 1;
                last_wakeup = Instant::now();
            }
            Err(e) if e.kind() == ErrorKind::Timeout => {
                if last_wakeup.elapsed() >= Duration::from_secs(idle_secs) {
                    break;
                }
            }
            Err(e) => {
                eprintln!("[Server] Wait failed: {}", e);
                break;
            }
        }
    }

    let elapsed = start_time.elapsed().as_secs_f64();
    println!(
        "[Server] Wakeups: {}, Uptime: {:.1}s, Rate: {:.1}/s",
        wakeups,
        elapsed,
        wakeups as f64 / elapsed
    );

    if let Err(e) = server.destroy() {
        eprintln!("[Server] Failed to destroy FIFO: {}", e);
        std::process::exit(1);
    }
    println!("[Server] FIFO removed");
}
