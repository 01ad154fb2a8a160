//! Example Client
//!
//! Connects output-only to a running server's FIFO and sends wake tokens.

use jack_fifo::{FifoConfig, JackFifo};
use std::time::Duration;

fn main() {
    env_logger::init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    let server_name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "default".to_string());
    let count: u64 = std::env::args()
        .nth(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let mut client = JackFifo::client(FifoConfig::default());
    if let Err(e) = client.connect_output(&name, &server_name) {
        eprintln!("[Client] Failed to connect: {}", e);
        eprintln!("[Client] Make sure the server is running first!");
        std::process::exit(1);
    }

    let mut sent = 0u64;
    for _ in 0..count {
        match client.signal() {
            Ok(()) => sent += 1,
            Err(e) => eprintln!("[Client] Signal failed: {}", e),
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("[Client] Sent {}/{} signals", sent, count);
    let _ = client.disconnect();
}
