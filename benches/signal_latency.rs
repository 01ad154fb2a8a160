//! Signal/wait latency benchmarks.
//!
//! - `signal_wait`: one token written by a client and consumed by the server
//! - `signal_flush`: the suppressed path taken while flush mode is set
//!
//! Run: `cargo bench --bench signal_latency`

use criterion::{criterion_group, criterion_main, Criterion};
use jack_fifo::{FifoConfig, JackFifo};
use std::time::Duration;

fn bench_signal(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let config = FifoConfig::with_root(dir.path());

    let mut server = JackFifo::server(config.clone());
    server.allocate("bench", "default", 0).unwrap();
    let mut client = JackFifo::client(config);
    client.connect_output("bench", "default").unwrap();

    c.bench_function("signal_wait", |b| {
        b.iter(|| {
            client.signal().unwrap();
            server.timed_wait(Duration::from_millis(100)).unwrap();
        })
    });

    client.set_flush(true);
    c.bench_function("signal_flush", |b| b.iter(|| client.signal().unwrap()));

    server.destroy().unwrap();
}

criterion_group!(benches, bench_signal);
criterion_main!(benches);
