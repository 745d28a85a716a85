//! Runs a TCP `NetworkCollector` on port 9125 and re-exports whatever it receives through Prometheus.
//!
//! Start this first, then run the `sender` example in another terminal. The scrape endpoint is the
//! exporter's default, `0.0.0.0:9000`. Ctrl+C stops the process.

use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_net_target::{NetworkCollector, Transport};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

fn main() {
    // Everything the collector replays lands in this exporter.
    PrometheusBuilder::new()
        .install()
        .expect("Failed to install Prometheus recorder");

    // Same port the sender example connects to.
    let collector = NetworkCollector::default()
        .port(9125)
        .transport(Transport::Stream);
    match collector.start_collecting() {
        Ok(addr) => println!("Collecting metrics on {addr}."),
        Err(e) => {
            eprintln!("Failed to start metrics collector: {}", e);
            return;
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    println!("Waiting for senders; Ctrl+C to stop.");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_secs(1));
    }

    println!("Collector stopped.");
}
