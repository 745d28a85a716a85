//! This example demonstrates how to set up the NetworkRecorderBuilder for sending metrics to a remote collector.
//!
//! The NetworkRecorderBuilder opens a TCP connection to the collector started by the `listener` example and
//! configures it as the global metrics recorder. Every counter, gauge, and histogram update is then written to
//! the connection as one framed event.

use metrics::{counter, gauge, histogram};
use metrics_net_target::{NetworkRecorderBuilder, Transport};

fn main() {
    // Point the recorder at the collector.
    let builder = NetworkRecorderBuilder::default()
        .destination("127.0.0.1")
        .port(9125)
        .transport(Transport::Stream);

    // Attempt to connect and set it as the global recorder.
    if let Err(e) = builder.install() {
        eprintln!("Failed to set up network recorder: {}", e);
        return;
    }

    // Record some example metrics.
    counter!("example_counter").increment(1);
    gauge!("example_gauge").set(std::f32::consts::PI);
    histogram!("example_histogram").record(42.0);

    println!("Metrics recorded and sent to the collector.");
}
