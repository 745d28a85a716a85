#![warn(clippy::pedantic, clippy::nursery, clippy::cargo, clippy::perf)]

//! # `metrics_net_target`
//!
//! Deliver metrics to a remote collector over TCP or UDP, IPv4 or IPv6.
//!
//! The heart of the crate is [`NetworkTarget`]: one remote endpoint plus the
//! connection currently open to it, guarded by a single lock. Stream targets
//! check for a peer close before every write and finish partial writes;
//! datagram targets send each message in one call.
//!
//! On top of it sit [`NetworkRecorder`], a `metrics` recorder that ships every
//! event through a target, and [`NetworkCollector`], which receives those
//! events and replays them into a local recorder for export.
//!
//! ```no_run
//! use metrics_net_target::{NetworkRecorderBuilder, Transport};
//!
//! NetworkRecorderBuilder::default()
//!     .destination("127.0.0.1")
//!     .port(9125)
//!     .transport(Transport::Stream)
//!     .install()
//!     .expect("collector reachable");
//! metrics::counter!("requests").increment(1);
//! ```
//!
//! See README and demos for details.

mod collector;
mod error;
mod events;
mod recorder;
mod target;

pub use collector::NetworkCollector;
pub use error::{MetricsError, TargetError};
pub use events::{MetricData, MetricEvent, MetricKind, MetricMetadata, MetricOperation};
pub use recorder::{NetworkRecorder, NetworkRecorderBuilder};
pub use target::{
    AddressFamily, Connection, Connector, Destination, LogReporter, NetworkTarget,
    NetworkTargetBuilder, Reporter, SilentReporter, SystemConnector, TargetOptions, Transport,
};
