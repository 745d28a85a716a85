//! Recorder to collector over loopback, replayed into a capturing recorder.

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};
use metrics_net_target::{NetworkCollector, NetworkRecorderBuilder, Transport};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
struct Capture {
    lines: Mutex<Vec<String>>,
}

impl Capture {
    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    fn wait_for(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.lines.lock().unwrap().len() >= count {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let mut lines = self.lines.lock().unwrap().clone();
        lines.sort();
        lines
    }
}

struct CaptureHandle {
    name: String,
    capture: Arc<Capture>,
}

impl CounterFn for CaptureHandle {
    fn increment(&self, value: u64) {
        self.capture.push(format!("{} counter+{value}", self.name));
    }

    fn absolute(&self, value: u64) {
        self.capture.push(format!("{} counter={value}", self.name));
    }
}

impl GaugeFn for CaptureHandle {
    fn increment(&self, value: f64) {
        self.capture.push(format!("{} gauge+{value}", self.name));
    }

    fn decrement(&self, value: f64) {
        self.capture.push(format!("{} gauge-{value}", self.name));
    }

    fn set(&self, value: f64) {
        self.capture.push(format!("{} gauge={value}", self.name));
    }
}

impl HistogramFn for CaptureHandle {
    fn record(&self, value: f64) {
        self.capture.push(format!("{} histogram {value}", self.name));
    }
}

#[derive(Debug, Default, Clone)]
struct CaptureRecorder(Arc<Capture>);

impl CaptureRecorder {
    fn handle(&self, key: &Key) -> Arc<CaptureHandle> {
        let labels: Vec<String> = key
            .labels()
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        Arc::new(CaptureHandle {
            name: format!("{}{{{}}}", key.name(), labels.join(",")),
            capture: self.0.clone(),
        })
    }

    fn describe(&self, kind: &str, key: &KeyName, unit: Option<Unit>) {
        let unit = unit.map_or("none", |u| u.as_str());
        self.0.push(format!("describe {kind} {} {unit}", key.as_str()));
    }
}

impl Recorder for CaptureRecorder {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, _: SharedString) {
        self.describe("counter", &key, unit);
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, _: SharedString) {
        self.describe("gauge", &key, unit);
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, _: SharedString) {
        self.describe("histogram", &key, unit);
    }

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

fn round_trip(transport: Transport) -> Vec<String> {
    let capture = CaptureRecorder::default();
    let addr = NetworkCollector::default()
        .port(0)
        .transport(transport)
        .recorder(Arc::new(capture.clone()))
        .start_collecting()
        .unwrap();

    let recorder = NetworkRecorderBuilder::default()
        .destination(addr.ip())
        .port(addr.port())
        .transport(transport)
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || {
        metrics::describe_counter!("hits", Unit::Count, "handled requests");
        metrics::counter!("hits", "route" => "/").increment(3);
        metrics::gauge!("depth").set(2.5);
        metrics::histogram!("latency").record(0.5);
    });

    capture.0.wait_for(4)
}

fn expected() -> Vec<String> {
    let mut lines = vec![
        "describe counter hits count".to_string(),
        "hits{route=/} counter+3".to_string(),
        "depth{} gauge=2.5".to_string(),
        "latency{} histogram 0.5".to_string(),
    ];
    lines.sort();
    lines
}

#[test]
fn stream_events_reach_the_collector() {
    assert_eq!(round_trip(Transport::Stream), expected());
}

#[test]
fn datagram_events_reach_the_collector() {
    assert_eq!(round_trip(Transport::Datagram), expected());
}
