use crate::events::{MetricData, MetricEvent, MetricKind, MetricMetadata, MetricOperation};

pub fn handle_event(event: MetricEvent) {
    match event {
        MetricEvent::Metadata(metadata) => handle_metadata_event(metadata),
        MetricEvent::Metric(metric) => handle_metric_event(metric),
    }
}

fn handle_metric_event(metric: MetricData) {
    let labels: Vec<metrics::Label> = metric
        .labels
        .into_iter()
        .map(|(k, v)| metrics::Label::new(k, v))
        .collect();
    let name = metric.name;

    match metric.operation {
        MetricOperation::IncrementCounter(value) => {
            metrics::counter!(name, labels).increment(value);
        }
        MetricOperation::SetCounter(value) => metrics::counter!(name, labels).absolute(value),
        MetricOperation::IncrementGauge(value) => metrics::gauge!(name, labels).increment(value),
        MetricOperation::DecrementGauge(value) => metrics::gauge!(name, labels).decrement(value),
        MetricOperation::SetGauge(value) => metrics::gauge!(name, labels).set(value),
        MetricOperation::RecordHistogram(value) => {
            metrics::histogram!(name, labels).record(value);
        }
    }
}

fn handle_metadata_event(metadata: MetricMetadata) {
    let unit = metadata
        .unit
        .as_deref()
        .and_then(metrics::Unit::from_string);
    let (name, description) = (metadata.name, metadata.description);

    match (metadata.kind, unit) {
        (MetricKind::Counter, Some(unit)) => metrics::describe_counter!(name, unit, description),
        (MetricKind::Counter, None) => metrics::describe_counter!(name, description),
        (MetricKind::Gauge, Some(unit)) => metrics::describe_gauge!(name, unit, description),
        (MetricKind::Gauge, None) => metrics::describe_gauge!(name, description),
        (MetricKind::Histogram, Some(unit)) => {
            metrics::describe_histogram!(name, unit, description);
        }
        (MetricKind::Histogram, None) => metrics::describe_histogram!(name, description),
    }
}
