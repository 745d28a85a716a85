use crate::{
    error::{MetricsError, TargetError},
    events::{MetricData, MetricEvent, MetricKind, MetricMetadata, MetricOperation},
    target::{
        AddressFamily, Connector, Destination, NetworkTarget, NetworkTargetBuilder, Reporter,
        TargetOptions, Transport,
    },
};
use std::{collections::BTreeMap, sync::Arc};

// A closed target is opened before the send, at most once across racing
// threads. A failed send swaps the connection for a fresh one; the event itself
// is not retried.
fn write_event(target: &NetworkTarget, event: &MetricEvent) -> Result<(), MetricsError> {
    let frame = event.to_frame(target.transport())?;
    target.open_if_closed()?;

    match target.send(&frame) {
        Err(TargetError::SendFailed(e)) => {
            target.reopen();
            Err(TargetError::SendFailed(e).into())
        }
        result => result.map_err(Into::into),
    }
}

#[derive(Debug)]
struct Handle {
    key: metrics::Key,
    target: Arc<NetworkTarget>,
}

impl Handle {
    const fn new(key: metrics::Key, target: Arc<NetworkTarget>) -> Self {
        Self { key, target }
    }

    fn push_metric(&self, op: MetricOperation) {
        let metric = MetricData {
            name: self.key.name().to_string(),
            labels: self
                .key
                .labels()
                .map(|label| (label.key().to_owned(), label.value().to_owned()))
                .collect::<BTreeMap<_, _>>(),
            operation: op,
        };
        if let Err(e) = write_event(&self.target, &MetricEvent::Metric(metric)) {
            log::trace!("dropped update for {}: {e}", self.key.name());
        }
    }
}

impl metrics::CounterFn for Handle {
    fn increment(&self, value: u64) {
        self.push_metric(MetricOperation::IncrementCounter(value));
    }

    fn absolute(&self, value: u64) {
        self.push_metric(MetricOperation::SetCounter(value));
    }
}

impl metrics::GaugeFn for Handle {
    fn increment(&self, value: f64) {
        self.push_metric(MetricOperation::IncrementGauge(value));
    }

    fn decrement(&self, value: f64) {
        self.push_metric(MetricOperation::DecrementGauge(value));
    }

    fn set(&self, value: f64) {
        self.push_metric(MetricOperation::SetGauge(value));
    }
}

impl metrics::HistogramFn for Handle {
    fn record(&self, value: f64) {
        self.push_metric(MetricOperation::RecordHistogram(value));
    }
}

/// A recorder that ships every metric event to a remote collector.
///
/// Each description and each update becomes one message on the underlying
/// [`NetworkTarget`]; nothing is buffered or aggregated locally.
#[derive(Debug, Clone)]
pub struct NetworkRecorder {
    target: Arc<NetworkTarget>,
}

impl NetworkRecorder {
    /// Wraps a target. The target does not have to be open yet.
    #[must_use]
    pub fn new(target: NetworkTarget) -> Self {
        Self {
            target: Arc::new(target),
        }
    }

    #[must_use]
    pub fn target(&self) -> &NetworkTarget {
        &self.target
    }

    fn register_metric(
        &self,
        key_name: &metrics::KeyName,
        kind: MetricKind,
        unit: Option<metrics::Unit>,
        description: &metrics::SharedString,
    ) {
        let metadata = MetricMetadata {
            name: key_name.as_str().to_string(),
            kind,
            unit: unit.map(|u| u.as_str().to_string()),
            description: description.to_string(),
        };
        if let Err(e) = write_event(&self.target, &MetricEvent::Metadata(metadata)) {
            log::trace!("dropped description for {}: {e}", key_name.as_str());
        }
    }
}

impl metrics::Recorder for NetworkRecorder {
    fn describe_counter(
        &self,
        key_name: metrics::KeyName,
        unit: Option<metrics::Unit>,
        description: metrics::SharedString,
    ) {
        self.register_metric(&key_name, MetricKind::Counter, unit, &description);
    }

    fn describe_gauge(
        &self,
        key_name: metrics::KeyName,
        unit: Option<metrics::Unit>,
        description: metrics::SharedString,
    ) {
        self.register_metric(&key_name, MetricKind::Gauge, unit, &description);
    }

    fn describe_histogram(
        &self,
        key_name: metrics::KeyName,
        unit: Option<metrics::Unit>,
        description: metrics::SharedString,
    ) {
        self.register_metric(&key_name, MetricKind::Histogram, unit, &description);
    }

    fn register_counter(
        &self,
        key: &metrics::Key,
        _meta: &metrics::Metadata<'_>,
    ) -> metrics::Counter {
        metrics::Counter::from_arc(Arc::new(Handle::new(key.clone(), self.target.clone())))
    }

    fn register_gauge(&self, key: &metrics::Key, _meta: &metrics::Metadata<'_>) -> metrics::Gauge {
        metrics::Gauge::from_arc(Arc::new(Handle::new(key.clone(), self.target.clone())))
    }

    fn register_histogram(
        &self,
        key: &metrics::Key,
        _meta: &metrics::Metadata<'_>,
    ) -> metrics::Histogram {
        metrics::Histogram::from_arc(Arc::new(Handle::new(key.clone(), self.target.clone())))
    }
}

/// Configures where a [`NetworkRecorder`] delivers to.
#[derive(Debug, Default)]
pub struct NetworkRecorderBuilder {
    target: NetworkTargetBuilder,
}

impl NetworkRecorderBuilder {
    /// Sets the collector host name or address.
    #[must_use]
    pub fn destination(mut self, destination: impl Into<Destination>) -> Self {
        self.target = self.target.destination(destination);
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.target = self.target.port(port);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Transport) -> Self {
        self.target = self.target.transport(transport);
        self
    }

    #[must_use]
    pub fn family(mut self, family: AddressFamily) -> Self {
        self.target = self.target.family(family);
        self
    }

    #[must_use]
    pub fn options(mut self, options: TargetOptions) -> Self {
        self.target = self.target.options(options);
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.target = self.target.connector(connector);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.target = self.target.reporter(reporter);
        self
    }

    /// Opens the connection to the collector and returns the recorder.
    ///
    /// # Errors
    /// Returns an error if the collector cannot be reached.
    pub fn build(self) -> Result<NetworkRecorder, MetricsError> {
        let target = self.target.build();
        target.open()?;
        Ok(NetworkRecorder::new(target))
    }

    /// Builds the recorder and sets it as the global recorder.
    /// All metrics recorded after this call are sent to the collector.
    ///
    /// # Example
    /// ```no_run
    /// use metrics_net_target::{NetworkRecorderBuilder, Transport};
    /// let builder = NetworkRecorderBuilder::default()
    ///     .destination("127.0.0.1")
    ///     .port(9125)
    ///     .transport(Transport::Stream);
    /// if let Err(e) = builder.install() {
    ///     eprintln!("Failed to set up network recorder: {}", e);
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or if the recorder cannot be set.
    pub fn install(self) -> Result<(), MetricsError> {
        metrics::set_global_recorder(self.build()?).map_err(Into::into)
    }
}
