use crate::{error::MetricsError, target::Transport};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{self, Read},
};

/// Length of the big-endian size prefix in front of every stream frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload a stream frame may announce. Longer headers are rejected
/// before anything is allocated for them.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Largest payload a UDP datagram can carry.
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// The kind of metric being recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Metadata describing a metric: name, kind, description and optional unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricMetadata {
    pub name: String,
    pub kind: MetricKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<String>,
}

/// A single update to a labelled metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricData {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub operation: MetricOperation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operation", content = "value")]
#[serde(rename_all = "snake_case")]
pub enum MetricOperation {
    IncrementCounter(u64),
    SetCounter(u64),
    IncrementGauge(f64),
    DecrementGauge(f64),
    SetGauge(f64),
    RecordHistogram(f64),
}

/// What travels from a recorder to a collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricEvent {
    Metadata(MetricMetadata),
    Metric(MetricData),
}

impl MetricEvent {
    /// Encodes the event as one message for `transport`.
    ///
    /// Datagrams carry the bare event. Streams prefix it with its length so the
    /// collector can find the boundaries again.
    ///
    /// # Errors
    /// Returns an error if the event cannot be serialized or is too large for
    /// the transport.
    pub fn to_frame(&self, transport: Transport) -> Result<Vec<u8>, MetricsError> {
        let payload: Vec<u8> = self.try_into()?;
        match transport {
            Transport::Datagram if payload.len() > MAX_DATAGRAM_LEN => {
                Err(MetricsError::FrameTooLarge(payload.len()))
            }
            Transport::Datagram => Ok(payload),
            Transport::Stream if payload.len() > MAX_FRAME_LEN => {
                Err(MetricsError::FrameTooLarge(payload.len()))
            }
            Transport::Stream => {
                let len = u32::try_from(payload.len())
                    .map_err(|_| MetricsError::FrameTooLarge(payload.len()))?;
                let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
                frame.extend_from_slice(&len.to_be_bytes());
                frame.extend_from_slice(&payload);
                Ok(frame)
            }
        }
    }
}

/// Reads the next length-prefixed payload from a stream into `buffer`.
///
/// Returns `Ok(false)` when the stream ends exactly on a frame boundary.
///
/// # Errors
/// Returns an error if the stream fails, ends in the middle of a frame, or
/// announces a payload longer than [`MAX_FRAME_LEN`].
pub fn read_frame(reader: &mut impl Read, buffer: &mut Vec<u8>) -> io::Result<bool> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} header bytes"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME_LEN}"),
        ));
    }

    buffer.clear();
    buffer.resize(len, 0);
    reader.read_exact(buffer)?;
    Ok(true)
}

impl TryFrom<&[u8]> for MetricEvent {
    type Error = MetricsError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        rmp_serde::from_slice(buffer).map_err(MetricsError::from)
    }
}

impl TryFrom<&MetricEvent> for Vec<u8> {
    type Error = MetricsError;

    fn try_from(event: &MetricEvent) -> Result<Self, Self::Error> {
        rmp_serde::to_vec_named(event).map_err(MetricsError::from)
    }
}
