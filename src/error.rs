use crate::recorder::NetworkRecorder;
use std::io;
use thiserror::Error;

/// Failures raised by a [`NetworkTarget`](crate::NetworkTarget).
///
/// `NetworkClosed`, `SendFailed` and `NotOpen` come out of the send paths and
/// are also handed to the target's [`Reporter`](crate::Reporter). `Connect` is
/// only ever returned from `open`.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("network connection was closed by the remote end")]
    NetworkClosed,
    #[error("socket send failed: {0}")]
    SendFailed(#[source] io::Error),
    #[error("target is not open")]
    NotOpen,
    #[error("could not connect to target: {0}")]
    Connect(#[source] io::Error),
}

impl TargetError {
    /// The OS error code behind a send or connect failure, if there is one.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::SendFailed(e) | Self::Connect(e) => e.raw_os_error(),
            Self::NetworkClosed | Self::NotOpen => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("IO error setting up metrics transport {0}")]
    Io(#[from] io::Error),
    #[error("network target error: {0}")]
    Target(#[from] TargetError),
    #[error("failed to set NetworkRecorder: {0}")]
    Recorder(#[from] metrics::SetRecorderError<NetworkRecorder>),
    #[error("couldnt serialize event: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("failed to deserialize event: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("event of {0} bytes does not fit in a frame")]
    FrameTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_exposes_os_code() {
        let err = TargetError::SendFailed(io::Error::from_raw_os_error(32));
        assert_eq!(err.code(), Some(32));
        assert_eq!(TargetError::NetworkClosed.code(), None);
    }

    #[test]
    fn target_errors_convert_into_metrics_errors() {
        let err: MetricsError = TargetError::NotOpen.into();
        assert!(matches!(err, MetricsError::Target(TargetError::NotOpen)));
    }
}
