use crate::error::TargetError;
use std::fmt;

/// Receives the failures a target raises while sending.
///
/// Reporting happens in addition to the `Err` returned to the caller, so a
/// reporter must not assume it is the only party that sees the error. The
/// target's lock is released before `report` runs; a reporter may call back
/// into the same target, for example to `reopen` it.
pub trait Reporter: Send + Sync + fmt::Debug {
    fn report(&self, error: &TargetError);
}

/// Reports through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, error: &TargetError) {
        match error {
            TargetError::NetworkClosed => log::warn!("{error}"),
            TargetError::SendFailed(_) => {
                log::error!("{error} (code: {})", error.code().unwrap_or_default());
            }
            _ => log::error!("{error}"),
        }
    }
}

/// Discards every report. Failures still reach the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&self, _error: &TargetError) {}
}
