//! Structured error types for bpf-mocker
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every variant is fatal; lost events are reported through the dispatcher
//! and never become an error.

use std::fmt;
use std::io;
use thiserror::Error;

/// Startup or run-loop step that produced a [`DaemonError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    SignalSetup,
    Open,
    Load,
    Attach,
    ChannelCreate,
    Poll,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SignalSetup => "signal setup",
            Self::Open => "open",
            Self::Load => "load",
            Self::Attach => "attach",
            Self::ChannelCreate => "channel create",
            Self::Poll => "poll",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("can't set signal handler: {source}")]
    SignalSetupFailed {
        #[source]
        source: io::Error,
    },

    #[error("failed to open BPF object: {reason}")]
    OpenFailed { reason: String },

    #[error("failed to load BPF object: {code}")]
    LoadFailed { code: i32 },

    #[error("failed to attach BPF program {probe}: {reason}")]
    AttachFailed { probe: String, reason: String },

    #[error("failed to create ring buffer: {reason}")]
    ChannelCreateFailed { reason: String },

    #[error("error polling ring buffer: {}", io::Error::from_raw_os_error(-code))]
    PollError { code: i32 },
}

impl DaemonError {
    /// The step that failed
    #[must_use]
    pub fn step(&self) -> LifecycleStep {
        match self {
            Self::SignalSetupFailed { .. } => LifecycleStep::SignalSetup,
            Self::OpenFailed { .. } => LifecycleStep::Open,
            Self::LoadFailed { .. } => LifecycleStep::Load,
            Self::AttachFailed { .. } => LifecycleStep::Attach,
            Self::ChannelCreateFailed { .. } => LifecycleStep::ChannelCreate,
            Self::PollError { .. } => LifecycleStep::Poll,
        }
    }
}

/// Negative errno carried by the first `io::Error` in an error chain
///
/// Falls back to `-EINVAL` when the chain holds no OS error (e.g. a
/// malformed object rejected before reaching the kernel).
pub fn errno_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(code) = e.downcast_ref::<io::Error>().and_then(io::Error::raw_os_error) {
            return -code;
        }
        current = e.source();
    }
    -libc::EINVAL
}
