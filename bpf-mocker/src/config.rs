//! Daemon configuration
//!
//! [`DaemonConfig`] is built once (by the CLI or a test) and only read
//! afterwards. [`StaticParams`] is the subset written into the
//! instrumentation unit before it is loaded.

use std::os::raw::c_int;
use std::time::Duration;

use signal_hook::consts::signal::{SIGINT, SIGTERM};

use crate::domain::Pid;
use crate::ebpf::ProbeTypes;

/// Poll timeout; bounds shutdown latency once the flag is set
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Signals that request a graceful shutdown
pub const DEFAULT_SHUTDOWN_SIGNALS: [c_int; 2] = [SIGINT, SIGTERM];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Process to instrument
    pub target: Pid,
    /// Enables debug-level diagnostics
    pub verbose: bool,
    /// Emit a record on syscall exit as well as entry
    pub trace_exit: bool,
    /// Perf PMU types, resolved before load
    pub probe_types: ProbeTypes,
    pub poll_timeout: Duration,
    pub shutdown_signals: Vec<c_int>,
}

impl DaemonConfig {
    #[must_use]
    pub fn new(target: Pid) -> Self {
        Self {
            target,
            verbose: false,
            trace_exit: true,
            probe_types: ProbeTypes::default(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            shutdown_signals: DEFAULT_SHUTDOWN_SIGNALS.to_vec(),
        }
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn with_trace_exit(mut self, trace_exit: bool) -> Self {
        self.trace_exit = trace_exit;
        self
    }

    #[must_use]
    pub fn with_probe_types(mut self, probe_types: ProbeTypes) -> Self {
        self.probe_types = probe_types;
        self
    }

    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_signals(mut self, signals: Vec<c_int>) -> Self {
        self.shutdown_signals = signals;
        self
    }
}

/// Values frozen into the instrumentation unit by `configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticParams {
    pub target_pid: u32,
    pub trace_exit: bool,
    pub uprobe_perf_type: i32,
    pub kprobe_perf_type: i32,
}

impl StaticParams {
    #[must_use]
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            target_pid: config.target.0,
            trace_exit: config.trace_exit,
            uprobe_perf_type: config.probe_types.uprobe,
            kprobe_perf_type: config.probe_types.kprobe,
        }
    }
}
