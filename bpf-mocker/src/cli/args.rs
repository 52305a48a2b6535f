//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DaemonConfig;
use crate::domain::Pid;
use crate::ebpf::{ProbeTypes, DEFAULT_OBJECT_PATH};
use crate::handler::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "bpf-mocker",
    about = "Trace the syscalls of a running process through eBPF",
    after_help = "\
EXAMPLES:
    sudo bpf-mocker --pid 1234                 Trace syscalls of PID 1234
    sudo bpf-mocker --pid 1234 --format json   One JSON object per event
    sudo bpf-mocker --pid 1234 -v              Include libbpf-level debug output"
)]
pub struct Args {
    /// Process ID to trace
    #[arg(short, long)]
    pub pid: u32,

    /// Compiled eBPF object to load
    #[arg(long, value_name = "FILE", default_value = DEFAULT_OBJECT_PATH)]
    pub object: PathBuf,

    /// Show debug diagnostics and raw syscall arguments
    #[arg(short, long)]
    pub verbose: bool,

    /// Only trace syscall entry
    #[arg(long)]
    pub no_exit_events: bool,

    /// Event output format: text or json
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Ring buffer poll timeout in milliseconds
    #[arg(long, value_name = "MS", default_value = "100")]
    pub poll_timeout_ms: u64,
}

impl Args {
    /// Build the daemon configuration
    ///
    /// `probe_types` is passed in because resolving it reads sysfs.
    #[must_use]
    pub fn to_config(&self, probe_types: ProbeTypes) -> DaemonConfig {
        DaemonConfig::new(Pid::from(self.pid))
            .with_verbose(self.verbose)
            .with_trace_exit(!self.no_exit_events)
            .with_probe_types(probe_types)
            .with_poll_timeout(Duration::from_millis(self.poll_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args() {
        let args = Args::try_parse_from(["bpf-mocker", "--pid", "1234"]).unwrap();
        assert_eq!(args.pid, 1234);
        assert_eq!(args.object, PathBuf::from(DEFAULT_OBJECT_PATH));
        assert_eq!(args.format, OutputFormat::Text);

        let config = args.to_config(ProbeTypes::default());
        assert_eq!(config.target, Pid(1234));
        assert!(!config.verbose);
        assert!(config.trace_exit);
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_full_args() {
        let args = Args::try_parse_from([
            "bpf-mocker",
            "-p",
            "42",
            "-v",
            "--no-exit-events",
            "--format",
            "json",
            "--poll-timeout-ms",
            "250",
            "--object",
            "/tmp/probe.o",
        ])
        .unwrap();
        let config = args.to_config(ProbeTypes { uprobe: 8, kprobe: 6 });
        assert!(config.verbose);
        assert!(!config.trace_exit);
        assert_eq!(config.probe_types.uprobe, 8);
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.object, PathBuf::from("/tmp/probe.o"));
    }

    #[test]
    fn test_pid_is_required() {
        assert!(Args::try_parse_from(["bpf-mocker"]).is_err());
    }

    #[test]
    fn test_bad_format_is_rejected() {
        assert!(Args::try_parse_from(["bpf-mocker", "--pid", "1", "--format", "xml"]).is_err());
    }
}
