//! # bpf-mocker - eBPF Syscall Tracing Daemon
//!
//! bpf-mocker attaches eBPF probes to a running process, streams one record
//! per intercepted operation through a BPF ring buffer and hands each record
//! to a pluggable handler.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     eBPF Programs (Kernel)                      │
//! │  • Tracepoints: raw_syscalls/sys_enter, raw_syscalls/sys_exit   │
//! │  • Filtered by TARGET_PID, drops counted in LOST_EVENTS         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ring buffer records
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   bpf-mocker (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Lifecycle   │──▶│   Channel    │──▶│  Dispatcher  │──▶ Handler
//! │  │ (open→attach)│   │  (poll 100ms)│   │  (decode)    │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │         ▲                                                       │
//! │         └───── Orchestrator ◀── Signal Gate (SIGINT/SIGTERM)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`daemon`]: Lifecycle contract, event channel, dispatcher, orchestrator
//! - [`ebpf`]: aya implementation of the lifecycle and the ring-buffer channel
//! - [`handler`]: Handler capability and the default event printer
//! - [`config`]: Immutable daemon configuration
//! - [`cli`]: Command-line parsing
//! - [`domain`]: Core domain types and errors
//! - [`preflight`]: Privilege and kernel checks run before startup
//!
//! ## Lifecycle
//!
//! 1. Install shutdown signal handlers (fatal if impossible)
//! 2. Open the eBPF object, write static parameters, load, attach
//! 3. Create the ring buffer channel
//! 4. Poll with a 100ms timeout until a shutdown signal arrives
//! 5. Free the channel, then destroy the eBPF object
//!
//! Failure at any step releases everything acquired so far and yields a
//! non-zero exit status.
//!
//! ## Typical Usage
//!
//! ```bash
//! cargo xtask build-ebpf
//! sudo ./target/release/bpf-mocker --pid <PID>
//! ```

pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod ebpf;
pub mod handler;
pub mod preflight;

pub use config::DaemonConfig;
pub use daemon::Daemon;
