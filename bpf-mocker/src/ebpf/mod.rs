//! aya-backed instrumentation
//!
//! - [`object`]: open/load/attach of the compiled syscall probes
//! - [`ring_channel`]: ring-buffer event channel with per-CPU loss reporting
//! - [`probe_types`]: perf PMU types read from sysfs before load

pub mod object;
pub mod probe_types;
pub mod ring_channel;

pub use object::{EbpfObject, EbpfUnit, DEFAULT_OBJECT_PATH};
pub use probe_types::{ProbeTypes, PERF_TYPE_UNAVAILABLE};
pub use ring_channel::RingBufChannel;
