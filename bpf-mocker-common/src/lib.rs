//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Defines the event record and the names shared between the kernel-side
//! programs and the daemon. All types use `#[repr(C)]` for consistent memory
//! layout across the kernel/userspace boundary.
//!
//! ## Key Items
//!
//! - [`Event`] - Fixed-size record passed via the `EVENTS` ring buffer
//! - Map, global and program names looked up by the userspace loader

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Event Kinds
// ============================================================================

/// A traced thread entered a syscall
///
/// Emitted by: `sys_enter` tracepoint (`raw_syscalls/sys_enter`)
pub const EVENT_SYSCALL_ENTER: u32 = 1;

/// A traced thread returned from a syscall
///
/// Emitted by: `sys_exit` tracepoint (`raw_syscalls/sys_exit`), only when the
/// `TRACE_EXIT` global is non-zero
pub const EVENT_SYSCALL_EXIT: u32 = 2;

/// Number of syscall arguments captured per record
pub const SYSCALL_ARG_COUNT: usize = 6;

/// Length of the kernel `comm` field
pub const COMM_LEN: usize = 16;

// ============================================================================
// Object Names
// ============================================================================

/// Ring buffer carrying [`Event`] records to userspace
pub const EVENTS_MAP: &str = "EVENTS";

/// Capacity of the `EVENTS` ring buffer in bytes
pub const EVENTS_BYTE_SIZE: u32 = 256 * 1024;

/// Per-CPU counter of records dropped because `EVENTS` was full
pub const LOST_EVENTS_MAP: &str = "LOST_EVENTS";

/// Global: thread group ID to trace (0 traces every process)
pub const GLOBAL_TARGET_PID: &str = "TARGET_PID";

/// Global: non-zero to emit [`EVENT_SYSCALL_EXIT`] records
pub const GLOBAL_TRACE_EXIT: &str = "TRACE_EXIT";

/// Global: perf event type of the uprobe PMU (negative if unavailable)
pub const GLOBAL_UPROBE_PERF_TYPE: &str = "UPROBE_PERF_TYPE";

/// Global: perf event type of the kprobe PMU (negative if unavailable)
pub const GLOBAL_KPROBE_PERF_TYPE: &str = "KPROBE_PERF_TYPE";

/// Program attached to `raw_syscalls/sys_enter`
pub const PROG_SYS_ENTER: &str = "sys_enter";

/// Program attached to `raw_syscalls/sys_exit`
pub const PROG_SYS_EXIT: &str = "sys_exit";

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Event sent from eBPF to userspace via ring buffer
///
/// **Memory Layout**: `#[repr(C)]` ensures consistent layout across kernel/userspace
/// **Size**: 104 bytes, 8-byte aligned
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    /// Process ID (TGID in Linux terms)
    pub pid: u32,

    /// Thread ID (PID in Linux terms, TID in userspace)
    pub tid: u32,

    /// Timestamp in nanoseconds (from `bpf_ktime_get_ns()`), monotonic since boot
    pub timestamp_ns: u64,

    /// Event kind (see `EVENT_SYSCALL_ENTER`, `EVENT_SYSCALL_EXIT`)
    pub kind: u32,

    /// CPU core where the probe fired
    pub cpu_id: u32,

    /// Syscall number (architecture specific)
    pub syscall_id: i64,

    /// Raw syscall arguments (enter records only, zero on exit)
    pub args: [u64; SYSCALL_ARG_COUNT],

    /// Syscall return value (exit records only, zero on enter)
    pub ret: i64,

    /// Command name of the current task, NUL padded
    pub comm: [u8; COMM_LEN],
}

impl Event {
    /// Size of one record as written into the ring buffer
    pub const SIZE: usize = core::mem::size_of::<Event>();

    /// Command name up to the first NUL byte
    pub fn comm_bytes(&self) -> &[u8] {
        let end = self.comm.iter().position(|&b| b == 0).unwrap_or(COMM_LEN);
        &self.comm[..end]
    }
}

#[cfg(feature = "user")]
use aya::Pod;

// Pod lets the record travel as plain bytes
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for Event {}
