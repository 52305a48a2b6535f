//! # eBPF Kernel-Side Instrumentation
//!
//! Syscall probes that feed the bpf-mocker daemon.
//!
//! ## Programs
//!
//! - **Tracepoint**: `sys_enter` - `raw_syscalls/sys_enter`, one record per syscall entry
//! - **Tracepoint**: `sys_exit` - `raw_syscalls/sys_exit`, gated by `TRACE_EXIT`
//!
//! ## Maps (Shared with Userspace)
//!
//! - `EVENTS` - Ring buffer (256KB) for the event stream
//! - `LOST_EVENTS` - Per-CPU count of records that did not fit in `EVENTS`
//!
//! ## Globals (written by the loader before load)
//!
//! - `TARGET_PID`, `TRACE_EXIT`, `UPROBE_PERF_TYPE`, `KPROBE_PERF_TYPE`
//!
//! ## Build
//!
//! ```bash
//! cargo xtask build-ebpf
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    helpers::{bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_ktime_get_ns},
    macros::{map, tracepoint},
    maps::{PerCpuArray, RingBuf},
    programs::TracePointContext,
};
use bpf_mocker_common::{
    Event, COMM_LEN, EVENTS_BYTE_SIZE, EVENT_SYSCALL_ENTER, EVENT_SYSCALL_EXIT, SYSCALL_ARG_COUNT,
};

// ============================================================================
// Tracepoint Layout
// ============================================================================

/// `raw_syscalls/*`: `long id` follows the 8 bytes of common fields
const SYSCALL_ID_OFFSET: usize = 8;

/// `raw_syscalls/sys_enter`: `unsigned long args[6]`
const SYSCALL_ARGS_OFFSET: usize = 16;

/// `raw_syscalls/sys_exit`: `long ret`
const SYSCALL_RET_OFFSET: usize = 16;

// ============================================================================
// Globals
// ============================================================================

#[no_mangle]
static TARGET_PID: u32 = 0;

#[no_mangle]
static TRACE_EXIT: u8 = 1;

/// Perf PMU type for uprobes, resolved by userspace from sysfs
#[no_mangle]
static UPROBE_PERF_TYPE: i32 = -1;

/// Perf PMU type for kprobes, resolved by userspace from sysfs
#[no_mangle]
static KPROBE_PERF_TYPE: i32 = -1;

// ============================================================================
// Maps
// ============================================================================

/// Ring buffer for sending events to userspace
#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(EVENTS_BYTE_SIZE, 0);

/// Records dropped because `EVENTS` had no room, indexed per CPU
#[map]
static LOST_EVENTS: PerCpuArray<u64> = PerCpuArray::with_max_entries(1, 0);

// ============================================================================
// Programs
// ============================================================================

#[tracepoint]
pub fn sys_enter(ctx: TracePointContext) -> u32 {
    match try_sys_enter(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sys_enter(ctx: &TracePointContext) -> Result<(), i64> {
    let Some(pid_tgid) = traced_pid_tgid() else {
        return Ok(());
    };

    let syscall_id: i64 = unsafe { ctx.read_at(SYSCALL_ID_OFFSET)? };
    let args: [u64; SYSCALL_ARG_COUNT] = unsafe { ctx.read_at(SYSCALL_ARGS_OFFSET)? };

    emit(pid_tgid, EVENT_SYSCALL_ENTER, syscall_id, args, 0);
    Ok(())
}

#[tracepoint]
pub fn sys_exit(ctx: TracePointContext) -> u32 {
    match try_sys_exit(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sys_exit(ctx: &TracePointContext) -> Result<(), i64> {
    if unsafe { core::ptr::read_volatile(&TRACE_EXIT) } == 0 {
        return Ok(());
    }
    let Some(pid_tgid) = traced_pid_tgid() else {
        return Ok(());
    };

    let syscall_id: i64 = unsafe { ctx.read_at(SYSCALL_ID_OFFSET)? };
    let ret: i64 = unsafe { ctx.read_at(SYSCALL_RET_OFFSET)? };

    emit(pid_tgid, EVENT_SYSCALL_EXIT, syscall_id, [0; SYSCALL_ARG_COUNT], ret);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Current pid/tgid, or `None` when the task is outside the traced process
fn traced_pid_tgid() -> Option<u64> {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    let target = unsafe { core::ptr::read_volatile(&TARGET_PID) };
    if target != 0 && (pid_tgid >> 32) as u32 != target {
        return None;
    }
    Some(pid_tgid)
}

fn emit(pid_tgid: u64, kind: u32, syscall_id: i64, args: [u64; SYSCALL_ARG_COUNT], ret: i64) {
    let Some(mut entry) = EVENTS.reserve::<Event>(0) else {
        record_lost();
        return;
    };

    entry.write(Event {
        pid: (pid_tgid >> 32) as u32,
        tid: pid_tgid as u32,
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        kind,
        cpu_id: unsafe { aya_ebpf::helpers::gen::bpf_get_smp_processor_id() },
        syscall_id,
        args,
        ret,
        comm: bpf_get_current_comm().unwrap_or([0u8; COMM_LEN]),
    });
    entry.submit(0);
}

fn record_lost() {
    if let Some(counter) = LOST_EVENTS.get_ptr_mut(0) {
        // Per-CPU slot, no other writer on this CPU
        unsafe { *counter += 1 };
    }
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
