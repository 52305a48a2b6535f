//! Pre-flight checks for bpf-mocker
//!
//! Validates system requirements before any eBPF object is opened.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() and setrlimit() require unsafe

use anyhow::{bail, Context, Result};
use log::debug;
use std::path::Path;

use crate::domain::Pid;

/// Minimum kernel version providing the BPF ring buffer
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before eBPF loading
///
/// # Errors
/// Returns an error naming the first unmet requirement
pub fn run_preflight_checks(pid: Pid) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_process_exists(pid)?;
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: bpf-mocker requires root privileges to load eBPF programs.\n\n\
         Run with: sudo bpf-mocker ..."
    );
}

/// Check if the kernel version is sufficient for the ring buffer
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 6.1.0-arch1-1 ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             bpf-mocker requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// Parse "major.minor" from a release string like "5.15.0-generic"
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    Some((major, minor.parse().ok()?))
}

/// Check if the target process exists
///
/// # Errors
/// Returns an error if `/proc/<pid>` is absent
pub fn check_process_exists(pid: Pid) -> Result<()> {
    let proc_path = format!("/proc/{}", pid.0);
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {} not found.\n\n\
             Is the process still running? Check with: ps -p {}",
            pid.0,
            pid.0
        );
    }
    Ok(())
}

/// Lift the locked-memory limit
///
/// Kernels before 5.11 charge BPF maps against `RLIMIT_MEMLOCK`; newer
/// kernels use memcg accounting and ignore it.
pub fn bump_memlock_rlimit() {
    let rlim = libc::rlimit { rlim_cur: libc::RLIM_INFINITY, rlim_max: libc::RLIM_INFINITY };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}
