//! Perf PMU type discovery
//!
//! Uprobes and kprobes created through `perf_event_open` need the dynamic PMU
//! type the running kernel assigned to them, published under
//! /sys/bus/event_source/devices.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;

const UPROBE_TYPE_PATH: &str = "/sys/bus/event_source/devices/uprobe/type";
const KPROBE_TYPE_PATH: &str = "/sys/bus/event_source/devices/kprobe/type";

/// Marker written into the instrumentation when a PMU type is unknown
pub const PERF_TYPE_UNAVAILABLE: i32 = -1;

/// Probe-type discriminants resolved from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTypes {
    pub uprobe: i32,
    pub kprobe: i32,
}

impl Default for ProbeTypes {
    fn default() -> Self {
        Self { uprobe: PERF_TYPE_UNAVAILABLE, kprobe: PERF_TYPE_UNAVAILABLE }
    }
}

impl ProbeTypes {
    /// Read both PMU types from sysfs
    ///
    /// A missing or unreadable entry resolves to [`PERF_TYPE_UNAVAILABLE`]
    /// so that startup can continue on kernels without that PMU.
    #[must_use]
    pub fn detect() -> Self {
        Self { uprobe: resolve("uprobe", UPROBE_TYPE_PATH), kprobe: resolve("kprobe", KPROBE_TYPE_PATH) }
    }
}

fn resolve(kind: &str, path: &str) -> i32 {
    match read_perf_type(path) {
        Ok(value) => {
            debug!("{kind} perf type: {value}");
            value
        }
        Err(e) => {
            warn!("{kind} perf type unavailable: {e:#}");
            PERF_TYPE_UNAVAILABLE
        }
    }
}

fn read_perf_type(path: &str) -> Result<i32> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    parse_perf_type(&content)
}

/// Parse the contents of a sysfs `type` file (e.g. "8\n")
///
/// # Errors
/// Returns an error if the content is not a non-negative integer
pub fn parse_perf_type(content: &str) -> Result<i32> {
    let value: u32 = content
        .trim()
        .parse()
        .with_context(|| format!("Invalid perf type: {:?}", content.trim()))?;
    i32::try_from(value).context("Perf type out of range")
}
