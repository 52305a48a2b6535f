//! # eBPF Object Loading and Attachment
//!
//! [`EbpfObject`] and [`EbpfUnit`] implement the instrumentation lifecycle on
//! top of aya.
//!
//! ## Steps
//!
//! - **open**: read the compiled object and check it defines every program
//!   and the `EVENTS` map; nothing reaches the kernel yet
//! - **configure**: remember the globals to patch into `.rodata`
//! - **load**: create maps and run each program through the verifier
//! - **attach**: attach every tracepoint; any failure aborts the step
//! - **destroy**: drop the `Ebpf` handle, which detaches links and closes fds
//!
//! ## Attachment Points
//!
//! - **Tracepoint**: `raw_syscalls/sys_enter`
//! - **Tracepoint**: `raw_syscalls/sys_exit`

use std::fs;
use std::path::PathBuf;

use aya::maps::{PerCpuArray, RingBuf};
use aya::programs::TracePoint;
use aya::{Ebpf, EbpfLoader};
use bpf_mocker_common::{
    EVENTS_MAP, GLOBAL_KPROBE_PERF_TYPE, GLOBAL_TARGET_PID, GLOBAL_TRACE_EXIT,
    GLOBAL_UPROBE_PERF_TYPE, LOST_EVENTS_MAP, PROG_SYS_ENTER, PROG_SYS_EXIT,
};
use log::{debug, info, warn};
use object::{Object, ObjectSymbol};

use super::RingBufChannel;
use crate::config::StaticParams;
use crate::daemon::lifecycle::{Instrumentation, InstrumentationUnit, UnitState};
use crate::domain::errors::errno_code;
use crate::domain::DaemonError;

/// Default location of the object built by `cargo xtask build-ebpf`
pub const DEFAULT_OBJECT_PATH: &str = "target/bpfel-unknown-none/release/bpf-mocker";

/// A tracepoint program and where it attaches
#[derive(Debug, Clone, Copy)]
struct Probe {
    program: &'static str,
    category: &'static str,
    name: &'static str,
}

const PROBES: [Probe; 2] = [
    Probe { program: PROG_SYS_ENTER, category: "raw_syscalls", name: "sys_enter" },
    Probe { program: PROG_SYS_EXIT, category: "raw_syscalls", name: "sys_exit" },
];

/// Compiled eBPF object on disk
#[derive(Debug, Clone)]
pub struct EbpfObject {
    path: PathBuf,
}

impl EbpfObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Instrumentation for EbpfObject {
    type Unit = EbpfUnit;

    fn open(&self) -> Result<EbpfUnit, DaemonError> {
        let bytes = fs::read(&self.path).map_err(|e| DaemonError::OpenFailed {
            reason: format!("{}: {e}", self.path.display()),
        })?;

        let mut required: Vec<&str> = PROBES.iter().map(|p| p.program).collect();
        required.push(EVENTS_MAP);
        let missing = missing_symbols(&bytes, &required)
            .map_err(|reason| DaemonError::OpenFailed { reason })?;
        if !missing.is_empty() {
            return Err(DaemonError::OpenFailed {
                reason: format!("{} does not define {}", self.path.display(), missing.join(", ")),
            });
        }

        debug!("opened {} ({} bytes)", self.path.display(), bytes.len());
        Ok(EbpfUnit { bytes, params: None, ebpf: None, state: UnitState::Opened })
    }
}

/// Symbols from `required` that the ELF image does not define
fn missing_symbols<'a>(bytes: &[u8], required: &[&'a str]) -> Result<Vec<&'a str>, String> {
    let obj = object::File::parse(bytes).map_err(|e| format!("not an ELF object: {e}"))?;
    let missing = required
        .iter()
        .copied()
        .filter(|name| !obj.symbols().any(|sym| sym.name().is_ok_and(|n| n == *name)))
        .collect();
    Ok(missing)
}

/// An opened eBPF object and, once loaded, its kernel handle
pub struct EbpfUnit {
    bytes: Vec<u8>,
    params: Option<StaticParams>,
    ebpf: Option<Ebpf>,
    state: UnitState,
}

impl EbpfUnit {
    #[must_use]
    pub fn state(&self) -> UnitState {
        self.state
    }

    fn tracepoint<'a>(ebpf: &'a mut Ebpf, program: &str) -> Result<&'a mut TracePoint, String> {
        ebpf.program_mut(program)
            .ok_or_else(|| format!("{program} program not found"))?
            .try_into()
            .map_err(|e| format!("{program} is not a tracepoint: {e}"))
    }
}

impl InstrumentationUnit for EbpfUnit {
    type Channel = RingBufChannel;

    fn configure(&mut self, params: &StaticParams) {
        self.params = Some(*params);
        self.state = UnitState::Configured;
        info!("✓ Set target PID: {}", params.target_pid);
    }

    fn load(&mut self) -> Result<(), DaemonError> {
        let Some(params) = self.params.filter(|_| self.state == UnitState::Configured) else {
            warn!("load requested in state {:?}", self.state);
            return Err(DaemonError::LoadFailed { code: -libc::EINVAL });
        };

        let trace_exit = u8::from(params.trace_exit);
        let ebpf = EbpfLoader::new()
            .set_global(GLOBAL_TARGET_PID, &params.target_pid, true)
            .set_global(GLOBAL_TRACE_EXIT, &trace_exit, true)
            .set_global(GLOBAL_UPROBE_PERF_TYPE, &params.uprobe_perf_type, false)
            .set_global(GLOBAL_KPROBE_PERF_TYPE, &params.kprobe_perf_type, false)
            .load(&self.bytes)
            .map_err(|e| {
                warn!("{e}");
                DaemonError::LoadFailed { code: errno_code(&e) }
            })?;
        let ebpf = self.ebpf.insert(ebpf);

        for probe in &PROBES {
            let program = Self::tracepoint(ebpf, probe.program).map_err(|reason| {
                warn!("{reason}");
                DaemonError::LoadFailed { code: -libc::ENOENT }
            })?;
            program.load().map_err(|e| {
                // Includes the verifier log on rejection
                warn!("{}: {e}", probe.program);
                DaemonError::LoadFailed { code: errno_code(&e) }
            })?;
            debug!("loaded program {}", probe.program);
        }

        self.state = UnitState::Loaded;
        Ok(())
    }

    fn attach(&mut self) -> Result<(), DaemonError> {
        let ebpf = match self.ebpf.as_mut() {
            Some(ebpf) if self.state == UnitState::Loaded => ebpf,
            _ => {
                return Err(DaemonError::AttachFailed {
                    probe: PROBES[0].program.to_string(),
                    reason: format!("unit is {:?}, not loaded", self.state),
                })
            }
        };

        // Links attached before a failure stay owned by the programs and are
        // released by destroy()
        for probe in &PROBES {
            let program = Self::tracepoint(ebpf, probe.program).map_err(|reason| {
                DaemonError::AttachFailed { probe: probe.program.to_string(), reason }
            })?;
            program.attach(probe.category, probe.name).map_err(|e| DaemonError::AttachFailed {
                probe: probe.program.to_string(),
                reason: e.to_string(),
            })?;
            info!("✓ Attached tracepoint: {}/{}", probe.category, probe.name);
        }

        self.state = UnitState::Attached;
        Ok(())
    }

    fn open_channel(&mut self) -> Result<RingBufChannel, DaemonError> {
        let ebpf = match self.ebpf.as_mut() {
            Some(ebpf) if self.state == UnitState::Attached => ebpf,
            _ => {
                return Err(DaemonError::ChannelCreateFailed {
                    reason: format!("unit is {:?}, not attached", self.state),
                })
            }
        };

        let map = ebpf.take_map(EVENTS_MAP).ok_or_else(|| DaemonError::ChannelCreateFailed {
            reason: format!("{EVENTS_MAP} map not found"),
        })?;
        let ring = RingBuf::try_from(map)
            .map_err(|e| DaemonError::ChannelCreateFailed { reason: e.to_string() })?;

        let lost = match ebpf.take_map(LOST_EVENTS_MAP).map(PerCpuArray::try_from) {
            Some(Ok(lost)) => Some(lost),
            Some(Err(e)) => {
                warn!("{LOST_EVENTS_MAP} unusable, lost events will not be reported: {e}");
                None
            }
            None => {
                warn!("{LOST_EVENTS_MAP} map not found, lost events will not be reported");
                None
            }
        };

        Ok(RingBufChannel::new(ring, lost))
    }

    fn destroy(&mut self) {
        if self.ebpf.take().is_some() {
            info!("✓ Detached and released BPF programs");
        }
        self.state = UnitState::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_params() -> StaticParams {
        StaticParams { target_pid: 1234, trace_exit: true, uprobe_perf_type: -1, kprobe_perf_type: -1 }
    }

    fn opened_unit() -> EbpfUnit {
        EbpfUnit { bytes: Vec::new(), params: None, ebpf: None, state: UnitState::Opened }
    }

    #[test]
    fn test_open_missing_file() {
        let err = EbpfObject::new("/nonexistent/bpf-mocker.o").open().err().unwrap();
        assert!(matches!(err, DaemonError::OpenFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/bpf-mocker.o"));
    }

    #[test]
    fn test_open_rejects_non_elf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an ELF file").unwrap();

        let err = EbpfObject::new(file.path()).open().err().unwrap();
        assert!(matches!(err, DaemonError::OpenFailed { .. }));
        assert!(err.to_string().contains("not an ELF object"));
    }

    #[test]
    fn test_open_rejects_object_without_programs() {
        // The test binary is a valid ELF that defines none of the probes
        let exe = std::env::current_exe().unwrap();
        let err = EbpfObject::new(exe).open().err().unwrap();
        assert!(err.to_string().contains(PROG_SYS_ENTER));
        assert!(err.to_string().contains(EVENTS_MAP));
    }

    #[test]
    fn test_missing_symbols_finds_present_symbol() {
        let bytes = fs::read(std::env::current_exe().unwrap()).unwrap();
        let missing = missing_symbols(&bytes, &["main", "no_such_symbol_here"]).unwrap();
        assert_eq!(missing, vec!["no_such_symbol_here"]);
    }

    #[test]
    fn test_load_before_configure_fails_without_kernel() {
        let mut unit = opened_unit();
        let err = unit.load().unwrap_err();
        assert!(matches!(err, DaemonError::LoadFailed { code } if code == -libc::EINVAL));
        assert_eq!(unit.state(), UnitState::Opened);
    }

    #[test]
    fn test_configure_records_params() {
        let mut unit = opened_unit();
        unit.configure(&config_params());
        assert_eq!(unit.state(), UnitState::Configured);
        assert_eq!(unit.params, Some(config_params()));
    }

    #[test]
    fn test_attach_and_channel_require_previous_steps() {
        let mut unit = opened_unit();
        assert!(matches!(unit.attach(), Err(DaemonError::AttachFailed { .. })));
        assert!(matches!(unit.open_channel(), Err(DaemonError::ChannelCreateFailed { .. })));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut unit = opened_unit();
        unit.destroy();
        unit.destroy();
        assert_eq!(unit.state(), UnitState::Destroyed);
    }
}
