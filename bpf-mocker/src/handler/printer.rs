//! Default handler: prints each event as text or JSON lines

use std::io::{self, Write};
use std::str::FromStr;

use bpf_mocker_common::{Event, EVENT_SYSCALL_ENTER, EVENT_SYSCALL_EXIT};
use log::warn;
use serde::Serialize;

use super::EventHandler;
use crate::config::DaemonConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other} (expected text or json)")),
        }
    }
}

/// Serializable view of an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyscallRecord {
    pub kind: &'static str,
    pub pid: u32,
    pub tid: u32,
    pub comm: String,
    pub cpu: u32,
    pub timestamp_ns: u64,
    pub syscall: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<[u64; 6]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ret: Option<i64>,
}

impl From<&Event> for SyscallRecord {
    fn from(event: &Event) -> Self {
        let is_exit = event.kind == EVENT_SYSCALL_EXIT;
        Self {
            kind: kind_name(event.kind),
            pid: event.pid,
            tid: event.tid,
            comm: String::from_utf8_lossy(event.comm_bytes()).into_owned(),
            cpu: event.cpu_id,
            timestamp_ns: event.timestamp_ns,
            syscall: event.syscall_id,
            args: (!is_exit).then_some(event.args),
            ret: is_exit.then_some(event.ret),
        }
    }
}

fn kind_name(kind: u32) -> &'static str {
    match kind {
        EVENT_SYSCALL_ENTER => "enter",
        EVENT_SYSCALL_EXIT => "exit",
        _ => "unknown",
    }
}

/// Writes one line per event
pub struct EventPrinter<W: Write> {
    format: OutputFormat,
    /// Include the raw argument registers in text output
    show_args: bool,
    out: W,
}

impl EventPrinter<io::Stdout> {
    /// Printer on stdout; argument registers are shown in verbose mode
    #[must_use]
    pub fn from_config(config: &DaemonConfig, format: OutputFormat) -> Self {
        Self::new(io::stdout(), format, config.verbose)
    }
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, format: OutputFormat, show_args: bool) -> Self {
        Self { format, show_args, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &Event) -> io::Result<()> {
        let record = SyscallRecord::from(event);
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)
            }
            OutputFormat::Text => self.write_text(&record),
        }
    }

    fn write_text(&mut self, record: &SyscallRecord) -> io::Result<()> {
        write!(
            self.out,
            "[{}] pid={} tid={} comm={} cpu={} syscall={}",
            record.kind, record.pid, record.tid, record.comm, record.cpu, record.syscall
        )?;
        if let Some(ret) = record.ret {
            write!(self.out, " ret={ret}")?;
        }
        if self.show_args {
            if let Some(args) = record.args {
                write!(self.out, " args=[")?;
                for (i, arg) in args.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    write!(self.out, "{sep}0x{arg:x}")?;
                }
                write!(self.out, "]")?;
            }
        }
        writeln!(self.out)
    }
}

impl<W: Write> EventHandler for EventPrinter<W> {
    fn handle(&mut self, event: &Event) {
        // A closed stdout must not stop the daemon
        if let Err(e) = self.write_event(event) {
            warn!("Failed to write event: {e}");
        }
    }
}
