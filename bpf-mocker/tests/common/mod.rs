//! Recording fakes for the instrumentation lifecycle and event channel
//!
//! Every acquire/release goes into a shared call log so tests can check
//! ordering and balance without a kernel.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::os::raw::c_int;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bpf_mocker::config::{DaemonConfig, StaticParams};
use bpf_mocker::daemon::{
    ConsumeResult, EventChannel, EventSink, Instrumentation, InstrumentationUnit, ShutdownFlag,
};
use bpf_mocker::domain::{CpuId, DaemonError, Pid};
use bpf_mocker_common::{Event, COMM_LEN, EVENT_SYSCALL_ENTER, SYSCALL_ARG_COUNT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Configure(StaticParams),
    Load,
    Attach,
    ChannelCreate,
    Poll,
    Free,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailAt {
    #[default]
    Nothing,
    Open,
    Load(i32),
    Attach,
    ChannelCreate,
}

/// One scripted `poll` outcome
#[derive(Debug, Clone)]
pub enum PollStep {
    Deliver(Vec<Vec<u8>>),
    Lost(CpuId, u64),
    Interrupted,
    Error(i32),
    /// Sets the shutdown flag from inside the wait, as a signal would
    ShutdownDuringWait,
    /// Blocks for the full timeout and delivers nothing
    Idle,
    /// Delivers a real signal to the polling thread
    RaiseSignal(c_int),
    /// Delivers the same batch on this and every later poll
    Endless(Vec<Vec<u8>>),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Clone)]
pub struct FakeInstrumentation {
    pub log: CallLog,
    pub fail: FailAt,
    pub script: Vec<PollStep>,
    pub shutdown: ShutdownFlag,
}

impl FakeInstrumentation {
    pub fn new(fail: FailAt, script: Vec<PollStep>, shutdown: &ShutdownFlag) -> Self {
        Self { log: CallLog::default(), fail, script, shutdown: shutdown.clone() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

impl Instrumentation for FakeInstrumentation {
    type Unit = FakeUnit;

    fn open(&self) -> Result<FakeUnit, DaemonError> {
        self.record(Call::Open);
        if self.fail == FailAt::Open {
            return Err(DaemonError::OpenFailed { reason: "fake object missing".to_string() });
        }
        Ok(FakeUnit { owner: self.clone() })
    }
}

pub struct FakeUnit {
    owner: FakeInstrumentation,
}

impl InstrumentationUnit for FakeUnit {
    type Channel = FakeChannel;

    fn configure(&mut self, params: &StaticParams) {
        self.owner.record(Call::Configure(*params));
    }

    fn load(&mut self) -> Result<(), DaemonError> {
        self.owner.record(Call::Load);
        match self.owner.fail {
            FailAt::Load(code) => Err(DaemonError::LoadFailed { code }),
            _ => Ok(()),
        }
    }

    fn attach(&mut self) -> Result<(), DaemonError> {
        self.owner.record(Call::Attach);
        if self.owner.fail == FailAt::Attach {
            return Err(DaemonError::AttachFailed {
                probe: "sys_exit".to_string(),
                reason: "tracepoint not found".to_string(),
            });
        }
        Ok(())
    }

    fn open_channel(&mut self) -> Result<FakeChannel, DaemonError> {
        self.owner.record(Call::ChannelCreate);
        if self.owner.fail == FailAt::ChannelCreate {
            return Err(DaemonError::ChannelCreateFailed { reason: "EVENTS map not found".to_string() });
        }
        Ok(FakeChannel {
            owner: self.owner.clone(),
            script: self.owner.script.iter().cloned().collect(),
        })
    }

    fn destroy(&mut self) {
        self.owner.record(Call::Destroy);
    }
}

pub struct FakeChannel {
    owner: FakeInstrumentation,
    script: VecDeque<PollStep>,
}

impl EventChannel for FakeChannel {
    fn poll(&mut self, timeout: Duration, sink: &mut dyn EventSink) -> ConsumeResult {
        self.owner.record(Call::Poll);
        if let Some(PollStep::Endless(records)) = self.script.front() {
            let records = records.clone();
            // Records arrive faster than the poll timeout but never stop
            std::thread::sleep(Duration::from_millis(1));
            return deliver(&records, sink);
        }
        let Some(step) = self.script.pop_front() else {
            // Script exhausted: stop the daemon so tests cannot hang
            self.owner.shutdown.request_shutdown();
            return ConsumeResult::Delivered(0);
        };
        match step {
            PollStep::Deliver(records) | PollStep::Endless(records) => deliver(&records, sink),
            PollStep::Lost(cpu, count) => {
                sink.on_lost(cpu, count);
                ConsumeResult::Delivered(0)
            }
            PollStep::Interrupted => ConsumeResult::Interrupted,
            PollStep::Error(code) => ConsumeResult::Error(code),
            PollStep::ShutdownDuringWait => {
                self.owner.shutdown.request_shutdown();
                ConsumeResult::Interrupted
            }
            PollStep::Idle => {
                std::thread::sleep(timeout);
                ConsumeResult::Delivered(0)
            }
            PollStep::RaiseSignal(signal) => {
                signal_hook::low_level::raise(signal).unwrap();
                ConsumeResult::Interrupted
            }
        }
    }

    fn free(&mut self) {
        self.owner.record(Call::Free);
    }
}

fn deliver(records: &[Vec<u8>], sink: &mut dyn EventSink) -> ConsumeResult {
    let mut delivered = 0;
    for record in records {
        delivered += 1;
        if sink.on_event(record) == ControlFlow::Break(()) {
            break;
        }
    }
    ConsumeResult::Delivered(delivered)
}

/// Diagnostics writer whose contents remain readable after the daemon is gone
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn test_config() -> DaemonConfig {
    DaemonConfig::new(Pid(1234))
        .with_verbose(false)
        .with_poll_timeout(Duration::from_millis(10))
}

pub fn event(tid: u32, syscall_id: i64) -> Event {
    Event {
        pid: 1234,
        tid,
        timestamp_ns: 1_000 + u64::from(tid),
        kind: EVENT_SYSCALL_ENTER,
        cpu_id: 0,
        syscall_id,
        args: [u64::from(tid); SYSCALL_ARG_COUNT],
        ret: 0,
        comm: [b'x'; COMM_LEN],
    }
}

/// Raw bytes of `event` as the ring buffer would carry them
pub fn record_bytes(event: &Event) -> Vec<u8> {
    #[allow(unsafe_code)]
    let bytes = unsafe {
        std::slice::from_raw_parts(std::ptr::from_ref(event).cast::<u8>(), Event::SIZE)
    };
    bytes.to_vec()
}

/// Count of acquisitions (open, channel create) and releases (destroy, free)
pub fn acquire_release_balance(calls: &[Call], fail: FailAt) -> (usize, usize) {
    let opened = calls.contains(&Call::Open) && fail != FailAt::Open;
    let channel = calls.contains(&Call::ChannelCreate) && fail != FailAt::ChannelCreate;
    let acquired = usize::from(opened) + usize::from(channel);
    let released = calls.iter().filter(|c| matches!(c, Call::Destroy | Call::Free)).count();
    (acquired, released)
}
