//! # Daemon Orchestrator
//!
//! Drives one run of the daemon:
//!
//! ```text
//! Init → SignalInstalled → Opened → Loaded → Attached → ChannelReady
//!      → Polling → ShuttingDown → TornDown
//! ```
//!
//! A failure before `Polling` returns straight away; the guards release
//! whatever was acquired. Locals drop in reverse declaration order, so the
//! channel is always freed before the unit is destroyed, and both before the
//! signal handlers are removed.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use log::{debug, error, info, LevelFilter};

use crate::config::{DaemonConfig, StaticParams};
use crate::daemon::channel::{ChannelGuard, ConsumeResult, EventChannel};
use crate::daemon::dispatcher::{DispatchStats, Dispatcher};
use crate::daemon::lifecycle::{Instrumentation, InstrumentationUnit, UnitGuard};
use crate::daemon::signal_gate::{ShutdownFlag, SignalGate};
use crate::domain::DaemonError;
use crate::handler::EventHandler;

pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Progress of a daemon run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Init,
    SignalInstalled,
    Opened,
    Loaded,
    Attached,
    ChannelReady,
    Polling,
    ShuttingDown,
    TornDown,
}

/// Result of a clean run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: DispatchStats,
    pub polls: u64,
    pub interrupted_polls: u64,
    pub elapsed: Duration,
}

pub struct Daemon<I: Instrumentation, H: EventHandler> {
    config: DaemonConfig,
    instrumentation: I,
    handler: H,
    shutdown: ShutdownFlag,
    diagnostics: Box<dyn Write + Send>,
    state: DaemonState,
}

impl<I: Instrumentation, H: EventHandler> Daemon<I, H> {
    pub fn new(config: DaemonConfig, instrumentation: I, handler: H) -> Self {
        Self {
            config,
            instrumentation,
            handler,
            shutdown: ShutdownFlag::new(),
            diagnostics: Box::new(io::stderr()),
            state: DaemonState::Init,
        }
    }

    /// Use an externally owned shutdown flag
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: ShutdownFlag) -> Self {
        self.shutdown = flag;
        self
    }

    /// Redirect diagnostic lines (stderr by default)
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Box<dyn Write + Send>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Run the daemon once and map the outcome to an exit status
    ///
    /// Writes one diagnostic line naming the cause on failure. Consumes the
    /// daemon: a run cannot be repeated with the same instance.
    pub fn start(mut self) -> i32 {
        match self.run() {
            Ok(summary) => {
                info!(
                    "shutdown: {:.1}s, {} events delivered, {} lost",
                    summary.elapsed.as_secs_f64(),
                    summary.stats.delivered,
                    summary.stats.lost
                );
                EXIT_CLEAN
            }
            Err(e) => {
                debug!("{} step failed", e.step());
                if let Err(write_err) = writeln!(self.diagnostics, "{e}") {
                    error!("{e} (diagnostics unavailable: {write_err})");
                }
                EXIT_FAILURE
            }
        }
    }

    /// Set up the instrumentation, poll until shutdown, then tear down
    ///
    /// Without `verbose` in the configuration, debug output (including the
    /// loader's) is capped at info for the rest of the process.
    ///
    /// # Errors
    /// Returns the first fatal [`DaemonError`]; everything acquired up to
    /// that point has been released when this returns.
    pub fn run(&mut self) -> Result<RunSummary, DaemonError> {
        if !self.config.verbose && log::max_level() > LevelFilter::Info {
            log::set_max_level(LevelFilter::Info);
        }
        let result = self.run_inner();
        self.transition(DaemonState::TornDown);
        result
    }

    fn run_inner(&mut self) -> Result<RunSummary, DaemonError> {
        let _signals = SignalGate::install(&self.shutdown, &self.config.shutdown_signals)?;
        self.transition(DaemonState::SignalInstalled);

        let mut unit = UnitGuard::new(self.instrumentation.open()?);
        self.transition(DaemonState::Opened);

        unit.configure(&StaticParams::from_config(&self.config));
        unit.load()?;
        self.transition(DaemonState::Loaded);

        unit.attach()?;
        self.transition(DaemonState::Attached);

        let mut channel = ChannelGuard::new(unit.open_channel()?);
        self.transition(DaemonState::ChannelReady);

        let started = Instant::now();
        self.transition(DaemonState::Polling);
        let outcome = self.poll_until_shutdown(&mut *channel);
        self.transition(DaemonState::ShuttingDown);

        drop(channel);
        drop(unit);

        let (stats, polls, interrupted_polls) = outcome?;
        Ok(RunSummary { stats, polls, interrupted_polls, elapsed: started.elapsed() })
    }

    fn poll_until_shutdown<C: EventChannel>(
        &mut self,
        channel: &mut C,
    ) -> Result<(DispatchStats, u64, u64), DaemonError> {
        let timeout = self.config.poll_timeout;
        let mut dispatcher = Dispatcher::new(&mut self.handler, &mut *self.diagnostics);
        let mut polls = 0u64;
        let mut interrupted = 0u64;

        while !self.shutdown.should_exit() {
            polls += 1;
            match channel.poll(timeout, &mut dispatcher) {
                ConsumeResult::Delivered(_) => {}
                ConsumeResult::Interrupted => interrupted += 1,
                ConsumeResult::Error(code) => return Err(DaemonError::PollError { code }),
            }
        }

        Ok((dispatcher.stats(), polls, interrupted))
    }

    fn transition(&mut self, next: DaemonState) {
        debug!("daemon state: {:?} -> {next:?}", self.state);
        self.state = next;
    }
}
