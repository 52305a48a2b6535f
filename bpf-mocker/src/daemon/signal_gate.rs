//! # Signal Gate
//!
//! Shutdown requests arrive asynchronously as signals. The handler installed
//! here performs a single atomic store into a [`ShutdownFlag`]; the polling
//! loop reads the flag once per iteration.
//!
//! The flag is an ordinary value passed to both the installer and the loop,
//! so several daemons (or tests) never share hidden global state.

use std::io;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use signal_hook::SigId;

use crate::domain::DaemonError;

/// Cloneable handle to the shutdown request bit
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Lock-free and allocation-free.
    pub fn request_shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn should_exit(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Installed signal handlers; removed again when dropped
#[derive(Debug)]
pub struct SignalGate {
    ids: Vec<SigId>,
}

impl SignalGate {
    /// Route each of `signals` to `flag`
    ///
    /// Installation is all-or-nothing: handlers registered before a failing
    /// signal are removed again.
    ///
    /// # Errors
    /// Returns [`DaemonError::SignalSetupFailed`] if any handler cannot be
    /// registered: a signal that cannot be caught (`SIGKILL`, `SIGSTOP`), one
    /// that must keep its default action (`SIGSEGV`, `SIGILL`, `SIGFPE`), or
    /// a number the kernel rejects.
    pub fn install(flag: &ShutdownFlag, signals: &[c_int]) -> Result<Self, DaemonError> {
        let mut gate = Self { ids: Vec::with_capacity(signals.len()) };
        for &signal in signals {
            // signal-hook panics on these instead of returning an error
            if signal_hook::consts::FORBIDDEN.contains(&signal) {
                return Err(DaemonError::SignalSetupFailed {
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("signal {signal} cannot be handled"),
                    ),
                });
            }
            // On error `gate` drops here and unregisters the earlier handlers
            let id = signal_hook::flag::register(signal, Arc::clone(&flag.0))
                .map_err(|source| DaemonError::SignalSetupFailed { source })?;
            debug!("installed shutdown handler for signal {signal}");
            gate.ids.push(id);
        }
        Ok(gate)
    }
}

impl Drop for SignalGate {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
