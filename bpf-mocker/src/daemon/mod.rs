//! Daemon core
//!
//! - [`signal_gate`]: shutdown flag set from signal context
//! - [`lifecycle`]: open/configure/load/attach/destroy contract for instrumentation units
//! - [`channel`]: bounded event transport and its poll outcome
//! - [`dispatcher`]: decodes records and forwards them to the handler
//! - [`orchestrator`]: composes the above into a single run

pub mod channel;
pub mod dispatcher;
pub mod lifecycle;
pub mod orchestrator;
pub mod signal_gate;

pub use channel::{ChannelGuard, ConsumeResult, EventChannel, EventSink};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use lifecycle::{Instrumentation, InstrumentationUnit, UnitGuard, UnitState};
pub use orchestrator::{Daemon, DaemonState, RunSummary, EXIT_CLEAN, EXIT_FAILURE};
pub use signal_gate::{ShutdownFlag, SignalGate};
