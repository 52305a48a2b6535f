//! # Event Handlers
//!
//! The daemon hands every decoded [`Event`] to an [`EventHandler`]. What the
//! handler does with it (mocking, translation, printing) is its own business;
//! the daemon only guarantees in-order, exactly-once delivery on the polling
//! thread.

pub mod printer;

use bpf_mocker_common::Event;

pub use printer::{EventPrinter, OutputFormat, SyscallRecord};

/// Capability invoked once per delivered record
///
/// The reference is only valid for the duration of the call.
pub trait EventHandler {
    fn handle(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventHandler for F {
    fn handle(&mut self, event: &Event) {
        self(event);
    }
}
