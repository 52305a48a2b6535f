//! # Event Dispatching
//!
//! Turns raw ring-buffer records into [`Event`] values and forwards them to
//! the configured [`EventHandler`]. Always asks the channel to keep draining:
//! one odd record never aborts the rest of the batch.

use std::io::Write;
use std::ops::ControlFlow;

use bpf_mocker_common::Event;
use log::warn;

use crate::daemon::channel::EventSink;
use crate::domain::CpuId;
use crate::handler::EventHandler;

/// Counters kept while dispatching
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records forwarded to the handler
    pub delivered: u64,
    /// Records smaller than an [`Event`], skipped
    pub short_records: u64,
    /// Sum of all lost-event counts
    pub lost: u64,
    /// Number of lost-event notifications
    pub lost_reports: u64,
}

pub struct Dispatcher<'a, H: EventHandler> {
    handler: &'a mut H,
    diagnostics: &'a mut dyn Write,
    stats: DispatchStats,
}

impl<'a, H: EventHandler> Dispatcher<'a, H> {
    pub fn new(handler: &'a mut H, diagnostics: &'a mut dyn Write) -> Self {
        Self { handler, diagnostics, stats: DispatchStats::default() }
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

impl<H: EventHandler> EventSink for Dispatcher<'_, H> {
    fn on_event(&mut self, data: &[u8]) -> ControlFlow<()> {
        if data.len() < Event::SIZE {
            warn!("Received incomplete event ({} of {} bytes)", data.len(), Event::SIZE);
            self.stats.short_records += 1;
            return ControlFlow::Continue(());
        }

        // SAFETY: the buffer holds at least one Event and Event is plain old data
        #[allow(unsafe_code)]
        let event = unsafe { std::ptr::read_unaligned(data.as_ptr().cast::<Event>()) };

        self.handler.handle(&event);
        self.stats.delivered += 1;
        ControlFlow::Continue(())
    }

    fn on_lost(&mut self, cpu: CpuId, count: u64) {
        self.stats.lost = self.stats.lost.saturating_add(count);
        self.stats.lost_reports += 1;
        if let Err(e) = writeln!(self.diagnostics, "Lost {count} events on CPU #{}!", cpu.0) {
            warn!("Failed to report lost events: {e}");
        }
    }
}
