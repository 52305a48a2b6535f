//! # Event Channel
//!
//! Bounded producer/consumer transport between the instrumentation and the
//! daemon. A channel delivers records synchronously to an [`EventSink`] on
//! the thread that called [`EventChannel::poll`], and reports records the
//! producer had to drop as `(cpu, count)` notifications.

use std::ops::{ControlFlow, Deref, DerefMut};
use std::time::Duration;

use crate::domain::CpuId;

/// Outcome of one [`EventChannel::poll`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeResult {
    /// `n` records were handed to the sink before returning (may be 0 on timeout)
    Delivered(usize),
    /// The wait was interrupted by a signal; not an error
    Interrupted,
    /// Any other failure, as a negative errno
    Error(i32),
}

/// Receiver of channel callbacks
pub trait EventSink {
    /// Called once per record. `Break` stops draining for the current poll.
    fn on_event(&mut self, data: &[u8]) -> ControlFlow<()>;

    /// Called once per drop report
    fn on_lost(&mut self, cpu: CpuId, count: u64);
}

pub trait EventChannel {
    /// Wait up to `timeout` for records and deliver the available ones to `sink`
    fn poll(&mut self, timeout: Duration, sink: &mut dyn EventSink) -> ConsumeResult;

    /// Release the channel. Idempotent.
    fn free(&mut self);
}

/// Owns a channel and frees it on drop
pub struct ChannelGuard<C: EventChannel> {
    channel: C,
}

impl<C: EventChannel> ChannelGuard<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }
}

impl<C: EventChannel> Deref for ChannelGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.channel
    }
}

impl<C: EventChannel> DerefMut for ChannelGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}

impl<C: EventChannel> Drop for ChannelGuard<C> {
    fn drop(&mut self) {
        self.channel.free();
    }
}
