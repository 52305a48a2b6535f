//! # Ring Buffer Channel
//!
//! [`EventChannel`] over the kernel's BPF ring buffer (`EVENTS`). Waiting is
//! done with `poll(2)` on the ring's file descriptor so that an incoming
//! signal interrupts the wait.
//!
//! A BPF ring buffer has no built-in loss notification. The kernel program
//! counts failed reservations per CPU in `LOST_EVENTS`; after each drain the
//! channel reports the growth of each CPU's counter as one lost-event
//! notification.
//!
//! One `poll` drains at most a ring's worth of records, so a producer that
//! keeps the ring non-empty cannot hold the caller past its next shutdown
//! check.

#![allow(unsafe_code)] // poll(2) requires unsafe

use std::io;
use std::os::fd::AsRawFd;
use std::os::raw::c_int;
use std::time::Duration;

use aya::maps::{MapData, PerCpuArray, RingBuf};
use bpf_mocker_common::{Event, EVENTS_BYTE_SIZE};
use log::{debug, warn};

use crate::daemon::channel::{ConsumeResult, EventChannel, EventSink};
use crate::domain::CpuId;

/// Most records handed to the sink by a single `poll`
pub const MAX_RECORDS_PER_POLL: usize = EVENTS_BYTE_SIZE as usize / Event::SIZE;

pub struct RingBufChannel {
    ring: Option<RingBuf<MapData>>,
    lost: Option<PerCpuArray<MapData, u64>>,
    /// Last seen value of each CPU's drop counter
    lost_seen: Vec<u64>,
}

impl RingBufChannel {
    #[must_use]
    pub fn new(ring: RingBuf<MapData>, lost: Option<PerCpuArray<MapData, u64>>) -> Self {
        Self { ring: Some(ring), lost, lost_seen: Vec::new() }
    }

    fn report_lost(&mut self, sink: &mut dyn EventSink) {
        let Some(lost) = self.lost.as_ref() else {
            return;
        };
        match lost.get(&0, 0) {
            Ok(totals) => {
                for (cpu, count) in lost_deltas(&mut self.lost_seen, &totals) {
                    sink.on_lost(cpu, count);
                }
            }
            Err(e) => warn!("Failed to read lost event counters: {e}"),
        }
    }
}

impl EventChannel for RingBufChannel {
    fn poll(&mut self, timeout: Duration, sink: &mut dyn EventSink) -> ConsumeResult {
        let Some(ring) = self.ring.as_mut() else {
            return ConsumeResult::Error(-libc::EBADF);
        };

        let mut fds = [libc::pollfd { fd: ring.as_raw_fd(), events: libc::POLLIN, revents: 0 }];
        let timeout_ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        // SAFETY: fds is a valid array of one pollfd for the duration of the call
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) };
        if ret < 0 {
            return classify_poll_error(&io::Error::last_os_error());
        }
        if let Some(failed) = classify_revents(fds[0].revents) {
            return failed;
        }

        let delivered = drain_batch(MAX_RECORDS_PER_POLL, || match ring.next() {
            None => Pulled::Empty,
            Some(item) if sink.on_event(&item).is_break() => Pulled::Stop,
            Some(_) => Pulled::More,
        });

        self.report_lost(sink);
        ConsumeResult::Delivered(delivered)
    }

    fn free(&mut self) {
        if self.ring.take().is_some() {
            debug!("ring buffer released");
        }
        self.lost = None;
    }
}

fn classify_poll_error(err: &io::Error) -> ConsumeResult {
    match err.raw_os_error() {
        Some(libc::EINTR) => ConsumeResult::Interrupted,
        Some(code) => ConsumeResult::Error(-code),
        None => ConsumeResult::Error(-libc::EIO),
    }
}

/// A ring fd the kernel flags as broken would otherwise poll ready forever
fn classify_revents(revents: libc::c_short) -> Option<ConsumeResult> {
    if revents & libc::POLLNVAL != 0 {
        return Some(ConsumeResult::Error(-libc::EBADF));
    }
    if revents & libc::POLLERR != 0 {
        return Some(ConsumeResult::Error(-libc::EIO));
    }
    None
}

/// Outcome of pulling one record off the ring
enum Pulled {
    Empty,
    More,
    Stop,
}

/// Pull records until the ring is empty, the sink stops, or `limit` is hit
///
/// Returns the number of records delivered.
fn drain_batch(limit: usize, mut pull: impl FnMut() -> Pulled) -> usize {
    let mut delivered = 0;
    while delivered < limit {
        match pull() {
            Pulled::Empty => break,
            Pulled::More => delivered += 1,
            Pulled::Stop => {
                delivered += 1;
                break;
            }
        }
    }
    delivered
}

/// Per-CPU growth of the drop counters since the previous call
///
/// Updates `seen` to `totals`. CPUs whose counter did not grow are omitted.
fn lost_deltas(seen: &mut Vec<u64>, totals: &[u64]) -> Vec<(CpuId, u64)> {
    let deltas = totals
        .iter()
        .enumerate()
        .filter_map(|(cpu, &total)| {
            let previous = seen.get(cpu).copied().unwrap_or(0);
            let cpu = u32::try_from(cpu).ok()?;
            (total > previous).then(|| (CpuId(cpu), total - previous))
        })
        .collect();
    seen.clear();
    seen.extend_from_slice(totals);
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eintr_is_interrupted() {
        let err = io::Error::from_raw_os_error(libc::EINTR);
        assert_eq!(classify_poll_error(&err), ConsumeResult::Interrupted);
    }

    #[test]
    fn test_other_errno_is_negative_error() {
        let err = io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(classify_poll_error(&err), ConsumeResult::Error(-libc::EBADF));
    }

    #[test]
    fn test_broken_fd_revents_are_errors() {
        assert_eq!(classify_revents(libc::POLLNVAL), Some(ConsumeResult::Error(-libc::EBADF)));
        assert_eq!(
            classify_revents(libc::POLLIN | libc::POLLERR),
            Some(ConsumeResult::Error(-libc::EIO))
        );
        assert_eq!(classify_revents(libc::POLLIN), None);
        assert_eq!(classify_revents(0), None);
    }

    #[test]
    fn test_drain_stops_at_limit_on_endless_ring() {
        let mut pulls = 0;
        let delivered = drain_batch(32, || {
            pulls += 1;
            Pulled::More
        });
        assert_eq!(delivered, 32);
        assert_eq!(pulls, 32);
    }

    #[test]
    fn test_drain_stops_when_ring_is_empty() {
        let mut remaining = 3;
        let delivered = drain_batch(MAX_RECORDS_PER_POLL, || {
            if remaining == 0 {
                return Pulled::Empty;
            }
            remaining -= 1;
            Pulled::More
        });
        assert_eq!(delivered, 3);
    }

    #[test]
    fn test_drain_counts_record_that_stopped_it() {
        let mut pulls = 0;
        let delivered = drain_batch(MAX_RECORDS_PER_POLL, || {
            pulls += 1;
            if pulls == 2 { Pulled::Stop } else { Pulled::More }
        });
        assert_eq!(delivered, 2);
    }

    #[test]
    fn test_batch_limit_covers_a_full_ring() {
        assert_eq!(MAX_RECORDS_PER_POLL, 256 * 1024 / 104);
    }

    #[test]
    fn test_lost_deltas_first_read_reports_nonzero_counters() {
        let mut seen = Vec::new();
        let deltas = lost_deltas(&mut seen, &[0, 0, 0, 7]);
        assert_eq!(deltas, vec![(CpuId(3), 7)]);
        assert_eq!(seen, vec![0, 0, 0, 7]);
    }

    #[test]
    fn test_lost_deltas_reports_only_growth() {
        let mut seen = vec![2, 5];
        assert!(lost_deltas(&mut seen, &[2, 5]).is_empty());
        assert_eq!(lost_deltas(&mut seen, &[4, 5]), vec![(CpuId(0), 2)]);
        assert_eq!(lost_deltas(&mut seen, &[4, 9]), vec![(CpuId(1), 4)]);
    }
}
