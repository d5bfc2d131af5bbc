//! Bounded capture queue and the monotonic frame-index counter.
//!
//! Single-producer/single-consumer by construction: the
//! capture producer calls [`CaptureQueue::submit`], the fan-out loop calls
//! [`CaptureQueue::try_drain`] once per iteration. A `Mutex`-backed
//! `VecDeque` is sufficient since both sides only ever hold it for a plain
//! push/pop, never across an I/O call.
//!
//! Overflow policy (ported from
//! `distributor.py::add_frame_for_distribution`): on a full queue, evict
//! the oldest pending frame and retry once; if still full, drop the new
//! frame. Loss is observable only via a `tracing::warn!`, never as an
//! `Err` — the capture loop must never block or fail.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::frame::Frame;

/// Outcome of a [`CaptureQueue::submit`] call.
///
/// The index is assigned unconditionally (every
/// assigned index is strictly greater than all previous ones, even when the
/// frame itself is dropped). Only `Admitted` corresponds to a
/// `frame_captured` trace event, matching the original's behavior of
/// logging the instant event solely on the first, uncontended enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Admitted { index: u64, evicted: bool },
    Dropped { index: u64 },
}

impl SubmitOutcome {
    pub fn index(&self) -> u64 {
        match self {
            SubmitOutcome::Admitted { index, .. } => *index,
            SubmitOutcome::Dropped { index } => *index,
        }
    }
}

pub struct CaptureQueue {
    queue: Mutex<VecDeque<Frame>>,
    capacity: usize,
    counter: AtomicU64,
}

impl CaptureQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            counter: AtomicU64::new(0),
        }
    }

    /// Assigns the next index and attempts to enqueue the frame.
    ///
    /// `timestamp` defaults to the current wall clock when `None`.
    /// `prompt` defaults to the empty string when `None`.
    pub fn submit(
        &self,
        payload: Vec<u8>,
        timestamp: Option<f64>,
        prompt: Option<String>,
    ) -> SubmitOutcome {
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = timestamp.unwrap_or_else(wall_clock_secs);
        let prompt = prompt.unwrap_or_default();
        let frame = Frame::new(index, timestamp, prompt, payload);

        let mut queue = self.queue.lock().unwrap();
        if queue.len() < self.capacity {
            queue.push_back(frame);
            return SubmitOutcome::Admitted {
                index,
                evicted: false,
            };
        }

        // Overflow: evict oldest, retry once.
        queue.pop_front();
        if queue.len() < self.capacity {
            queue.push_back(frame);
            tracing::warn!(index, "capture queue full, evicted oldest frame");
            SubmitOutcome::Admitted {
                index,
                evicted: true,
            }
        } else {
            tracing::warn!(index, "capture queue full after eviction, dropping frame");
            SubmitOutcome::Dropped { index }
        }
    }

    /// Drains at most one frame from the queue: one call feeds at most one
    /// Frame into the fan-out loop's CaptureSlot per iteration.
    pub fn try_drain(&self) -> Option<Frame> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Current value of the monotonic frame-index counter, used by the
    /// collector to bound stale indices.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_monotonic_and_unique() {
        let q = CaptureQueue::new(10);
        for i in 0..20u64 {
            let outcome = q.submit(vec![], Some(0.0), None);
            assert_eq!(outcome.index(), i);
        }
    }

    #[test]
    fn overflow_evicts_oldest_then_admits() {
        let q = CaptureQueue::new(2);
        q.submit(vec![1], Some(0.0), None);
        q.submit(vec![2], Some(0.0), None);
        let outcome = q.submit(vec![3], Some(0.0), None);
        assert_eq!(outcome, SubmitOutcome::Admitted { index: 2, evicted: true });
        assert_eq!(q.len(), 2);
        let first = q.try_drain().unwrap();
        assert_eq!(first.payload, vec![2]);
    }

    #[test]
    fn overload_drop_scenario() {
        // 100 submits with nothing draining;
        // counter reaches 100, queue saturates at capacity, never errors.
        let q = CaptureQueue::new(10);
        for _ in 0..100 {
            q.submit(vec![0u8; 4], Some(0.0), None);
        }
        assert_eq!(q.counter(), 100);
        assert_eq!(q.len(), 10);
    }

    #[test]
    fn drain_takes_at_most_one_at_a_time() {
        let q = CaptureQueue::new(10);
        q.submit(vec![1], Some(0.0), None);
        q.submit(vec![2], Some(0.0), None);
        assert_eq!(q.try_drain().unwrap().payload, vec![1]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn timestamp_defaults_to_wall_clock() {
        let q = CaptureQueue::new(4);
        q.submit(vec![9], None, None);
        let frame = q.try_drain().unwrap();
        assert!(frame.timestamp > 0.0);
    }
}
