//! Reorder buffer and playout clock.
//!
//! The reorder buffer and the two counters it is advanced against are
//! concentrated behind one mutex-guarded [`PlayoutState`] rather than
//! message-passed between the
//! collector and the renderer. Callers only ever see three operations:
//! [`PlayoutState::ingest`] (collector), [`PlayoutState::tick`] and
//! [`PlayoutState::get_current`] (renderer). The mutex is held only for map
//! operations and counter updates — no I/O ever runs under it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::frame::ProcessedFrame;

/// Snapshot of the playout counters, for diagnostics (`get_frame_stats` in
/// the original `distributor.py`).
#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    pub buffer_size: usize,
    pub current_display_frame: u64,
    pub latest_received_frame: i64,
    pub frame_delay: u64,
}

struct Inner {
    buffer: BTreeMap<u64, ProcessedFrame>,
    /// -1 means nothing has been received yet (ported from the original's
    /// `latest_received_frame = -1` sentinel).
    latest_received: i64,
    current_display: u64,
}

/// The mutex-guarded playout object.
pub struct PlayoutState {
    inner: Mutex<Inner>,
    frame_delay: u64,
    buffer_capacity: usize,
}

impl PlayoutState {
    pub fn new(frame_delay: u64, buffer_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: BTreeMap::new(),
                latest_received: -1,
                current_display: 0,
            }),
            frame_delay,
            buffer_capacity,
        }
    }

    /// Ingests a processed frame.
    ///
    /// `capture_counter` is the distributor's live frame-index counter,
    /// used as the stale-index upper bound: an index greater than the
    /// counter can only have come from a worker replying against a prior
    /// capture session, and is dropped with a log rather than inserted.
    ///
    /// Returns `true` if the frame was admitted, `false` if dropped as
    /// stale.
    pub fn ingest(&self, processed: ProcessedFrame, capture_counter: u64) -> bool {
        if processed.index > capture_counter {
            tracing::warn!(
                index = processed.index,
                capture_counter,
                "dropping processed frame with index beyond the capture counter"
            );
            return false;
        }

        let mut inner = self.inner.lock().unwrap();
        let index = processed.index;
        inner.buffer.insert(index, processed);
        inner.latest_received = inner.latest_received.max(index as i64);

        let current_display = inner.current_display;
        inner.buffer.retain(|&idx, _| idx >= current_display);

        while inner.buffer.len() > self.buffer_capacity {
            if let Some(&smallest) = inner.buffer.keys().next() {
                inner.buffer.remove(&smallest);
            } else {
                break;
            }
        }
        true
    }

    /// Advances the playout clock by at most one step.
    ///
    /// Returns `(advanced, target_index)`. `target_index` is only
    /// meaningful when `advanced` is `true`.
    ///
    /// Whenever `latest_received >= frame_delay`, `distributor.py`'s
    /// `update_display_frame` assigns `current_display_frame = target_frame`
    /// and returns `True` unconditionally — both its branches do the
    /// identical assignment, so the "target present or target > current"
    /// check is a no-op in the ground truth. That assignment is clamped
    /// here to `current_display.max(target)` rather than applied bare: once
    /// the warm-up phase has advanced `current_display` ahead of
    /// `latest_received - frame_delay` (reachable right as `latest_received`
    /// crosses `frame_delay`), an unclamped assignment would regress
    /// `current_display`, which spec's own monotonicity invariant forbids.
    /// The clamp preserves the original's "always advance, always report
    /// true" behavior without reintroducing that regression.
    pub fn tick(&self) -> (bool, Option<u64>) {
        let mut inner = self.inner.lock().unwrap();
        let latest = inner.latest_received;
        let delay = self.frame_delay as i64;

        if latest >= delay {
            let target = (latest - delay) as u64;
            let advanced_to = inner.current_display.max(target);
            inner.current_display = advanced_to;
            inner.buffer.retain(|&idx, _| idx >= advanced_to);
            return (true, Some(advanced_to));
        }

        if latest > 0 && inner.current_display < latest as u64 {
            let advanced_to = latest as u64;
            inner.current_display = advanced_to;
            inner.buffer.retain(|&idx, _| idx >= advanced_to);
            return (true, Some(advanced_to));
        }

        (false, None)
    }

    /// Returns the payload to display for the current display-frame index:
    /// the exact entry if present, otherwise the closest available index
    /// (ties broken toward the smaller index), otherwise `None` if the
    /// buffer is empty.
    pub fn get_current(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let target = inner.current_display;

        if let Some(frame) = inner.buffer.get(&target) {
            return Some(frame.payload.clone());
        }

        inner
            .buffer
            .keys()
            .min_by_key(|&&idx| {
                let diff = idx.abs_diff(target);
                // Ties broken toward the smaller index: bias the key by
                // preferring idx < target on equal distance.
                (diff, idx >= target)
            })
            .and_then(|idx| inner.buffer.get(idx))
            .map(|frame| frame.payload.clone())
    }

    pub fn stats(&self) -> FrameStats {
        let inner = self.inner.lock().unwrap();
        FrameStats {
            buffer_size: inner.buffer.len(),
            current_display_frame: inner.current_display,
            latest_received_frame: inner.latest_received,
            frame_delay: self.frame_delay,
        }
    }

    pub fn current_display_frame(&self) -> u64 {
        self.inner.lock().unwrap().current_display
    }

    pub fn latest_received_frame(&self) -> i64 {
        self.inner.lock().unwrap().latest_received
    }

    pub fn buffer_len(&self) -> usize {
        self.inner.lock().unwrap().buffer.len()
    }

    pub fn contains(&self, index: u64) -> bool {
        self.inner.lock().unwrap().buffer.contains_key(&index)
    }
}
