//! The capture-host orchestrator.
//!
//! A [`Distributor`] owns the three pieces of shared state that the
//! independent loops talk through rather than to each other directly: the
//! bounded [`CaptureQueue`], a single-slot "current frame to serve" cell,
//! and the mutex-guarded [`PlayoutState`].
//! `run_fan_out` and `run_collect` are meant to be driven from separate
//! threads (or, in a single-threaded harness, interleaved by the caller);
//! neither ever blocks past its socket's poll timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::capture_queue::CaptureQueue;
use crate::config::DistributorConfig;
use crate::error::DistributorError;
use crate::frame::Frame;
use crate::reorder::PlayoutState;
use crate::trace::TraceLog;
use crate::transport::{CollectServer, DistributeServer};

/// The single frame currently offered to requesting workers, plus the
/// high-water mark of the last index actually sent (one watermark shared
/// by all workers, not one per client —
/// a worker that asks again before a newer frame lands simply gets nothing
/// back this round, rather than a repeat).
struct CaptureSlot {
    current: Option<Frame>,
    last_frame_sent: i64,
}

impl CaptureSlot {
    fn new() -> Self {
        Self {
            current: None,
            last_frame_sent: -1,
        }
    }
}

pub struct Distributor {
    config: DistributorConfig,
    queue: CaptureQueue,
    slot: Mutex<CaptureSlot>,
    playout: PlayoutState,
    trace: TraceLog,
    running: AtomicBool,
}

impl Distributor {
    pub fn new(config: DistributorConfig) -> Result<Self, DistributorError> {
        config.validate()?;
        let playout = PlayoutState::new(config.frame_delay, config.buffer_capacity);
        let trace = TraceLog::new(config.enable_trace_export);
        Ok(Self {
            queue: CaptureQueue::new(config.capture_queue_size),
            slot: Mutex::new(CaptureSlot::new()),
            playout,
            trace,
            running: AtomicBool::new(true),
            config,
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Submits a freshly captured frame.
    pub fn submit_frame(&self, payload: Vec<u8>, prompt: Option<String>) -> u64 {
        let outcome = self.queue.submit(payload, None, prompt);
        if let crate::capture_queue::SubmitOutcome::Admitted { index, .. } = outcome {
            self.trace.frame_captured(index, wall_clock_secs());
        }
        outcome.index()
    }

    /// One iteration of the fan-out loop: drain at most
    /// one frame into the slot, then answer at most one pending `READY`.
    /// Transport and framing failures are logged and otherwise swallowed —
    /// the fan-out loop never stops running over a single bad client.
    pub fn fan_out_once(&self, server: &DistributeServer) {
        if let Some(frame) = self.queue.try_drain() {
            let mut slot = self.slot.lock().unwrap();
            slot.current = Some(frame);
        }

        let identity = match server.poll_ready() {
            Ok(Some(identity)) => identity,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "malformed READY request, ignoring");
                return;
            }
        };

        let mut slot = self.slot.lock().unwrap();
        let Some(frame) = slot.current.clone() else {
            return;
        };
        if frame.index as i64 <= slot.last_frame_sent {
            // Nothing newer than what this worker (or the last one) already
            // received; let it spin until the next capture lands.
            return;
        }
        match server.send_frame(&identity, &frame) {
            Ok(()) => slot.last_frame_sent = frame.index as i64,
            Err(e) => {
                tracing::warn!(error = %e, index = frame.index, "failed to send frame to worker")
            }
        }
    }

    /// One iteration of the collector loop: poll for a
    /// single processed frame and ingest it into the playout buffer.
    pub fn collect_once(&self, server: &CollectServer) {
        let processed = match server.poll_processed() {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "malformed processed-frame message, ignoring");
                return;
            }
        };
        let index = processed.index;
        let worker_id = processed.worker_id;
        let start_ts = processed.start_ts;
        let end_ts = processed.end_ts;
        if self.playout.ingest(processed, self.queue.counter()) {
            self.trace
                .frame_processed_received(index, start_ts, end_ts, worker_id);
        }
    }

    /// One iteration of the render/playout loop.
    /// Returns the frame payload to display this tick, if the clock
    /// advanced and a frame is available.
    pub fn render_tick(&self) -> Option<Vec<u8>> {
        self.playout.tick();
        self.playout.get_current()
    }

    pub fn stats(&self) -> crate::reorder::FrameStats {
        self.playout.stats()
    }

    /// Ingests an already-received [`crate::frame::ProcessedFrame`] without
    /// going through a transport socket. Used by tests that exercise the
    /// collector + playout path end to end against synthetic timelines.
    pub fn ingest_processed(&self, processed: crate::frame::ProcessedFrame) -> bool {
        self.playout.ingest(processed, self.queue.counter())
    }

    pub fn capture_counter(&self) -> u64 {
        self.queue.counter()
    }

    pub fn last_frame_sent(&self) -> i64 {
        self.slot.lock().unwrap().last_frame_sent
    }

    pub fn flush_trace(&self) -> Result<(), DistributorError> {
        self.trace
            .flush(&self.config.trace_output)
            .map_err(DistributorError::from)
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }
}

fn wall_clock_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
