//! Single-threaded worker loop.
//!
//! State machine: AnnounceReady -> AwaitFrame -> Receive -> Transform ->
//! Return, repeated for as long as the process runs. All batch members
//! share one `(start_ts, end_ts)` pair — the batch's processing interval,
//! not a per-frame one — and the prompt of the *last* frame in the batch
//! governs the whole batch's transform call.

use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::frame::ProcessedFrame;
use crate::transform::Transform;
use crate::transport::{DistributeClient, FrameSink, WOULD_BLOCK_SLEEP};

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

struct PendingBatch {
    indices: Vec<u64>,
    prompt: String,
    payloads: Vec<Vec<u8>>,
}

impl PendingBatch {
    fn new() -> Self {
        Self {
            indices: Vec::new(),
            prompt: String::new(),
            payloads: Vec::new(),
        }
    }

    fn push(&mut self, index: u64, prompt: String, payload: Vec<u8>) {
        self.indices.push(index);
        // Last frame in the batch wins.
        self.prompt = prompt;
        self.payloads.push(payload);
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn clear(&mut self) {
        self.indices.clear();
        self.prompt.clear();
        self.payloads.clear();
    }
}

pub struct Worker {
    config: WorkerConfig,
    worker_id: u64,
    transform: Box<dyn Transform>,
    batch: PendingBatch,
}

impl Worker {
    pub fn new(config: WorkerConfig, transform: Box<dyn Transform>) -> Result<Self, WorkerError> {
        config.validate()?;
        Ok(Self {
            config,
            worker_id: std::process::id() as u64,
            transform,
            batch: PendingBatch::new(),
        })
    }

    /// One AnnounceReady step: sends `READY`, sleeping briefly and
    /// retrying on backpressure.
    pub fn announce_ready(&self, client: &DistributeClient) -> Result<(), zmq::Error> {
        loop {
            if client.announce_ready()? {
                return Ok(());
            }
            thread::sleep(WOULD_BLOCK_SLEEP);
        }
    }

    /// One AwaitFrame+Receive step: polls for a single `(index, prompt,
    /// payload)` and appends it to the pending batch. Returns `true` once
    /// the batch has reached `batch_size` and is ready to transform.
    pub fn receive_once(&mut self, client: &DistributeClient) -> bool {
        let (index, prompt, payload) = match client.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame message, ignoring");
                return false;
            }
        };
        self.ingest_frame(index, prompt, payload)
    }

    /// Appends one received frame to the pending batch, applying the
    /// configured artificial delay. Returns `true` once the batch has
    /// reached `batch_size` and is ready to transform. Split out of
    /// [`Worker::receive_once`] so it can be driven directly in tests
    /// without a live socket.
    fn ingest_frame(&mut self, index: u64, prompt: String, payload: Vec<u8>) -> bool {
        if self.config.delay > 0.0 {
            thread::sleep(std::time::Duration::from_secs_f64(self.config.delay));
        }

        self.batch.push(index, prompt, payload);
        self.batch.len() >= self.config.batch_size
    }

    /// Transform + Return steps. On any transport failure while pushing
    /// results, the whole batch is discarded after logging.
    pub fn transform_and_return(&mut self, collector: &dyn FrameSink) {
        if self.batch.len() == 0 {
            return;
        }
        let start_ts = wall_clock_secs();
        let result = self.transform.apply(&self.batch.payloads, &self.batch.prompt);
        let end_ts = wall_clock_secs();

        let outputs = match result {
            Ok(outputs) if outputs.len() == self.batch.len() => outputs,
            Ok(outputs) => {
                tracing::warn!(
                    expected = self.batch.len(),
                    actual = outputs.len(),
                    transform = self.transform.name(),
                    "transform returned a mismatched batch length, discarding batch"
                );
                self.batch.clear();
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, transform = self.transform.name(), "transform failed, discarding batch");
                self.batch.clear();
                return;
            }
        };

        for (index, payload) in self.batch.indices.iter().zip(outputs.into_iter()) {
            let processed = ProcessedFrame::new(*index, self.worker_id, start_ts, end_ts, payload);
            if let Err(e) = collector.send(&processed) {
                tracing::warn!(error = %e, index, "failed to push processed frame, discarding rest of batch");
                break;
            }
        }
        self.batch.clear();
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Identity;

    fn worker() -> Worker {
        Worker::new(WorkerConfig::default(), Box::new(Identity)).unwrap()
    }

    #[test]
    fn pending_batch_tracks_last_prompt() {
        let mut batch = PendingBatch::new();
        batch.push(0, "first".to_string(), vec![1]);
        batch.push(1, "second".to_string(), vec![2]);
        assert_eq!(batch.prompt, "second");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn pending_batch_clear_resets_state() {
        let mut batch = PendingBatch::new();
        batch.push(0, "p".to_string(), vec![1]);
        batch.clear();
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.prompt, "");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut cfg = WorkerConfig::default();
        cfg.batch_size = 0;
        assert!(Worker::new(cfg, Box::new(Identity)).is_err());
    }

    #[test]
    fn worker_id_matches_process_id() {
        let w = worker();
        assert_eq!(w.worker_id(), std::process::id() as u64);
    }

    #[test]
    fn batch_accumulation_reaches_threshold_without_sockets() {
        // Exercises the PendingBatch half of Receive directly; the socket
        // poll itself is exercised only against a live zmq context, which
        // unit tests here intentionally avoid.
        let mut batch = PendingBatch::new();
        for i in 0..2u64 {
            batch.push(i, format!("p{i}"), vec![i as u8]);
        }
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.prompt, "p1");
    }

    #[derive(Default)]
    struct VecSink {
        sent: std::cell::RefCell<Vec<ProcessedFrame>>,
    }

    impl FrameSink for VecSink {
        fn send(&self, processed: &ProcessedFrame) -> Result<(), zmq::Error> {
            self.sent.borrow_mut().push(processed.clone());
            Ok(())
        }
    }

    #[test]
    fn batch_size_two_shares_timestamps_and_batches_are_disjoint() {
        // Scenario 5: one worker, batch_size=2, four frames submitted ->
        // exactly two batches. Every ProcessedFrame in a batch shares one
        // (start_ts, end_ts); the two batches' intervals don't overlap.
        let mut cfg = WorkerConfig::default();
        cfg.batch_size = 2;
        let mut w = Worker::new(cfg, Box::new(Identity)).unwrap();
        let sink = VecSink::default();

        assert!(!w.ingest_frame(0, "p0".to_string(), vec![0]));
        assert!(w.ingest_frame(1, "p1".to_string(), vec![1]));
        w.transform_and_return(&sink);

        thread::sleep(std::time::Duration::from_millis(10));

        assert!(!w.ingest_frame(2, "p2".to_string(), vec![2]));
        assert!(w.ingest_frame(3, "p3".to_string(), vec![3]));
        w.transform_and_return(&sink);

        let sent = sink.sent.into_inner();
        assert_eq!(sent.len(), 4);

        let (first_batch, second_batch) = sent.split_at(2);
        assert_eq!(first_batch[0].start_ts, first_batch[1].start_ts);
        assert_eq!(first_batch[0].end_ts, first_batch[1].end_ts);
        assert_eq!(second_batch[0].start_ts, second_batch[1].start_ts);
        assert_eq!(second_batch[0].end_ts, second_batch[1].end_ts);

        assert!(
            second_batch[0].start_ts > first_batch[0].end_ts,
            "batches' processing intervals must be disjoint"
        );

        assert_eq!(
            sent.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }
}
