//! In-flight frame types shared by the distributor and the worker loop.
//!
//! A [`Frame`] travels capture host -> worker; a [`ProcessedFrame`] travels
//! worker -> capture host. Both are opaque-payload envelopes: the pipeline
//! never interprets `payload`, it only indexes, reorders and times it.

/// A frame handed to a worker for processing.
///
/// `index` is assigned once, by the capture host's monotonic counter, and
/// never changes afterwards. `prompt` rides along unchanged end to end even
/// when empty.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub timestamp: f64,
    pub prompt: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, prompt: String, payload: Vec<u8>) -> Self {
        Self {
            index,
            timestamp,
            prompt,
            payload,
        }
    }
}

/// A frame returned by a worker after running the pluggable transform.
///
/// `index` echoes the originating [`Frame::index`]. `start_ts`/`end_ts` are
/// wall-clock seconds on the *worker*, not the capture host — they are
/// opaque diagnostic labels, never to be diffed against capture-host time
/// across hosts.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub index: u64,
    pub worker_id: u64,
    pub start_ts: f64,
    pub end_ts: f64,
    pub payload: Vec<u8>,
}

impl ProcessedFrame {
    pub fn new(index: u64, worker_id: u64, start_ts: f64, end_ts: f64, payload: Vec<u8>) -> Self {
        Self {
            index,
            worker_id,
            start_ts,
            end_ts,
            payload,
        }
    }
}
