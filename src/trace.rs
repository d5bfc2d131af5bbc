//! Trace log: an optional, append-only recorder of
//! per-frame capture instants and per-frame processed intervals, flushed
//! to a Chrome/Perfetto-compatible JSON file on shutdown.
//!
//! Field names and the `traceEvents` envelope are carried over directly
//! from `distributor.py`'s `log_frame_timing` / `log_frame_complete_timing`
//! / `export_perfetto_trace`.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// One instant event: a point in time, e.g. `frame_captured`.
#[derive(Debug, Clone, Serialize)]
struct InstantEvent {
    name: String,
    ph: &'static str,
    ts: i64,
    pid: u32,
    tid: u64,
    args: InstantArgs,
}

#[derive(Debug, Clone, Serialize)]
struct InstantArgs {
    frame_index: u64,
    event_type: &'static str,
    absolute_timestamp: f64,
}

/// One complete (interval) event: a span with a duration, e.g.
/// `frame_inverted_received`.
#[derive(Debug, Clone, Serialize)]
struct CompleteEvent {
    name: String,
    ph: &'static str,
    ts: i64,
    dur: i64,
    pid: u64,
    tid: u64,
    args: CompleteArgs,
}

#[derive(Debug, Clone, Serialize)]
struct CompleteArgs {
    frame_index: u64,
    event_type: &'static str,
    begin_timestamp: f64,
    end_timestamp: f64,
    duration_ms: f64,
}

#[derive(Serialize)]
struct TraceFile {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<serde_json::Value>,
}

enum Event {
    Instant(InstantEvent),
    Complete(CompleteEvent),
}

/// Append-only trace recorder. Cheap no-op when disabled, so callers don't
/// need to branch on `enabled` themselves.
pub struct TraceLog {
    enabled: bool,
    trace_start: f64,
    events: Mutex<Vec<Event>>,
}

impl TraceLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            trace_start: wall_clock_secs(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Offset of a wall-clock timestamp from this trace's start, matching
    /// `distributor.py::log_frame_complete_timing`'s
    /// `begin_time - self.trace_start_time`.
    fn relative(&self, timestamp: f64) -> f64 {
        timestamp - self.trace_start
    }

    /// Records `frame_captured(index, timestamp)`.
    pub fn frame_captured(&self, index: u64, timestamp: f64) {
        if !self.enabled {
            return;
        }
        let relative = self.relative(timestamp);
        let event = InstantEvent {
            name: format!("Frame {index} - frame_captured"),
            ph: "i",
            ts: (relative * 1_000_000.0) as i64,
            pid: std::process::id(),
            tid: thread_id(),
            args: InstantArgs {
                frame_index: index,
                event_type: "frame_captured",
                absolute_timestamp: timestamp,
            },
        };
        self.events.lock().unwrap().push(Event::Instant(event));
    }

    /// Records `frame_inverted_received(index, begin, end, worker_id)`.
    pub fn frame_processed_received(
        &self,
        index: u64,
        begin_ts: f64,
        end_ts: f64,
        worker_id: u64,
    ) {
        if !self.enabled {
            return;
        }
        let begin_relative = self.relative(begin_ts);
        let end_relative = self.relative(end_ts);
        let duration = end_relative - begin_relative;
        let event = CompleteEvent {
            name: format!("Frame {index} - frame_inverted_received"),
            ph: "X",
            ts: (begin_relative * 1_000_000.0) as i64,
            dur: (duration * 1_000_000.0) as i64,
            pid: worker_id,
            tid: thread_id(),
            args: CompleteArgs {
                frame_index: index,
                event_type: "frame_inverted_received",
                begin_timestamp: begin_ts,
                end_timestamp: end_ts,
                duration_ms: duration * 1000.0,
            },
        };
        self.events.lock().unwrap().push(Event::Complete(event));
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the recorded events into the Perfetto-compatible
    /// top-level `{"traceEvents": [...]}` envelope.
    pub fn to_json(&self) -> serde_json::Value {
        let events = self.events.lock().unwrap();
        let trace_events: Vec<serde_json::Value> = events
            .iter()
            .map(|e| match e {
                Event::Instant(ev) => serde_json::to_value(ev).unwrap(),
                Event::Complete(ev) => serde_json::to_value(ev).unwrap(),
            })
            .collect();
        serde_json::to_value(TraceFile { trace_events }).unwrap()
    }

    /// Flushes the trace to `path` if tracing is enabled and at least one
    /// event was recorded; no-op otherwise.
    pub fn flush(&self, path: &str) -> std::io::Result<()> {
        if !self.enabled || self.is_empty() {
            return Ok(());
        }
        let json = self.to_json();
        let mut file = File::create(path)?;
        file.write_all(serde_json::to_string_pretty(&json)?.as_bytes())?;
        tracing::info!(path, events = self.len(), "trace exported");
        Ok(())
    }
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn thread_id() -> u64 {
    // `std::thread::ThreadId` has no stable numeric conversion; hash it
    // down to a u64 for the trace's `tid` field, which only needs to
    // distinguish threads from each other, not match OS thread ids.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trace_records_nothing() {
        let trace = TraceLog::new(false);
        trace.frame_captured(0, 0.0);
        trace.frame_processed_received(0, 0.0, 0.01, 1);
        assert_eq!(trace.len(), 0);
    }

    #[test]
    fn enabled_trace_records_events_with_non_negative_duration() {
        // Scenario 6: 5 submitted+processed frames, expect >=5 events with
        // ph="X" and non-negative dur.
        let trace = TraceLog::new(true);
        for i in 0..5u64 {
            trace.frame_captured(i, i as f64 * 0.05);
            trace.frame_processed_received(i, i as f64 * 0.05, i as f64 * 0.05 + 0.01, 123);
        }
        assert_eq!(trace.len(), 10);
        let json = trace.to_json();
        let events = json["traceEvents"].as_array().unwrap();
        let complete: Vec<_> = events.iter().filter(|e| e["ph"] == "X").collect();
        assert!(complete.len() >= 5);
        for e in &complete {
            assert!(e["dur"].as_i64().unwrap() >= 0);
        }
    }

    #[test]
    fn flush_writes_file_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let trace = TraceLog::new(true);
        trace.frame_captured(0, 0.0);
        trace.flush(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(parsed["traceEvents"].is_array());
    }

    #[test]
    fn flush_is_noop_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let trace = TraceLog::new(false);
        trace.flush(path.to_str().unwrap()).unwrap();
        assert!(!path.exists());
    }
}
