//! Configuration structures for the distributor and worker processes.
//!
//! Plain structs, a `Default` impl documenting the defaults, and a
//! `validate()` that runs before any socket is touched.

use crate::error::ConfigError;

/// Configuration for the capture-host `distributor` process.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// TCP port the fan-out ROUTER socket binds to.
    pub distribute_port: u16,
    /// TCP port the collection PULL socket binds to.
    pub collect_port: u16,
    /// Playout lag, in frames, behind the latest received index.
    pub frame_delay: u64,
    /// Hard cap on the number of entries kept in the reorder buffer.
    pub buffer_capacity: usize,
    /// Capacity of the bounded capture queue.
    pub capture_queue_size: usize,
    /// Whether to record trace events and flush them on shutdown.
    pub enable_trace_export: bool,
    /// Path the Perfetto-compatible trace JSON is written to on shutdown.
    pub trace_output: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            distribute_port: 5555,
            collect_port: 5556,
            frame_delay: 5,
            buffer_capacity: 50,
            capture_queue_size: 10,
            enable_trace_export: false,
            trace_output: "webcam_frame_timing.pftrace".to_string(),
        }
    }
}

impl DistributorConfig {
    /// Validates the configuration. Called before any socket is bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_delay == 0 {
            return Err(ConfigError::Invalid(
                "frame_delay must be greater than 0".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "buffer_capacity must be greater than 0".to_string(),
            ));
        }
        if self.capture_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "capture_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.distribute_port == self.collect_port {
            return Err(ConfigError::Invalid(
                "distribute_port and collect_port must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which pluggable transform a worker process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    Inverter,
    Diffusion,
}

/// Configuration for a `worker` process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub host: String,
    pub distribute_port: u16,
    pub collect_port: u16,
    /// Number of frames accumulated per transform invocation. Must be >= 1.
    pub batch_size: usize,
    /// Artificial per-frame sleep, for testing the playout scheduler under load.
    pub delay: f64,
    pub transform: TransformKind,
    /// HTTP endpoint for the diffusion transform. Required iff `transform == Diffusion`.
    pub diffusion_endpoint: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            distribute_port: 5555,
            collect_port: 5556,
            batch_size: 1,
            delay: 0.0,
            transform: TransformKind::Identity,
            diffusion_endpoint: None,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.delay < 0.0 {
            return Err(ConfigError::Invalid(
                "delay must not be negative".to_string(),
            ));
        }
        if self.distribute_port == self.collect_port {
            return Err(ConfigError::Invalid(
                "distribute_port and collect_port must differ".to_string(),
            ));
        }
        if self.transform == TransformKind::Diffusion && self.diffusion_endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "diffusion transform requires --diffusion-endpoint".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributor_defaults_match_spec() {
        let cfg = DistributorConfig::default();
        assert_eq!(cfg.distribute_port, 5555);
        assert_eq!(cfg.collect_port, 5556);
        assert_eq!(cfg.frame_delay, 5);
        assert_eq!(cfg.buffer_capacity, 50);
        assert_eq!(cfg.capture_queue_size, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn distributor_rejects_zero_frame_delay() {
        let mut cfg = DistributorConfig::default();
        cfg.frame_delay = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn distributor_rejects_matching_ports() {
        let mut cfg = DistributorConfig::default();
        cfg.collect_port = cfg.distribute_port;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn worker_defaults_are_valid() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.batch_size, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn worker_diffusion_requires_endpoint() {
        let mut cfg = WorkerConfig::default();
        cfg.transform = TransformKind::Diffusion;
        assert!(cfg.validate().is_err());
        cfg.diffusion_endpoint = Some("http://localhost:8001/transform".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn worker_rejects_zero_batch_size() {
        let mut cfg = WorkerConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}
