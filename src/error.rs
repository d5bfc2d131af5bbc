//! Error types for the distributor and worker processes.
//!
//! One enum per failure boundary:
//! transport errors never propagate as surfaced errors for data-plane
//! messages (loss is silent, logged at the call site) — these types exist
//! for the handful of cases that *are* allowed to fail a process: startup
//! (bind/connect) and configuration validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("expected {expected} message parts, received {actual}")]
    MalformedMessage { expected: usize, actual: usize },

    #[error("message part was not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("message part {0:?} was not a valid decimal number")]
    InvalidNumber(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("failed to bind distribution socket on port {port}: {source}")]
    BindDistribute { port: u16, source: zmq::Error },

    #[error("failed to bind collection socket on port {port}: {source}")]
    BindCollect { port: u16, source: zmq::Error },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("trace export failed: {0}")]
    TraceExport(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to connect distribution socket to {host}:{port}: {source}")]
    ConnectDistribute {
        host: String,
        port: u16,
        source: zmq::Error,
    },

    #[error("failed to connect collection socket to {host}:{port}: {source}")]
    ConnectCollect {
        host: String,
        port: u16,
        source: zmq::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
