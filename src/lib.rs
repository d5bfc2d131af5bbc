//! # frame_relay
//!
//! A distributed, low-latency frame-transformation pipeline: a capture-host
//! `Distributor` fans frames out to a dynamic pool of `Worker` processes
//! over a pull-based transport, collects the transformed results, and
//! re-orders them behind a bounded playout buffer so a renderer can always
//! ask for "the current frame" without stalling on network jitter or an
//! occasional lost frame.
//!
//! ## Architecture
//!
//! - [`capture_queue`]: bounded, single-producer/single-consumer queue
//!   between the capture source and the fan-out loop.
//! - [`reorder`]: the mutex-guarded playout clock and reorder buffer shared
//!   between the collector and the renderer.
//! - [`transport`]: thin `zmq` socket wrappers for the two wire channels
//!   (ROUTER/DEALER distribution, PULL/PUSH collection).
//! - [`transform`]: the worker's pluggable per-batch transform.
//! - [`distributor`] / [`worker`]: the two process roles built on top of
//!   the above.
//! - [`trace`]: optional Perfetto-compatible timing export.
//!
//! ## Dependencies
//!
//! - **zmq**: ROUTER/DEALER and PUSH/PULL message transport.
//! - **thiserror**: structured error enums at each process boundary.
//! - **tracing** / **tracing-subscriber**: structured logging.
//! - **clap**: CLI argument parsing for both binaries.
//! - **serde** / **serde_json**: trace export and the diffusion transform's
//!   HTTP payloads.

pub mod capture_queue;
pub mod config;
pub mod distributor;
pub mod error;
pub mod frame;
pub mod reorder;
pub mod trace;
pub mod transform;
pub mod transport;
pub mod worker;
