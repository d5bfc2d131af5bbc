//! Wire transport: thin wrappers over `zmq` sockets implementing the two
//! channels.
//!
//! - **Distribution channel**: capture host binds a `ROUTER`, workers
//!   connect a `DEALER`. Workers pull on demand with a single-part
//!   `"READY"`; the capture host replies with the routing identity frame
//!   followed by `(index, prompt, payload)`.
//! - **Collection channel**: capture host binds a `PULL`, workers connect
//!   a `PUSH`. Each worker reply is `(index, worker_id, start_ts, end_ts,
//!   payload)`, five parts, no routing identity (PUSH/PULL is unidirectional
//!   and anonymous).
//!
//! Every poll uses a ~10 ms timeout throughout; a
//! timeout is not an error; it is the normal "nothing is ready yet" case.

use std::time::Duration;

use crate::error::TransportError;
use crate::frame::{Frame, ProcessedFrame};

/// Poll timeout used by every loop in this crate.
pub const POLL_TIMEOUT_MS: i64 = 10;

/// Sleep applied when a send would block.
pub const WOULD_BLOCK_SLEEP: Duration = Duration::from_millis(1);

fn decimal(bytes: &[u8]) -> Result<String, TransportError> {
    String::from_utf8(bytes.to_vec()).map_err(TransportError::InvalidUtf8)
}

fn parse_u64(s: &str) -> Result<u64, TransportError> {
    s.parse().map_err(|_| TransportError::InvalidNumber(s.to_string()))
}

fn parse_f64(s: &str) -> Result<f64, TransportError> {
    s.parse().map_err(|_| TransportError::InvalidNumber(s.to_string()))
}

/// ROUTER side of the distribution channel, owned by the distributor's
/// fan-out loop.
pub struct DistributeServer {
    socket: zmq::Socket,
}

impl DistributeServer {
    pub fn bind(ctx: &zmq::Context, port: u16) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::ROUTER)?;
        socket.bind(&format!("tcp://*:{port}"))?;
        Ok(Self { socket })
    }

    /// Polls for a single `READY` request. Returns the client's routing
    /// identity if one arrived within the timeout.
    pub fn poll_ready(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.socket.poll(zmq::POLLIN, POLL_TIMEOUT_MS)? == 0 {
            return Ok(None);
        }
        let parts = self.socket.recv_multipart(zmq::DONTWAIT)?;
        if parts.len() != 2 {
            return Err(TransportError::MalformedMessage {
                expected: 2,
                actual: parts.len(),
            });
        }
        let identity = parts[0].clone();
        let message = decimal(&parts[1])?;
        if message != "READY" {
            return Err(TransportError::MalformedMessage {
                expected: 2,
                actual: parts.len(),
            });
        }
        Ok(Some(identity))
    }

    /// Sends `(index, prompt, payload)` to the client addressed by `identity`.
    pub fn send_frame(&self, identity: &[u8], frame: &Frame) -> Result<(), zmq::Error> {
        self.socket.send_multipart(
            [
                identity.to_vec(),
                frame.index.to_string().into_bytes(),
                frame.prompt.clone().into_bytes(),
                frame.payload.clone(),
            ],
            zmq::DONTWAIT,
        )
    }
}

/// PULL side of the collection channel, owned by the distributor's
/// collector loop.
pub struct CollectServer {
    socket: zmq::Socket,
}

impl CollectServer {
    pub fn bind(ctx: &zmq::Context, port: u16) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::PULL)?;
        socket.bind(&format!("tcp://*:{port}"))?;
        Ok(Self { socket })
    }

    /// Polls for a single processed-frame message.
    pub fn poll_processed(&self) -> Result<Option<ProcessedFrame>, TransportError> {
        if self.socket.poll(zmq::POLLIN, POLL_TIMEOUT_MS)? == 0 {
            return Ok(None);
        }
        let parts = self.socket.recv_multipart(zmq::DONTWAIT)?;
        if parts.len() != 5 {
            return Err(TransportError::MalformedMessage {
                expected: 5,
                actual: parts.len(),
            });
        }
        let index = parse_u64(&decimal(&parts[0])?)?;
        let worker_id = parse_u64(&decimal(&parts[1])?)?;
        let start_ts = parse_f64(&decimal(&parts[2])?)?;
        let end_ts = parse_f64(&decimal(&parts[3])?)?;
        let payload = parts[4].clone();
        Ok(Some(ProcessedFrame::new(
            index, worker_id, start_ts, end_ts, payload,
        )))
    }
}

/// DEALER side of the distribution channel, owned by a worker process.
pub struct DistributeClient {
    socket: zmq::Socket,
}

impl DistributeClient {
    pub fn connect(ctx: &zmq::Context, host: &str, port: u16) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::DEALER)?;
        socket.connect(&format!("tcp://{host}:{port}"))?;
        Ok(Self { socket })
    }

    /// Sends `READY`. Returns `false` if the send would block (caller
    /// should sleep [`WOULD_BLOCK_SLEEP`] and retry).
    pub fn announce_ready(&self) -> Result<bool, zmq::Error> {
        match self.socket.send("READY", zmq::DONTWAIT) {
            Ok(()) => Ok(true),
            Err(zmq::Error::EAGAIN) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Polls for a single `(index, prompt, payload)` response.
    pub fn poll_frame(&self) -> Result<Option<(u64, String, Vec<u8>)>, TransportError> {
        if self.socket.poll(zmq::POLLIN, POLL_TIMEOUT_MS)? == 0 {
            return Ok(None);
        }
        let parts = self.socket.recv_multipart(zmq::DONTWAIT)?;
        if parts.len() != 3 {
            return Err(TransportError::MalformedMessage {
                expected: 3,
                actual: parts.len(),
            });
        }
        let index = parse_u64(&decimal(&parts[0])?)?;
        let prompt = decimal(&parts[1])?;
        let payload = parts[2].clone();
        Ok(Some((index, prompt, payload)))
    }
}

/// PUSH side of the collection channel, owned by a worker process.
pub struct CollectClient {
    socket: zmq::Socket,
}

impl CollectClient {
    pub fn connect(ctx: &zmq::Context, host: &str, port: u16) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::PUSH)?;
        socket.connect(&format!("tcp://{host}:{port}"))?;
        Ok(Self { socket })
    }

    /// Sends one processed frame's five-part message.
    pub fn send_processed(&self, processed: &ProcessedFrame) -> Result<(), zmq::Error> {
        self.socket.send_multipart(
            [
                processed.index.to_string().into_bytes(),
                processed.worker_id.to_string().into_bytes(),
                processed.start_ts.to_string().into_bytes(),
                processed.end_ts.to_string().into_bytes(),
                processed.payload.clone(),
            ],
            zmq::DONTWAIT,
        )
    }
}

/// The Return step's destination for a transformed batch (§4.3). Lets the
/// worker's Transform+Return logic be exercised against a fake sink in
/// tests without a live `zmq` connection.
pub trait FrameSink {
    fn send(&self, processed: &ProcessedFrame) -> Result<(), zmq::Error>;
}

impl FrameSink for CollectClient {
    fn send(&self, processed: &ProcessedFrame) -> Result<(), zmq::Error> {
        self.send_processed(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_roundtrip() {
        assert_eq!(parse_u64("42").unwrap(), 42);
        assert_eq!(parse_f64("1.5").unwrap(), 1.5);
        assert!(parse_u64("not-a-number").is_err());
    }
}
