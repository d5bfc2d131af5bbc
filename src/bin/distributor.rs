//! Capture-host binary.
//!
//! Frame ingestion from the actual capture source (camera, screen, etc.) is
//! an external collaborator — this binary is touched
//! only at its interface, here a newline-delimited JSON stream on stdin:
//! `{"prompt": "...", "payload_b64": "..."}` per line. Processed frames are
//! exposed the same way: each time the playout clock advances, the current
//! frame's raw payload is written to stdout, length-prefixed (u32 LE).

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use clap::Parser;
use frame_relay::config::DistributorConfig;
use frame_relay::distributor::Distributor;
use frame_relay::error::DistributorError;
use frame_relay::transport::{CollectServer, DistributeServer};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "distributor", about = "Capture-host frame distributor")]
struct Args {
    #[arg(long, default_value_t = 5555)]
    distribute_port: u16,

    #[arg(long, default_value_t = 5556)]
    collect_port: u16,

    #[arg(long, default_value_t = 5)]
    frame_delay: u64,

    #[arg(long, default_value_t = 50)]
    buffer_capacity: usize,

    #[arg(long, default_value_t = 10)]
    capture_queue_size: usize,

    #[arg(long, default_value_t = false)]
    enable_trace_export: bool,

    #[arg(long, default_value = "webcam_frame_timing.pftrace")]
    trace_output: String,
}

impl From<Args> for DistributorConfig {
    fn from(args: Args) -> Self {
        Self {
            distribute_port: args.distribute_port,
            collect_port: args.collect_port,
            frame_delay: args.frame_delay,
            buffer_capacity: args.buffer_capacity,
            capture_queue_size: args.capture_queue_size,
            enable_trace_export: args.enable_trace_export,
            trace_output: args.trace_output,
        }
    }
}

#[derive(Deserialize)]
struct StdinFrame {
    #[serde(default)]
    prompt: String,
    payload_b64: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = DistributorConfig::from(args);

    let distributor = match Distributor::new(config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let ctx = zmq::Context::new();
    let distribute_port = distributor.config().distribute_port;
    let distribute_server = match DistributeServer::bind(&ctx, distribute_port) {
        Ok(s) => s,
        Err(source) => {
            let err = DistributorError::BindDistribute {
                port: distribute_port,
                source,
            };
            tracing::error!(error = %err, "failed to bind distribution socket");
            std::process::exit(1);
        }
    };
    let collect_port = distributor.config().collect_port;
    let collect_server = match CollectServer::bind(&ctx, collect_port) {
        Ok(s) => s,
        Err(source) => {
            let err = DistributorError::BindCollect {
                port: collect_port,
                source,
            };
            tracing::error!(error = %err, "failed to bind collection socket");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            tracing::warn!(error = %e, "failed to install signal handler");
        }
    }

    let stdin_handle = {
        let distributor = distributor.clone();
        let running = running.clone();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(frame) = serde_json::from_str::<StdinFrame>(&line) else {
                    tracing::warn!("skipping malformed stdin frame line");
                    continue;
                };
                let Ok(payload) = base64::engine::general_purpose::STANDARD.decode(&frame.payload_b64)
                else {
                    tracing::warn!("skipping frame with invalid base64 payload");
                    continue;
                };
                distributor.submit_frame(payload, Some(frame.prompt));
            }
        })
    };

    let fan_out_handle = {
        let distributor = distributor.clone();
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                distributor.fan_out_once(&distribute_server);
            }
        })
    };

    let collect_handle = {
        let distributor = distributor.clone();
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                distributor.collect_once(&collect_server);
            }
        })
    };

    let render_handle = {
        let distributor = distributor.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut stdout = std::io::stdout();
            while running.load(Ordering::SeqCst) {
                if let Some(payload) = distributor.render_tick() {
                    let len = (payload.len() as u32).to_le_bytes();
                    if stdout.write_all(&len).is_err() || stdout.write_all(&payload).is_err() {
                        break;
                    }
                    let _ = stdout.flush();
                }
                thread::sleep(Duration::from_millis(10));
            }
        })
    };

    for handle in [stdin_handle, fan_out_handle, collect_handle, render_handle] {
        let _ = handle.join();
    }

    if let Err(e) = distributor.flush_trace() {
        tracing::warn!(error = %e, "failed to flush trace on shutdown");
    }
    tracing::info!(stats = ?distributor.stats(), "distributor shut down");
}
