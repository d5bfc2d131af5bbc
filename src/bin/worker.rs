//! Worker binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use frame_relay::config::{TransformKind as ConfigTransformKind, WorkerConfig};
use frame_relay::error::WorkerError;
use frame_relay::transform::{Diffusion, Identity, Inverter, Transform};
use frame_relay::transport::{CollectClient, DistributeClient};
use frame_relay::worker::Worker;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TransformArg {
    Identity,
    Inverter,
    Diffusion,
}

#[derive(Parser, Debug)]
#[command(name = "worker", about = "Frame-transform worker process")]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 5555)]
    distribute_port: u16,

    #[arg(long, default_value_t = 5556)]
    collect_port: u16,

    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    #[arg(long, default_value_t = 0.0)]
    delay: f64,

    #[arg(long, value_enum, default_value = "identity")]
    transform: TransformArg,

    #[arg(long)]
    diffusion_endpoint: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let transform_kind = match args.transform {
        TransformArg::Identity => ConfigTransformKind::Identity,
        TransformArg::Inverter => ConfigTransformKind::Inverter,
        TransformArg::Diffusion => ConfigTransformKind::Diffusion,
    };

    let config = WorkerConfig {
        host: args.host,
        distribute_port: args.distribute_port,
        collect_port: args.collect_port,
        batch_size: args.batch_size,
        delay: args.delay,
        transform: transform_kind,
        diffusion_endpoint: args.diffusion_endpoint,
    };

    let transform: Box<dyn Transform> = match transform_kind {
        ConfigTransformKind::Identity => Box::new(Identity),
        ConfigTransformKind::Inverter => Box::new(Inverter),
        ConfigTransformKind::Diffusion => {
            // Presence already enforced by `WorkerConfig::validate` inside
            // `Worker::new`; unwrap here only runs after that check passes.
            Box::new(Diffusion::new(config.diffusion_endpoint.clone().unwrap_or_default()))
        }
    };

    let mut worker = match Worker::new(config, transform) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let ctx = zmq::Context::new();
    let host = worker.config().host.clone();
    let distribute_port = worker.config().distribute_port;
    let collect_port = worker.config().collect_port;

    let distribute_client = match DistributeClient::connect(&ctx, &host, distribute_port) {
        Ok(c) => c,
        Err(source) => {
            let err = WorkerError::ConnectDistribute {
                host: host.clone(),
                port: distribute_port,
                source,
            };
            tracing::error!(error = %err, "failed to connect distribution socket");
            std::process::exit(1);
        }
    };
    let collect_client = match CollectClient::connect(&ctx, &host, collect_port) {
        Ok(c) => c,
        Err(source) => {
            let err = WorkerError::ConnectCollect {
                host,
                port: collect_port,
                source,
            };
            tracing::error!(error = %err, "failed to connect collection socket");
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

    tracing::info!(worker_id = worker.worker_id(), "worker started");

    while running.load(Ordering::SeqCst) {
        let mut batch_ready = false;
        while running.load(Ordering::SeqCst) && !batch_ready {
            // AnnounceReady precedes every AwaitFrame poll, not just the
            // batch's first frame: a poll timeout returns to AnnounceReady
            // per-frame, matching the original's outer-loop resend.
            if let Err(e) = worker.announce_ready(&distribute_client) {
                tracing::error!(error = %e, "distribution socket error announcing readiness");
                running.store(false, Ordering::SeqCst);
                break;
            }
            batch_ready = worker.receive_once(&distribute_client);
        }

        // Finish any accumulated batch even if shutdown was requested
        // mid-accumulation, so in-flight work completes cleanly.
        worker.transform_and_return(&collect_client);
    }

    tracing::info!("worker shut down");
}
