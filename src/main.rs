//! Demo for ThrottleBus
//!
//! Subscribes one printing handler, publishes three payloads faster than the
//! throttle interval and waits for them to trickle out one per interval.

use std::time::Duration;

use clap::Parser;
use throttlebus::bus::{ThrottlingBus, handler};
use throttlebus::config::load_config;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "throttlebus")]
struct Args {
    /// Topic to publish the sample payloads on
    #[arg(long, default_value = "message")]
    topic: String,
    /// Override the configured throttle interval (milliseconds)
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Gap between the sample publishes (milliseconds)
    #[arg(long, default_value_t = 500)]
    gap_ms: u64,
    /// Stop after this long (milliseconds) even if payloads are still queued
    #[arg(long)]
    wait_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        // no-op if run() already installed a subscriber
        throttlebus::utils::logging::init("info");
        error!("Demo failed: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;
    throttlebus::utils::logging::init(&config.logging.level);

    if let Some(ms) = args.interval_ms {
        config.bus.throttle_interval_ms = ms;
    }

    let bus = ThrottlingBus::<String>::new(config.bus)?;
    info!(interval = ?bus.interval(), topic = %args.topic, "bus ready");

    bus.subscribe(
        &args.topic,
        handler(|data: &String| {
            println!("Message received: {data}");
            Ok(())
        }),
    );

    let gap = Duration::from_millis(args.gap_ms);
    for (i, payload) in ["Hello", "World", "!"].into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        bus.publish(&args.topic, payload.to_string());
    }

    let drain = async {
        // one more interval after the queue drains so the last delivery lands
        while bus.pending_len(&args.topic) > 0 {
            tokio::time::sleep(bus.interval()).await;
        }
        tokio::time::sleep(bus.interval()).await;
    };

    match args.wait_ms {
        Some(ms) => {
            if tokio::time::timeout(Duration::from_millis(ms), drain).await.is_err() {
                warn!(
                    pending = bus.pending_len(&args.topic),
                    "wait elapsed before the queue drained"
                );
            }
        }
        None => drain.await,
    }

    bus.shutdown();
    info!("Demo finished");
    Ok(())
}
