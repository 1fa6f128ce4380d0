use std::io::{self, Read};
use std::{env, fs};

use anyhow::Context;
use route_engine::{BuildRequest, EngineConfig, RouteEngine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Reads the request from the file named by the first argument, or stdin.
fn read_request() -> anyhow::Result<BuildRequest> {
    let raw = match env::args().nth(1) {
        Some(path) if path != "-" => {
            fs::read_to_string(&path).with_context(|| format!("reading {path}"))?
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing build request")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = EngineConfig::from_env()?;
    let request = read_request()?;
    tracing::info!(
        "Planning {:?} route through {} waypoints",
        request.profile,
        request.waypoints.len()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let engine = RouteEngine::from_config(&config);
    let artifact = engine.build(&request, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}
