mod capture;
mod config;
mod debounce;
mod dispatch;
mod error;
mod serial;
mod sink;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use capture::{CameraCapture, CaptureCollaborator, NoCamera};
use dispatch::Dispatcher;
use sink::delivery::HttpDelivery;
use sink::persist::JsonFileSink;
use sink::registry::SinkRegistry;

#[derive(Parser)]
#[command(name = "composter-bridge")]
#[command(about = "Bridges a composter controller's serial link to local storage and a collection service")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Controller link, overriding `serial.path` (`-` for stdin)
    #[arg(short, long)]
    serial: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        config::Config::default()
    });
    if let Some(serial) = cli.serial {
        config.serial.path = serial;
    }

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("composter-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Device {} → {}", config.device.id, config.remote.base_url);

    let registry = Arc::new(SinkRegistry::new(
        &config.storage.root,
        &config.remote.base_url,
    ));
    registry.ensure_dirs()?;
    info!("Storing events under {}", config.storage.root.display());

    let delivery = HttpDelivery::new(config.request_timeout())?;

    let capture: Arc<dyn CaptureCollaborator> = if config.camera.enabled {
        Arc::new(CameraCapture::new(
            &config.camera.command,
            &config.device.id,
            registry.pictures_dir(),
            registry.pictures_url(),
            delivery.client().clone(),
        ))
    } else {
        warn!("Camera disabled; door events will not trigger captures");
        Arc::new(NoCamera)
    };

    let mut dispatcher = Dispatcher::new(
        config.device.id.clone(),
        Arc::clone(&registry),
        Arc::new(JsonFileSink::new()),
        Arc::new(delivery),
        capture,
        config.initial_delay()?,
    );

    let mut source = serial::open_device(&config.serial.path, config.settle()).await?;

    info!("Bridge running. Press Ctrl+C to stop.");
    let outcome = tokio::select! {
        result = dispatcher.run(&mut source) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
            Ok(())
        }
    };

    dispatcher.shutdown().await;

    if let Err(e) = outcome {
        error!("Dispatcher stopped: {}", e);
        return Err(e.into());
    }

    info!("Done");
    Ok(())
}
