use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ventobridge::bridge::BridgeHandle;
use ventobridge::config::BridgeConfig;
use ventobridge::device::{ClientSettings, DeviceClient, UdpTransport};

/// Control a Blauberg Vento ventilation unit via MQTT
#[derive(Parser, Debug)]
#[command(name = "ventobridge", version)]
struct Args {
    /// Host of the ventilation unit
    #[arg(long)]
    device_host: Option<String>,

    /// UDP control port of the unit
    #[arg(long)]
    device_port: Option<u16>,

    /// Device id announced in every frame
    #[arg(long)]
    device_id: Option<String>,

    /// Device password announced in every frame
    #[arg(long)]
    device_password: Option<String>,

    /// MQTT broker hostname
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// MQTT username
    #[arg(long)]
    mqtt_user: Option<String>,

    /// MQTT password
    #[arg(long)]
    mqtt_pass: Option<String>,

    /// Topic prefix for command, status and service topics
    #[arg(long)]
    base_topic: Option<String>,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Per-attempt reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Attempts before the unit counts as unreachable
    #[arg(long)]
    retries: Option<u32>,

    /// Optional TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(args.debug)?;

    let config = build_config(&args)?;

    info!(
        "Connecting to ventilation unit at {}:{}",
        config.device.host, config.device.port
    );
    let transport = UdpTransport::connect(&config.device.host, config.device.port)
        .await
        .map_err(|e| eyre!("Cannot reach unit host {}: {}", config.device.host, e))?;

    // The broker connection itself is retried by the MQTT client; resolve
    // the name here so a typo still fails at startup.
    tokio::net::lookup_host((config.mqtt.host.as_str(), config.mqtt.port))
        .await
        .map_err(|e| eyre!("Cannot resolve MQTT broker {}: {}", config.mqtt.host, e))?;

    let client = DeviceClient::new(
        config.device.device_id.clone(),
        config.device.password.clone(),
        ClientSettings {
            timeout: config.device.timeout(),
            retries: config.device.retries,
        },
        Box::new(transport),
    );

    let mut handle = BridgeHandle::start(config, client)?;

    wait_for_termination().await;
    info!("Start cleanup");
    handle.shutdown().await?;
    info!("Bye");
    Ok(())
}

fn setup(debug: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let level = if debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .init();
    Ok(())
}

/// Merges the optional config file with CLI flags; flags win
fn build_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    if let Some(host) = &args.device_host {
        config.device.host = host.clone();
    }
    if let Some(port) = args.device_port {
        config.device.port = port;
    }
    if let Some(id) = &args.device_id {
        config.device.device_id = id.clone();
    }
    if let Some(password) = &args.device_password {
        config.device.password = password.clone();
    }
    if let Some(host) = &args.mqtt_host {
        config.mqtt.host = host.clone();
    }
    if let Some(port) = args.mqtt_port {
        config.mqtt.port = port;
    }
    if let Some(user) = &args.mqtt_user {
        config.mqtt.username = Some(user.clone());
    }
    if let Some(pass) = &args.mqtt_pass {
        config.mqtt.password = Some(pass.clone());
    }
    if let Some(base) = &args.base_topic {
        config.base_topic = base.clone();
    }
    if let Some(interval) = args.poll_interval {
        config.poll_interval_secs = interval;
    }
    if let Some(timeout) = args.timeout_ms {
        config.device.timeout_ms = timeout;
    }
    if let Some(retries) = args.retries {
        config.device.retries = retries;
    }

    if config.device.host.is_empty() {
        return Err(eyre!("No ventilation unit host given (--device-host)"));
    }
    if config.mqtt.host.is_empty() {
        return Err(eyre!("No MQTT broker host given (--mqtt-host)"));
    }

    Ok(config)
}

/// Waits for SIGINT or SIGTERM
async fn wait_for_termination() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Cannot install SIGTERM handler: {}", e);
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}
