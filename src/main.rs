// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, timeout, Duration, Instant};
use tracing::{debug, info, warn};

use gateway_hub::config::default_client_id;
use gateway_hub::constants::DEFAULT_BROKER;
use gateway_hub::{Bridge, Device, EventReceiver, HubConfig, HubEvent, MqttBus};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "hub2mqtt")]
#[command(about = "Bridge between a smart-home gateway hub and MQTT")]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Broker address (host:port, mqtt://host:port or tcp://host:port)
    #[arg(long, env = "MQTT_SERVER")]
    server: Option<String>,

    #[arg(long, env = "MQTT_USER")]
    user: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "MQTT_CLIENT_ID")]
    client_id: Option<String>,

    /// Wrap payloads in the Triple-DES envelope (true/false, 1/0)
    #[arg(long, env = "MQTT_SECRET_ENABLE")]
    secret_enable: Option<String>,

    /// 24-byte envelope key
    #[arg(long, env = "MQTT_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Gateway device number
    #[arg(long, env = "DEVICE_NO")]
    device_no: Option<String>,

    /// Address of the local control panel on the gateway
    #[arg(long, env = "DEVICE_PANEL_ADDRESS")]
    panel_address: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Keep the bridge running and poll the gateway for status (default)
    Run,
    /// Send one set_panels command for the local panel and exit
    Set {
        /// Device attribute as key=value, e.g. --attr channel=1 --attr state=on
        #[arg(long = "attr", value_parser = parse_attr, required = true)]
        attrs: Vec<(String, String)>,
        /// Seconds to wait for the gateway acknowledgement
        #[arg(long, default_value_t = 5)]
        wait_secs: u64,
    },
    /// Request a status report and print it as JSON
    ReadStatus {
        /// Seconds to wait for the report
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

fn parse_attr(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    gateway: GatewayToml,
    #[serde(default)]
    mqtt: MqttToml,
    #[serde(default)]
    secret: SecretToml,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayToml {
    #[serde(default)]
    device_no: String,
    #[serde(default)]
    panel_address: String,
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    #[serde(default = "default_mqtt_url")]
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default = "default_keep_alive")]
    keep_alive_secs: u64,
    /// How often `run` asks the gateway for a status report; 0 disables polling
    #[serde(default = "default_status_interval")]
    status_interval_secs: u64,
}

impl Default for MqttToml {
    fn default() -> Self {
        Self {
            url: default_mqtt_url(),
            client_id: default_client_id(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: default_keep_alive(),
            status_interval_secs: default_status_interval(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretToml {
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    key: String,
}

fn default_mqtt_url() -> String {
    DEFAULT_BROKER.to_string()
}
fn default_keep_alive() -> u64 {
    30
}
fn default_status_interval() -> u64 {
    60
}

/// Accepts the spellings Go's `strconv.ParseBool` does, which the gateway
/// tooling uses for `MQTT_SECRET_ENABLE`.
fn parse_bool_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Merge the config file (if any) with CLI/environment overrides.
///
/// Empty overrides are ignored so an exported-but-blank variable does not
/// wipe a value from the file.
fn load_config(cli: &Cli) -> Result<(HubConfig, u64)> {
    let file = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&text).context("Failed to parse config file")?
        }
        None => Config::default(),
    };

    let mut config = HubConfig::builder()
        .device_no(file.gateway.device_no)
        .panel_address(file.gateway.panel_address)
        .broker(file.mqtt.url)
        .client_id(file.mqtt.client_id)
        .username(file.mqtt.username)
        .password(file.mqtt.password)
        .keep_alive_secs(file.mqtt.keep_alive_secs)
        .secret_enable(file.secret.enable)
        .secret_key(file.secret.key)
        .build();

    let set = |target: &mut String, value: &Option<String>| {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            *target = v.to_string();
        }
    };
    set(&mut config.broker, &cli.server);
    set(&mut config.username, &cli.user);
    set(&mut config.password, &cli.password);
    set(&mut config.client_id, &cli.client_id);
    set(&mut config.secret_key, &cli.key);
    set(&mut config.device_no, &cli.device_no);
    set(&mut config.panel_address, &cli.panel_address);

    if let Some(v) = cli.secret_enable.as_deref().filter(|v| !v.is_empty()) {
        match parse_bool_flag(v) {
            Some(enable) => config.secret_enable = enable,
            None => warn!("Ignoring MQTT_SECRET_ENABLE={v:?}: not a boolean"),
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok((config, file.mqtt.status_interval_secs))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=gateway_hub=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let (config, status_interval_secs) = load_config(&cli)?;
    info!(
        "Bind gateway {} (panel address {})",
        config.device_no, config.panel_address
    );

    let bus = MqttBus::new(&config).context("Failed to set up MQTT client")?;
    let mut bridge = Bridge::new(config, bus).context("Failed to set up bridge")?;
    bridge
        .connect()
        .await
        .context("Failed to connect to MQTT broker")?;

    let outcome = match cli.command.unwrap_or(Cmd::Run) {
        Cmd::Run => run(&bridge, status_interval_secs).await,
        Cmd::Set { attrs, wait_secs } => set(&bridge, attrs, wait_secs).await,
        Cmd::ReadStatus { timeout_secs } => read_status(&bridge, timeout_secs).await,
    };

    if let Err(e) = bridge.disconnect().await {
        warn!("Error disconnecting from MQTT broker: {e}");
    }
    outcome
}

async fn run(bridge: &Bridge<MqttBus>, status_interval_secs: u64) -> Result<()> {
    let events = bridge.subscribe();
    let event_handle = tokio::spawn(log_events(events));

    if let Err(e) = bridge.request_status().await {
        warn!("Initial status request failed: {e}");
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut ticker = interval(Duration::from_secs(status_interval_secs.max(1)));
    // Skip the first immediate tick (we already asked for a report)
    ticker.tick().await;

    info!("Bridge running. Send SIGINT/SIGTERM to stop.");
    loop {
        tokio::select! {
            _ = ticker.tick(), if status_interval_secs > 0 => {
                if let Err(e) = bridge.request_status().await {
                    warn!("Status poll failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
        }
    }

    event_handle.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn log_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(HubEvent::StatusStored { device_no, serial }) => {
                info!("Status stored for {device_no} (serial {serial})");
            }
            Ok(HubEvent::PayloadRejected { reason }) => {
                debug!("Payload rejected: {reason}");
            }
            Ok(event) => debug!("Event: {event:?}"),
            Err(RecvError::Lagged(n)) => warn!("Event listener lagged, missed {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn set(bridge: &Bridge<MqttBus>, attrs: Vec<(String, String)>, wait_secs: u64) -> Result<()> {
    let device: Device = attrs.into_iter().collect();
    if device.channel().is_none() {
        warn!("No channel attribute given; the gateway may ignore this command");
    }

    let mut events = bridge.subscribe();
    let serial = bridge
        .set_device(device)
        .await
        .context("Failed to publish set_panels")?;

    let deadline = Instant::now() + Duration::from_secs(wait_secs);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, events.recv()).await {
            Ok(Ok(HubEvent::CommandResult(result))) if result.serial == serial => {
                if result.is_success() {
                    info!("Gateway accepted set_panels (serial {serial})");
                    return Ok(());
                }
                bail!("Gateway rejected set_panels (serial {serial})");
            }
            Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
            Ok(Err(RecvError::Closed)) => bail!("Bridge stopped before acknowledgement"),
            Err(_) => {
                warn!("No acknowledgement for serial {serial} within {wait_secs}s");
                return Ok(());
            }
        }
    }
}

async fn read_status(bridge: &Bridge<MqttBus>, timeout_secs: u64) -> Result<()> {
    let device_no = bridge.config().device_no.clone();
    let mut events = bridge.subscribe();
    bridge
        .request_status()
        .await
        .context("Failed to publish read_status")?;

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, events.recv()).await {
            Ok(Ok(HubEvent::StatusStored { device_no: from, .. })) if from == device_no => break,
            Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
            Ok(Err(RecvError::Closed)) => bail!("Bridge stopped before a report arrived"),
            Err(_) => bail!("No status report from {device_no} within {timeout_secs}s"),
        }
    }

    let snapshot = bridge
        .snapshot()
        .context("Status report vanished from cache")?;
    println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    Ok(())
}
