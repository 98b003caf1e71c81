//! ftx1-hamlibd -- Hamlib-compatible daemon for the Yaesu FTX-1.
//!
//! Exposes the radio to rigctld-speaking clients (WSJT-X, VARA, fldigi)
//! on one TCP port and bridges the radio's USB audio to remote clients on
//! a second port.
//!
//! Usage:
//!   ftx1-hamlibd -r /dev/ttyUSB0
//!   ftx1-hamlibd -r /dev/ttyUSB0 -s 38400 -t 4532 -A 4533 \
//!       --capture "USB Audio CODEC" --playback "USB Audio CODEC"
//!   ftx1-hamlibd --list-audio-devices

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ftx1_audio::{AudioServer, AudioServerConfig, CpalDeviceFactory};
use ftx1_cat::{CatLink, Radio, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT};
use ftx1_rigctld::RigctldServer;

mod discovery;

/// Hamlib-compatible control and audio bridge for the Yaesu FTX-1.
#[derive(Parser)]
#[command(name = "ftx1-hamlibd", version, about)]
struct Cli {
    /// Serial port the radio is attached to (e.g. /dev/ttyUSB0,
    /// /dev/cu.SLAB_USBtoUART, COM3).
    #[arg(short = 'r', long = "rig-file")]
    rig_file: Option<String>,

    /// CAT baud rate.
    #[arg(short = 's', long = "serial-speed", default_value_t = DEFAULT_BAUD_RATE)]
    serial_speed: u32,

    /// TCP port for the rigctld protocol.
    #[arg(short = 't', long = "port", default_value_t = ftx1_rigctld::DEFAULT_PORT)]
    port: u16,

    /// TCP port for the audio bridge.
    #[arg(short = 'A', long = "audio-port", default_value_t = ftx1_audio::DEFAULT_PORT)]
    audio_port: u16,

    /// Listen address for both servers.
    #[arg(short = 'T', long = "listen-addr", default_value = "0.0.0.0")]
    listen_addr: String,

    /// Capture device name for radio RX audio (substring match).
    #[arg(long = "capture")]
    capture_device: Option<String>,

    /// Playback device name for radio TX audio (substring match).
    #[arg(long = "playback")]
    playback_device: Option<String>,

    /// Playback target latency in milliseconds.
    #[arg(long = "target-latency", default_value_t = 100)]
    target_latency_ms: u32,

    /// UDP port for LAN discovery.
    #[arg(long = "discovery-port", default_value_t = discovery::DISCOVERY_PORT)]
    discovery_port: u16,

    /// Disable the LAN discovery responder.
    #[arg(long = "no-discovery")]
    no_discovery: bool,

    /// Operator callsign advertised in discovery responses.
    #[arg(long = "callsign", default_value = "")]
    callsign: String,

    /// List audio devices and exit.
    #[arg(long = "list-audio-devices")]
    list_audio_devices: bool,

    /// Verbose output (per-command CAT traffic at debug level).
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if cli.list_audio_devices {
        for device in ftx1_audio::list_audio_devices()? {
            let kind = match (device.is_input, device.is_output) {
                (true, true) => "capture+playback",
                (true, false) => "capture",
                (false, true) => "playback",
                (false, false) => "unusable",
            };
            println!("{} [{}]", device.name, kind);
        }
        return Ok(());
    }

    let rig_file = cli
        .rig_file
        .as_deref()
        .context("serial port required (-r /dev/ttyUSB0)")?;

    info!(port = rig_file, baud = cli.serial_speed, "connecting to FTX-1");
    let transport = SerialTransport::open(rig_file, cli.serial_speed)
        .await
        .context("failed to open serial port")?;
    let link = CatLink::new(Box::new(transport), DEFAULT_COMMAND_TIMEOUT);

    let radio = Radio::detect(link)
        .await
        .context("failed to connect to the radio")?;
    info!(head = %radio.head(), max_power_w = radio.max_power_watts(), "FTX-1 detected");

    radio
        .enable_auto_info()
        .await
        .context("failed to enable auto-information mode")?;

    let radio = Arc::new(Mutex::new(radio));

    let rigctld = RigctldServer::bind(
        &format!("{}:{}", cli.listen_addr, cli.port),
        Arc::clone(&radio),
    )
    .await
    .context("failed to start rigctld server")?;

    let audio_factory = match (&cli.capture_device, &cli.playback_device) {
        (Some(capture), Some(playback)) => Some(Arc::new(CpalDeviceFactory::new(
            capture.clone(),
            playback.clone(),
        )) as Arc<dyn ftx1_audio::AudioDeviceFactory>),
        (None, None) => {
            info!("no audio devices configured; audio clients will be refused");
            None
        }
        _ => anyhow::bail!("--capture and --playback must be given together"),
    };

    let audio = AudioServer::bind(
        &format!("{}:{}", cli.listen_addr, cli.audio_port),
        audio_factory,
        AudioServerConfig {
            target_latency_ms: cli.target_latency_ms,
            ..Default::default()
        },
    )
    .await
    .context("failed to start audio server")?;

    let discovery = if cli.no_discovery {
        None
    } else {
        Some(
            discovery::DiscoveryServer::bind(
                &format!("{}:{}", cli.listen_addr, cli.discovery_port),
                discovery::ServerInfo {
                    cat_port: cli.port,
                    audio_port: cli.audio_port,
                    rig_model: "FTX-1".to_string(),
                    callsign: cli.callsign.clone(),
                },
            )
            .await
            .context("failed to start discovery responder")?,
        )
    };

    info!(
        rigctl_port = cli.port,
        audio_port = cli.audio_port,
        "ftx1-hamlibd running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    if let Some(discovery) = discovery {
        discovery.stop().await;
    }
    audio.stop().await;
    rigctld.stop().await;

    // Leave AI mode so the radio stops pushing to a dead line.
    let radio = radio.lock().await;
    let _ = tokio::time::timeout(Duration::from_secs(2), radio.disable_auto_info()).await;

    Ok(())
}
