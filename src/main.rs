//! Binary entrypoint for the maildisplay CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the base station, optionally overriding the radio port
//! - `init` - create a starter `config.toml`
//! - `status` - print the configuration summary and derived topics
//! - `decode <hex> [--format <f>]` - decode one radio frame and print the state payload
//!
//! See the library crate docs for module-level details: `maildisplay::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use maildisplay::actuator;
use maildisplay::config::{Config, MqttConfig};
use maildisplay::logutil::parse_hex_frame;
use maildisplay::mqtt::discovery;
use maildisplay::mqtt::{Lifecycle, MqttLink, MqttSettings};
use maildisplay::radio::RadioReader;
use maildisplay::station::Station;
use maildisplay::telemetry::{decode, Interpreter, PayloadFormat};

#[derive(Parser)]
#[command(name = "maildisplay")]
#[command(about = "Mailbox sensor base station: LoRa telemetry to MQTT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the base station
    Start {
        /// Radio serial port (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Run as a background daemon (Unix only)
        #[arg(short, long)]
        daemon: bool,

        /// PID file location (for daemon mode)
        #[arg(long, default_value = "/tmp/maildisplay.pid")]
        pid_file: String,
    },
    /// Write a default configuration file
    Init,
    /// Show configuration summary and topics
    Status,
    /// Decode a radio frame given as hex and print the resulting state payload
    Decode {
        /// Frame bytes, e.g. "10 00 64 7C"
        frame: String,
        /// Payload format, "primary" or "alternate" as in [radio] format; defaults to the configured one
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            port,
            daemon,
            pid_file,
        } => {
            let mut config = Config::load(&cli.config).await?;

            #[cfg(all(unix, feature = "daemon"))]
            if daemon {
                // Parent exits inside; only the detached child returns.
                daemonize_process(&config, &pid_file)?;
            }

            #[cfg(not(all(unix, feature = "daemon")))]
            if daemon {
                let _ = pid_file;
                eprintln!("Error: Daemon mode requires Unix platform and 'daemon' feature.");
                std::process::exit(1);
            }

            init_logging(Some(&config), cli.verbose);
            info!("Starting maildisplay v{}", env!("CARGO_PKG_VERSION"));

            if let Some(cli_port) = port {
                config.radio.port = cli_port;
            }
            run_station(config, &cli.config).await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            if std::path::Path::new(&cli.config).exists() {
                return Err(anyhow!("{} already exists; not overwriting", cli.config));
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            show_status(&config);
        }
        Commands::Decode { frame, format } => {
            let config = Config::load(&cli.config).await.ok();
            init_logging(config.as_ref(), cli.verbose);
            let format = match format {
                Some(f) => PayloadFormat::parse(&f)
                    .ok_or_else(|| anyhow!("Unknown payload format '{}'", f))?,
                None => config
                    .as_ref()
                    .map(|c| c.radio.format)
                    .unwrap_or_default(),
            };
            let threshold = config
                .as_ref()
                .map(|c| c.interpreter.mail_threshold)
                .unwrap_or(maildisplay::telemetry::interpreter::DEFAULT_MAIL_THRESHOLD);
            let bytes =
                parse_hex_frame(&frame).ok_or_else(|| anyhow!("Invalid hex frame '{}'", frame))?;
            let reading = decode(format, &bytes)?;
            let state = Interpreter::new(threshold).interpret(&reading);
            println!(
                "{}",
                maildisplay::mqtt::payload::state_payload(format, Lifecycle::Update, &state)
            );
        }
    }

    Ok(())
}

async fn run_station(config: Config, config_path: &str) -> Result<()> {
    let link = MqttLink::new(MqttSettings::from_config(&config.mqtt));
    info!("Broker {} as {}", link.settings().endpoint(), link.settings().client_id);
    let flag = actuator::from_config(&config.actuator);

    let radio = if config.radio.port.is_empty() {
        info!("No radio port configured; running with heartbeats only");
        None
    } else {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        match RadioReader::open(
            &config.radio.port,
            config.radio.baud_rate,
            config.radio.format,
            std::time::Duration::from_millis(config.radio.frame_gap_ms),
            tx,
        ) {
            Ok(reader) => {
                tokio::spawn(async move {
                    if let Err(e) = reader.run().await {
                        warn!("Radio reader exited: {}", e);
                    }
                });
                Some(rx)
            }
            Err(e) => {
                warn!("{} (station continuing without radio)", e);
                None
            }
        }
    };

    let mut station = Station::new(config, link, flag).with_reload(
        config_path,
        Box::new(|mqtt: &MqttConfig| MqttLink::new(MqttSettings::from_config(mqtt))),
    );
    if let Some(rx) = radio {
        station.attach_radio(rx);
    }

    #[cfg(unix)]
    if let Err(e) = maildisplay::station::listen_for_reload(station.reconfigure_flag()) {
        warn!("SIGHUP reload unavailable: {}", e);
    }

    station
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

fn show_status(config: &Config) {
    let format = config.radio.format;
    println!("=== maildisplay Status ===");
    println!("Station: {}", config.station.name);
    println!(
        "Radio: {} @ {} baud ({} format, {}-byte frames)",
        if config.radio.port.is_empty() { "(none)" } else { config.radio.port.as_str() },
        config.radio.baud_rate,
        format,
        format.frame_len()
    );
    println!("Mail threshold: {}", config.interpreter.mail_threshold);
    println!("Broker: {}:{}", config.mqtt.host, config.mqtt.port);
    println!("Heartbeat: {:?}", config.heartbeat_period());
    println!("Flag actuator: {:?}", config.actuator.kind);
    println!("State topic: {}", discovery::state_topic(&config.mqtt.topic));
    for channel in discovery::channels(format) {
        println!(
            "Discovery: {}",
            discovery::config_topic(&config.mqtt.topic, channel)
        );
    }
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // In daemon mode stdout is redirected, so only the file gets the line
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}

/// Drop the first daemon flag so the child runs in the foreground. Later
/// occurrences are option values, e.g. a PID file literally named `-d`.
#[cfg(all(unix, feature = "daemon"))]
fn strip_daemon_flag(args: &mut Vec<String>) {
    if let Some(pos) = args.iter().position(|arg| arg == "--daemon" || arg == "-d") {
        args.remove(pos);
    }
}

/// Re-spawn detached with output appended to the log file, write the PID
/// file, and exit the parent.
#[cfg(all(unix, feature = "daemon"))]
fn daemonize_process(config: &Config, pid_file: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::Command;

    let log_path = config
        .logging
        .file
        .as_deref()
        .unwrap_or("maildisplay.log");

    let current_exe = std::env::current_exe()?;
    let mut args: Vec<String> = std::env::args().collect();
    strip_daemon_flag(&mut args);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let child = Command::new(&current_exe)
        .args(&args[1..])
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, format!("{}", child.id()))?;
    std::process::exit(0);
}

#[cfg(all(test, unix, feature = "daemon"))]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn only_the_daemon_flag_is_stripped() {
        let mut args = argv(&["maildisplay", "start", "-d", "--pid-file", "-d"]);
        strip_daemon_flag(&mut args);
        assert_eq!(args, argv(&["maildisplay", "start", "--pid-file", "-d"]));

        let mut args = argv(&["maildisplay", "start", "--daemon"]);
        strip_daemon_flag(&mut args);
        assert_eq!(args, argv(&["maildisplay", "start"]));

        let mut args = argv(&["maildisplay", "status"]);
        strip_daemon_flag(&mut args);
        assert_eq!(args, argv(&["maildisplay", "status"]));
    }
}
