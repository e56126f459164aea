//! # Arena Link
//!
//! Decodes the radio receivers and the referee system of one robot.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Set up logging with tracing subscriber (console, optional rolling file)
//!    - Open each enabled UART and spawn its reader and worker tasks
//!
//! 2. **Main Loop**
//!    - Record telemetry snapshots at the configured interval
//!    - Log link status every few seconds
//!    - Pick up the own robot id from the referee once it is reported
//!    - Handle Ctrl+C for graceful shutdown
//!
//! Expected output:
//! ```text
//! INFO arena_link: Arena Link v0.1.0 starting...
//! INFO arena_link::serial: Opened /dev/ttyUSB0 at 921600 baud
//! INFO arena_link::link::liveness: vt03 link online
//! INFO arena_link: vt03=online dr16=offline referee=online active=vt03
//! ```

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use arena_link::config::{Config, LoggingConfig};
use arena_link::input::ButtonTiming;
use arena_link::link::{PrioritySequence, RxSink};
use arena_link::rc::{Dr16, RcHub, RcLink, Vt03};
use arena_link::referee::{RefereeHandle, RefereeLink, RefereeTx};
use arena_link::serial::{run_reader, LineSettings, PortWriter, SerialLink, SerialPortIO, DEFAULT_IDLE_GAP};
use arena_link::telemetry::{TelemetryLogger, TelemetryRecord};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Period of the link status log line
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

type LinkTasks = JoinSet<arena_link::error::Result<()>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("Arena Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let sequence = Arc::new(PrioritySequence::new());
    let timing = ButtonTiming::from(&config.input);
    let mut hub = RcHub::new(Arc::clone(&sequence));
    let mut tasks = LinkTasks::new();

    if config.rc.vt03.enabled {
        let settings = LineSettings::VT03.with_baud_rate(config.rc.vt03.baud_rate);
        let serial = SerialLink::open(&config.rc.vt03.port, settings)?;
        let (rx, worker, handle) = RcLink::<Vt03>::new(Arc::clone(&sequence))
            .with_timeout(config.rc.vt03.timeout())
            .with_timing(timing)
            .build();

        spawn_link(&mut tasks, serial, rx, worker.run());
        hub = hub.with_vt03(handle);
    }

    if config.rc.dr16.enabled {
        let settings = LineSettings::DR16.with_baud_rate(config.rc.dr16.baud_rate);
        let serial = SerialLink::open(&config.rc.dr16.port, settings)?;
        let (rx, worker, handle) = RcLink::<Dr16>::new(Arc::clone(&sequence))
            .with_timeout(config.rc.dr16.timeout())
            .with_timing(timing)
            .build();

        spawn_link(&mut tasks, serial, rx, worker.run());
        hub = hub.with_dr16(handle);
    }

    let mut referee: Option<(RefereeHandle, RefereeTx<PortWriter>)> = None;
    if config.referee.enabled {
        let settings = LineSettings::REFEREE.with_baud_rate(config.referee.baud_rate);
        let serial = SerialLink::open(&config.referee.port, settings)?;
        let (rx, worker, handle) = RefereeLink::new()
            .with_subscriptions(&config.referee.subscriptions)
            .with_timeout(config.referee.timeout())
            .build();

        let writer = spawn_link(&mut tasks, serial, rx, worker.run());
        referee = Some((handle, RefereeTx::new(writer, config.referee.robot_id)));
    }

    if tasks.is_empty() {
        warn!("No link enabled in {}", config_path);
    }

    let mut telemetry = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry)?)
    } else {
        None
    };

    let mut telemetry_tick = interval(Duration::from_millis(config.telemetry.log_interval_ms));
    telemetry_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_tick = interval(STATUS_INTERVAL);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = telemetry_tick.tick(), if telemetry.is_some() => {
                let record = TelemetryRecord::capture(&hub, referee.as_ref().map(|(h, _)| h));
                if let Some(logger) = telemetry.as_mut() {
                    if let Err(e) = logger.log(&record) {
                        warn!("Failed to write telemetry: {}", e);
                    }
                }
            }

            _ = status_tick.tick() => {
                let referee_handle = referee.as_ref().map(|(h, _)| h);
                info!("{}", status_line(&hub, referee_handle));

                if let Some((handle, tx)) = referee.as_mut() {
                    learn_robot_id(handle, tx);
                }
            }

            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok(Ok(())) => debug!("Link task finished"),
                    Ok(Err(e)) => warn!("Link task failed: {}", e),
                    Err(e) => warn!("Link task aborted: {}", e),
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

/// Install the console layer and, when configured, a daily-rolling file layer
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "arena-link.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Spawn the reader (receive side) and the worker of one link
///
/// Returns the transmit half of the port.
fn spawn_link<S, W>(tasks: &mut LinkTasks, serial: SerialLink, mut sink: S, worker: W) -> PortWriter
where
    S: RxSink + 'static,
    W: Future<Output = ()> + Send + 'static,
{
    let (reader, writer) = serial.into_split();

    tasks.spawn(async move { run_reader(reader, &mut sink, DEFAULT_IDLE_GAP).await });
    tasks.spawn(async move {
        worker.await;
        Ok(())
    });

    writer
}

/// Adopt the robot id reported by the referee when none was configured
fn learn_robot_id<P: SerialPortIO>(handle: &RefereeHandle, tx: &mut RefereeTx<P>) {
    if tx.robot_id() != 0 || !handle.is_online() {
        return;
    }

    let robot_id = u16::from(handle.read(|d| d.robot_status().robot_id));
    if robot_id != 0 {
        match tx.set_robot_id(robot_id) {
            Ok(()) => info!("Own robot id reported by referee: {}", robot_id),
            Err(e) => warn!("Ignoring robot id from referee: {}", e),
        }
    }
}

/// One-line summary of every configured link
fn status_line(hub: &RcHub, referee: Option<&RefereeHandle>) -> String {
    let state = |online: bool| if online { "online" } else { "offline" };

    let mut parts = Vec::with_capacity(4);
    if let Some(vt03) = hub.vt03() {
        parts.push(format!("vt03={}", state(vt03.is_online())));
    }
    if let Some(dr16) = hub.dr16() {
        parts.push(format!("dr16={}", state(dr16.is_online())));
    }
    if let Some(referee) = referee {
        let stats = referee.stats();
        parts.push(format!(
            "referee={} (frames={} crc_errors={})",
            state(referee.is_online()),
            stats.frames_ok,
            stats.crc_errors()
        ));
    }

    let active = match hub.active() {
        Some(arena_link::rc::RcSource::Vt03) => "vt03",
        Some(arena_link::rc::RcSource::Dr16) => "dr16",
        None => "none",
    };
    parts.push(format!("active={}", active));

    parts.join(" ")
}
