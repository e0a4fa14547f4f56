//! `smipc-monitor` - command-line reader for shared-memory sensor telemetry.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use smipc_telemetry::cli::{ChannelsCommand, Cli, Command, ConfigCommand, ReadCommand, WatchCommand};
use smipc_telemetry::context::{attach_source, ChannelKind, TelemetryContext};
use smipc_telemetry::monitor::{Monitor, MonitorSettings};
use smipc_telemetry::Core::CancelToken;
use smipc_telemetry::IPC::{segment_size, SCHEMAS};
use smipc_telemetry::{init_logging, Config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Watch(cmd) => handle_watch(config, &cmd),
        Command::Read(cmd) => handle_read(config, &cmd),
        Command::Channels(cmd) => {
            handle_channels(&cmd);
            Ok(())
        }
        Command::Config(cmd) => {
            handle_config(&config, &cmd);
            Ok(())
        }
    }
}

fn handle_watch(mut config: Config, cmd: &WatchCommand) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ms) = cmd.interval_ms {
        config.monitor.poll_interval_ms = ms;
    }
    config.validate()?;
    let kinds = if cmd.channels.is_empty() {
        config.monitored_channels()
    } else {
        cmd.channels
            .iter()
            .map(|name| ChannelKind::from_str(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_for_handler.store(true, Ordering::SeqCst);
    })?;

    let context = TelemetryContext::attach(&config, CancelToken::from_flag(Arc::clone(&stop)));
    let monitor = Monitor::start(
        context.sources(&kinds),
        MonitorSettings {
            poll_interval: config.poll_interval(),
            stale_after: config.stale_after(),
        },
        Arc::clone(&stop),
    )?;

    if monitor.worker_count() == 0 {
        println!("No producer is publishing the selected channels.");
        println!("Fallback position: {}", context.fallback_position());
        return Ok(());
    }

    println!("Watching {} channel(s); Ctrl-C to stop.", monitor.worker_count());
    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(100));
    }

    let reports = monitor.join();
    info!(position = %context.position(), "last known position");
    context.detach_all();

    println!();
    println!("{:<14} {:>8} {:>8} {:>8} {:>8}", "CHANNEL", "POLLS", "NEW", "ERRORS", "STALE");
    for r in reports {
        println!(
            "{:<14} {:>8} {:>8} {:>8} {:>8}",
            r.channel, r.polls, r.new_samples, r.errors, r.stale_warnings
        );
    }
    Ok(())
}

fn handle_read(mut config: Config, cmd: &ReadCommand) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ms) = cmd.timeout_ms {
        config.read.timeout_ms = ms;
    }
    config.validate()?;
    let kind = ChannelKind::from_str(&cmd.name)?;
    let source = attach_source(kind, &config, &CancelToken::new());

    if let Some(err) = source.attach_error() {
        println!("{kind}: unavailable ({err})");
        if matches!(kind, ChannelKind::Gga | ChannelKind::GpsPosition) {
            let fallback = &config.fallback;
            println!(
                "fallback position: {:.6}, {:.6} @ {:.1} m",
                fallback.latitude_deg, fallback.longitude_deg, fallback.altitude_m
            );
        }
        return Ok(());
    }

    let status = source.poll()?;
    let header = source.header();
    println!("{kind} ({}) {status:?}", source.record_name());
    println!("  {}", source.describe());
    println!(
        "  header: length {} updated {}.{:09} flag {} scratch {}",
        header.length, header.updated.sec, header.updated.nsec, header.flag, header.scratch
    );
    println!("  age: {:.3?}", source.data_age());
    if let Some(warning) = source.check_stale(config.stale_after()) {
        println!("  warning: {warning}");
    }
    source.detach();
    Ok(())
}

fn handle_channels(cmd: &ChannelsCommand) {
    println!("{:<14} {:<18} {:>8} {:>8}", "CHANNEL", "RECORD", "PAYLOAD", "SEGMENT");
    for schema in SCHEMAS {
        println!(
            "{:<14} {:<18} {:>8} {:>8}",
            schema.channel,
            schema.record,
            schema.payload_size,
            segment_size(schema.payload_size)
        );
        if cmd.fields {
            let mut offset = 0;
            for field in schema.fields {
                let unit = if field.unit.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", field.unit)
                };
                println!("    +{offset:<4} {:<20} {}{unit}", field.name, field.ty);
                offset += field.width();
            }
        }
    }
}

fn handle_config(config: &Config, cmd: &ConfigCommand) {
    match cmd {
        ConfigCommand::Show => {
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[read]");
            println!("  timeout_ms:        {}", config.read.timeout_ms);
            println!("  overrun_policy:    {:?}", config.read.overrun_policy);
            println!("  stale_after_ms:    {}", config.read.stale_after_ms);
            println!("  gga_layout:        {:?}", config.read.gga_layout);
            println!();
            println!("[monitor]");
            println!("  channels:          {}", config.monitor.channels.join(", "));
            println!("  poll_interval_ms:  {}", config.monitor.poll_interval_ms);
            println!();
            println!("[fallback]");
            println!("  latitude_deg:      {}", config.fallback.latitude_deg);
            println!("  longitude_deg:     {}", config.fallback.longitude_deg);
            println!("  altitude_m:        {}", config.fallback.altitude_m);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
    }
}
