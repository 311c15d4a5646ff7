use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use std::{path::PathBuf, sync::Arc, time::Duration};

use ufo82::{Coordinator, JsonFileStore, LoggingPeer, PortWatcher, SerialTransport, SystemPorts};

fn cli() -> Command {
    Command::new("ufo82")
        .about("Poll the sensitivity calibration rig")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Hardware configuration file")
                .value_parser(value_parser!(PathBuf))
                .default_value("hardware.json"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Serial port to use"),
        )
        .arg(
            Arg::new("place")
                .long("place")
                .help("Enable a place (0-9); may be repeated")
                .value_parser(value_parser!(usize))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .short('s')
                .help("Start polling immediately")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("scan-interval-ms")
                .long("scan-interval-ms")
                .help("How often to look for serial port changes")
                .value_parser(value_parser!(u64))
                .default_value("2000"),
        )
}

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .context("Missing --config value")?;
    let scan_interval = matches
        .get_one::<u64>("scan-interval-ms")
        .copied()
        .context("Missing --scan-interval-ms value")?;

    let ports = Arc::new(SystemPorts);
    let coordinator = Coordinator::spawn(
        Arc::new(LoggingPeer),
        Box::new(JsonFileStore::new(config_path)),
        Arc::new(SerialTransport::default()),
        ports.clone(),
    )?;
    let hardware = coordinator.handle().clone();
    let watcher = PortWatcher::spawn(
        ports,
        hardware.clone(),
        Duration::from_millis(scan_interval),
    )?;

    if let Some(port) = matches.get_one::<String>("port") {
        hardware.set_port_name(port.clone())?;
    }
    if let Some(places) = matches.get_many::<usize>("place") {
        for place in places {
            hardware.set_checked(*place, true)?;
        }
    }
    if matches.get_flag("start") {
        hardware.start()?;
    }

    let (quit_tx, quit_rx) = flume::bounded(1);
    ctrlc::set_handler(move || {
        let _ = quit_tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;
    let _ = quit_rx.recv();

    log::info!("Shutting down");
    watcher.stop();
    coordinator.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_clap() {
        let matches = cli().try_get_matches_from(["ufo82"]).unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("hardware.json"))
        );
        assert_eq!(matches.get_one::<u64>("scan-interval-ms"), Some(&2000));
        assert!(!matches.get_flag("start"));
    }

    #[test]
    fn test_places_accumulate() {
        let matches = cli()
            .try_get_matches_from(["ufo82", "--place", "1", "--place", "7", "--start"])
            .unwrap();
        let places: Vec<usize> = matches.get_many::<usize>("place").unwrap().copied().collect();
        assert_eq!(places, vec![1, 7]);
        assert!(matches.get_flag("start"));
    }
}
