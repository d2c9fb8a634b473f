use clap::{Parser, Subcommand};
use rs232_tester::config::{Config, ConfigLoader};
use rs232_tester::controller::{ControllerEvent, PollSettings, PollingController};
use rs232_tester::discovery;
use rs232_tester::logging::{self, LogTarget};
use rs232_tester::port::SystemPortOpener;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use tracing::info;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "rs232-tester",
    version,
    about = "Watch RS-232 control lines, drive DTR/RTS and loopback-test TX/RX.",
    long_about = "Opens one serial device at 9600 8N1, samples CD/DSR/CTS/RI every polling interval, \
                  reports the DTR/RTS levels and optionally writes a test byte to TX each cycle to \
                  check that it comes back on RX. Without a subcommand the interactive panel starts."
)]
struct Cli {
    /// Configuration file (overrides the standard search path).
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List candidate serial devices.
    List {
        /// Print JSON instead of one name per line.
        #[arg(long)]
        json: bool,
        /// Only list devices that can be opened right now.
        #[arg(long)]
        probe: bool,
    },
    /// Print one line per sampling cycle without a UI.
    Watch {
        /// Device path or configured alias.
        device: String,
        /// Run the TX/RX loopback test.
        #[arg(long)]
        tx: bool,
        /// Print each snapshot as a JSON object.
        #[arg(long)]
        json: bool,
        /// Stop after this many cycles.
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// DTR level to drive after opening.
        #[arg(long, value_name = "BOOL")]
        dtr: Option<bool>,
        /// RTS level to drive after opening.
        #[arg(long, value_name = "BOOL")]
        rts: Option<bool>,
    },
    /// Interactive lamp panel (default).
    #[cfg(feature = "tui")]
    Tui,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config_path = loader.config_path.clone();
    let config = loader.into_config();

    #[cfg(feature = "tui")]
    let command = cli.command.unwrap_or(Command::Tui);
    #[cfg(not(feature = "tui"))]
    let command = cli.command.unwrap_or(Command::List {
        json: false,
        probe: false,
    });

    let target = match command {
        #[cfg(feature = "tui")]
        Command::Tui => LogTarget::Quiet,
        _ => LogTarget::Stderr,
    };
    logging::init(&config.logging, target)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "configuration loaded");
    }

    match command {
        Command::List { json, probe } => list(json, probe),
        Command::Watch {
            device,
            tx,
            json,
            cycles,
            dtr,
            rts,
        } => {
            let device = config.serial.resolve_port(&device);
            watch(&config, &device, WatchOptions { tx, json, cycles, dtr, rts })
        }
        #[cfg(feature = "tui")]
        Command::Tui => Ok(rs232_tester::tui::run(config, Arc::new(SystemPortOpener))?),
    }
}

fn list(json: bool, probe: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut devices = discovery::list_devices()?;
    if probe {
        let names: Vec<String> = devices.iter().map(|d| d.name.clone()).collect();
        let openable = discovery::probe_openable(&SystemPortOpener, &names);
        devices.retain(|d| openable.contains(&d.name));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else if devices.is_empty() {
        eprintln!("no serial devices found");
    } else {
        for device in devices {
            match device.description {
                Some(description) => println!("{}\t{}\t{}", device.name, device.transport, description),
                None => println!("{}\t{}", device.name, device.transport),
            }
        }
    }
    Ok(())
}

struct WatchOptions {
    tx: bool,
    json: bool,
    cycles: Option<u64>,
    dtr: Option<bool>,
    rts: Option<bool>,
}

fn watch(config: &Config, device: &str, options: WatchOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (events, snapshots) = mpsc::channel::<ControllerEvent>();
    let controller = PollingController::spawn(
        Arc::new(SystemPortOpener),
        PollSettings::from(&config.polling),
        events,
    )?;

    controller.open(device)?;
    if let Some(level) = options.dtr {
        controller.set_dtr(level)?;
    }
    if let Some(level) = options.rts {
        controller.set_rts(level)?;
    }
    if options.tx {
        controller.set_tx_enable(true)?;
    }

    let mut seen = 0u64;
    while options.cycles.map_or(true, |limit| seen < limit) {
        match snapshots.recv()? {
            ControllerEvent::Snapshot(snapshot) => {
                if options.json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    println!("{snapshot}");
                }
                seen += 1;
            }
            ControllerEvent::Disconnected(e) => return Err(e.into()),
        }
    }

    controller.close()?;
    Ok(())
}
