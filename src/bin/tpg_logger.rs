use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use tpg_logger::{
    AcquireConfig, RowPolicy, acquire,
    config::{DEFAULT_BAUD, DEFAULT_COUNT},
    export, plot, port,
};

/// Fetch time/temperature/pressure/gas readings from a sensor board over serial
#[derive(Parser)]
#[command(name = "tpg_logger", version, about)]
struct Cli {
    /// Serial port of the board (e.g. /dev/ttyACM0, COM3)
    #[arg(short, long, required_unless_present = "list")]
    port: Option<String>,

    /// Number of readings to take
    #[arg(short = 'n', long, default_value_t = DEFAULT_COUNT)]
    count: usize,

    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Per-line read timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,

    /// CSV file to write
    #[arg(short, long, default_value = "./tpg_data.csv")]
    output: PathBuf,

    /// Prefix the output file name with the local date and time
    #[arg(long)]
    timestamped: bool,

    /// Leave dropped readings out instead of writing zero rows
    #[arg(long)]
    omit_dropped: bool,

    /// Don't open the plot window
    #[arg(long)]
    no_plot: bool,

    /// List serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn print_ports() -> Result<()> {
    for line in port::listing_lines(&port::list_ports()?) {
        println!("{line}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.list {
        return print_ports();
    }

    if let Err(e) = print_ports() {
        warn!("{e:#}");
    }

    let port_path = cli.port.context("No serial port given")?;
    let config = AcquireConfig::new(&port_path)
        .with_baud_rate(cli.baud)
        .with_count(cli.count)
        .with_timeout(Duration::from_millis(cli.timeout_ms));

    let policy = if cli.omit_dropped {
        RowPolicy::Omit
    } else {
        RowPolicy::ZeroFill
    };

    info!(
        "{}: reading {} samples from {} at {} baud",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        config.count,
        config.port_path,
        config.baud_rate
    );

    let dev = port::open(&config)?;
    let table = acquire(dev, config.count, config.field_count, config.timeout)?;

    let path = if cli.timestamped {
        export::timestamped(&cli.output)
    } else {
        cli.output
    };
    export::write_csv(&path, &table, policy)?;

    println!(
        "Saved {} readings ({} requested) to {}",
        table.filled(),
        table.len(),
        path.display()
    );

    if !cli.no_plot {
        plot::show(&table, policy)?;
    }

    Ok(())
}
