mod config;
mod error;
mod line_logger;
mod log_file;
mod log_record;
mod serial_source;

use anyhow::{Context, Result};
use clap::Parser;
use error::LoggerError;
use line_logger::LineLogger;
use log::{error, info, LevelFilter};
use serial_source::SerialLineSource;
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .context("Failed to initialise logging")?;

    info!("Starting serial-line-logger");

    if cli.list_ports {
        return print_ports();
    }

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Configuration loaded: {:?}", config);

    let source = match SerialLineSource::open(&config) {
        Ok(source) => source,
        Err(e) => {
            error!("Could not open {}: {}", config.port, e);
            println!("Failed to access serial port: {}", e);
            return Ok(());
        }
    };
    println!("Reading from {} at {} baud", config.port, config.baud_rate);

    let log = log_file::open(&config.log_file)
        .with_context(|| format!("Failed to open log file: {}", config.log_file.display()))?;
    info!("Appending to log file: {}", config.log_file.display());

    let mut logger = LineLogger::new(source, log, std::io::stdout(), &config);

    let stopped = match logger.run(shutdown_signal()).await {
        Ok(never) => match never {},
        Err(e) => e,
    };
    info!("{} lines logged", logger.lines_logged());

    match stopped {
        LoggerError::Device(e) => {
            error!("Serial connection failed: {}", e);
            println!("Failed to access serial port: {}", e);
            Ok(())
        }
        LoggerError::Interrupted => {
            println!("Program stopped.");
            Ok(())
        }
        other => Err(other).context("Serial logging aborted"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_ports() -> Result<()> {
    let ports = serial_source::list_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }

    Ok(())
}
