use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "./serial-logger.toml";

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Parser, Debug, Default)]
#[clap(name = "serial-line-logger", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Override serial port path (e.g. /dev/ttyUSB0, COM14)
    #[clap(long)]
    pub port: Option<String>,

    /// Override baud rate
    #[clap(long)]
    pub baud_rate: Option<u32>,

    /// Override read timeout in seconds
    #[clap(long)]
    pub timeout: Option<f64>,

    /// Override log file path
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// What to do with lines that are not valid UTF-8
    #[clap(long, value_enum)]
    pub invalid_utf8: Option<InvalidUtf8Policy>,

    /// List available serial ports and exit
    #[clap(long)]
    pub list_ports: bool,

    /// Increase diagnostic output (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InvalidUtf8Policy {
    /// Decode lossily, substituting U+FFFD
    #[default]
    Replace,
    /// Drop the line
    Skip,
    /// Stop logging with an error
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_secs: f64,
    pub log_file: PathBuf,
    pub poll_interval_ms: u64,
    pub invalid_utf8: InvalidUtf8Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: 115200,
            timeout_secs: 1.0,
            log_file: PathBuf::from("serial_log.txt"),
            poll_interval_ms: 100,
            invalid_utf8: InvalidUtf8Policy::Replace,
        }
    }
}

impl Config {
    /// Saturates for out-of-range values; `load_config` rejects those.
    pub fn read_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            anyhow::bail!("Serial port must not be empty");
        }
        if self.baud_rate == 0 {
            anyhow::bail!("Baud rate must be greater than zero");
        }
        if self.timeout_secs <= 0.0 || Duration::try_from_secs_f64(self.timeout_secs).is_err() {
            anyhow::bail!(
                "Read timeout must be a positive number of seconds, got {}",
                self.timeout_secs
            );
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        Ok(())
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                Config::default()
            }
        }
    };

    // Apply CLI overrides
    if let Some(ref port) = cli.port {
        config.port = port.clone();
    }

    if let Some(baud_rate) = cli.baud_rate {
        config.baud_rate = baud_rate;
    }

    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }

    if let Some(ref log_file) = cli.log_file {
        config.log_file = log_file.clone();
    }

    if let Some(policy) = cli.invalid_utf8 {
        config.invalid_utf8 = policy;
    }

    config.validate().context("Invalid configuration")?;

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let config_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("serial-logger.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.log_file, PathBuf::from("serial_log.txt"));
        assert_eq!(config.invalid_utf8, InvalidUtf8Policy::Replace);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "port = \"/dev/ttyACM0\"\ntimeout_secs = 0.5\n");

        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let config = load_config(&cli).unwrap();

        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.read_timeout(), Duration::from_millis(500));
        assert_eq!(config.baud_rate, 115200);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "port = \"/dev/ttyACM0\"\nbaud_rate = 9600\ninvalid_utf8 = \"skip\"\n",
        );

        let cli = Cli {
            config: Some(path),
            port: Some("/dev/ttyUSB3".to_string()),
            baud_rate: Some(57600),
            log_file: Some(PathBuf::from("other.txt")),
            invalid_utf8: Some(InvalidUtf8Policy::Abort),
            ..Default::default()
        };
        let config = load_config(&cli).unwrap();

        assert_eq!(config.port, "/dev/ttyUSB3");
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.log_file, PathBuf::from("other.txt"));
        assert_eq!(config.invalid_utf8, InvalidUtf8Policy::Abort);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };

        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_unknown_key_is_error() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "baudrate = 9600\n");
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };

        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = Config {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            timeout_secs: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            timeout_secs: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            timeout_secs: 1e30,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            port: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_timeout_flag_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "timeout_secs = 1e30\n");

        let cli = Cli {
            config: Some(path.clone()),
            ..Default::default()
        };
        assert!(load_config(&cli).is_err());

        let cli = Cli {
            config: Some(path),
            timeout: Some(1e30),
            ..Default::default()
        };
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "serial-line-logger",
            "--port",
            "COM14",
            "--baud-rate",
            "9600",
            "--timeout",
            "2.5",
            "--invalid-utf8",
            "skip",
            "-vv",
        ]);

        assert_eq!(cli.port.as_deref(), Some("COM14"));
        assert_eq!(cli.baud_rate, Some(9600));
        assert_eq!(cli.timeout, Some(2.5));
        assert_eq!(cli.invalid_utf8, Some(InvalidUtf8Policy::Skip));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.list_ports);
    }
}
