use crate::config::Config;
use crate::error::LoggerError;
use log::{debug, info, trace};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Something the logger can poll for bytes and pull lines from.
#[allow(async_fn_in_trait)]
pub trait LineSource {
    /// Number of bytes that can be read without waiting.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Reads bytes up to and including `\n`. If the read timeout expires
    /// first, whatever arrived so far is returned. An empty result means
    /// nothing arrived at all.
    async fn read_line(&mut self) -> io::Result<Vec<u8>>;
}

/// Serial port opened through tokio-serial.
pub struct SerialLineSource {
    reader: BufReader<SerialStream>,
    read_timeout: Duration,
}

impl SerialLineSource {
    pub fn open(config: &Config) -> Result<Self, LoggerError> {
        let port = tokio_serial::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout())
            .open_native_async()?;

        info!("Connected to serial port: {}", config.port);

        Ok(Self::from_stream(port, config.read_timeout()))
    }

    pub fn from_stream(port: SerialStream, read_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(port),
            read_timeout,
        }
    }
}

impl LineSource for SerialLineSource {
    fn bytes_available(&mut self) -> io::Result<usize> {
        // Bytes already pulled into the BufReader are no longer visible to
        // the driver's count.
        let buffered = self.reader.buffer().len();
        let pending = self.reader.get_ref().bytes_to_read()?;
        Ok(buffered + pending as usize)
    }

    async fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();

        // read_until keeps partially read bytes in `line` when cancelled.
        match timeout(self.read_timeout, self.reader.read_until(b'\n', &mut line)).await {
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port closed",
            )),
            Ok(Ok(n)) => {
                trace!("Read {} bytes from serial port", n);
                Ok(line)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(
                    "Read timed out after {:?} with {} bytes",
                    self.read_timeout,
                    line.len()
                );
                Ok(line)
            }
        }
    }
}

/// Serial ports reported by the operating system.
pub fn list_ports() -> Result<Vec<String>, LoggerError> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
