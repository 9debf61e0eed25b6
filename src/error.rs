use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Serial port error: {0}")]
    Device(#[from] tokio_serial::Error),

    #[error("Interrupted")]
    Interrupted,

    #[error("Invalid UTF-8 on serial line: {0}")]
    Decode(#[from] FromUtf8Error),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl LoggerError {
    /// Wraps an io error coming from the serial side, which is a device
    /// failure rather than an output failure.
    pub fn device(err: std::io::Error) -> Self {
        LoggerError::Device(err.into())
    }
}
