//! UART transport on the Raspberry Pi, through `rppal`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{io, time::Duration};

use log::info;
use rppal::uart::{Parity, Uart};

use super::{Transport, TransportError};
use crate::params::TransportParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct UartTransport {
    uart: Uart,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl UartTransport {
    /// Open the UART as 8N1 in non-blocking mode.
    pub fn new(params: &TransportParams) -> Result<Self, TransportError> {
        let mut uart = Uart::with_path(&params.uart_path, params.baud_rate, Parity::None, 8, 1)
            .map_err(to_io)?;

        // Return straight away whether or not there is data
        uart.set_read_mode(0, Duration::default()).map_err(to_io)?;

        info!(
            "UART open on {} at {} baud",
            params.uart_path, params.baud_rate
        );

        Ok(Self { uart })
    }
}

impl Transport for UartTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut buf = [0u8; 1];

        match self.uart.read(&mut buf).map_err(to_io)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let mut written = 0;
        while written < bytes.len() {
            written += self.uart.write(&bytes[written..]).map_err(to_io)?;
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn to_io(e: rppal::uart::Error) -> TransportError {
    match e {
        rppal::uart::Error::Io(e) => TransportError::Io(e),
        e => TransportError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())),
    }
}
