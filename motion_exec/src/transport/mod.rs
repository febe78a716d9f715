//! # Transport Module
//!
//! The command protocol runs over a byte stream in and a line stream out. The main loop never
//! blocks on the transport: [`Transport::read_byte`] returns `Ok(None)` when no byte is waiting.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Raspberry Pi UART transport.
#[cfg(all(any(target_arch = "arm", target_arch = "aarch64"), target_os = "linux"))]
pub mod uart;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::mpsc::{channel, Receiver, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, warn};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Transport {
    /// Get the next available input byte, or `None` if there isn't one right now.
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write one line, the line terminator is added by the transport.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// In-memory transport, input is pushed by the caller and output is collected.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    input: VecDeque<u8>,
    output: Vec<String>,

    /// Once set and the input is drained, reads report the transport as closed
    closed: bool,
}

/// Transport over the process's stdin and stdout.
///
/// stdin is read by a background thread so that the main loop can poll it.
pub struct StdioTransport {
    rx: Receiver<u8>,

    _bg_jh: JoinHandle<()>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Transport IO error: {0}")]
    Io(#[from] io::Error),

    #[error("The transport has been closed")]
    Closed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be read.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Take every line written so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Close the input side once the queued bytes have been read.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Transport for LoopbackTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        match self.input.pop_front() {
            Some(b) => Ok(Some(b)),
            None if self.closed => Err(TransportError::Closed),
            None => Ok(None),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.output.push(line.to_string());
        Ok(())
    }
}

impl StdioTransport {
    /// Start the stdin reader thread.
    pub fn new() -> Self {
        let (tx, rx) = channel();

        let bg_jh = thread::spawn(move || {
            let stdin = io::stdin();
            let mut stdin = stdin.lock();
            let mut buf = [0u8; 256];

            loop {
                let n = match stdin.read(&mut buf) {
                    Ok(0) => {
                        debug!("stdin closed");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Error reading stdin: {}", e);
                        break;
                    }
                };

                // Receiver dropped, nobody is listening anymore
                if buf[..n].iter().any(|&b| tx.send(b).is_err()) {
                    break;
                }
            }
        });

        Self { rx, _bg_jh: bg_jh }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StdioTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        match self.rx.try_recv() {
            Ok(b) => Ok(Some(b)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_loopback() {
        let mut t = LoopbackTransport::new();
        assert!(matches!(t.read_byte(), Ok(None)));

        t.push_input(b"AB");
        assert!(matches!(t.read_byte(), Ok(Some(b'A'))));

        t.close();
        // Queued input is still delivered before the close is reported
        assert!(matches!(t.read_byte(), Ok(Some(b'B'))));
        assert!(matches!(t.read_byte(), Err(TransportError::Closed)));

        t.write_line("PONG").unwrap();
        t.write_line("OK").unwrap();
        assert_eq!(t.take_output(), vec!["PONG", "OK"]);
        assert!(t.take_output().is_empty());
    }
}
