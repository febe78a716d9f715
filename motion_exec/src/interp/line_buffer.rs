//! Splits the incoming byte stream into bounded lines.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use motion_if::MAX_LINE_LEN;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct LineBuffer {
    buf: Vec<u8>,

    /// Set after an overflow, bytes are dropped until the end of the line
    discarding: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete, non-empty line without its terminator
    Line(String),

    /// The current line grew past the maximum length and has been dropped
    Overflow,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_LINE_LEN),
            discarding: false,
        }
    }

    /// Feed one byte, returning an event if it completes or overflows a line.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let was_discarding = self.discarding;
                self.discarding = false;

                if was_discarding || self.buf.is_empty() {
                    self.buf.clear();
                    return None;
                }

                let line = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                Some(LineEvent::Line(line))
            }
            _ if self.discarding => None,
            _ if self.buf.len() >= MAX_LINE_LEN => {
                self.buf.clear();
                self.discarding = true;
                Some(LineEvent::Overflow)
            }
            b => {
                self.buf.push(b);
                None
            }
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn feed(lb: &mut LineBuffer, bytes: &[u8]) -> Vec<LineEvent> {
        bytes.iter().filter_map(|&b| lb.push(b)).collect()
    }

    #[test]
    fn test_lines() {
        let mut lb = LineBuffer::new();

        assert_eq!(
            feed(&mut lb, b"PING\r\n\n\r\nS 1 1500\n"),
            vec![
                LineEvent::Line("PING".into()),
                LineEvent::Line("S 1 1500".into())
            ]
        );

        // Partial lines wait for their terminator
        assert!(feed(&mut lb, b"LOG O").is_empty());
        assert_eq!(feed(&mut lb, b"N\n"), vec![LineEvent::Line("LOG ON".into())]);
    }

    #[test]
    fn test_max_length_line_accepted() {
        let mut lb = LineBuffer::new();
        let mut line = vec![b'x'; MAX_LINE_LEN];
        line.push(b'\n');

        assert_eq!(
            feed(&mut lb, &line),
            vec![LineEvent::Line("x".repeat(MAX_LINE_LEN))]
        );
    }

    #[test]
    fn test_overflow_reported_once() {
        let mut lb = LineBuffer::new();

        let mut bytes = vec![b'x'; 200];
        bytes.extend_from_slice(b"\nPING\n");

        assert_eq!(
            feed(&mut lb, &bytes),
            vec![LineEvent::Overflow, LineEvent::Line("PING".into())]
        );
    }

    #[test]
    fn test_carriage_return_not_counted() {
        let mut lb = LineBuffer::new();
        let mut bytes = vec![b'\r'; 100];
        bytes.extend_from_slice(b"PING\n");

        assert_eq!(feed(&mut lb, &bytes), vec![LineEvent::Line("PING".into())]);
    }
}
