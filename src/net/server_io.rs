use std::io;

use log::*;
use thiserror::Error;

use crate::ext::{ReadWrite, WriteExt};

// the size of the receive buffer to allocate, in bytes.
const BUFFER_SIZE: usize = 16 * 1024;

// the longest line kept: 8191 bytes of message tags and a 512 byte message
const MAX_LINE_LEN: usize = 8191 + 512;

#[derive(Debug, Error)]
pub enum MessagePollErr {
    #[error("the connection was closed")]
    Closed,
    #[error("polling was unsuccessful after {} retries", .0)]
    TooManyRetries(u8),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum LineWriteErr {
    #[error("line contains a line break: {:?}", .0)]
    LineBreak(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// splits a byte stream into lines. a line is only emitted once its `\r\n` arrived, everything
/// after the last terminator stays buffered for the next push. a line that grows past
/// `MAX_LINE_LEN` without a terminator is dropped, up to and including its `\r\n`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: String,
    // the start of a UTF8 character that was cut off at the end of the last push
    partial_char: Vec<u8>,
    // the start of the current line was dropped for being too long
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let joined;
        let bytes = if self.partial_char.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.partial_char);
            buf.extend_from_slice(bytes);
            joined = buf;
            joined.as_slice()
        };

        let (decoded, invalid) = from_utf8_lossy_split(bytes);
        debug_assert!(invalid.len() < 4);
        self.text.push_str(&decoded);
        self.partial_char = invalid.to_vec();

        let mut lines = Vec::new();
        while let Some(idx) = self.text.find("\r\n") {
            let line = self.text[..idx].to_string();
            // remove the line and its CRLF
            self.text.drain(..idx + 2);

            if std::mem::take(&mut self.discarding) {
                debug!("dropped the rest of an overlong line ({} bytes)", line.len());
                continue;
            }
            // clients should ignore 0 length messages
            if line.is_empty() {
                continue;
            }
            lines.push(line);
        }

        if self.text.len() > MAX_LINE_LEN {
            warn!("dropping {} bytes without a line break", self.text.len());
            // the CR may be the first half of the terminator
            let cr = self.text.ends_with('\r');
            self.text.clear();
            if cr {
                self.text.push('\r');
            }
            self.discarding = true;
        }
        lines
    }

    /// the text received after the last complete line
    pub fn remainder(&self) -> &str {
        self.text.as_str()
    }
}

/// line based IO on a server stream. works the same for plain and TLS streams, which are
/// expected to be nonblocking.
pub struct ServerIo {
    connection: Box<dyn ReadWrite + Send>,
    buffer: Box<[u8; BUFFER_SIZE]>,
    lines: LineBuffer,
}

impl ServerIo {
    pub fn new(connection: Box<dyn ReadWrite + Send>) -> Self {
        Self {
            connection,
            buffer: Box::new([0_u8; BUFFER_SIZE]),
            lines: LineBuffer::new(),
        }
    }

    /// writes one line, appending the CRLF
    pub fn write_line(&mut self, line: &str) -> Result<(), LineWriteErr> {
        if line.contains(['\r', '\n']) {
            return Err(LineWriteErr::LineBreak(line.to_string()));
        }
        debug!("<- {:?}", line);
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.connection.write_all_blocking(&bytes)?;
        Ok(())
    }

    /// reads whatever is available and returns the lines it completed. a nonblocking stream
    /// without data gives no lines.
    pub fn recv(&mut self) -> Result<Vec<String>, MessagePollErr> {
        const MAX_RETRIES: u8 = 5;
        let mut interrupted = 0;
        let count = loop {
            match self.connection.read(&mut self.buffer[..]) {
                // the other side closed the stream
                Ok(0) => return Err(MessagePollErr::Closed),
                Ok(count) => break count,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Vec::new()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    interrupted += 1;
                    if interrupted > MAX_RETRIES {
                        return Err(MessagePollErr::TooManyRetries(interrupted));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        let lines = self.lines.push(&self.buffer[..count]);
        for line in &lines {
            debug!("-> {:?}", line);
        }
        Ok(lines)
    }
}

// decodes a byte slice into a UTF8 string, but if the end of the slice is not valid UTF8,
// keep it to prepend to the next recv.
fn from_utf8_lossy_split(b: &[u8]) -> (String, &[u8]) {
    let mut s = String::new();
    let mut chunks = b.utf8_chunks().peekable();
    while let Some(chunk) = chunks.next() {
        s.push_str(chunk.valid());
        // if there's invalid data, either replace it if it's not at the end of the chunk,
        // or split it if it is
        if !chunk.invalid().is_empty() {
            if chunks.peek().is_some() || !is_truncated_char(chunk.invalid()) {
                // UTF8 replacement char
                s.push('\u{FFFD}');
            } else {
                // error due to end of input
                return (s, chunk.invalid());
            }
        }
    }

    // no end of input errors were found
    (s, [].as_slice())
}

// whether the bytes could be the start of a multi byte character that continues in the next read
fn is_truncated_char(b: &[u8]) -> bool {
    let Some(&first) = b.first() else {
        return false;
    };
    let expected = match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return false,
    };
    b.len() < expected && b[1..].iter().all(|&c| c & 0xC0 == 0x80)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};

    use super::*;

    #[test]
    fn partial_lines_are_carried_over() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"JOIN #a\r\nPART #a\r\nPARTIAL");
        assert_eq!(lines, vec!["JOIN #a", "PART #a"]);
        assert_eq!(buf.remainder(), "PARTIAL");

        let lines = buf.push(b" done\r\n");
        assert_eq!(lines, vec!["PARTIAL done"]);
        assert_eq!(buf.remainder(), "");
    }

    #[test]
    fn crlf_split_across_reads() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"PING :a\r").is_empty());
        assert_eq!(buf.push(b"\nPING :b\r\n"), vec!["PING :a", "PING :b"]);
    }

    #[test]
    fn empty_lines_are_ignored() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"\r\n\r\nPING :a\r\n\r\n"), vec!["PING :a"]);
    }

    #[test]
    fn overlong_lines_are_dropped() {
        let mut buf = LineBuffer::new();
        let long = vec![b'a'; MAX_LINE_LEN + 1];
        assert!(buf.push(&long).is_empty());
        assert_eq!(buf.remainder(), "");
        assert!(buf.push(&long).is_empty());
        assert_eq!(buf.remainder(), "");

        // the end of the long line goes too
        assert_eq!(buf.push(b"aaa\r\nPING :x\r\n"), vec!["PING :x"]);

        // a line right at the limit is kept
        let mut line = vec![b'b'; MAX_LINE_LEN];
        line.extend_from_slice(b"\r\n");
        assert_eq!(buf.push(&line), vec!["b".repeat(MAX_LINE_LEN)]);
    }

    #[test]
    fn utf8_split_across_reads() {
        let text = "PRIVMSG #a :zażółć\r\n".as_bytes();
        // split inside the two byte `ż`
        let split = text.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let mut buf = LineBuffer::new();
        assert!(buf.push(&text[..split]).is_empty());
        assert_eq!(buf.push(&text[split..]), vec!["PRIVMSG #a :zażółć"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"a\xFFb\r\n"), vec!["a\u{FFFD}b"]);
    }

    // a stream that hands out the given chunks one read at a time
    struct Chunks {
        chunks: Vec<&'static [u8]>,
        written: Vec<u8>,
    }

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            Cursor::new(chunk).read(buf)
        }
    }

    impl Write for Chunks {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn recv_and_write() {
        let stream = Chunks {
            chunks: vec![b"PING :one\r\nPI", b"NG :two\r\n"],
            written: Vec::new(),
        };
        let mut io = ServerIo::new(Box::new(stream));
        assert_eq!(io.recv().unwrap(), vec!["PING :one"]);
        assert_eq!(io.recv().unwrap(), vec!["PING :two"]);
        assert!(matches!(io.recv(), Err(MessagePollErr::Closed)));

        io.write_line("PONG one").unwrap();
        assert!(matches!(
            io.write_line("PONG one\r\nQUIT"),
            Err(LineWriteErr::LineBreak(_))
        ));
    }
}
