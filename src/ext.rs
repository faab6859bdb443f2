use std::io::{self, Read, Write};

pub trait StrExt {
    fn split_first_matches(&self, c: char) -> Option<(char, &str)>;
}

impl StrExt for str {
    fn split_first_matches(&self, c: char) -> Option<(char, &str)> {
        self.strip_prefix(c).map(|rest| (c, rest))
    }
}

/// a stream that can be both read from and written to, so that plain and TLS connections can be
/// handled the same
pub trait ReadWrite: Read + Write {}

impl<T: Read + Write> ReadWrite for T {}

pub trait WriteExt: Write {
    /// like `write_all`, but keeps trying when a nonblocking stream isn't ready yet. flushes once
    /// everything is written.
    fn write_all_blocking(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => buf = &buf[n..],
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }

        loop {
            match self.flush() {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<W: Write + ?Sized> WriteExt for W {}
