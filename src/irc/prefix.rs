use core::fmt::Display;

/// the `:source` segment of a message. `subject` is the nick or server name, everything before
/// the first `!` or `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix {
    pub raw: String,
    pub subject: String,
}

impl Prefix {
    pub fn parse(s: &str) -> Prefix {
        // may be only hostname, but it could just be `nick@host`
        let subject = match s.find(['!', '@']) {
            Some(idx) => &s[..idx],
            None => s,
        };

        Prefix {
            raw: s.to_string(),
            subject: subject.to_string(),
        }
    }

    /// servers are sent as a bare hostname. nicks can't contain a `.`, so a bare name with a dot
    /// is a server.
    pub fn is_server(&self) -> bool {
        self.raw == self.subject && self.subject.contains('.')
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.subject)
    }
}
