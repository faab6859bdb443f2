use log::*;

use crate::irc::{IrcCommand, Prefix};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub raw: String,
    pub prefix: Option<Prefix>,
    pub command: IrcCommand,
    /// the client's own nick as far as the server is concerned. only set for numeric replies.
    pub target: Option<String>,
    /// parameters as they appeared on the wire. the trailing parameter is kept as a single
    /// element, including its leading `:`. use [`IrcMessage::arg`] and
    /// [`IrcMessage::text_from`] to read them.
    pub parameters: Vec<String>,
}

impl IrcMessage {
    /// parses a single line, without its CRLF. parsing never fails: malformed input produces a
    /// message with whatever fields could be found, and an empty line has an empty
    /// `Unrecognized` command.
    pub fn parse(line: &str) -> Self {
        let raw = line.to_string();
        let mut s = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');

        // optional tags section. tags are not used by the engine.
        if s.starts_with('@') {
            let (_, rest) = next_token(s);
            s = rest;
        }

        // optional source section
        let prefix = match s.strip_prefix(':') {
            Some(rest) => {
                let (source, rest) = next_token(rest);
                s = rest;
                let prefix = Prefix::parse(source);
                trace!("parsed prefix: {:?}", prefix);
                Some(prefix)
            }
            None => None,
        };

        let (command, rest) = next_token(s);
        let command = IrcCommand::parse(command);
        let mut parameters = parse_params(rest);

        let target = if command.is_numeric() && !parameters.is_empty() {
            let target = parameters.remove(0);
            Some(match target.strip_prefix(':') {
                Some(target) => target.to_string(),
                None => target,
            })
        } else {
            None
        };

        IrcMessage {
            raw,
            prefix,
            command,
            target,
            parameters,
        }
    }

    /// the subject (nick or server name) of the prefix
    pub fn subject(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.subject.as_str())
    }

    /// the nth parameter, with the trailing `:` removed
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.parameters.get(n).map(|p| decode(p))
    }

    pub fn last_arg(&self) -> Option<&str> {
        self.parameters.last().map(|p| decode(p))
    }

    /// every parameter from the nth on, with the trailing `:` removed
    pub fn args_from(&self, n: usize) -> impl Iterator<Item = &str> {
        self.parameters.iter().skip(n).map(|p| decode(p))
    }

    /// the free text starting at parameter n. this is the single place where the trailing
    /// parameter convention is undone, handlers must go through it.
    pub fn text_from(&self, n: usize) -> String {
        self.args_from(n).collect::<Vec<_>>().join(" ")
    }
}

fn decode(param: &str) -> &str {
    param.strip_prefix(':').unwrap_or(param)
}

// splits off the next space-delimited token, skipping any run of spaces after it
fn next_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

fn parse_params(s: &str) -> Vec<String> {
    let mut params = vec![];

    let mut s = s.trim_start_matches(' ');
    while !s.is_empty() {
        // NOTE: if a parameter starts with a `:`, the rest of the message is a parameter. the last
        // parameter may omit the `:` if it's not necessary to disambiguate.
        if s.starts_with(':') {
            params.push(s.to_string());
            // ate the rest of the params, return early
            return params;
        }

        let (param, rest) = next_token(s);
        params.push(param.to_string());
        s = rest;
    }

    params
}
