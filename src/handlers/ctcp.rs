use log::*;

use crate::irc::ClientCommand;

pub const CTCP_DELIM: char = '\u{0001}';

// KEEP THIS IN SYNC WITH THE ENUM BELOW
const IMPLEMENTED_CTCP: &[&str] = ["ACTION", "CLIENTINFO"].as_slice();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtcpCommand {
    Action(String),
    Clientinfo,
}

impl CtcpCommand {
    /// the text of a PRIVMSG carrying this command
    pub fn irc_string(&self) -> String {
        let inner = match self {
            CtcpCommand::Action(action) => format!("ACTION {}", action),
            CtcpCommand::Clientinfo => String::from("CLIENTINFO"),
        };

        format!("{}{}{}", CTCP_DELIM, inner, CTCP_DELIM)
    }

    pub fn to_command(&self, target: impl Into<String>) -> ClientCommand {
        ClientCommand::Privmsg {
            target: target.into(),
            text: self.irc_string(),
        }
    }
}

pub fn is_ctcp(msg: &str) -> bool {
    msg.starts_with(CTCP_DELIM)
}

/// parses the text of a PRIVMSG that starts with the CTCP delimiter
pub fn parse_ctcp(msg: &str) -> Option<CtcpCommand> {
    let body = msg.strip_prefix(CTCP_DELIM)?;
    // the closing delimiter is optional
    let body = body.split(CTCP_DELIM).next().unwrap_or(body);

    let (cmd, params) = match body.split_once(' ') {
        Some((cmd, params)) => (cmd, params),
        None => (body, ""),
    };
    if cmd.is_empty() || !cmd.bytes().all(is_valid_ctcp_command) {
        warn!("invalid CTCP command {:?}", cmd);
        return None;
    }
    let params = params
        .chars()
        // this will stop at any characters that can't be in an IRC message
        .take_while(|&c| !matches!(c, '\0' | '\r' | '\n'))
        .collect::<String>();

    match cmd {
        "ACTION" => Some(CtcpCommand::Action(params)),
        "CLIENTINFO" => Some(CtcpCommand::Clientinfo),
        unk => {
            warn!("unknown CTCP command {:?}", unk);
            None
        }
    }
}

fn is_valid_ctcp_command(c: u8) -> bool {
    matches!(c, 0x02..=0x09 | 0x0B..=0x0C | 0x0E..=0x1F | 0x21..=0xFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtcpReply {
    Clientinfo,
}

impl CtcpReply {
    /// replies are sent as a NOTICE to the nick that asked
    pub fn to_command(self, nick: impl Into<String>) -> ClientCommand {
        ClientCommand::Notice {
            target: nick.into(),
            text: self.irc_string(),
        }
    }

    fn irc_string(self) -> String {
        match self {
            CtcpReply::Clientinfo => {
                format!(
                    "{}CLIENTINFO {}{}",
                    CTCP_DELIM,
                    IMPLEMENTED_CTCP.join(" "),
                    CTCP_DELIM
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action() {
        assert_eq!(
            parse_ctcp("\u{1}ACTION waves hello\u{1}"),
            Some(CtcpCommand::Action(String::from("waves hello")))
        );
        // some clients leave off the closing delimiter
        assert_eq!(
            parse_ctcp("\u{1}ACTION waves"),
            Some(CtcpCommand::Action(String::from("waves")))
        );
    }

    #[test]
    fn parse_clientinfo() {
        assert_eq!(parse_ctcp("\u{1}CLIENTINFO\u{1}"), Some(CtcpCommand::Clientinfo));
        assert_eq!(parse_ctcp("\u{1}VERSION\u{1}"), None);
        assert_eq!(parse_ctcp("\u{1}\u{1}"), None);
        assert_eq!(parse_ctcp("no delimiter"), None);
    }

    #[test]
    fn commands_and_replies() {
        let action = CtcpCommand::Action(String::from("waves")).to_command("#rust");
        assert_eq!(
            action.irc_str().unwrap(),
            "PRIVMSG #rust :\u{1}ACTION waves\u{1}"
        );
        assert_eq!(
            CtcpReply::Clientinfo.to_command("mike").irc_str().unwrap(),
            "NOTICE mike :\u{1}CLIENTINFO ACTION CLIENTINFO\u{1}"
        );
    }
}
