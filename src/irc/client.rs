use thiserror::Error;

/// a command sent by the client. clients never send a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Pass(String),
    Nick(String),
    User {
        username: String,
        real_name: String,
    },
    Pong(String),
    Oper {
        name: String,
        password: String,
    },
    Quit(Option<String>),
    Join {
        channel: String,
        key: Option<String>,
    },
    Part {
        channel: String,
        reason: Option<String>,
    },
    Topic {
        channel: String,
        topic: String,
    },
    Invite {
        nick: String,
        channel: String,
    },
    Kick {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    Mode {
        target: String,
        modes: String,
    },
    Privmsg {
        target: String,
        text: String,
    },
    Notice {
        target: String,
        text: String,
    },
    Raw(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientCommandErr {
    #[error("message contains a line break")]
    LineBreak,
    #[error("{} must not be empty", .0)]
    EmptyParam(&'static str),
    #[error("{} {:?} must not contain spaces", .0, .1)]
    InvalidParam(&'static str, String),
}

impl ClientCommand {
    /// formats the command for the wire, without the CRLF
    pub fn irc_str(&self) -> Result<String, ClientCommandErr> {
        let msg = match self {
            ClientCommand::Pass(pass) => format!("PASS {}", trailing(pass)),
            ClientCommand::Nick(nick) => format!("NICK {}", middle("nick", nick)?),
            ClientCommand::User {
                username,
                real_name,
            } => format!("USER {} 0 * :{}", middle("username", username)?, real_name),
            ClientCommand::Pong(token) => format!("PONG {}", trailing(token)),
            ClientCommand::Oper { name, password } => {
                format!("OPER {} {}", middle("name", name)?, trailing(password))
            }
            ClientCommand::Quit(reason) => match reason {
                Some(reason) => format!("QUIT :{}", reason),
                None => String::from("QUIT"),
            },
            ClientCommand::Join { channel, key } => match key {
                Some(key) => format!("JOIN {} {}", middle("channel", channel)?, middle("key", key)?),
                None => format!("JOIN {}", middle("channel", channel)?),
            },
            ClientCommand::Part { channel, reason } => match reason {
                Some(reason) => format!("PART {} :{}", middle("channel", channel)?, reason),
                None => format!("PART {}", middle("channel", channel)?),
            },
            ClientCommand::Topic { channel, topic } => {
                format!("TOPIC {} :{}", middle("channel", channel)?, topic)
            }
            ClientCommand::Invite { nick, channel } => format!(
                "INVITE {} {}",
                middle("nick", nick)?,
                middle("channel", channel)?
            ),
            ClientCommand::Kick {
                channel,
                nick,
                reason,
            } => {
                let mut msg = format!("KICK {} {}", middle("channel", channel)?, middle("nick", nick)?);
                if let Some(reason) = reason {
                    msg.push_str(" :");
                    msg.push_str(reason);
                }
                msg
            }
            ClientCommand::Mode { target, modes } => {
                let target = middle("target", target)?;
                if modes.is_empty() {
                    format!("MODE {}", target)
                } else {
                    format!("MODE {} {}", target, modes)
                }
            }
            ClientCommand::Privmsg { target, text } => {
                format!("PRIVMSG {} :{}", middle("target", target)?, text)
            }
            ClientCommand::Notice { target, text } => {
                format!("NOTICE {} :{}", middle("target", target)?, text)
            }
            ClientCommand::Raw(text) => text.to_string(),
        };

        if msg.contains(['\r', '\n']) {
            return Err(ClientCommandErr::LineBreak);
        }

        Ok(msg)
    }
}

// a parameter that must be a single token
fn middle<'a>(name: &'static str, param: &'a str) -> Result<&'a str, ClientCommandErr> {
    if param.is_empty() {
        Err(ClientCommandErr::EmptyParam(name))
    } else if param.contains(' ') || param.starts_with(':') {
        Err(ClientCommandErr::InvalidParam(name, param.to_string()))
    } else {
        Ok(param)
    }
}

// only adds the `:` when it's needed to disambiguate, so PONG echoes the token verbatim
fn trailing(param: &str) -> String {
    if param.is_empty() || param.contains(' ') || param.starts_with(':') {
        format!(":{}", param)
    } else {
        param.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration() {
        assert_eq!(
            ClientCommand::Nick(String::from("mike")).irc_str(),
            Ok(String::from("NICK mike"))
        );
        assert_eq!(
            ClientCommand::User {
                username: String::from("mike"),
                real_name: String::from("Mike Smith"),
            }
            .irc_str(),
            Ok(String::from("USER mike 0 * :Mike Smith"))
        );
    }

    #[test]
    fn pong_echoes_token() {
        assert_eq!(
            ClientCommand::Pong(String::from("irc.example.com")).irc_str(),
            Ok(String::from("PONG irc.example.com"))
        );
        assert_eq!(
            ClientCommand::Pong(String::from("two words")).irc_str(),
            Ok(String::from("PONG :two words"))
        );
    }

    #[test]
    fn kick_with_and_without_reason() {
        let kick = ClientCommand::Kick {
            channel: String::from("#rust"),
            nick: String::from("troll"),
            reason: Some(String::from("be nice")),
        };
        assert_eq!(kick.irc_str(), Ok(String::from("KICK #rust troll :be nice")));
        let kick = ClientCommand::Kick {
            channel: String::from("#rust"),
            nick: String::from("troll"),
            reason: None,
        };
        assert_eq!(kick.irc_str(), Ok(String::from("KICK #rust troll")));
    }

    #[test]
    fn rejects_line_breaks() {
        let msg = ClientCommand::Privmsg {
            target: String::from("#rust"),
            text: String::from("hi\r\nQUIT"),
        };
        assert_eq!(msg.irc_str(), Err(ClientCommandErr::LineBreak));
        assert_eq!(
            ClientCommand::Raw(String::from("JOIN #a\nJOIN #b")).irc_str(),
            Err(ClientCommandErr::LineBreak)
        );
    }

    #[test]
    fn rejects_bad_targets() {
        let msg = ClientCommand::Join {
            channel: String::from("#a b"),
            key: None,
        };
        assert!(matches!(
            msg.irc_str(),
            Err(ClientCommandErr::InvalidParam("channel", _))
        ));
        assert_eq!(
            ClientCommand::Nick(String::new()).irc_str(),
            Err(ClientCommandErr::EmptyParam("nick"))
        );
    }

    #[test]
    fn mode_query_and_change() {
        let query = ClientCommand::Mode {
            target: String::from("#rust"),
            modes: String::new(),
        };
        assert_eq!(query.irc_str(), Ok(String::from("MODE #rust")));
        let change = ClientCommand::Mode {
            target: String::from("#rust"),
            modes: String::from("+bk mask key"),
        };
        assert_eq!(change.irc_str(), Ok(String::from("MODE #rust +bk mask key")));
    }
}
