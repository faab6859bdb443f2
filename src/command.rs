use thiserror::Error;

use crate::{
    channel::ChannelKind,
    connection::ConnectionId,
    ext::StrExt,
    session::{SessionController, SessionErr},
};

/// a line typed by the user. lines starting with `/` are commands, anything else is a message to
/// the current channel. `//` sends a message starting with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Join {
        channel: String,
        key: Option<String>,
    },
    /// parts the current channel when no channel is given
    Part {
        channel: Option<String>,
        reason: Option<String>,
    },
    Close(Option<String>),
    Query(String),
    Msg {
        target: String,
        text: String,
    },
    Me(String),
    Mode {
        target: String,
        modes: String,
    },
    Topic {
        channel: Option<String>,
        topic: String,
    },
    Kick {
        nick: String,
        reason: Option<String>,
    },
    Invite {
        nick: String,
        channel: Option<String>,
    },
    Oper {
        name: String,
        password: String,
    },
    Quit(Option<String>),
    Raw(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseErr {
    #[error("missing a command")]
    MissingCommand,
    #[error("unknown command /{}", .0)]
    UnknownCommand(String),
    #[error("/{} needs a {}", .0, .1)]
    MissingArgument(&'static str, &'static str),
}

#[derive(Debug, Error)]
pub enum CommandRunErr {
    #[error("no channel is open")]
    NoChannel,
    #[error(transparent)]
    Session(#[from] SessionErr),
}

impl Command {
    pub fn parse<S: AsRef<str>>(s: S) -> Result<Self, CommandParseErr> {
        let s = s.as_ref().trim_end();
        let Some((_, s)) = s.split_first_matches('/') else {
            return Ok(Command::Message(s.to_string()));
        };
        if s.starts_with('/') {
            return Ok(Command::Message(s.to_string()));
        }

        let (cmd, rest) = match s.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim_start()),
            None => (s, ""),
        };
        if cmd.is_empty() {
            return Err(CommandParseErr::MissingCommand);
        }
        let mut args = Args { cmd: "", rest };

        let command = match cmd.to_lowercase().as_str() {
            "join" | "j" => {
                args.cmd = "join";
                Command::Join {
                    channel: args.word("channel")?,
                    key: args.optional_word(),
                }
            }
            "part" | "leave" => {
                let channel = args.optional_channel();
                Command::Part {
                    channel,
                    reason: args.optional_text(),
                }
            }
            "close" => Command::Close(args.optional_word()),
            "query" => {
                args.cmd = "query";
                Command::Query(args.word("nick")?)
            }
            "msg" | "privmsg" => {
                args.cmd = "msg";
                Command::Msg {
                    target: args.word("target")?,
                    text: args.text("message")?,
                }
            }
            "me" => {
                args.cmd = "me";
                Command::Me(args.text("action")?)
            }
            "mode" => {
                args.cmd = "mode";
                Command::Mode {
                    target: args.word("target")?,
                    modes: args.optional_text().unwrap_or_default(),
                }
            }
            "topic" => {
                args.cmd = "topic";
                let channel = args.optional_channel();
                Command::Topic {
                    channel,
                    topic: args.text("topic")?,
                }
            }
            "kick" => {
                args.cmd = "kick";
                Command::Kick {
                    nick: args.word("nick")?,
                    reason: args.optional_text(),
                }
            }
            "invite" => {
                args.cmd = "invite";
                Command::Invite {
                    nick: args.word("nick")?,
                    channel: args.optional_word(),
                }
            }
            "oper" => {
                args.cmd = "oper";
                Command::Oper {
                    name: args.word("name")?,
                    password: args.text("password")?,
                }
            }
            "quit" | "exit" => Command::Quit(args.optional_text()),
            "raw" | "quote" => {
                args.cmd = "raw";
                Command::Raw(args.text("line")?)
            }
            _ => return Err(CommandParseErr::UnknownCommand(cmd.to_string())),
        };
        Ok(command)
    }

    /// runs the command on a connection. `current` is the channel the user is looking at.
    pub fn run(
        self,
        session: &mut SessionController,
        id: ConnectionId,
        current: Option<&str>,
    ) -> Result<(), CommandRunErr> {
        let current_channel = || current.map(str::to_string).ok_or(CommandRunErr::NoChannel);

        match self {
            Command::Message(text) => session.send_message(id, &current_channel()?, &text)?,
            Command::Join { channel, key } => session.join_channel(id, &channel, key)?,
            Command::Part { channel, reason } => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => current_channel()?,
                };
                session.part_channel(id, &channel, reason)?
            }
            Command::Close(channel) => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => current_channel()?,
                };
                session.close_channel(id, &channel)?
            }
            Command::Query(nick) => session.open_private_message(id, &nick)?,
            Command::Msg { target, text } => session.send_message(id, &target, &text)?,
            Command::Me(action) => session.send_action(id, &current_channel()?, &action)?,
            Command::Mode { target, modes } => {
                if ChannelKind::for_name(&target) == ChannelKind::MultiUser {
                    session.set_channel_mode(id, &target, &modes)?
                } else {
                    session.set_user_mode(id, &modes)?
                }
            }
            Command::Topic { channel, topic } => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => current_channel()?,
                };
                session.set_channel_topic(id, &channel, &topic)?
            }
            Command::Kick { nick, reason } => session.kick_user(id, &current_channel()?, &nick, reason)?,
            Command::Invite { nick, channel } => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => current_channel()?,
                };
                session.invite_user(id, &nick, &channel)?
            }
            Command::Oper { name, password } => session.operator_login(id, &name, &password)?,
            Command::Quit(reason) => {
                // the caller decides whether to wait for the close
                let _ = session.disconnect(id, reason)?;
            }
            Command::Raw(line) => session.send_raw(id, &line)?,
        }
        Ok(())
    }
}

// the unparsed arguments of a command
struct Args<'a> {
    cmd: &'static str,
    rest: &'a str,
}

impl Args<'_> {
    fn optional_word(&mut self) -> Option<String> {
        if self.rest.is_empty() {
            return None;
        }
        let (word, rest) = match self.rest.split_once(' ') {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some(word.to_string())
    }

    fn word(&mut self, name: &'static str) -> Result<String, CommandParseErr> {
        self.optional_word()
            .ok_or(CommandParseErr::MissingArgument(self.cmd, name))
    }

    // only takes the next word if it names a channel
    fn optional_channel(&mut self) -> Option<String> {
        let next = self.rest.split(' ').next().unwrap_or_default();
        if !next.is_empty() && ChannelKind::for_name(next) == ChannelKind::MultiUser {
            self.optional_word()
        } else {
            None
        }
    }

    fn optional_text(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.rest);
        (!text.is_empty()).then(|| text.to_string())
    }

    fn text(&mut self, name: &'static str) -> Result<String, CommandParseErr> {
        self.optional_text()
            .ok_or(CommandParseErr::MissingArgument(self.cmd, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            Command::parse("hello there"),
            Ok(Command::Message(String::from("hello there")))
        );
        assert_eq!(
            Command::parse("//slash"),
            Ok(Command::Message(String::from("/slash")))
        );
        assert_eq!(Command::parse("/"), Err(CommandParseErr::MissingCommand));
    }

    #[test]
    fn channel_commands() {
        assert_eq!(
            Command::parse("/JOIN #rust secret"),
            Ok(Command::Join {
                channel: String::from("#rust"),
                key: Some(String::from("secret")),
            })
        );
        assert_eq!(
            Command::parse("/part going  home"),
            Ok(Command::Part {
                channel: None,
                reason: Some(String::from("going  home")),
            })
        );
        assert_eq!(
            Command::parse("/part #rust bye"),
            Ok(Command::Part {
                channel: Some(String::from("#rust")),
                reason: Some(String::from("bye")),
            })
        );
        assert_eq!(
            Command::parse("/topic #rust be nice"),
            Ok(Command::Topic {
                channel: Some(String::from("#rust")),
                topic: String::from("be nice"),
            })
        );
        assert_eq!(
            Command::parse("/mode #rust +o-v mike piotr"),
            Ok(Command::Mode {
                target: String::from("#rust"),
                modes: String::from("+o-v mike piotr"),
            })
        );
    }

    #[test]
    fn missing_arguments() {
        assert_eq!(
            Command::parse("/join"),
            Err(CommandParseErr::MissingArgument("join", "channel"))
        );
        assert_eq!(
            Command::parse("/msg mike"),
            Err(CommandParseErr::MissingArgument("msg", "message"))
        );
        assert_eq!(
            Command::parse("/oper admin"),
            Err(CommandParseErr::MissingArgument("oper", "password"))
        );
        assert_eq!(
            Command::parse("/dance"),
            Err(CommandParseErr::UnknownCommand(String::from("dance")))
        );
    }

    #[test]
    fn free_text_commands() {
        assert_eq!(
            Command::parse("/me waves"),
            Ok(Command::Me(String::from("waves")))
        );
        assert_eq!(
            Command::parse("/raw PRIVMSG #rust :hi"),
            Ok(Command::Raw(String::from("PRIVMSG #rust :hi")))
        );
        assert_eq!(Command::parse("/quit"), Ok(Command::Quit(None)));
    }

    #[test]
    fn run_needs_a_channel() {
        let (mut session, _) = SessionController::new();
        let id = session.add_connection(crate::connection::test_server());
        let err = Command::Me(String::from("waves"))
            .run(&mut session, id, None)
            .unwrap_err();
        assert!(matches!(err, CommandRunErr::NoChannel));

        Command::Join {
            channel: String::from("#rust"),
            key: None,
        }
        .run(&mut session, id, None)
        .unwrap();
        let conn = session.store().connection(id).unwrap();
        assert!(conn.pending_channels.contains("#rust"));
    }
}
