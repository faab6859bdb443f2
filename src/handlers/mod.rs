use log::*;

use crate::{
    channel::{ChannelKind, MessageKind},
    connection::ConnectionId,
    irc::{ClientCommand, IrcCommand, IrcMessage, Prefix},
    mode::parse_mode_change,
    store::{Action, Store},
};

pub mod ctcp;
mod numeric;

use ctcp::{CtcpCommand, CtcpReply};

// drops the message when it has fewer parameters than the handler needs
macro_rules! expect_params {
    ($msg:expr, $min:expr) => {
        if $msg.parameters.len() < $min {
            warn!(
                "dropping {:?}: expected at least {} parameters, got {:?}",
                $msg.command, $min, $msg.raw
            );
            return Vec::new();
        }
    };
}

// drops the message when it has no prefix, otherwise evaluates to the prefix
macro_rules! expect_prefix {
    ($msg:expr) => {
        match &$msg.prefix {
            Some(prefix) => prefix.clone(),
            None => {
                warn!("dropping {:?} without a prefix: {:?}", $msg.command, $msg.raw);
                return Vec::new();
            }
        }
    };
}

pub(crate) use expect_params;
pub(crate) use expect_prefix;

/// turns parsed messages into store actions. returns the commands that have to be sent back to
/// the server right away, like PONG.
pub struct Dispatcher {
    id: ConnectionId,
    store: Store,
}

impl Dispatcher {
    pub fn new(id: ConnectionId, store: Store) -> Self {
        Self { id, store }
    }

    pub fn handle(&self, msg: &IrcMessage) -> Vec<ClientCommand> {
        match &msg.command {
            IrcCommand::Ping => {
                expect_params!(msg, 1);
                let token = msg.arg(0).unwrap_or_default();
                vec![ClientCommand::Pong(token.to_string())]
            }
            IrcCommand::Pong => {
                // NOTE: server -> client PONG has the server before the token
                expect_params!(msg, 2);
                self.server_text(format!("PONG {}", msg.text_from(1)));
                vec![]
            }
            IrcCommand::Join => {
                expect_params!(msg, 1);
                let prefix = expect_prefix!(msg);
                for channel in channels(msg.arg(0)) {
                    self.dispatch(|connection| Action::UserJoined {
                        connection,
                        channel: channel.to_string(),
                        prefix: prefix.clone(),
                    });
                }
                vec![]
            }
            IrcCommand::Part => {
                expect_params!(msg, 1);
                let prefix = expect_prefix!(msg);
                // reasons are entirely optional
                let reason = optional_text(msg, 1);
                for channel in channels(msg.arg(0)) {
                    self.dispatch(|connection| Action::UserParted {
                        connection,
                        channel: channel.to_string(),
                        prefix: prefix.clone(),
                        reason: reason.clone(),
                    });
                }
                vec![]
            }
            IrcCommand::Quit => {
                let prefix = expect_prefix!(msg);
                // NOTE: servers SHOULD always send a reason, but make sure
                let reason = optional_text(msg, 0);
                self.dispatch(|connection| Action::UserQuit {
                    connection,
                    prefix,
                    reason,
                });
                vec![]
            }
            IrcCommand::Privmsg => {
                expect_params!(msg, 1);
                let prefix = expect_prefix!(msg);
                self.handle_message(msg, Some(prefix), MessageKind::PrivateMessage)
            }
            IrcCommand::Notice => {
                expect_params!(msg, 1);
                self.handle_message(msg, msg.prefix.clone(), MessageKind::Notice)
            }
            IrcCommand::Nick => {
                expect_params!(msg, 1);
                let prefix = expect_prefix!(msg);
                let nick = msg.arg(0).unwrap_or_default().to_string();
                self.dispatch(|connection| Action::NickChanged {
                    connection,
                    prefix,
                    nick,
                });
                vec![]
            }
            IrcCommand::Topic => {
                expect_params!(msg, 2);
                let prefix = expect_prefix!(msg);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let topic = msg.text_from(1);
                self.dispatch(|connection| Action::TopicChanged {
                    connection,
                    channel,
                    topic: Some(topic),
                    by: Some(prefix),
                });
                vec![]
            }
            IrcCommand::Mode => {
                expect_params!(msg, 2);
                let target = msg.arg(0).unwrap_or_default();
                let modes = msg.arg(1).unwrap_or_default();
                if ChannelKind::for_name(target) == ChannelKind::MultiUser {
                    let args = msg.args_from(2).collect::<Vec<_>>();
                    let change = parse_mode_change(modes, &args);
                    self.dispatch(|connection| Action::ModeChanged {
                        connection,
                        channel: target.to_string(),
                        change,
                        by: msg.prefix.clone(),
                    });
                } else {
                    let setter = msg.subject().unwrap_or(target);
                    self.server_text(format!(
                        "{} sets mode {} on {}",
                        setter,
                        msg.text_from(1),
                        target
                    ));
                }
                vec![]
            }
            IrcCommand::Kick => {
                expect_params!(msg, 2);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let nick = msg.arg(1).unwrap_or_default().to_string();
                let reason = optional_text(msg, 2);
                self.dispatch(|connection| Action::UserKicked {
                    connection,
                    channel,
                    nick,
                    by: msg.prefix.clone(),
                    reason,
                });
                vec![]
            }
            IrcCommand::Invite => {
                expect_params!(msg, 2);
                let inviter = msg.subject().unwrap_or("someone");
                self.server_text(format!(
                    "{} invited {} to {}",
                    inviter,
                    msg.arg(0).unwrap_or_default(),
                    msg.arg(1).unwrap_or_default()
                ));
                vec![]
            }
            IrcCommand::Error => {
                expect_params!(msg, 1);
                let text = msg.text_from(0);
                self.dispatch(|connection| Action::ErrorReceived { connection, text });
                vec![]
            }
            IrcCommand::Reply(reply) => self.handle_reply(*reply, msg),
            IrcCommand::Numeric(code @ 400..=599) => {
                self.error(*code, msg);
                vec![]
            }
            IrcCommand::Numeric(code) => {
                debug!("unhandled numeric {:03}: {:?}", code, msg.raw);
                vec![]
            }
            IrcCommand::Unrecognized(command) => {
                debug!("unhandled command {:?}: {:?}", command, msg.raw);
                vec![]
            }
        }
    }

    fn dispatch(&self, action: impl FnOnce(ConnectionId) -> Action) {
        self.store.dispatch(action(self.id));
    }

    fn server_text(&self, text: String) {
        self.dispatch(|connection| Action::ServerText { connection, text });
    }

    fn handle_message(
        &self,
        msg: &IrcMessage,
        prefix: Option<Prefix>,
        kind: MessageKind,
    ) -> Vec<ClientCommand> {
        let recipient = msg.arg(0).unwrap_or_default().to_string();
        let text = msg.text_from(1);

        // handle CTCP messages specially
        if !ctcp::is_ctcp(&text) {
            self.dispatch(|connection| Action::MessageReceived {
                connection,
                prefix,
                recipient,
                text,
                kind,
            });
            return vec![];
        }

        // CTCP replies come as notices and are never answered
        if kind == MessageKind::Notice {
            debug!("ignoring CTCP reply {:?}", text);
            return vec![];
        }
        let Some(ctcp) = ctcp::parse_ctcp(&text) else {
            return vec![];
        };
        debug!("{:?}", ctcp);
        match ctcp {
            CtcpCommand::Action(action) => {
                self.dispatch(|connection| Action::MessageReceived {
                    connection,
                    prefix,
                    recipient,
                    text: action,
                    kind: MessageKind::Action,
                });
                vec![]
            }
            CtcpCommand::Clientinfo => match prefix {
                Some(prefix) => vec![CtcpReply::Clientinfo.to_command(prefix.subject)],
                None => {
                    warn!("CTCP CLIENTINFO without a prefix");
                    vec![]
                }
            },
        }
    }
}

// JOIN and PART may carry a comma separated list of channels
fn channels(arg: Option<&str>) -> impl Iterator<Item = &str> {
    arg.unwrap_or_default().split(',').filter(|c| !c.is_empty())
}

// the text from parameter n on, or None when there is none
fn optional_text(msg: &IrcMessage, n: usize) -> Option<String> {
    if msg.parameters.len() <= n {
        return None;
    }
    let text = msg.text_from(n);
    (!text.is_empty()).then_some(text)
}
