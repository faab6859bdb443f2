use chrono::{DateTime, Local};
use log::*;

use super::{expect_params, Dispatcher};
use crate::{
    channel::{AccessType, MessageKind, User},
    connection::ConnectionState,
    irc::{ClientCommand, IrcMessage, Prefix, Reply},
    mode::{parse_mode_change, ChannelModeChange},
    store::Action,
};

impl Dispatcher {
    pub(super) fn handle_reply(&self, reply: Reply, msg: &IrcMessage) -> Vec<ClientCommand> {
        match reply {
            // =======================
            // registration
            // =======================
            Reply::Welcome => {
                expect_params!(msg, 1);
                let identifier = welcome_identifier(msg);
                let text = msg.text_from(0);
                self.dispatch(|connection| Action::Welcome {
                    connection,
                    identifier,
                    text,
                });

                // join everything that was requested before registration finished, or was
                // joined before a reconnect
                let pending = self
                    .store
                    .read(|state| {
                        state
                            .connection(self.id)
                            .map(|c| c.pending_channels.iter().cloned().collect::<Vec<_>>())
                    })
                    .unwrap_or_default();
                pending
                    .into_iter()
                    .map(|channel| ClientCommand::Join { channel, key: None })
                    .collect()
            }
            Reply::YourHost | Reply::Created | Reply::MyInfo => {
                self.server_text(msg.text_from(0));
                vec![]
            }
            Reply::ISupport => {
                debug!("ignoring RPL_ISUPPORT {:?}", msg.raw);
                vec![]
            }
            Reply::UModeIs => {
                expect_params!(msg, 1);
                self.server_text(format!("your mode is {}", msg.text_from(0)));
                vec![]
            }

            // =======================
            // LUSERS responses
            // =======================
            Reply::LUserClient
            | Reply::LUserOp
            | Reply::LUserUnknown
            | Reply::LUserChannels
            | Reply::LUserMe
            | Reply::LocalUsers
            | Reply::GlobalUsers => {
                self.server_text(msg.text_from(0));
                vec![]
            }

            // =======================
            // MOTD
            // =======================
            Reply::MotdStart | Reply::Motd | Reply::EndOfMotd | Reply::NoMotd => {
                self.server_text(msg.text_from(0));
                vec![]
            }

            // =======================
            // channels
            // =======================
            Reply::ChannelModeIs => {
                expect_params!(msg, 2);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let args = msg.args_from(2).collect::<Vec<_>>();
                let change = parse_mode_change(msg.arg(1).unwrap_or_default(), &args);
                self.dispatch(|connection| Action::ModeReplaced {
                    connection,
                    channel,
                    change,
                });
                vec![]
            }
            Reply::NoTopic => {
                expect_params!(msg, 1);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                self.dispatch(|connection| Action::TopicChanged {
                    connection,
                    channel,
                    topic: None,
                    by: None,
                });
                vec![]
            }
            Reply::Topic => {
                expect_params!(msg, 2);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let topic = msg.text_from(1);
                self.dispatch(|connection| Action::TopicChanged {
                    connection,
                    channel,
                    topic: Some(topic),
                    by: None,
                });
                vec![]
            }
            Reply::TopicWhoTime => {
                expect_params!(msg, 2);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let who = Prefix::parse(msg.arg(1).unwrap_or_default());
                let when = msg
                    .arg(2)
                    .and_then(|secs| secs.parse::<i64>().ok())
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .map(|time| time.with_timezone(&Local));
                let text = match when {
                    Some(when) => format!(
                        "topic set by {} on {}",
                        who.subject,
                        when.format("%Y-%m-%d %H:%M:%S")
                    ),
                    None => format!("topic set by {}", who.subject),
                };
                self.dispatch(|connection| Action::ChannelText {
                    connection,
                    channel,
                    text,
                    kind: MessageKind::Topic,
                });
                vec![]
            }
            Reply::Inviting => {
                expect_params!(msg, 2);
                self.server_text(format!(
                    "inviting {} to {}",
                    msg.arg(0).unwrap_or_default(),
                    msg.arg(1).unwrap_or_default()
                ));
                vec![]
            }
            Reply::NamesReply => {
                expect_params!(msg, 3);
                let access_type = AccessType::from_symbol(msg.arg(0).unwrap_or_default());
                let channel = msg.arg(1).unwrap_or_default().to_string();
                let users = msg
                    .args_from(2)
                    .flat_map(str::split_whitespace)
                    .filter_map(|entry| {
                        let user = User::from_names_entry(entry);
                        if user.is_none() {
                            warn!("invalid NAMES entry {:?} in {}", entry, channel);
                        }
                        user
                    })
                    .collect();
                self.dispatch(|connection| Action::NamesReceived {
                    connection,
                    channel,
                    access_type,
                    users,
                });
                vec![]
            }
            Reply::EndOfNames => {
                expect_params!(msg, 1);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                self.dispatch(|connection| Action::NamesEnded {
                    connection,
                    channel,
                });
                vec![]
            }
            Reply::BanList => {
                expect_params!(msg, 2);
                let channel = msg.arg(0).unwrap_or_default().to_string();
                let mut change = ChannelModeChange::default();
                change
                    .added_bans
                    .insert(msg.arg(1).unwrap_or_default().to_string());
                self.dispatch(|connection| Action::ModeChanged {
                    connection,
                    channel,
                    change,
                    by: None,
                });
                vec![]
            }
            Reply::EndOfBanList => vec![],
            Reply::YoureOper => {
                self.server_text(msg.text_from(0));
                vec![]
            }

            // =======================
            // errors
            // =======================
            Reply::NicknameInUse | Reply::ErroneousNickname => {
                self.error(reply.code(), msg);
                // a nick has to be accepted before registration can finish, so try another one
                let registering = self.store.read(|state| {
                    state
                        .connection(self.id)
                        .is_some_and(|c| c.state != ConnectionState::Connected)
                });
                match (reply, registering, msg.arg(0)) {
                    (Reply::NicknameInUse, true, Some(nick)) if !nick.is_empty() => {
                        vec![ClientCommand::Nick(format!("{}_", nick))]
                    }
                    _ => vec![],
                }
            }
            Reply::NoSuchNick
            | Reply::NoSuchChannel
            | Reply::CannotSendToChan
            | Reply::NoNicknameGiven
            | Reply::UserNotInChannel
            | Reply::NotOnChannel
            | Reply::NeedMoreParams
            | Reply::PasswdMismatch
            | Reply::ChannelIsFull
            | Reply::InviteOnlyChan
            | Reply::BannedFromChan
            | Reply::BadChannelKey
            | Reply::ChanOPrivsNeeded
            | Reply::NoOperHost => {
                self.error(reply.code(), msg);
                vec![]
            }
        }
    }

    /// any 4xx or 5xx reply, listed in [`Reply`] or not
    pub(super) fn error(&self, code: u16, msg: &IrcMessage) {
        let text = error_text(msg);
        debug!("error {:03}: {}", code, text);
        self.dispatch(|connection| Action::ErrorReceived { connection, text });
    }
}

// error replies are `<subject...> :<description>`, like `401 me mike :No such nick/channel`
fn error_text(msg: &IrcMessage) -> String {
    match msg.parameters.len() {
        0 => String::from("unknown error"),
        1 => msg.text_from(0),
        n => format!(
            "{}: {}",
            msg.args_from(0).take(n - 1).collect::<Vec<_>>().join(" "),
            msg.last_arg().unwrap_or_default()
        ),
    }
}

// RPL_WELCOME usually ends in `nick!user@host`. servers that only send the nick are handled by
// falling back to the reply target, which is always our nick.
fn welcome_identifier(msg: &IrcMessage) -> Prefix {
    let from_text = msg
        .last_arg()
        .and_then(|text| text.split_whitespace().last())
        .map(Prefix::parse);
    match (from_text, msg.target.as_deref()) {
        (Some(prefix), Some(target)) if prefix.subject.eq_ignore_ascii_case(target) => prefix,
        (_, Some(target)) => Prefix::parse(target),
        (Some(prefix), None) => prefix,
        (None, None) => Prefix::parse(""),
    }
}
