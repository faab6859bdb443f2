use log::*;

use crate::{
    channel::{ChannelKind, ChannelMessage, JoinState, MessageKind, Notification, User},
    connection::{Connection, ConnectionId, ConnectionState},
    event::EngineEvent,
    irc::Prefix,
    mode::{to_mode_string, ChannelModeChange},
    store::{Action, State},
};

/// applies one action to the state and returns what changed
pub(super) fn reduce(state: &mut State, action: Action) -> Vec<EngineEvent> {
    let id = action.connection();
    match action {
        Action::AddConnection { connection, server } => {
            if state.connections.contains_key(&connection) {
                warn!("connection {} already exists", connection);
                return Vec::new();
            }
            state
                .connections
                .insert(connection, Connection::new(connection, server.clone()));
            return vec![EngineEvent::ConnectionAdded { connection, server }];
        }
        Action::RemoveConnection { connection } => {
            return match state.connections.shift_remove(&connection) {
                Some(_) => vec![EngineEvent::ConnectionRemoved { connection }],
                None => Vec::new(),
            };
        }
        _ => {}
    }

    let Some(conn) = state.connections.get_mut(&id) else {
        warn!("dropping action for unknown connection {}: {:?}", id, action);
        return Vec::new();
    };

    let mut reducer = Reducer {
        id,
        conn,
        events: Vec::new(),
    };
    reducer.apply(action);
    reducer.events
}

struct Reducer<'a> {
    id: ConnectionId,
    conn: &'a mut Connection,
    events: Vec<EngineEvent>,
}

impl Reducer<'_> {
    fn apply(&mut self, action: Action) {
        match action {
            Action::AddConnection { .. } | Action::RemoveConnection { .. } => {}
            Action::SetConnectionState { state, .. } => self.set_state(state),
            Action::Welcome {
                identifier, text, ..
            } => {
                self.conn.server_identifier = Some(identifier);
                self.server_line(MessageKind::Server, text);
                self.set_state(ConnectionState::Connected);
            }
            Action::ServerText { text, .. } => self.server_line(MessageKind::Server, text),
            Action::ChannelText {
                channel,
                text,
                kind,
                ..
            } => self.line(&channel, ChannelMessage::new(kind, None, text)),
            Action::ErrorReceived { text, .. } => {
                self.server_line(MessageKind::Error, text.clone());
                self.events.push(EngineEvent::ErrorReceived {
                    connection: self.id,
                    message: text,
                });
            }
            Action::UserJoined {
                channel, prefix, ..
            } => self.user_joined(&channel, prefix),
            Action::UserParted {
                channel,
                prefix,
                reason,
                ..
            } => self.user_parted(&channel, prefix, reason),
            Action::UserKicked {
                channel,
                nick,
                by,
                reason,
                ..
            } => self.user_kicked(&channel, nick, by, reason),
            Action::UserQuit { prefix, reason, .. } => self.user_quit(prefix, reason),
            Action::NickChanged { prefix, nick, .. } => self.nick_changed(prefix, nick),
            Action::MessageReceived {
                prefix,
                recipient,
                text,
                kind,
                ..
            } => self.message_received(prefix, &recipient, text, kind),
            Action::MessageSent {
                target, text, kind, ..
            } => {
                let name = self.open(&target, ChannelKind::for_name(&target));
                let nick = self.conn.nick().to_string();
                self.line(&name, ChannelMessage::new(kind, Some(&nick), text));
            }
            Action::NamesReceived {
                channel,
                access_type,
                users,
                ..
            } => {
                if let (Some(access_type), Some(chan)) =
                    (access_type, self.conn.channel_mut(&channel))
                {
                    chan.access_type = access_type;
                }
                self.conn
                    .pending_names
                    .entry(channel.to_lowercase())
                    .or_default()
                    .extend(users);
            }
            Action::NamesEnded { channel, .. } => self.names_ended(&channel),
            Action::TopicChanged {
                channel, topic, by, ..
            } => self.topic_changed(&channel, topic, by),
            Action::ModeChanged {
                channel, change, by, ..
            } => self.mode_changed(&channel, change, by),
            Action::ModeReplaced {
                channel, change, ..
            } => {
                let Some(chan) = self.conn.channel_mut(&channel) else {
                    debug!("mode for unknown channel {}", channel);
                    return;
                };
                chan.mode = chan.mode.with_lists_only().apply(&change);
                let name = chan.name().to_string();
                let mode = chan.mode.clone();
                self.events.push(EngineEvent::ModeChanged {
                    connection: self.id,
                    channel: name.clone(),
                    mode,
                });
                let text = format!("mode is {}", to_mode_string(&change));
                self.line(&name, ChannelMessage::new(MessageKind::Mode, None, text));
            }
            Action::OpenChannel { channel, kind, .. } => {
                self.open(&channel, kind);
            }
            Action::CloseChannel { channel, .. } => self.close(&channel),
            Action::AddPendingChannel { channel, .. } => {
                if !self
                    .conn
                    .pending_channels
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&channel))
                {
                    self.conn.pending_channels.insert(channel);
                }
            }
            Action::SetPendingChannels { channels, .. } => {
                self.conn.pending_channels = channels.into_iter().collect();
            }
            Action::ClearNotifications { channel, .. } => {
                if let Some(chan) = self.conn.channel_mut(&channel) {
                    chan.notifications.clear();
                }
            }
        }
    }

    /// adds a line to a channel, or to the server channel if the channel doesn't exist
    fn line(&mut self, channel: &str, message: ChannelMessage) {
        let name = match self.conn.channel(channel) {
            Some(chan) => chan.name().to_string(),
            None => self.conn.server_channel().name().to_string(),
        };
        if let Some(chan) = self.conn.channel_mut(&name) {
            chan.add_line(message.clone());
        }
        self.events.push(EngineEvent::MessageReceived {
            connection: self.id,
            channel: name,
            message,
        });
    }

    fn server_line(&mut self, kind: MessageKind, text: String) {
        let name = self.conn.server_channel().name().to_string();
        self.line(&name, ChannelMessage::new(kind, None, text));
    }

    /// returns the name of the channel, creating it if needed
    fn open(&mut self, channel: &str, kind: ChannelKind) -> String {
        let (chan, created) = self.conn.channel_or_insert(channel, kind);
        let name = chan.name().to_string();
        let kind = chan.kind;
        if created {
            self.events.push(EngineEvent::ChannelAdded {
                connection: self.id,
                channel: name.clone(),
                kind,
            });
        }
        name
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.conn.state == state {
            return;
        }
        self.conn.state = state;
        self.events.push(EngineEvent::ConnectionStateChanged {
            connection: self.id,
            state,
        });

        if state != ConnectionState::Disconnected {
            return;
        }

        // nothing is joined without a connection
        self.conn.server_identifier = None;
        self.conn.pending_names.clear();
        let mut parted = Vec::new();
        for chan in self.conn.channels_mut() {
            if chan.kind == ChannelKind::MultiUser && chan.is_joined() {
                chan.join_state = JoinState::Parted;
                chan.clear_users();
                parted.push(chan.name().to_string());
            }
        }
        for channel in parted {
            self.events.push(EngineEvent::ChannelParted {
                connection: self.id,
                channel,
                reason: None,
            });
        }
        for channel in std::mem::take(&mut self.conn.closing_channels) {
            if let Some(chan) = self.conn.remove_channel(&channel) {
                self.events.push(EngineEvent::ChannelRemoved {
                    connection: self.id,
                    channel: chan.name().to_string(),
                });
            }
        }
    }

    fn user_joined(&mut self, channel: &str, prefix: Prefix) {
        let text = format!("{} joined {}", prefix.subject, channel);
        if self.conn.is_self(&prefix.subject) {
            let name = self.open(channel, ChannelKind::MultiUser);
            if let Some(chan) = self.conn.channel_mut(&name) {
                chan.join_state = JoinState::Joined;
            }
            self.conn
                .pending_channels
                .retain(|c| !c.eq_ignore_ascii_case(&name));
            self.conn.closing_channels.shift_remove(&name.to_lowercase());
            self.events.push(EngineEvent::ChannelJoined {
                connection: self.id,
                channel: name.clone(),
            });
            let message = ChannelMessage::new(MessageKind::Join, Some(&prefix.subject), text);
            self.line(&name, message);
            return;
        }

        let Some(chan) = self.conn.channel_mut(channel) else {
            warn!("{} joined unknown channel {}", prefix.subject, channel);
            return;
        };
        chan.add_user(User::new(prefix.subject.as_str()));
        let name = chan.name().to_string();
        let message = ChannelMessage::new(MessageKind::Join, Some(&prefix.subject), text);
        self.events.push(EngineEvent::UserJoined {
            connection: self.id,
            channel: name.clone(),
            prefix,
        });
        self.line(&name, message);
    }

    fn user_parted(&mut self, channel: &str, prefix: Prefix, reason: Option<String>) {
        let own = self.conn.is_self(&prefix.subject);
        let Some(chan) = self.conn.channel_mut(channel) else {
            warn!("{} left unknown channel {}", prefix.subject, channel);
            return;
        };
        let name = chan.name().to_string();
        let mut text = format!("{} left {}", prefix.subject, name);
        if let Some(reason) = &reason {
            text.push_str(&format!(": {}", reason));
        }
        let message = ChannelMessage::new(MessageKind::Part, Some(&prefix.subject), text);

        if !own {
            chan.remove_user(&prefix.subject);
            self.events.push(EngineEvent::UserParted {
                connection: self.id,
                channel: name.clone(),
                prefix,
                reason,
            });
            self.line(&name, message);
            return;
        }

        chan.join_state = JoinState::Parted;
        chan.clear_users();
        self.events.push(EngineEvent::ChannelParted {
            connection: self.id,
            channel: name.clone(),
            reason,
        });
        self.line(&name, message);

        // the channel was closed by the user, it goes away now that the server confirmed
        if self.conn.closing_channels.shift_remove(&name.to_lowercase()) {
            self.remove(&name);
        }
    }

    fn user_kicked(
        &mut self,
        channel: &str,
        nick: String,
        by: Option<Prefix>,
        reason: Option<String>,
    ) {
        let own = self.conn.is_self(&nick);
        let Some(chan) = self.conn.channel_mut(channel) else {
            warn!("{} was kicked from unknown channel {}", nick, channel);
            return;
        };
        let name = chan.name().to_string();
        let kicker = by.as_ref().map(|p| p.subject.as_str()).unwrap_or("server");
        let mut text = format!("{} kicked {} from {}", kicker, nick, name);
        if let Some(reason) = &reason {
            text.push_str(&format!(": {}", reason));
        }
        let message = ChannelMessage::new(MessageKind::Kick, Some(kicker), text.as_str());

        if own {
            chan.join_state = JoinState::Parted;
            chan.clear_users();
            self.conn.closing_channels.shift_remove(&name.to_lowercase());
            self.events.push(EngineEvent::ChannelParted {
                connection: self.id,
                channel: name.clone(),
                reason: Some(text),
            });
        } else {
            chan.remove_user(&nick);
        }
        self.events.push(EngineEvent::UserKicked {
            connection: self.id,
            channel: name.clone(),
            nick,
            by,
            reason,
        });
        self.line(&name, message);
    }

    fn user_quit(&mut self, prefix: Prefix, reason: Option<String>) {
        if self.conn.is_self(&prefix.subject) {
            debug!("ignoring our own QUIT");
            return;
        }

        let nick = prefix.subject.as_str();
        let mut channels = Vec::new();
        for chan in self.conn.channels_mut() {
            let in_private = chan.kind == ChannelKind::PrivateMessage
                && chan.name().eq_ignore_ascii_case(nick);
            if chan.remove_user(nick).is_some() || in_private {
                channels.push(chan.name().to_string());
            }
        }

        let text = match &reason {
            Some(reason) => format!("{} quit: {}", nick, reason),
            None => format!("{} quit", nick),
        };
        let sender = prefix.subject.clone();
        self.events.push(EngineEvent::UserQuit {
            connection: self.id,
            prefix,
            reason,
            channels: channels.clone(),
        });
        for channel in channels {
            let message = ChannelMessage::new(MessageKind::Quit, Some(&sender), text.as_str());
            self.line(&channel, message);
        }
    }

    fn nick_changed(&mut self, prefix: Prefix, nick: String) {
        let old = prefix.subject.clone();
        let mut renamed = Vec::new();

        if self.conn.is_self(&old) {
            let raw = match prefix.raw.find('!') {
                Some(idx) => format!("{}{}", nick, &prefix.raw[idx..]),
                None => nick.clone(),
            };
            self.conn.server_identifier = Some(Prefix::parse(&raw));
            renamed.push(self.conn.server_channel().name().to_string());
        }

        for chan in self.conn.channels_mut() {
            if chan.rename_user(&old, &nick) {
                renamed.push(chan.name().to_string());
            }
        }
        if self.conn.rename_channel(&old, &nick) {
            renamed.push(nick.clone());
        }

        let text = format!("{} is now known as {}", old, nick);
        self.events.push(EngineEvent::NickChanged {
            connection: self.id,
            old,
            new: nick.clone(),
        });
        for channel in renamed {
            let message = ChannelMessage::new(MessageKind::Nick, Some(&nick), text.as_str());
            self.line(&channel, message);
        }
    }

    fn message_received(
        &mut self,
        prefix: Option<Prefix>,
        recipient: &str,
        text: String,
        kind: MessageKind,
    ) {
        let sender = prefix.as_ref().map(|p| p.subject.clone());
        // channel messages go to the channel, messages to us go to a private channel named after
        // the sender, everything else (server notices, `NOTICE *` during registration) goes to
        // the server channel
        let name = match &prefix {
            _ if ChannelKind::for_name(recipient) == ChannelKind::MultiUser => {
                self.open(recipient, ChannelKind::MultiUser)
            }
            Some(prefix) if !prefix.is_server() && self.conn.is_self(recipient) => {
                self.open(&prefix.subject, ChannelKind::PrivateMessage)
            }
            _ => self.conn.server_channel().name().to_string(),
        };

        let own_nick = self.conn.nick().to_lowercase();
        let from_self = sender.as_deref().is_some_and(|s| self.conn.is_self(s));
        let mention = !from_self && text.to_lowercase().contains(&own_nick);
        if let Some(chan) = self.conn.channel_mut(&name) {
            chan.notifications.insert(Notification::NewMessages);
            if mention {
                chan.notifications.insert(Notification::Mention);
            }
        }

        self.line(&name, ChannelMessage::new(kind, sender.as_deref(), text));
    }

    fn names_ended(&mut self, channel: &str) {
        let Some(users) = self.conn.pending_names.remove(&channel.to_lowercase()) else {
            debug!("end of names for {} without any names", channel);
            return;
        };
        let Some(chan) = self.conn.channel_mut(channel) else {
            debug!("names for unknown channel {}", channel);
            return;
        };
        chan.replace_users(users);
        self.events.push(EngineEvent::UsersUpdated {
            connection: self.id,
            channel: chan.name().to_string(),
            users: chan.users().cloned().collect(),
        });
    }

    fn topic_changed(&mut self, channel: &str, topic: Option<String>, by: Option<Prefix>) {
        let Some(chan) = self.conn.channel_mut(channel) else {
            debug!("topic for unknown channel {}", channel);
            return;
        };
        chan.topic = topic.filter(|t| !t.is_empty());
        let name = chan.name().to_string();
        let topic = chan.topic.clone();

        let text = match (&by, &topic) {
            (Some(by), Some(topic)) => format!("{} changed the topic to: {}", by.subject, topic),
            (Some(by), None) => format!("{} cleared the topic", by.subject),
            (None, Some(topic)) => format!("topic: {}", topic),
            (None, None) => String::from("no topic is set"),
        };
        let sender = by.map(|p| p.subject);
        self.events.push(EngineEvent::TopicChanged {
            connection: self.id,
            channel: name.clone(),
            topic,
        });
        self.line(
            &name,
            ChannelMessage::new(MessageKind::Topic, sender.as_deref(), text),
        );
    }

    fn mode_changed(&mut self, channel: &str, change: ChannelModeChange, by: Option<Prefix>) {
        let Some(chan) = self.conn.channel_mut(channel) else {
            debug!("mode change for unknown channel {}", channel);
            return;
        };
        chan.mode = chan.mode.apply(&change);
        for (privilege, nicks) in &change.added_privileges {
            for nick in nicks {
                if let Some(user) = chan.user_mut(nick) {
                    user.privileges.insert(*privilege);
                }
            }
        }
        for (privilege, nicks) in &change.removed_privileges {
            for nick in nicks {
                if let Some(user) = chan.user_mut(nick) {
                    user.privileges.remove(privilege);
                }
            }
        }

        let name = chan.name().to_string();
        let mode = chan.mode.clone();
        let users = change
            .has_privilege_changes()
            .then(|| chan.users().cloned().collect::<Vec<_>>());

        self.events.push(EngineEvent::ModeChanged {
            connection: self.id,
            channel: name.clone(),
            mode,
        });
        if let Some(users) = users {
            self.events.push(EngineEvent::UsersUpdated {
                connection: self.id,
                channel: name.clone(),
                users,
            });
        }

        let setter = by.map(|p| p.subject);
        let text = format!(
            "{} sets mode {}",
            setter.as_deref().unwrap_or("server"),
            to_mode_string(&change)
        );
        self.line(
            &name,
            ChannelMessage::new(MessageKind::Mode, setter.as_deref(), text),
        );
    }

    fn close(&mut self, channel: &str) {
        let Some(chan) = self.conn.channel(channel) else {
            debug!("closing unknown channel {}", channel);
            return;
        };
        if chan.kind == ChannelKind::Server {
            warn!("the server channel can't be closed");
            return;
        }

        let name = chan.name().to_string();
        let waiting_for_part = chan.kind == ChannelKind::MultiUser
            && chan.is_joined()
            && self.conn.state != ConnectionState::Disconnected;
        self.conn
            .pending_channels
            .retain(|c| !c.eq_ignore_ascii_case(&name));
        if waiting_for_part {
            self.conn.closing_channels.insert(name.to_lowercase());
        } else {
            self.remove(&name);
        }
    }

    fn remove(&mut self, channel: &str) {
        if let Some(chan) = self.conn.remove_channel(channel) {
            self.events.push(EngineEvent::ChannelRemoved {
                connection: self.id,
                channel: chan.name().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{AccessType, ChannelPrivilege},
        connection::test_server,
        mode::parse_mode_change,
    };

    const ID: ConnectionId = ConnectionId::new(1);

    fn connected() -> State {
        let mut state = State::default();
        reduce(
            &mut state,
            Action::AddConnection {
                connection: ID,
                server: test_server(),
            },
        );
        reduce(
            &mut state,
            Action::Welcome {
                connection: ID,
                identifier: Prefix::parse("me!me@host"),
                text: String::from("Welcome me"),
            },
        );
        state
    }

    fn joined(channel: &str) -> State {
        let mut state = connected();
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: channel.to_string(),
                prefix: Prefix::parse("me!me@host"),
            },
        );
        state
    }

    fn conn(state: &State) -> &Connection {
        state.connection(ID).unwrap()
    }

    #[test]
    fn unknown_connection_is_ignored() {
        let mut state = State::default();
        let events = reduce(
            &mut state,
            Action::ServerText {
                connection: ID,
                text: String::from("hi"),
            },
        );
        assert!(events.is_empty());
    }

    #[test]
    fn welcome_connects() {
        let state = connected();
        let conn = conn(&state);
        assert_eq!(conn.state, ConnectionState::Connected);
        assert_eq!(conn.nick(), "me");
        assert_eq!(conn.server_channel().messages.len(), 1);
    }

    #[test]
    fn own_join_creates_joined_channel() {
        let mut state = connected();
        reduce(
            &mut state,
            Action::AddPendingChannel {
                connection: ID,
                channel: String::from("#Rust"),
            },
        );
        let events = reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("me!me@host"),
            },
        );

        let chan = conn(&state).channel("#rust").unwrap();
        assert!(chan.is_joined());
        assert_eq!(chan.kind, ChannelKind::MultiUser);
        assert!(conn(&state).pending_channels.is_empty());
        assert!(events.contains(&EngineEvent::ChannelJoined {
            connection: ID,
            channel: String::from("#rust")
        }));
        assert!(matches!(events[0], EngineEvent::ChannelAdded { .. }));
    }

    #[test]
    fn other_join_adds_user() {
        let mut state = joined("#rust");
        let events = reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("mike!m@example.com"),
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert!(chan.has_user("mike"));
        assert!(matches!(
            &events[0],
            EngineEvent::UserJoined { channel, prefix, .. }
                if channel == "#rust" && prefix.subject == "mike"
        ));
    }

    #[test]
    fn other_part_removes_user() {
        let mut state = joined("#rust");
        for nick in ["mike", "anna"] {
            reduce(
                &mut state,
                Action::UserJoined {
                    connection: ID,
                    channel: String::from("#rust"),
                    prefix: Prefix::parse(nick),
                },
            );
        }
        reduce(
            &mut state,
            Action::UserParted {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("mike!m@h"),
                reason: Some(String::from("bye")),
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert!(!chan.has_user("mike"));
        assert!(chan.has_user("anna"));
        assert!(chan.is_joined());
    }

    #[test]
    fn own_part_keeps_channel_unless_closing() {
        let mut state = joined("#rust");
        let events = reduce(
            &mut state,
            Action::UserParted {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("me!me@host"),
                reason: None,
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert_eq!(chan.join_state, JoinState::Parted);
        assert_eq!(chan.users().count(), 0);
        assert!(matches!(events[0], EngineEvent::ChannelParted { .. }));

        let mut state = joined("#rust");
        let events = reduce(
            &mut state,
            Action::CloseChannel {
                connection: ID,
                channel: String::from("#rust"),
            },
        );
        assert!(events.is_empty());
        assert!(conn(&state).channel("#rust").is_some());

        let events = reduce(
            &mut state,
            Action::UserParted {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("me!me@host"),
                reason: None,
            },
        );
        assert!(conn(&state).channel("#rust").is_none());
        assert!(events.contains(&EngineEvent::ChannelRemoved {
            connection: ID,
            channel: String::from("#rust")
        }));
    }

    #[test]
    fn closing_private_channel_removes_it() {
        let mut state = connected();
        reduce(
            &mut state,
            Action::OpenChannel {
                connection: ID,
                channel: String::from("mike"),
                kind: ChannelKind::PrivateMessage,
            },
        );
        reduce(
            &mut state,
            Action::CloseChannel {
                connection: ID,
                channel: String::from("Mike"),
            },
        );
        assert!(conn(&state).channel("mike").is_none());

        // the server channel stays
        let name = conn(&state).server_channel().name().to_string();
        reduce(
            &mut state,
            Action::CloseChannel {
                connection: ID,
                channel: name,
            },
        );
        assert_eq!(conn(&state).channels().count(), 1);
    }

    #[test]
    fn names_replace_users_at_end() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("stale"),
            },
        );
        reduce(
            &mut state,
            Action::NamesReceived {
                connection: ID,
                channel: String::from("#rust"),
                access_type: Some(AccessType::Secret),
                users: vec![User::from_names_entry("@mike").unwrap()],
            },
        );
        reduce(
            &mut state,
            Action::NamesReceived {
                connection: ID,
                channel: String::from("#rust"),
                access_type: Some(AccessType::Secret),
                users: vec![User::new("me"), User::new("anna")],
            },
        );
        // nothing is replaced until the end of the list
        assert!(conn(&state).channel("#rust").unwrap().has_user("stale"));

        let events = reduce(
            &mut state,
            Action::NamesEnded {
                connection: ID,
                channel: String::from("#rust"),
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        let nicks = chan.users().map(|u| u.nick.as_str()).collect::<Vec<_>>();
        assert_eq!(nicks, vec!["mike", "me", "anna"]);
        assert_eq!(chan.access_type, AccessType::Secret);
        assert!(matches!(
            &events[0],
            EngineEvent::UsersUpdated { users, .. } if users.len() == 3
        ));
        assert!(conn(&state).pending_names.is_empty());
    }

    #[test]
    fn quit_removes_user_everywhere() {
        let mut state = joined("#a");
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#b"),
                prefix: Prefix::parse("me!me@host"),
            },
        );
        for channel in ["#a", "#b"] {
            reduce(
                &mut state,
                Action::UserJoined {
                    connection: ID,
                    channel: channel.to_string(),
                    prefix: Prefix::parse("mike!m@h"),
                },
            );
        }

        let events = reduce(
            &mut state,
            Action::UserQuit {
                connection: ID,
                prefix: Prefix::parse("mike!m@h"),
                reason: Some(String::from("ping timeout")),
            },
        );
        assert!(!conn(&state).channel("#a").unwrap().has_user("mike"));
        assert!(!conn(&state).channel("#b").unwrap().has_user("mike"));
        assert!(matches!(
            &events[0],
            EngineEvent::UserQuit { channels, .. } if channels.len() == 2
        ));
    }

    #[test]
    fn private_message_opens_channel_with_notifications() {
        let mut state = connected();
        let events = reduce(
            &mut state,
            Action::MessageReceived {
                connection: ID,
                prefix: Some(Prefix::parse("mike!m@h")),
                recipient: String::from("me"),
                text: String::from("hey me, you there?"),
                kind: MessageKind::PrivateMessage,
            },
        );
        let chan = conn(&state).channel("mike").unwrap();
        assert_eq!(chan.kind, ChannelKind::PrivateMessage);
        assert!(chan.notifications.contains(&Notification::Mention));
        assert!(chan.notifications.contains(&Notification::NewMessages));
        assert_eq!(events.len(), 2);

        reduce(
            &mut state,
            Action::ClearNotifications {
                connection: ID,
                channel: String::from("mike"),
            },
        );
        assert!(conn(&state).channel("mike").unwrap().notifications.is_empty());
    }

    #[test]
    fn server_notice_goes_to_server_channel() {
        let mut state = connected();
        reduce(
            &mut state,
            Action::MessageReceived {
                connection: ID,
                prefix: Some(Prefix::parse("irc.example.com")),
                recipient: String::from("*"),
                text: String::from("*** Looking up your hostname"),
                kind: MessageKind::Notice,
            },
        );
        assert_eq!(conn(&state).channels().count(), 1);
        let last = conn(&state).server_channel().messages.back().unwrap();
        assert_eq!(last.kind, MessageKind::Notice);
    }

    #[test]
    fn nick_change_renames_everywhere() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("mike!m@h"),
            },
        );
        reduce(
            &mut state,
            Action::NickChanged {
                connection: ID,
                prefix: Prefix::parse("mike!m@h"),
                nick: String::from("mike_"),
            },
        );
        assert!(conn(&state).channel("#rust").unwrap().has_user("mike_"));

        reduce(
            &mut state,
            Action::NickChanged {
                connection: ID,
                prefix: Prefix::parse("me!me@host"),
                nick: String::from("me2"),
            },
        );
        let conn = conn(&state);
        assert_eq!(conn.nick(), "me2");
        assert_eq!(
            conn.server_identifier.as_ref().map(|p| p.raw.as_str()),
            Some("me2!me@host")
        );
    }

    #[test]
    fn mode_change_updates_mode_and_privileges() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("mike!m@h"),
            },
        );
        let events = reduce(
            &mut state,
            Action::ModeChanged {
                connection: ID,
                channel: String::from("#rust"),
                change: parse_mode_change("+nto", &["mike"]),
                by: Some(Prefix::parse("me!me@host")),
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert!(chan.mode.no_external_messages);
        assert!(chan.mode.protected_topic);
        assert_eq!(
            chan.user("mike").and_then(User::highest_privilege),
            Some(ChannelPrivilege::FullOperator)
        );
        assert!(matches!(events[0], EngineEvent::ModeChanged { .. }));
        assert!(matches!(events[1], EngineEvent::UsersUpdated { .. }));
    }

    #[test]
    fn channel_mode_is_replaces_flags_keeps_lists() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::ModeChanged {
                connection: ID,
                channel: String::from("#rust"),
                change: parse_mode_change("+mb", &["*!*@spam"]),
                by: None,
            },
        );
        reduce(
            &mut state,
            Action::ModeReplaced {
                connection: ID,
                channel: String::from("#rust"),
                change: parse_mode_change("+nt", &[] as &[&str]),
            },
        );
        let mode = &conn(&state).channel("#rust").unwrap().mode;
        assert!(!mode.moderated);
        assert!(mode.no_external_messages);
        assert!(mode.bans.contains("*!*@spam"));
    }

    #[test]
    fn kick_of_self_parts() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::UserKicked {
                connection: ID,
                channel: String::from("#rust"),
                nick: String::from("me"),
                by: Some(Prefix::parse("op!o@h")),
                reason: Some(String::from("spam")),
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert_eq!(chan.join_state, JoinState::Parted);
    }

    #[test]
    fn disconnect_parts_channels() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::UserJoined {
                connection: ID,
                channel: String::from("#rust"),
                prefix: Prefix::parse("mike"),
            },
        );
        let events = reduce(
            &mut state,
            Action::SetConnectionState {
                connection: ID,
                state: ConnectionState::Disconnected,
            },
        );
        let chan = conn(&state).channel("#rust").unwrap();
        assert_eq!(chan.join_state, JoinState::Parted);
        assert_eq!(chan.users().count(), 0);
        assert!(conn(&state).server_channel().is_joined());
        assert_eq!(
            events[0],
            EngineEvent::ConnectionStateChanged {
                connection: ID,
                state: ConnectionState::Disconnected
            }
        );

        // same state twice is not a change
        let events = reduce(
            &mut state,
            Action::SetConnectionState {
                connection: ID,
                state: ConnectionState::Disconnected,
            },
        );
        assert!(events.is_empty());
    }

    #[test]
    fn pending_channels_are_replaced() {
        let mut state = connected();
        for channel in ["#a", "#A", "#b"] {
            reduce(
                &mut state,
                Action::AddPendingChannel {
                    connection: ID,
                    channel: channel.to_string(),
                },
            );
        }
        assert_eq!(conn(&state).pending_channels.len(), 2);
        reduce(
            &mut state,
            Action::SetPendingChannels {
                connection: ID,
                channels: vec![String::from("#c")],
            },
        );
        let pending = conn(&state).pending_channels.iter().collect::<Vec<_>>();
        assert_eq!(pending, vec!["#c"]);
    }

    #[test]
    fn topic_changes() {
        let mut state = joined("#rust");
        reduce(
            &mut state,
            Action::TopicChanged {
                connection: ID,
                channel: String::from("#rust"),
                topic: Some(String::from("hello")),
                by: None,
            },
        );
        assert_eq!(
            conn(&state).channel("#rust").unwrap().topic.as_deref(),
            Some("hello")
        );
        reduce(
            &mut state,
            Action::TopicChanged {
                connection: ID,
                channel: String::from("#rust"),
                topic: Some(String::new()),
                by: Some(Prefix::parse("mike")),
            },
        );
        assert_eq!(conn(&state).channel("#rust").unwrap().topic, None);
    }
}
