use core::fmt;
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::{
    channel::{Channel, ChannelKind, JoinState, User},
    irc::Prefix,
};

/// where to connect and who to be. created from user input and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub nick: String,
    pub real_name: String,
    pub username: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub secure: bool,
    pub tls_verification: bool,
}

impl ServerInfo {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// registration finished, the server sent RPL_WELCOME
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    pub server: ServerInfo,
    pub state: ConnectionState,
    /// who the server says we are, from RPL_WELCOME
    pub server_identifier: Option<Prefix>,
    // keyed by lowercased name. the server channel is always first.
    channels: IndexMap<String, Channel>,
    /// channels we sent a JOIN for and have not seen our own JOIN for yet
    pub pending_channels: IndexSet<String>,
    /// channels that are removed once the server confirms we left them
    pub closing_channels: IndexSet<String>,
    /// NAMES replies in flight, replaced into the channel at RPL_ENDOFNAMES
    pub pending_names: HashMap<String, Vec<User>>,
}

impl Connection {
    pub fn new(id: ConnectionId, server: ServerInfo) -> Self {
        let mut channels = IndexMap::new();
        let mut server_channel = Channel::new(id, server.host.clone(), ChannelKind::Server);
        server_channel.join_state = JoinState::Joined;
        channels.insert(server.host.to_lowercase(), server_channel);

        Self {
            id,
            server,
            state: ConnectionState::Disconnected,
            server_identifier: None,
            channels,
            pending_channels: IndexSet::new(),
            closing_channels: IndexSet::new(),
            pending_names: HashMap::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// the nick the server knows us by, or the one we asked for before registration finished
    pub fn nick(&self) -> &str {
        match &self.server_identifier {
            Some(prefix) => prefix.subject.as_str(),
            None => self.server.nick.as_str(),
        }
    }

    pub fn is_self(&self, nick: &str) -> bool {
        self.nick().eq_ignore_ascii_case(nick)
    }

    pub fn server_channel(&self) -> &Channel {
        // the server channel is inserted on creation and never removed
        &self.channels[0]
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&name.to_lowercase())
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&name.to_lowercase())
    }

    /// returns the channel, creating it if needed. the bool is true if it was created.
    pub fn channel_or_insert(&mut self, name: &str, kind: ChannelKind) -> (&mut Channel, bool) {
        let id = self.id;
        let mut created = false;
        let channel = self
            .channels
            .entry(name.to_lowercase())
            .or_insert_with(|| {
                created = true;
                Channel::new(id, name, kind)
            });
        (channel, created)
    }

    /// removes a channel. the server channel can't be removed.
    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let key = name.to_lowercase();
        if self.channels.get_index_of(&key) == Some(0) {
            return None;
        }
        self.channels.shift_remove(&key)
    }

    /// renames a private conversation after the other user changed their nick
    pub fn rename_channel(&mut self, old: &str, new: &str) -> bool {
        let key = old.to_lowercase();
        let Some(idx) = self.channels.get_index_of(&key) else {
            return false;
        };
        if idx == 0 || self.channels.contains_key(&new.to_lowercase()) {
            return false;
        }
        let Some((_, mut channel)) = self.channels.shift_remove_index(idx) else {
            return false;
        };
        channel.rename(new);
        let (new_idx, _) = self.channels.insert_full(new.to_lowercase(), channel);
        self.channels.move_index(new_idx, idx);
        true
    }

    /// the joined multi-user channels, which is what a session snapshot rejoins
    pub fn joined_channel_names(&self) -> Vec<String> {
        self.channels()
            .filter(|c| c.kind == ChannelKind::MultiUser && c.is_joined())
            .map(|c| c.name().to_string())
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn test_server() -> ServerInfo {
    ServerInfo {
        nick: String::from("me"),
        real_name: String::from("Real Me"),
        username: String::from("me"),
        host: String::from("irc.example.com"),
        port: 6667,
        password: None,
        secure: false,
        tls_verification: true,
    }
}
