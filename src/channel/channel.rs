use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use crate::{
    channel::User,
    connection::ConnectionId,
    constants::names::{ACCESS_PRIVATE, ACCESS_PUBLIC, ACCESS_SECRET, CHANNEL_TYPES},
    mode::ChannelMode,
};

// older lines are dropped once a log grows past this
const MAX_LOG_LINES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// the status window of a connection, holds everything the server says to us directly
    Server,
    MultiUser,
    PrivateMessage,
}

impl ChannelKind {
    /// everything that starts with a channel type is a channel, everything else is a private
    /// conversation with a nick
    pub fn for_name(name: &str) -> Self {
        match name.chars().next() {
            Some(first) if CHANNEL_TYPES.contains(&first) => ChannelKind::MultiUser,
            _ => ChannelKind::PrivateMessage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinState {
    Joined,
    Parted,
}

/// the visibility of a channel, from the symbol of a NAMES reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessType {
    #[default]
    Public,
    Private,
    Secret,
}

impl AccessType {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ACCESS_PUBLIC => Some(AccessType::Public),
            ACCESS_PRIVATE => Some(AccessType::Private),
            ACCESS_SECRET => Some(AccessType::Secret),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Notification {
    Mention,
    NewMessages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PrivateMessage,
    Notice,
    /// a CTCP ACTION, `/me` in most clients
    Action,
    /// a message we sent ourselves
    Own,
    Join,
    Part,
    Quit,
    Kick,
    Nick,
    Topic,
    Mode,
    Server,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub timestamp: DateTime<Local>,
    pub sender: Option<String>,
    pub text: String,
    pub kind: MessageKind,
}

impl ChannelMessage {
    pub fn new(kind: MessageKind, sender: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            sender: sender.map(str::to_string),
            text: text.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    // the name of the channel, **including** the channel type prefix (so it is suitable for
    // direct use as a target). for private messages this is the other user's nick.
    name: String,
    pub kind: ChannelKind,
    pub join_state: JoinState,
    pub topic: Option<String>,
    pub mode: ChannelMode,
    pub access_type: AccessType,
    pub notifications: BTreeSet<Notification>,
    pub messages: VecDeque<ChannelMessage>,
    // keyed by lowercased nick
    users: IndexMap<String, User>,
    // the connection this channel lives in. only an id, lookups go through the store.
    connection: ConnectionId,
}

impl Channel {
    pub fn new(connection: ConnectionId, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            join_state: JoinState::Parted,
            topic: None,
            mode: ChannelMode::default(),
            access_type: AccessType::default(),
            notifications: BTreeSet::new(),
            messages: VecDeque::new(),
            users: IndexMap::new(),
            connection,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn is_joined(&self) -> bool {
        self.join_state == JoinState::Joined
    }

    pub fn add_line(&mut self, message: ChannelMessage) {
        if self.messages.len() >= MAX_LOG_LINES {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(&nick.to_lowercase())
    }

    pub fn user_mut(&mut self, nick: &str) -> Option<&mut User> {
        self.users.get_mut(&nick.to_lowercase())
    }

    pub fn has_user(&self, nick: &str) -> bool {
        self.users.contains_key(&nick.to_lowercase())
    }

    /// adds a user, replacing any user with the same nick
    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.nick.to_lowercase(), user);
    }

    pub fn remove_user(&mut self, nick: &str) -> Option<User> {
        self.users.shift_remove(&nick.to_lowercase())
    }

    pub fn replace_users(&mut self, users: impl IntoIterator<Item = User>) {
        self.users = users
            .into_iter()
            .map(|user| (user.nick.to_lowercase(), user))
            .collect();
    }

    pub fn clear_users(&mut self) {
        self.users.clear();
    }

    /// keeps the position of the user in the list
    pub fn rename_user(&mut self, old: &str, new: &str) -> bool {
        let Some(idx) = self.users.get_index_of(&old.to_lowercase()) else {
            return false;
        };
        let Some((_, mut user)) = self.users.shift_remove_index(idx) else {
            return false;
        };
        user.nick = new.to_string();
        let (new_idx, _) = self.users.insert_full(new.to_lowercase(), user);
        self.users.move_index(new_idx, idx.min(self.users.len() - 1));
        true
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
