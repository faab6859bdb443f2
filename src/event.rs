use crate::{
    channel::{ChannelKind, ChannelMessage, User},
    connection::{ConnectionId, ConnectionState, ServerInfo},
    irc::Prefix,
    mode::ChannelMode,
};

/// a change to the model, sent to whoever is listening on the engine's event channel. events only
/// carry ids and owned snapshots, the model itself is only changed through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ConnectionAdded {
        connection: ConnectionId,
        server: ServerInfo,
    },
    ConnectionRemoved {
        connection: ConnectionId,
    },
    ConnectionStateChanged {
        connection: ConnectionId,
        state: ConnectionState,
    },

    ChannelAdded {
        connection: ConnectionId,
        channel: String,
        kind: ChannelKind,
    },
    /// we joined a channel
    ChannelJoined {
        connection: ConnectionId,
        channel: String,
    },
    /// we left a channel, by parting, being kicked, or losing the connection
    ChannelParted {
        connection: ConnectionId,
        channel: String,
        reason: Option<String>,
    },
    ChannelRemoved {
        connection: ConnectionId,
        channel: String,
    },

    UserJoined {
        connection: ConnectionId,
        channel: String,
        prefix: Prefix,
    },
    UserParted {
        connection: ConnectionId,
        channel: String,
        prefix: Prefix,
        reason: Option<String>,
    },
    UserKicked {
        connection: ConnectionId,
        channel: String,
        nick: String,
        by: Option<Prefix>,
        reason: Option<String>,
    },
    UserQuit {
        connection: ConnectionId,
        prefix: Prefix,
        reason: Option<String>,
        /// every channel the user was removed from
        channels: Vec<String>,
    },
    NickChanged {
        connection: ConnectionId,
        old: String,
        new: String,
    },

    MessageReceived {
        connection: ConnectionId,
        channel: String,
        message: ChannelMessage,
    },
    TopicChanged {
        connection: ConnectionId,
        channel: String,
        topic: Option<String>,
    },
    ModeChanged {
        connection: ConnectionId,
        channel: String,
        mode: ChannelMode,
    },
    UsersUpdated {
        connection: ConnectionId,
        channel: String,
        users: Vec<User>,
    },
    ErrorReceived {
        connection: ConnectionId,
        message: String,
    },
}

impl EngineEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            EngineEvent::ConnectionAdded { connection, .. }
            | EngineEvent::ConnectionRemoved { connection }
            | EngineEvent::ConnectionStateChanged { connection, .. }
            | EngineEvent::ChannelAdded { connection, .. }
            | EngineEvent::ChannelJoined { connection, .. }
            | EngineEvent::ChannelParted { connection, .. }
            | EngineEvent::ChannelRemoved { connection, .. }
            | EngineEvent::UserJoined { connection, .. }
            | EngineEvent::UserParted { connection, .. }
            | EngineEvent::UserKicked { connection, .. }
            | EngineEvent::UserQuit { connection, .. }
            | EngineEvent::NickChanged { connection, .. }
            | EngineEvent::MessageReceived { connection, .. }
            | EngineEvent::TopicChanged { connection, .. }
            | EngineEvent::ModeChanged { connection, .. }
            | EngineEvent::UsersUpdated { connection, .. }
            | EngineEvent::ErrorReceived { connection, .. } => *connection,
        }
    }
}
