use crate::{
    channel::{AccessType, ChannelKind, MessageKind, User},
    connection::{ConnectionId, ConnectionState, ServerInfo},
    irc::Prefix,
    mode::ChannelModeChange,
};

/// every way the model can change. actions are only applied through [`super::Store::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddConnection {
        connection: ConnectionId,
        server: ServerInfo,
    },
    RemoveConnection {
        connection: ConnectionId,
    },
    SetConnectionState {
        connection: ConnectionId,
        state: ConnectionState,
    },
    /// registration finished
    Welcome {
        connection: ConnectionId,
        identifier: Prefix,
        text: String,
    },
    /// text for the server channel
    ServerText {
        connection: ConnectionId,
        text: String,
    },
    /// text for a channel, falls back to the server channel
    ChannelText {
        connection: ConnectionId,
        channel: String,
        text: String,
        kind: MessageKind,
    },
    ErrorReceived {
        connection: ConnectionId,
        text: String,
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
    },
    NickChanged {
        connection: ConnectionId,
        prefix: Prefix,
        nick: String,
    },

    MessageReceived {
        connection: ConnectionId,
        prefix: Option<Prefix>,
        recipient: String,
        text: String,
        kind: MessageKind,
    },
    /// a message we sent, echoed into its channel
    /// something we sent, `Own` or `Action`
    MessageSent {
        connection: ConnectionId,
        target: String,
        text: String,
        kind: MessageKind,
    },

    /// one RPL_NAMREPLY, accumulated until RPL_ENDOFNAMES
    NamesReceived {
        connection: ConnectionId,
        channel: String,
        access_type: Option<AccessType>,
        users: Vec<User>,
    },
    NamesEnded {
        connection: ConnectionId,
        channel: String,
    },
    TopicChanged {
        connection: ConnectionId,
        channel: String,
        topic: Option<String>,
        by: Option<Prefix>,
    },
    ModeChanged {
        connection: ConnectionId,
        channel: String,
        change: ChannelModeChange,
        by: Option<Prefix>,
    },
    /// RPL_CHANNELMODEIS, the full set of flag modes
    ModeReplaced {
        connection: ConnectionId,
        channel: String,
        change: ChannelModeChange,
    },

    OpenChannel {
        connection: ConnectionId,
        channel: String,
        kind: ChannelKind,
    },
    CloseChannel {
        connection: ConnectionId,
        channel: String,
    },
    AddPendingChannel {
        connection: ConnectionId,
        channel: String,
    },
    /// replaces the channels to join after registration
    SetPendingChannels {
        connection: ConnectionId,
        channels: Vec<String>,
    },
    ClearNotifications {
        connection: ConnectionId,
        channel: String,
    },
}

impl Action {
    pub fn connection(&self) -> ConnectionId {
        match self {
            Action::AddConnection { connection, .. }
            | Action::RemoveConnection { connection }
            | Action::SetConnectionState { connection, .. }
            | Action::Welcome { connection, .. }
            | Action::ServerText { connection, .. }
            | Action::ChannelText { connection, .. }
            | Action::ErrorReceived { connection, .. }
            | Action::UserJoined { connection, .. }
            | Action::UserParted { connection, .. }
            | Action::UserKicked { connection, .. }
            | Action::UserQuit { connection, .. }
            | Action::NickChanged { connection, .. }
            | Action::MessageReceived { connection, .. }
            | Action::MessageSent { connection, .. }
            | Action::NamesReceived { connection, .. }
            | Action::NamesEnded { connection, .. }
            | Action::TopicChanged { connection, .. }
            | Action::ModeChanged { connection, .. }
            | Action::ModeReplaced { connection, .. }
            | Action::OpenChannel { connection, .. }
            | Action::CloseChannel { connection, .. }
            | Action::AddPendingChannel { connection, .. }
            | Action::SetPendingChannels { connection, .. }
            | Action::ClearNotifications { connection, .. } => *connection,
        }
    }
}
