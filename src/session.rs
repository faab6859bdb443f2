use std::{
    collections::{BTreeMap, HashMap},
    sync::mpsc::Receiver,
};

use log::*;
use thiserror::Error;

use crate::{
    channel::{is_valid_nick, ChannelKind, MessageKind},
    connection::{ConnectionId, ConnectionState, ServerInfo},
    event::EngineEvent,
    handlers::ctcp::CtcpCommand,
    irc::{ClientCommand, ClientCommandErr},
    mode::{to_mode_string, ChannelMode},
    net::{ConnectErr, Transport, TransportErr, CONNECT_TIMEOUT},
    store::{Action, Store},
};

pub type ConnectReceiver = Receiver<Result<(), ConnectErr>>;
pub type DisconnectReceiver = Receiver<Result<(), TransportErr>>;

/// the joined channels of every registered connection, see
/// [`SessionController::session_snapshot`]
pub type SessionSnapshot = BTreeMap<ConnectionId, Vec<String>>;

#[derive(Debug, Error)]
pub enum SessionErr {
    #[error("unknown connection {}", .0)]
    UnknownConnection(ConnectionId),
    #[error("{} did not close in time", .0)]
    StillClosing(ConnectionId),
    #[error("{:?} is not a valid nick", .0)]
    InvalidNick(String),
    #[error("unknown channel {}", .0)]
    UnknownChannel(String),
    #[error(transparent)]
    Transport(#[from] TransportErr),
    #[error(transparent)]
    Command(#[from] ClientCommandErr),
}

/// the entry point for front-ends. owns a transport per connection, and turns requests into
/// commands for the server and actions for the store.
pub struct SessionController {
    store: Store,
    transports: HashMap<ConnectionId, Transport>,
    next_id: u64,
}

impl SessionController {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (store, events) = Store::new();
        (Self::with_store(store), events)
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            transports: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // =======================
    // connection lifecycle
    // =======================

    /// adds a connection without opening it
    pub fn add_connection(&mut self, server: ServerInfo) -> ConnectionId {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        self.store.dispatch(Action::AddConnection {
            connection: id,
            server,
        });
        self.transports
            .insert(id, Transport::new(id, self.store.clone()));
        id
    }

    pub fn connect(&mut self, server: ServerInfo) -> (ConnectionId, ConnectReceiver) {
        let id = self.add_connection(server.clone());
        let transport = self
            .transports
            .entry(id)
            .or_insert_with(|| Transport::new(id, self.store.clone()));
        (id, transport.connect(&server))
    }

    /// opens a known connection again and joins exactly `channels` once registered. a connection
    /// that is still open is closed first, which blocks until its IO thread stopped.
    pub fn reconnect(
        &mut self,
        id: ConnectionId,
        channels: &[String],
    ) -> Result<ConnectReceiver, SessionErr> {
        let server = self
            .store
            .read(|state| state.connection(id).map(|c| c.server.clone()))
            .ok_or(SessionErr::UnknownConnection(id))?;
        let transport = self.transport_mut(id)?;

        if transport.is_running() {
            debug!("closing {} before reconnecting", id);
            // does nothing when a close was already requested
            let _ = transport.disconnect();
            // the old IO thread reports Disconnected when it stops, that has to happen before the
            // new connection starts
            if !transport.wait_stopped(CONNECT_TIMEOUT) {
                return Err(SessionErr::StillClosing(id));
            }
        }

        self.store.dispatch(Action::SetPendingChannels {
            connection: id,
            channels: channels.to_vec(),
        });
        let transport = self.transport_mut(id)?;
        Ok(transport.connect(&server))
    }

    /// sends QUIT and closes the connection once it was written
    pub fn disconnect(
        &mut self,
        id: ConnectionId,
        reason: Option<String>,
    ) -> Result<DisconnectReceiver, SessionErr> {
        let transport = self.transport_mut(id)?;
        if transport.is_running() {
            if let Err(e) = transport.send(&ClientCommand::Quit(reason)) {
                debug!("could not send QUIT to {}: {}", id, e);
            }
        }
        Ok(transport.disconnect())
    }

    /// forgets a connection. an open connection is closed in the background.
    pub fn remove(&mut self, id: ConnectionId) -> Result<(), SessionErr> {
        let Some(mut transport) = self.transports.remove(&id) else {
            return Err(SessionErr::UnknownConnection(id));
        };
        if transport.is_running() {
            if let Err(e) = transport.send(&ClientCommand::Quit(None)) {
                debug!("could not send QUIT to {}: {}", id, e);
            }
        }
        // nobody waits for the close
        let _ = transport.disconnect();

        self.store
            .dispatch(Action::RemoveConnection { connection: id });
        Ok(())
    }

    /// the joined channels of every connected connection
    pub fn session_snapshot(&self) -> SessionSnapshot {
        self.store.read(|state| {
            state
                .connections()
                .filter(|c| c.state == ConnectionState::Connected)
                .map(|c| (c.id(), c.joined_channel_names()))
                .collect()
        })
    }

    /// reconnects every connection in the snapshot, rejoining exactly its channels
    pub fn restore(
        &mut self,
        snapshot: &SessionSnapshot,
    ) -> Vec<(ConnectionId, Result<ConnectReceiver, SessionErr>)> {
        snapshot
            .iter()
            .map(|(&id, channels)| (id, self.reconnect(id, channels)))
            .collect()
    }

    // =======================
    // commands
    // =======================

    /// sends a line as it is. the line must not contain line breaks.
    pub fn send_raw(&self, id: ConnectionId, line: &str) -> Result<(), SessionErr> {
        self.transport(id)?.send_line(line)?;
        Ok(())
    }

    /// joins right away when registered, otherwise once registration finished
    pub fn join_channel(
        &self,
        id: ConnectionId,
        channel: &str,
        key: Option<String>,
    ) -> Result<(), SessionErr> {
        let transport = self.transport(id)?;
        // NOTE: the channel is added before checking the state. if RPL_WELCOME arrives in between
        // the channel is joined twice, which servers ignore.
        self.store.dispatch(Action::AddPendingChannel {
            connection: id,
            channel: channel.to_string(),
        });
        if self.state(id)? == ConnectionState::Connected {
            transport.send(&ClientCommand::Join {
                channel: channel.to_string(),
                key,
            })?;
        }
        Ok(())
    }

    pub fn part_channel(
        &self,
        id: ConnectionId,
        channel: &str,
        reason: Option<String>,
    ) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Part {
                channel: channel.to_string(),
                reason,
            },
        )
    }

    /// removes a channel. a joined channel is parted first and removed when the server confirmed
    /// the PART.
    pub fn close_channel(&self, id: ConnectionId, channel: &str) -> Result<(), SessionErr> {
        let transport = self.transport(id)?;
        let needs_part = self
            .store
            .read(|state| {
                let conn = state.connection(id)?;
                let chan = conn.channel(channel)?;
                Some(
                    chan.kind == ChannelKind::MultiUser
                        && chan.is_joined()
                        && conn.state != ConnectionState::Disconnected,
                )
            })
            .ok_or_else(|| SessionErr::UnknownChannel(channel.to_string()))?;

        self.store.dispatch(Action::CloseChannel {
            connection: id,
            channel: channel.to_string(),
        });
        if needs_part {
            transport.send(&ClientCommand::Part {
                channel: channel.to_string(),
                reason: None,
            })?;
        }
        Ok(())
    }

    pub fn open_private_message(&self, id: ConnectionId, nick: &str) -> Result<(), SessionErr> {
        self.transport(id)?;
        if !is_valid_nick(nick) {
            return Err(SessionErr::InvalidNick(nick.to_string()));
        }
        self.store.dispatch(Action::OpenChannel {
            connection: id,
            channel: nick.to_string(),
            kind: ChannelKind::PrivateMessage,
        });
        Ok(())
    }

    /// sends a PRIVMSG per line of `text`
    pub fn send_message(&self, id: ConnectionId, target: &str, text: &str) -> Result<(), SessionErr> {
        let transport = self.transport(id)?;
        for line in text.lines().filter(|line| !line.is_empty()) {
            transport.send(&ClientCommand::Privmsg {
                target: target.to_string(),
                text: line.to_string(),
            })?;
            self.store.dispatch(Action::MessageSent {
                connection: id,
                target: target.to_string(),
                text: line.to_string(),
                kind: MessageKind::Own,
            });
        }
        Ok(())
    }

    /// `/me`
    pub fn send_action(&self, id: ConnectionId, target: &str, action: &str) -> Result<(), SessionErr> {
        let transport = self.transport(id)?;
        let command = CtcpCommand::Action(action.to_string()).to_command(target);
        transport.send(&command)?;
        self.store.dispatch(Action::MessageSent {
            connection: id,
            target: target.to_string(),
            text: action.to_string(),
            kind: MessageKind::Action,
        });
        Ok(())
    }

    pub fn set_channel_topic(
        &self,
        id: ConnectionId,
        channel: &str,
        topic: &str,
    ) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Topic {
                channel: channel.to_string(),
                topic: topic.to_string(),
            },
        )
    }

    /// sends a mode string as it was typed, like `+o-v mike piotr`
    pub fn set_channel_mode(
        &self,
        id: ConnectionId,
        channel: &str,
        mode_string: &str,
    ) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Mode {
                target: channel.to_string(),
                modes: mode_string.trim().to_string(),
            },
        )
    }

    /// sends only what differs between the channel's current mode and `edited`. nothing is sent
    /// if they are the same.
    pub fn apply_channel_mode(
        &self,
        id: ConnectionId,
        channel: &str,
        edited: &ChannelMode,
    ) -> Result<(), SessionErr> {
        let current = self
            .store
            .read(|state| {
                state
                    .connection(id)
                    .and_then(|c| c.channel(channel))
                    .map(|chan| chan.mode.clone())
            })
            .ok_or_else(|| SessionErr::UnknownChannel(channel.to_string()))?;

        let change = current.delta(edited);
        if change.is_empty() {
            debug!("mode of {} did not change", channel);
            return Ok(());
        }
        self.set_channel_mode(id, channel, &to_mode_string(&change))
    }

    /// changes our own user mode, like `+i`
    pub fn set_user_mode(&self, id: ConnectionId, mode_string: &str) -> Result<(), SessionErr> {
        let nick = self
            .store
            .read(|state| state.connection(id).map(|c| c.nick().to_string()))
            .ok_or(SessionErr::UnknownConnection(id))?;
        self.send(
            id,
            ClientCommand::Mode {
                target: nick,
                modes: mode_string.trim().to_string(),
            },
        )
    }

    pub fn kick_user(
        &self,
        id: ConnectionId,
        channel: &str,
        nick: &str,
        reason: Option<String>,
    ) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Kick {
                channel: channel.to_string(),
                nick: nick.to_string(),
                reason,
            },
        )
    }

    pub fn invite_user(&self, id: ConnectionId, nick: &str, channel: &str) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Invite {
                nick: nick.to_string(),
                channel: channel.to_string(),
            },
        )
    }

    pub fn operator_login(
        &self,
        id: ConnectionId,
        name: &str,
        password: &str,
    ) -> Result<(), SessionErr> {
        self.send(
            id,
            ClientCommand::Oper {
                name: name.to_string(),
                password: password.to_string(),
            },
        )
    }

    pub fn mark_read(&self, id: ConnectionId, channel: &str) -> Result<(), SessionErr> {
        self.transport(id)?;
        self.store.dispatch(Action::ClearNotifications {
            connection: id,
            channel: channel.to_string(),
        });
        Ok(())
    }

    fn send(&self, id: ConnectionId, command: ClientCommand) -> Result<(), SessionErr> {
        // invalid commands are reported even when not connected
        command.irc_str()?;
        self.transport(id)?.send(&command)?;
        Ok(())
    }

    fn state(&self, id: ConnectionId) -> Result<ConnectionState, SessionErr> {
        self.store
            .read(|state| state.connection(id).map(|c| c.state))
            .ok_or(SessionErr::UnknownConnection(id))
    }

    fn transport(&self, id: ConnectionId) -> Result<&Transport, SessionErr> {
        self.transports
            .get(&id)
            .ok_or(SessionErr::UnknownConnection(id))
    }

    fn transport_mut(&mut self, id: ConnectionId) -> Result<&mut Transport, SessionErr> {
        self.transports
            .get_mut(&id)
            .ok_or(SessionErr::UnknownConnection(id))
    }
}
