use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc, PoisonError, RwLock,
};

use indexmap::IndexMap;
use log::*;

use crate::{
    connection::{Connection, ConnectionId},
    event::EngineEvent,
};

mod action;
mod reducer;

pub use action::Action;

/// every connection the engine knows about, in the order they were added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    connections: IndexMap<ConnectionId, Connection>,
}

impl State {
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }
}

/// the single owner of the model. any thread may read, every change goes through
/// [`Store::dispatch`], which applies one action at a time and publishes the resulting events in
/// the order they happened.
#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<RwLock<State>>,
    events: Sender<EngineEvent>,
}

impl Store {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel();
        let store = Self {
            state: Arc::new(RwLock::new(State::default())),
            events,
        };
        (store, receiver)
    }

    pub fn dispatch(&self, action: Action) {
        trace!("dispatching {:?}", action);
        // a panic in another thread can't leave the state half changed, reducing happens
        // entirely under this lock
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let events = reducer::reduce(&mut state, action);
        // events are sent while the lock is held so that they are ordered the same as the changes
        for event in events {
            if self.events.send(event).is_err() {
                trace!("event receiver is gone, dropping event");
            }
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub fn snapshot(&self) -> State {
        self.read(State::clone)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.read(|state| state.connection(id).cloned())
    }
}
