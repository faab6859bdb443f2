//! an IRC client protocol engine. it owns one stream per connection, parses the lines coming in,
//! keeps the model of servers, channels and users up to date, and reports every change as an
//! [`EngineEvent`].

pub mod channel;
pub mod command;
pub mod connection;
pub mod constants;
pub mod display;
pub mod event;
pub mod ext;
pub mod handlers;
pub mod irc;
pub mod logging;
pub mod mode;
pub mod net;
pub mod session;
pub mod store;

pub use connection::{Connection, ConnectionId, ConnectionState, ServerInfo};
pub use event::EngineEvent;
pub use session::{SessionController, SessionErr, SessionSnapshot};
pub use store::{Action, State, Store};
