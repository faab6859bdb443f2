mod client;
mod command;
mod message;
mod prefix;

pub use client::{ClientCommand, ClientCommandErr};
pub use command::{IrcCommand, Reply};
pub use message::IrcMessage;
pub use prefix::Prefix;
