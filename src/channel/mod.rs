mod channel;
mod user;

pub use channel::{AccessType, Channel, ChannelKind, ChannelMessage, JoinState, MessageKind, Notification};
pub use user::{is_valid_nick, ChannelPrivilege, User};
