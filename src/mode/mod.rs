//! channel modes and the codec between them and MODE strings.

mod change;
mod channel_mode;

pub use change::{parse_mode_change, to_mode_string, ChannelModeChange, UnaryMode};
pub use channel_mode::ChannelMode;
