pub const CHANNEL_TYPES: &[char] = ['#', '&', '+', '!'].as_slice();
// ordered from the highest rank down, as servers send them in NAMES replies
pub const CHANNEL_MEMBERSHIP_PREFIXES: &[char] = ['~', '&', '@', '%', '+'].as_slice();

pub const INVALID_NICKNAME_CHARACTERS: &[char] = [' ', ',', '*', '?', '!', '@'].as_slice();
pub const INVALID_NICKNAME_START: &[char] = &['$', ':'];

/// NAMES reply symbols for the channel access type
pub const ACCESS_PUBLIC: &str = "=";
pub const ACCESS_PRIVATE: &str = "*";
pub const ACCESS_SECRET: &str = "@";
