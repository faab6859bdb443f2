use std::collections::BTreeSet;

use crate::constants::names::{
    CHANNEL_MEMBERSHIP_PREFIXES, INVALID_NICKNAME_CHARACTERS, INVALID_NICKNAME_START,
};

/// a rank a user holds in a channel. ordered by rank, `Owner` is the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelPrivilege {
    Voiced = 1,
    HalfOperator = 2,
    FullOperator = 3,
    Admin = 4,
    Owner = 5,
}

impl ChannelPrivilege {
    /// the membership prefix used in NAMES replies
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '~' => Some(ChannelPrivilege::Owner),
            '&' => Some(ChannelPrivilege::Admin),
            '@' => Some(ChannelPrivilege::FullOperator),
            '%' => Some(ChannelPrivilege::HalfOperator),
            '+' => Some(ChannelPrivilege::Voiced),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            ChannelPrivilege::Owner => '~',
            ChannelPrivilege::Admin => '&',
            ChannelPrivilege::FullOperator => '@',
            ChannelPrivilege::HalfOperator => '%',
            ChannelPrivilege::Voiced => '+',
        }
    }

    /// the channel mode character that grants this privilege. owner and admin have no portable
    /// mode character.
    pub fn mode_char(self) -> Option<char> {
        match self {
            ChannelPrivilege::FullOperator => Some('o'),
            ChannelPrivilege::HalfOperator => Some('h'),
            ChannelPrivilege::Voiced => Some('v'),
            ChannelPrivilege::Admin | ChannelPrivilege::Owner => None,
        }
    }
}

pub fn is_valid_nick(nick: &str) -> bool {
    let Some(first) = nick.chars().next() else {
        return false;
    };

    !INVALID_NICKNAME_START.contains(&first)
        && !CHANNEL_MEMBERSHIP_PREFIXES.contains(&first)
        && !nick.chars().any(|c| INVALID_NICKNAME_CHARACTERS.contains(&c))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub nick: String,
    pub privileges: BTreeSet<ChannelPrivilege>,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            privileges: BTreeSet::new(),
        }
    }

    pub fn with_privileges(
        nick: impl Into<String>,
        privileges: impl IntoIterator<Item = ChannelPrivilege>,
    ) -> Self {
        Self {
            nick: nick.into(),
            privileges: privileges.into_iter().collect(),
        }
    }

    /// resolves an entry of a NAMES reply, like `@+mike`. servers with multi-prefix send every
    /// prefix the user holds.
    pub fn from_names_entry(entry: &str) -> Option<Self> {
        let nick = entry.trim_start_matches(CHANNEL_MEMBERSHIP_PREFIXES);
        // NAMES entries may be `nick!user@host` with userhost-in-names
        let nick = match nick.split_once('!') {
            Some((nick, _)) => nick,
            None => nick,
        };
        if !is_valid_nick(nick) {
            return None;
        }

        let prefixes = &entry[..entry.len() - entry.trim_start_matches(CHANNEL_MEMBERSHIP_PREFIXES).len()];
        Some(Self::with_privileges(
            nick,
            prefixes.chars().filter_map(ChannelPrivilege::from_prefix),
        ))
    }

    pub fn highest_privilege(&self) -> Option<ChannelPrivilege> {
        self.privileges.iter().max().copied()
    }

    /// the nick with the prefix of the highest privilege, as shown in user lists
    pub fn display_name(&self) -> String {
        match self.highest_privilege() {
            Some(privilege) => format!("{}{}", privilege.prefix(), self.nick),
            None => self.nick.clone(),
        }
    }
}
