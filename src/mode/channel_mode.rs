use indexmap::IndexSet;

use crate::mode::{ChannelModeChange, UnaryMode};

/// the restrictions currently set on a channel. no key or limit means that restriction is off.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMode {
    pub invite_only: bool,
    pub moderated: bool,
    pub protected_topic: bool,
    pub secret: bool,
    pub no_external_messages: bool,
    pub key: Option<String>,
    pub client_limit: Option<u32>,
    pub bans: IndexSet<String>,
    pub exceptions: IndexSet<String>,
    pub invite_exceptions: IndexSet<String>,
}

impl ChannelMode {
    /// produces the mode that results from applying `change`. lists become
    /// `(old - removed) + added`, key and limit are replaced or cleared, and flags only change when
    /// the change mentions them.
    pub fn apply(&self, change: &ChannelModeChange) -> ChannelMode {
        ChannelMode {
            invite_only: change.invite_only.unwrap_or(self.invite_only),
            moderated: change.moderated.unwrap_or(self.moderated),
            protected_topic: change.protected_topic.unwrap_or(self.protected_topic),
            secret: change.secret.unwrap_or(self.secret),
            no_external_messages: change
                .no_external_messages
                .unwrap_or(self.no_external_messages),
            key: apply_unary(&self.key, &change.key),
            client_limit: apply_unary(&self.client_limit, &change.client_limit),
            bans: apply_list(&self.bans, &change.removed_bans, &change.added_bans),
            exceptions: apply_list(
                &self.exceptions,
                &change.removed_exceptions,
                &change.added_exceptions,
            ),
            invite_exceptions: apply_list(
                &self.invite_exceptions,
                &change.removed_invite_exceptions,
                &change.added_invite_exceptions,
            ),
        }
    }

    /// the change that turns `self` into `other`. fields that are the same are left out, so
    /// `self.apply(&self.delta(other)) == *other`.
    pub fn delta(&self, other: &ChannelMode) -> ChannelModeChange {
        ChannelModeChange {
            added_bans: other.bans.difference(&self.bans).cloned().collect(),
            removed_bans: self.bans.difference(&other.bans).cloned().collect(),
            added_exceptions: other.exceptions.difference(&self.exceptions).cloned().collect(),
            removed_exceptions: self.exceptions.difference(&other.exceptions).cloned().collect(),
            added_invite_exceptions: other
                .invite_exceptions
                .difference(&self.invite_exceptions)
                .cloned()
                .collect(),
            removed_invite_exceptions: self
                .invite_exceptions
                .difference(&other.invite_exceptions)
                .cloned()
                .collect(),
            key: delta_unary(&self.key, &other.key),
            client_limit: delta_unary(&self.client_limit, &other.client_limit),
            invite_only: delta_flag(self.invite_only, other.invite_only),
            moderated: delta_flag(self.moderated, other.moderated),
            no_external_messages: delta_flag(self.no_external_messages, other.no_external_messages),
            protected_topic: delta_flag(self.protected_topic, other.protected_topic),
            secret: delta_flag(self.secret, other.secret),
            ..ChannelModeChange::default()
        }
    }

    /// the flag and parameter modes only, keeping the lists. used for RPL_CHANNELMODEIS, which
    /// lists every set flag but never the lists.
    pub fn with_lists_only(&self) -> ChannelMode {
        ChannelMode {
            bans: self.bans.clone(),
            exceptions: self.exceptions.clone(),
            invite_exceptions: self.invite_exceptions.clone(),
            ..ChannelMode::default()
        }
    }
}

fn apply_list(old: &IndexSet<String>, removed: &IndexSet<String>, added: &IndexSet<String>) -> IndexSet<String> {
    old.iter()
        .filter(|entry| !removed.contains(*entry))
        .chain(added.iter())
        .cloned()
        .collect()
}

fn apply_unary<T: Clone>(old: &Option<T>, change: &Option<UnaryMode<T>>) -> Option<T> {
    match change {
        Some(UnaryMode {
            added: true,
            parameter: Some(parameter),
        }) => Some(parameter.clone()),
        // set without a value, nothing to replace it with
        Some(UnaryMode { added: true, .. }) => old.clone(),
        Some(UnaryMode { added: false, .. }) => None,
        None => old.clone(),
    }
}

fn delta_unary<T: Clone + PartialEq>(old: &Option<T>, new: &Option<T>) -> Option<UnaryMode<T>> {
    if old == new {
        return None;
    }
    match new {
        Some(new) => Some(UnaryMode::added(new.clone())),
        // the old value is kept since removing a key needs it as a parameter
        None => Some(UnaryMode::removed(old.clone())),
    }
}

fn delta_flag(old: bool, new: bool) -> Option<bool> {
    (old != new).then_some(new)
}
