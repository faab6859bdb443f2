use std::collections::BTreeMap;

use indexmap::IndexSet;
use log::*;

use crate::channel::ChannelPrivilege;

/// a mode that is either set with a parameter or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryMode<T> {
    pub added: bool,
    pub parameter: Option<T>,
}

impl<T> UnaryMode<T> {
    pub fn added(parameter: T) -> Self {
        Self {
            added: true,
            parameter: Some(parameter),
        }
    }

    pub fn removed(parameter: Option<T>) -> Self {
        Self {
            added: false,
            parameter,
        }
    }
}

/// a delta between two channel modes. a field is `None` (or empty) only when its mode was not
/// mentioned, `Some(false)` means the mode was explicitly removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelModeChange {
    pub added_bans: IndexSet<String>,
    pub removed_bans: IndexSet<String>,
    pub added_exceptions: IndexSet<String>,
    pub removed_exceptions: IndexSet<String>,
    pub added_invite_exceptions: IndexSet<String>,
    pub removed_invite_exceptions: IndexSet<String>,

    pub added_privileges: BTreeMap<ChannelPrivilege, Vec<String>>,
    pub removed_privileges: BTreeMap<ChannelPrivilege, Vec<String>>,

    pub key: Option<UnaryMode<String>>,
    pub client_limit: Option<UnaryMode<u32>>,

    pub invite_only: Option<bool>,
    pub moderated: Option<bool>,
    pub no_external_messages: Option<bool>,
    pub protected_topic: Option<bool>,
    pub secret: Option<bool>,
}

impl ChannelModeChange {
    pub fn is_empty(&self) -> bool {
        *self == ChannelModeChange::default()
    }

    /// whether the change touches anything stored in a `ChannelMode`. privilege changes apply to
    /// users instead.
    pub fn has_privilege_changes(&self) -> bool {
        !self.added_privileges.is_empty() || !self.removed_privileges.is_empty()
    }
}

fn flag(change: &mut ChannelModeChange, c: char) -> Option<&mut Option<bool>> {
    match c {
        'i' => Some(&mut change.invite_only),
        'm' => Some(&mut change.moderated),
        'n' => Some(&mut change.no_external_messages),
        's' => Some(&mut change.secret),
        't' => Some(&mut change.protected_topic),
        _ => None,
    }
}

fn list<'a>(change: &'a mut ChannelModeChange, c: char, adding: bool) -> Option<&'a mut IndexSet<String>> {
    Some(match (c, adding) {
        ('b', true) => &mut change.added_bans,
        ('b', false) => &mut change.removed_bans,
        ('e', true) => &mut change.added_exceptions,
        ('e', false) => &mut change.removed_exceptions,
        ('I', true) => &mut change.added_invite_exceptions,
        ('I', false) => &mut change.removed_invite_exceptions,
        _ => return None,
    })
}

fn privilege(c: char) -> Option<ChannelPrivilege> {
    match c {
        'o' => Some(ChannelPrivilege::FullOperator),
        'h' => Some(ChannelPrivilege::HalfOperator),
        'v' => Some(ChannelPrivilege::Voiced),
        _ => None,
    }
}

// whether the flag takes the next argument. `l` only takes one when it is being set.
fn takes_arg(c: char, adding: Option<bool>) -> bool {
    match c {
        'b' | 'e' | 'I' | 'k' | 'o' | 'h' | 'v' => true,
        'l' => adding != Some(false),
        _ => false,
    }
}

/// parses a mode string like `+bl-k` together with its positional arguments. arguments are
/// consumed exactly once, in the order their flags appear. unknown flags are skipped, and a flag
/// that is missing its argument is skipped on its own.
pub fn parse_mode_change(mode_string: &str, mode_args: &[impl AsRef<str>]) -> ChannelModeChange {
    let mut change = ChannelModeChange::default();
    let mut args = mode_args.iter().map(AsRef::as_ref);
    let mut adding: Option<bool> = None;

    for c in mode_string.chars() {
        match c {
            '+' => {
                adding = Some(true);
                continue;
            }
            '-' => {
                adding = Some(false);
                continue;
            }
            _ => {}
        }

        let arg = if takes_arg(c, adding) { args.next() } else { None };

        let Some(adding) = adding else {
            warn!("mode {:?} in {:?} has no + or -, skipping", c, mode_string);
            continue;
        };

        if let Some(flag) = flag(&mut change, c) {
            *flag = Some(adding);
        } else if let Some(list) = list(&mut change, c, adding) {
            match arg {
                Some(mask) => {
                    list.insert(mask.to_string());
                }
                // a bare +b is a list query, not a change
                None => debug!("mode {:?} without a mask, skipping", c),
            }
        } else if let Some(privilege) = privilege(c) {
            let Some(nick) = arg else {
                warn!("mode {:?} without a nick, skipping", c);
                continue;
            };
            let map = if adding {
                &mut change.added_privileges
            } else {
                &mut change.removed_privileges
            };
            map.entry(privilege).or_default().push(nick.to_string());
        } else if c == 'k' {
            match (adding, arg) {
                (true, Some(key)) => change.key = Some(UnaryMode::added(key.to_string())),
                (false, Some(key)) => change.key = Some(UnaryMode::removed(Some(key.to_string()))),
                (_, None) => warn!("mode k without a key, skipping"),
            }
        } else if c == 'l' {
            if !adding {
                change.client_limit = Some(UnaryMode::removed(None));
                continue;
            }
            match arg.map(str::parse::<u32>) {
                Some(Ok(limit)) => change.client_limit = Some(UnaryMode::added(limit)),
                Some(Err(e)) => warn!("mode l with invalid limit: {}", e),
                None => warn!("mode l without a limit, skipping"),
            }
        } else {
            // servers may send extension flags
            debug!("ignoring unknown mode {:?}", c);
        }
    }

    if args.next().is_some() {
        debug!("unused mode arguments for {:?}", mode_string);
    }

    change
}

/// builds `+<added>-<removed> <added params> <removed params>`, suitable as the arguments of a
/// MODE command. empty sections are left out entirely.
pub fn to_mode_string(change: &ChannelModeChange) -> String {
    let mut added_flags = String::new();
    let mut added_params: Vec<String> = Vec::new();
    let mut removed_flags = String::new();
    let mut removed_params: Vec<String> = Vec::new();

    let lists = [
        ('b', &change.added_bans, &change.removed_bans),
        ('e', &change.added_exceptions, &change.removed_exceptions),
        ('I', &change.added_invite_exceptions, &change.removed_invite_exceptions),
    ];
    for (c, added, removed) in lists {
        for mask in added {
            added_flags.push(c);
            added_params.push(mask.clone());
        }
        for mask in removed {
            removed_flags.push(c);
            removed_params.push(mask.clone());
        }
    }

    match &change.client_limit {
        Some(UnaryMode {
            added: true,
            parameter: Some(limit),
        }) => {
            added_flags.push('l');
            added_params.push(limit.to_string());
        }
        // a limit can't be set without a value
        Some(UnaryMode { added: true, .. }) => {}
        Some(UnaryMode { added: false, .. }) => removed_flags.push('l'),
        None => {}
    }

    match &change.key {
        Some(UnaryMode {
            added: true,
            parameter: Some(key),
        }) => {
            added_flags.push('k');
            added_params.push(key.clone());
        }
        Some(UnaryMode { added: true, .. }) => {}
        Some(UnaryMode {
            added: false,
            parameter,
        }) => {
            removed_flags.push('k');
            // servers want a key when removing one, any key works on most of them
            removed_params.push(parameter.clone().unwrap_or_else(|| String::from("*")));
        }
        None => {}
    }

    let flags = [
        ('i', change.invite_only),
        ('m', change.moderated),
        ('n', change.no_external_messages),
        ('t', change.protected_topic),
        ('s', change.secret),
    ];
    for (c, value) in flags {
        match value {
            Some(true) => added_flags.push(c),
            Some(false) => removed_flags.push(c),
            None => {}
        }
    }

    let privileges = [
        (&change.added_privileges, &mut added_flags, &mut added_params),
        (&change.removed_privileges, &mut removed_flags, &mut removed_params),
    ];
    for (map, flags, params) in privileges {
        for (privilege, nicks) in map {
            let Some(c) = privilege.mode_char() else {
                warn!("no mode character for {:?}", privilege);
                continue;
            };
            for nick in nicks {
                flags.push(c);
                params.push(nick.clone());
            }
        }
    }

    let mut s = String::new();
    if !added_flags.is_empty() {
        s.push('+');
        s.push_str(&added_flags);
    }
    if !removed_flags.is_empty() {
        s.push('-');
        s.push_str(&removed_flags);
    }
    for param in added_params.iter().chain(removed_params.iter()) {
        s.push(' ');
        s.push_str(param);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ARGS: &[&str] = &[];

    #[test]
    fn args_are_consumed_in_flag_order() {
        let change = parse_mode_change("+bkl", &["mask!*@*", "secret", "10"]);
        assert!(change.added_bans.contains("mask!*@*"));
        assert_eq!(change.key, Some(UnaryMode::added(String::from("secret"))));
        assert_eq!(change.client_limit, Some(UnaryMode::added(10)));
    }

    #[test]
    fn mixed_add_and_remove() {
        let change = parse_mode_change("+o-v+i", &["mike", "piotr"]);
        assert_eq!(
            change.added_privileges.get(&ChannelPrivilege::FullOperator),
            Some(&vec![String::from("mike")])
        );
        assert_eq!(
            change.removed_privileges.get(&ChannelPrivilege::Voiced),
            Some(&vec![String::from("piotr")])
        );
        assert_eq!(change.invite_only, Some(true));
        assert_eq!(change.moderated, None);
    }

    #[test]
    fn explicit_removal_is_some_false() {
        let change = parse_mode_change("-nt", NO_ARGS);
        assert_eq!(change.no_external_messages, Some(false));
        assert_eq!(change.protected_topic, Some(false));
        assert_eq!(change.secret, None);
    }

    #[test]
    fn unknown_flags_are_ignored() {
        let change = parse_mode_change("+Xi", NO_ARGS);
        assert_eq!(change.invite_only, Some(true));
        let change = parse_mode_change("+X", NO_ARGS);
        assert!(change.is_empty());
    }

    #[test]
    fn missing_argument_skips_only_that_flag() {
        // the ban mask is taken by b, o has nothing left
        let change = parse_mode_change("+bom", &["mask"]);
        assert!(change.added_bans.contains("mask"));
        assert!(change.added_privileges.is_empty());
        assert_eq!(change.moderated, Some(true));
    }

    #[test]
    fn limit_removal_takes_no_argument() {
        let change = parse_mode_change("-lk", &["key"]);
        assert_eq!(change.client_limit, Some(UnaryMode::removed(None)));
        assert_eq!(change.key, Some(UnaryMode::removed(Some(String::from("key")))));
    }

    #[test]
    fn invalid_limit_is_skipped() {
        let change = parse_mode_change("+lb", &["many", "mask"]);
        assert_eq!(change.client_limit, None);
        // the invalid limit still used up its argument
        assert!(change.added_bans.contains("mask"));
    }

    #[test]
    fn flags_without_direction_are_skipped() {
        let change = parse_mode_change("b+i", &["mask"]);
        assert!(change.added_bans.is_empty());
        assert_eq!(change.invite_only, Some(true));
    }

    #[test]
    fn mode_string_ordering() {
        let mut change = ChannelModeChange::default();
        change.secret = Some(true);
        change.invite_only = Some(true);
        change.removed_exceptions.insert(String::from("ex!*@*"));
        change.key = Some(UnaryMode::added(String::from("hunter2")));
        change.client_limit = Some(UnaryMode::added(5));
        change.added_bans.insert(String::from("bad!*@*"));
        change.moderated = Some(false);

        assert_eq!(
            to_mode_string(&change),
            "+blkis-em bad!*@* 5 hunter2 ex!*@*"
        );
    }

    #[test]
    fn empty_sections_are_omitted() {
        assert_eq!(to_mode_string(&ChannelModeChange::default()), "");

        let change = parse_mode_change("-i", NO_ARGS);
        assert_eq!(to_mode_string(&change), "-i");

        let change = parse_mode_change("+t", NO_ARGS);
        assert_eq!(to_mode_string(&change), "+t");
    }

    #[test]
    fn removals_keep_their_parameters() {
        let change = parse_mode_change("-bk", &["mask", "key"]);
        assert_eq!(to_mode_string(&change), "-bk mask key");

        let mut change = ChannelModeChange::default();
        change.key = Some(UnaryMode::removed(None));
        change.client_limit = Some(UnaryMode::removed(None));
        assert_eq!(to_mode_string(&change), "-lk *");
    }

    #[test]
    fn privileges_are_serialized() {
        let change = parse_mode_change("+ov-h", &["mike", "anna", "bob"]);
        assert_eq!(to_mode_string(&change), "+vo-h anna mike bob");
    }

    #[test]
    fn mode_string_parses_back() {
        let change = parse_mode_change("+bIl-ek+m", &["a!*@*", "b!*@*", "7", "c!*@*", "key"]);
        let s = to_mode_string(&change);
        let mut parts = s.split(' ');
        let modes = parts.next().unwrap();
        let args = parts.collect::<Vec<_>>();
        assert_eq!(parse_mode_change(modes, &args), change);
    }
}
