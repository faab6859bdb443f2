use crate::constants::numerics::*;

// generates the numeric reply enum along with both directions of the numeric table, so the two
// can't drift apart
macro_rules! replies {
    ($($variant:ident = $code:ident,)*) => {
        /// a numeric reply the engine knows by name
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Reply {
            $($variant,)*
        }

        impl Reply {
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Reply::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> u16 {
                match self {
                    $(Reply::$variant => $code,)*
                }
            }
        }
    };
}

replies! {
    Welcome = RPL_WELCOME,
    YourHost = RPL_YOURHOST,
    Created = RPL_CREATED,
    MyInfo = RPL_MYINFO,
    ISupport = RPL_ISUPPORT,
    UModeIs = RPL_UMODEIS,
    LUserClient = RPL_LUSERCLIENT,
    LUserOp = RPL_LUSEROP,
    LUserUnknown = RPL_LUSERUNKNOWN,
    LUserChannels = RPL_LUSERCHANNELS,
    LUserMe = RPL_LUSERME,
    LocalUsers = RPL_LOCALUSERS,
    GlobalUsers = RPL_GLOBALUSERS,
    ChannelModeIs = RPL_CHANNELMODEIS,
    NoTopic = RPL_NOTOPIC,
    Topic = RPL_TOPIC,
    TopicWhoTime = RPL_TOPICWHOTIME,
    Inviting = RPL_INVITING,
    NamesReply = RPL_NAMREPLY,
    EndOfNames = RPL_ENDOFNAMES,
    BanList = RPL_BANLIST,
    EndOfBanList = RPL_ENDOFBANLIST,
    Motd = RPL_MOTD,
    MotdStart = RPL_MOTDSTART,
    EndOfMotd = RPL_ENDOFMOTD,
    YoureOper = RPL_YOUREOPER,
    NoSuchNick = ERR_NOSUCHNICK,
    NoSuchChannel = ERR_NOSUCHCHANNEL,
    CannotSendToChan = ERR_CANNOTSENDTOCHAN,
    NoMotd = ERR_NOMOTD,
    NoNicknameGiven = ERR_NONICKNAMEGIVEN,
    ErroneousNickname = ERR_ERRONEUSNICKNAME,
    NicknameInUse = ERR_NICKNAMEINUSE,
    UserNotInChannel = ERR_USERNOTINCHANNEL,
    NotOnChannel = ERR_NOTONCHANNEL,
    NeedMoreParams = ERR_NEEDMOREPARAMS,
    PasswdMismatch = ERR_PASSWDMISMATCH,
    ChannelIsFull = ERR_CHANNELISFULL,
    InviteOnlyChan = ERR_INVITEONLYCHAN,
    BannedFromChan = ERR_BANNEDFROMCHAN,
    BadChannelKey = ERR_BADCHANNELKEY,
    ChanOPrivsNeeded = ERR_CHANOPRIVSNEEDED,
    NoOperHost = ERR_NOOPERHOST,
}

/// the command of a message received from a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCommand {
    Ping,
    // NOTE: server -> client PONG has a server param before the token.
    Pong,
    Join,
    Part,
    Privmsg,
    Notice,
    Quit,
    Nick,
    Mode,
    Topic,
    Kick,
    Invite,
    Error,

    Reply(Reply),
    /// a numeric the engine has no name for
    Numeric(u16),

    /// an unknown command, lowercased
    Unrecognized(String),
}

impl IrcCommand {
    /// looks up a command token. all-digit tokens go through the numeric table, everything else
    /// through the name table. never fails, unknown commands are kept as `Unrecognized`.
    pub fn parse(token: &str) -> Self {
        let name = token.to_ascii_lowercase();

        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            return match name.parse::<u16>() {
                Ok(code) => match Reply::from_code(code) {
                    Some(reply) => IrcCommand::Reply(reply),
                    None => IrcCommand::Numeric(code),
                },
                // too many digits to be a numeric
                Err(_) => IrcCommand::Unrecognized(name),
            };
        }

        match name.as_str() {
            "ping" => IrcCommand::Ping,
            "pong" => IrcCommand::Pong,
            "join" => IrcCommand::Join,
            "part" => IrcCommand::Part,
            "privmsg" => IrcCommand::Privmsg,
            "notice" => IrcCommand::Notice,
            "quit" => IrcCommand::Quit,
            "nick" => IrcCommand::Nick,
            "mode" => IrcCommand::Mode,
            "topic" => IrcCommand::Topic,
            "kick" => IrcCommand::Kick,
            "invite" => IrcCommand::Invite,
            "error" => IrcCommand::Error,
            _ => IrcCommand::Unrecognized(name),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, IrcCommand::Reply(_) | IrcCommand::Numeric(_))
    }

    pub fn numeric(&self) -> Option<u16> {
        match self {
            IrcCommand::Reply(reply) => Some(reply.code()),
            IrcCommand::Numeric(code) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(IrcCommand::parse("PRIVMSG"), IrcCommand::Privmsg);
        assert_eq!(IrcCommand::parse("privmsg"), IrcCommand::Privmsg);
        assert_eq!(IrcCommand::parse("PiNg"), IrcCommand::Ping);
    }

    #[test]
    fn numerics_use_the_table() {
        assert_eq!(IrcCommand::parse("001"), IrcCommand::Reply(Reply::Welcome));
        assert_eq!(IrcCommand::parse("353"), IrcCommand::Reply(Reply::NamesReply));
        assert_eq!(IrcCommand::parse("433"), IrcCommand::Reply(Reply::NicknameInUse));
        assert_eq!(IrcCommand::parse("999"), IrcCommand::Numeric(999));
        assert_eq!(IrcCommand::parse("001").numeric(), Some(1));
    }

    #[test]
    fn unknown_commands_are_kept() {
        assert_eq!(
            IrcCommand::parse("WALLOPS"),
            IrcCommand::Unrecognized(String::from("wallops"))
        );
        assert_eq!(
            IrcCommand::parse("9999999"),
            IrcCommand::Unrecognized(String::from("9999999"))
        );
        assert!(!IrcCommand::parse("WALLOPS").is_numeric());
    }

    #[test]
    fn reply_codes_round_trip() {
        for code in 0..1000 {
            if let Some(reply) = Reply::from_code(code) {
                assert_eq!(reply.code(), code);
            }
        }
    }
}
