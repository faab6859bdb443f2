//! plain terminal formatting of engine events for the bundled CLI.

use crossterm::style::Stylize;
use unicode_segmentation::UnicodeSegmentation as _;
use unicode_width::UnicodeWidthStr;

use crate::{
    channel::{ChannelMessage, MessageKind},
    connection::ConnectionState,
    event::EngineEvent,
};

// width of the sender column
pub const NICK_WIDTH: usize = 12;

const ZERO_WIDTH_JOINER: &str = "\u{200d}";

/// removes terminal escapes and control characters sent by other users
pub fn sanitize(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

/// the width of `s` in a monospace terminal
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

fn grapheme_width(g: &str) -> usize {
    // joined emoji are drawn as one
    if g.contains(ZERO_WIDTH_JOINER) {
        return 2;
    }
    match g {
        "\t" => 4,
        g => UnicodeWidthStr::width(g),
    }
}

/// cuts `s` down to `width` columns, or pads it on the left
pub fn fit(s: &str, width: usize) -> String {
    let mut fitted = String::new();
    let mut used = 0;
    for g in s.graphemes(true) {
        let w = grapheme_width(g);
        if used + w > width {
            break;
        }
        fitted.push_str(g);
        used += w;
    }
    format!("{}{}", " ".repeat(width - used), fitted)
}

pub fn format_message(channel: &str, message: &ChannelMessage) -> String {
    let time = format!("[{}]", message.timestamp.format("%H:%M:%S")).red();
    let channel = channel.dark_blue();
    let sender = sanitize(message.sender.as_deref().unwrap_or_default());
    let text = sanitize(&message.text);

    let body = match message.kind {
        MessageKind::PrivateMessage | MessageKind::Notice => {
            format!("{} {}", fit(&sender, NICK_WIDTH).cyan(), text)
        }
        MessageKind::Own => format!("{} {}", fit(&sender, NICK_WIDTH).bold(), text),
        MessageKind::Action => format!("{} {} {}", fit("*", NICK_WIDTH), sender, text)
            .magenta()
            .to_string(),
        MessageKind::Error => format!("{} {}", fit("!!", NICK_WIDTH), text).red().to_string(),
        MessageKind::Join
        | MessageKind::Part
        | MessageKind::Quit
        | MessageKind::Kick
        | MessageKind::Nick => format!("{} {}", fit("--", NICK_WIDTH), text)
            .dark_grey()
            .to_string(),
        MessageKind::Topic | MessageKind::Mode | MessageKind::Server => {
            format!("{} {}", fit("--", NICK_WIDTH), text)
        }
    };
    format!("{} {} {}", time, channel, body)
}

/// the line printed for an event, if any
pub fn format_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::MessageReceived {
            channel, message, ..
        } => Some(format_message(channel, message)),
        EngineEvent::ConnectionStateChanged { connection, state } => {
            let state = match state {
                ConnectionState::Disconnected => "disconnected",
                ConnectionState::Connecting => "connecting",
                ConnectionState::Connected => "connected",
            };
            Some(format!("{} {}", connection, state).green().to_string())
        }
        EngineEvent::UsersUpdated { channel, users, .. } => {
            let names = users
                .iter()
                .map(|u| sanitize(&u.display_name()))
                .collect::<Vec<_>>();
            Some(format!("{} {}", channel.as_str().dark_blue(), names.join(" ")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_removes_escapes() {
        assert_eq!(sanitize("\u{1b}[31mred\u{1b}[0m text"), "red text");
        assert_eq!(sanitize("bell\u{7}"), "bell");
        assert_eq!(sanitize("tab\tkept"), "tab\tkept");
    }

    #[test]
    fn widths() {
        assert_eq!(display_width("mike"), 4);
        assert_eq!(display_width("日本"), 4);
        assert_eq!(display_width("e\u{301}"), 1);
        assert_eq!(display_width("👩\u{200d}💻"), 2);
    }

    #[test]
    fn fit_pads_and_truncates() {
        assert_eq!(fit("mike", 6), "  mike");
        assert_eq!(fit("averylongnick", 6), "averyl");
        // a wide character that doesn't fit is left out entirely
        assert_eq!(fit("ab日", 3), " ab");
    }

    #[test]
    fn message_lines() {
        let message = ChannelMessage::new(MessageKind::PrivateMessage, Some("mike"), "hi all");
        let line = format_message("#rust", &message);
        assert!(line.contains("#rust"));
        assert!(line.contains("mike"));
        assert!(line.contains("hi all"));
    }
}
