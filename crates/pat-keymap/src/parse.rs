//! Single-pass parser for key combination strings.
//!
//! Outside angle brackets every printable ASCII character is one unicode
//! event (`"gd"` is two events). Inside `<...>` optional `C-`/`A-`/`S-`
//! prefixes set modifiers, then either a named special key (`<esc>`,
//! `<S-right>`) or a single character (`<C-x>`) terminates the group. A
//! malformed combination fails as a whole; no events are produced.

use crate::KeymapError;
use crate::encode::encode_key_event;
use pat_events::{KeyEvent, KeyMods, Keycode};

const SPECIAL_KEYS: &[(&str, Keycode)] = &[
    ("esc", Keycode::Escape),
    ("space", Keycode::Space),
    ("enter", Keycode::Enter),
    ("tab", Keycode::Tab),
    ("backspace", Keycode::Backspace),
    ("del", Keycode::Delete),
    ("up", Keycode::Up),
    ("down", Keycode::Down),
    ("left", Keycode::Left),
    ("right", Keycode::Right),
    ("home", Keycode::Home),
    ("end", Keycode::End),
    ("pageup", Keycode::PageUp),
    ("pagedown", Keycode::PageDown),
];

/// Keycode for a single character spelled inside angle brackets. Letters map
/// case-insensitively onto the letter keys, digits onto the digit keys, and
/// a small set of punctuation onto their dedicated keys.
fn bracket_char_keycode(c: u8) -> Option<Keycode> {
    let value = match c {
        b'a'..=b'z' => Keycode::A as u16 + (c - b'a') as u16,
        b'A'..=b'Z' => Keycode::A as u16 + (c - b'A') as u16,
        b'0'..=b'9' => Keycode::Zero as u16 + (c - b'0') as u16,
        b'-' => Keycode::Minus as u16,
        b'/' => Keycode::Slash as u16,
        b'\\' => Keycode::Backslash as u16,
        b'[' => Keycode::LeftBracket as u16,
        b']' => Keycode::RightBracket as u16,
        _ => return None,
    };
    Keycode::from_u16(value)
}

pub fn parse_key_combination(combo: &str) -> Result<Vec<u32>, KeymapError> {
    if combo.is_empty() {
        return Err(KeymapError::Empty);
    }

    let err = |at: usize, reason: &'static str| KeymapError::Parse {
        combo: combo.to_string(),
        at,
        reason,
    };

    let bytes = combo.as_bytes();
    let mut events = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'<' {
            i += 1;
            let mut mods = KeyMods::empty();
            loop {
                if bytes[i..].starts_with(b"C-") {
                    mods |= KeyMods::CTRL;
                    i += 2;
                } else if bytes[i..].starts_with(b"A-") {
                    mods |= KeyMods::ALT;
                    i += 2;
                } else if bytes[i..].starts_with(b"S-") {
                    mods |= KeyMods::SHIFT;
                    i += 2;
                } else {
                    break;
                }
            }

            let rest = &combo[i..];
            let close = rest
                .find('>')
                .ok_or_else(|| err(i, "unterminated angle group"))?;
            let name = &rest[..close];
            if name.is_empty() {
                return Err(err(i, "empty angle group"));
            }

            let code = if let Some(&(_, code)) =
                SPECIAL_KEYS.iter().find(|(n, _)| *n == name)
            {
                code
            } else if name.len() == 1 {
                bracket_char_keycode(name.as_bytes()[0])
                    .ok_or_else(|| err(i, "unknown key inside angle group"))?
            } else {
                return Err(err(i, "unknown special key name"));
            };

            events.push(encode_key_event(KeyEvent::key(code, mods)));
            i += close + 1;
            continue;
        }

        // Plain printable ASCII becomes a unicode event.
        if (0x21..=0x7E).contains(&c) {
            events.push(encode_key_event(KeyEvent::text(c as u32)));
            i += 1;
            continue;
        }

        return Err(err(i, "unexpected character"));
    }

    if events.is_empty() {
        return Err(KeymapError::Empty);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode_key_event;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_characters() {
        let events = parse_key_combination("gd").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(decode_key_event(events[0]).unicode, 'g' as u32);
        assert_eq!(decode_key_event(events[1]).unicode, 'd' as u32);
    }

    #[test]
    fn ctrl_chord_then_character() {
        let events = parse_key_combination("<C-x>i").unwrap();
        assert_eq!(events.len(), 2);
        let first = decode_key_event(events[0]);
        assert_eq!(first.code, Keycode::X);
        assert_eq!(first.mods, KeyMods::CTRL);
        assert_eq!(decode_key_event(events[1]).unicode, 'i' as u32);
    }

    #[test]
    fn shifted_special_key() {
        let events = parse_key_combination("<S-right>").unwrap();
        let key = decode_key_event(events[0]);
        assert_eq!(key.code, Keycode::Right);
        assert_eq!(key.mods, KeyMods::SHIFT);
    }

    #[test]
    fn stacked_modifiers() {
        let events = parse_key_combination("<C-A-del>").unwrap();
        let key = decode_key_event(events[0]);
        assert_eq!(key.code, Keycode::Delete);
        assert_eq!(key.mods, KeyMods::CTRL | KeyMods::ALT);
    }

    #[test]
    fn bracket_digit_and_punctuation() {
        let events = parse_key_combination("<C-0><C-/>").unwrap();
        assert_eq!(decode_key_event(events[0]).code, Keycode::Zero);
        assert_eq!(decode_key_event(events[1]).code, Keycode::Slash);
    }

    #[test]
    fn malformed_combinations_fail_whole() {
        assert!(parse_key_combination("").is_err());
        assert!(parse_key_combination("<C-").is_err());
        assert!(parse_key_combination("<>").is_err());
        assert!(parse_key_combination("<bogus>").is_err());
        assert!(parse_key_combination("a<C-!>").is_err());
        // A failure must not leave partial events behind; the error carries
        // the original combination for reporting.
        match parse_key_combination("ab<oops>") {
            Err(KeymapError::Parse { combo, .. }) => assert_eq!(combo, "ab<oops>"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
