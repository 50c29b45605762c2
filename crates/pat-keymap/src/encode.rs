//! Packing a key event into 32 bits for trie edges and recorded sequences.
//!
//! ```text
//! bits  0..9   keycode (raw value, <= 348)
//! bit   10     ctrl
//! bit   11     alt
//! bit   12     shift
//! bits 16..23  low byte of the unicode value
//! ```
//!
//! When the unicode byte is non-zero the keycode and modifier bits are left
//! zero and ignored on decode; printable input is matched by its character
//! alone.

use pat_events::{KeyEvent, KeyMods, Keycode};

const CTRL_BIT: u32 = 0x400;
const ALT_BIT: u32 = 0x800;
const SHIFT_BIT: u32 = 0x1000;

pub fn encode_key_event(key: KeyEvent) -> u32 {
    if key.unicode != 0 {
        return (key.unicode & 0xFF) << 16;
    }
    let mut out = key.code as u32;
    if key.mods.contains(KeyMods::CTRL) {
        out |= CTRL_BIT;
    }
    if key.mods.contains(KeyMods::ALT) {
        out |= ALT_BIT;
    }
    if key.mods.contains(KeyMods::SHIFT) {
        out |= SHIFT_BIT;
    }
    out
}

pub fn decode_key_event(encoded: u32) -> KeyEvent {
    let unicode = (encoded >> 16) & 0xFF;
    if unicode != 0 {
        return KeyEvent::text(unicode);
    }
    let code = Keycode::from_u16((encoded & 0x3FF) as u16).unwrap_or(Keycode::Null);
    let mut mods = KeyMods::empty();
    if encoded & CTRL_BIT != 0 {
        mods |= KeyMods::CTRL;
    }
    if encoded & ALT_BIT != 0 {
        mods |= KeyMods::ALT;
    }
    if encoded & SHIFT_BIT != 0 {
        mods |= KeyMods::SHIFT;
    }
    KeyEvent::key(code, mods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_dominates() {
        let ev = KeyEvent::text('x' as u32);
        let enc = encode_key_event(ev);
        assert_eq!(enc, ('x' as u32) << 16);
        assert_eq!(decode_key_event(enc), ev);
    }

    #[test]
    fn code_and_modifiers_round_trip() {
        let ev = KeyEvent::key(Keycode::Right, KeyMods::CTRL | KeyMods::SHIFT);
        let dec = decode_key_event(encode_key_event(ev));
        assert_eq!(dec.code, Keycode::Right);
        assert_eq!(dec.mods, KeyMods::CTRL | KeyMods::SHIFT);
        assert_eq!(dec.unicode, 0);
    }

    #[test]
    fn distinct_modifiers_encode_distinct_events() {
        let plain = encode_key_event(KeyEvent::key(Keycode::X, KeyMods::empty()));
        let ctrl = encode_key_event(KeyEvent::key(Keycode::X, KeyMods::CTRL));
        let alt = encode_key_event(KeyEvent::key(Keycode::X, KeyMods::ALT));
        assert_ne!(plain, ctrl);
        assert_ne!(ctrl, alt);
    }
}
