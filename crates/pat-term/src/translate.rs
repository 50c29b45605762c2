//! Translate crossterm events into the core's frontend-neutral events.
//!
//! Plain printable characters travel as unicode; anything carrying Ctrl or
//! Alt travels as a keycode plus modifiers so the key tree can match chords
//! like `<C-x>`.

use crossterm::event::{
    Event as CEvent, KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind, KeyModifiers,
    MouseEvent as CMouseEvent, MouseEventKind,
};

use pat_events::{Event, KeyEvent, KeyMods, Keycode, MouseButton, MouseEvent};

pub fn translate(event: CEvent) -> Option<Event> {
    match event {
        CEvent::Key(key) => translate_key(key).map(Event::Key),
        CEvent::Mouse(mouse) => translate_mouse(mouse).map(Event::Mouse),
        CEvent::Resize(width, height) => Some(Event::Resize {
            width: width as usize,
            height: height as usize,
        }),
        _ => None,
    }
}

fn translate_key(key: CKeyEvent) -> Option<KeyEvent> {
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return None;
    }

    let mut mods = KeyMods::empty();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= KeyMods::CTRL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods |= KeyMods::ALT;
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        mods |= KeyMods::SHIFT;
    }

    if let CKeyCode::Char(c) = key.code {
        // Shift is already baked into the character itself.
        if mods.intersects(KeyMods::CTRL | KeyMods::ALT) {
            let code = char_keycode(c)?;
            return Some(KeyEvent::key(code, mods));
        }
        return Some(KeyEvent::text(c as u32));
    }

    let code = match key.code {
        CKeyCode::Enter => Keycode::Enter,
        CKeyCode::Esc => Keycode::Escape,
        CKeyCode::Backspace => Keycode::Backspace,
        CKeyCode::Tab | CKeyCode::BackTab => Keycode::Tab,
        CKeyCode::Delete => Keycode::Delete,
        CKeyCode::Insert => Keycode::Insert,
        CKeyCode::Up => Keycode::Up,
        CKeyCode::Down => Keycode::Down,
        CKeyCode::Left => Keycode::Left,
        CKeyCode::Right => Keycode::Right,
        CKeyCode::Home => Keycode::Home,
        CKeyCode::End => Keycode::End,
        CKeyCode::PageUp => Keycode::PageUp,
        CKeyCode::PageDown => Keycode::PageDown,
        CKeyCode::F(n) => f_keycode(n)?,
        _ => return None,
    };
    Some(KeyEvent::key(code, mods))
}

fn char_keycode(c: char) -> Option<Keycode> {
    let value = match c {
        'a'..='z' => Keycode::A as u16 + (c as u16 - 'a' as u16),
        'A'..='Z' => Keycode::A as u16 + (c as u16 - 'A' as u16),
        '0'..='9' => Keycode::Zero as u16 + (c as u16 - '0' as u16),
        ' ' => Keycode::Space as u16,
        '-' => Keycode::Minus as u16,
        '/' => Keycode::Slash as u16,
        '\\' => Keycode::Backslash as u16,
        '[' => Keycode::LeftBracket as u16,
        ']' => Keycode::RightBracket as u16,
        '`' => Keycode::Grave as u16,
        _ => return None,
    };
    Keycode::from_u16(value)
}

fn f_keycode(n: u8) -> Option<Keycode> {
    if (1..=12).contains(&n) {
        Keycode::from_u16(Keycode::F1 as u16 + (n as u16 - 1))
    } else {
        None
    }
}

fn translate_mouse(mouse: CMouseEvent) -> Option<MouseEvent> {
    let button = match mouse.kind {
        MouseEventKind::Down(b) => match b {
            crossterm::event::MouseButton::Left => MouseButton::Left,
            crossterm::event::MouseButton::Right => MouseButton::Right,
            crossterm::event::MouseButton::Middle => MouseButton::Middle,
        },
        MouseEventKind::Up(_) => MouseButton::Released,
        MouseEventKind::ScrollUp => MouseButton::WheelUp,
        MouseEventKind::ScrollDown => MouseButton::WheelDown,
        _ => return None,
    };
    Some(MouseEvent {
        button,
        x: mouse.column as usize,
        y: mouse.row as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key_event(code: CKeyCode, modifiers: KeyModifiers) -> CEvent {
        CEvent::Key(CKeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    #[test]
    fn plain_char_is_unicode() {
        let event = translate(key_event(CKeyCode::Char('x'), KeyModifiers::NONE)).unwrap();
        match event {
            Event::Key(key) => {
                assert_eq!(key.unicode, 'x' as u32);
                assert_eq!(key.code, Keycode::Null);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shifted_char_stays_unicode() {
        let event = translate(key_event(CKeyCode::Char('X'), KeyModifiers::SHIFT)).unwrap();
        match event {
            Event::Key(key) => assert_eq!(key.unicode, 'X' as u32),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ctrl_char_becomes_keycode_chord() {
        let event = translate(key_event(CKeyCode::Char('x'), KeyModifiers::CONTROL)).unwrap();
        match event {
            Event::Key(key) => {
                assert_eq!(key.unicode, 0);
                assert_eq!(key.code, Keycode::X);
                assert!(key.mods.contains(KeyMods::CTRL));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn special_keys_map() {
        for (code, expected) in [
            (CKeyCode::Esc, Keycode::Escape),
            (CKeyCode::Enter, Keycode::Enter),
            (CKeyCode::PageDown, Keycode::PageDown),
            (CKeyCode::F(5), Keycode::F5),
        ] {
            let event = translate(key_event(code, KeyModifiers::NONE)).unwrap();
            match event {
                Event::Key(key) => assert_eq!(key.code, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn release_events_are_dropped() {
        let event = CEvent::Key(CKeyEvent {
            code: CKeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::empty(),
        });
        assert!(translate(event).is_none());
    }

    #[test]
    fn scroll_wheel_maps_to_wheel_buttons() {
        let event = CEvent::Mouse(CMouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 3,
            row: 7,
            modifiers: KeyModifiers::NONE,
        });
        match translate(event).unwrap() {
            Event::Mouse(mouse) => {
                assert_eq!(mouse.button, MouseButton::WheelDown);
                assert_eq!((mouse.x, mouse.y), (3, 7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resize_passes_dimensions() {
        match translate(CEvent::Resize(120, 40)).unwrap() {
            Event::Resize { width, height } => {
                assert_eq!((width, height), (120, 40));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
