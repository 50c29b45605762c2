//! Frontend-neutral event types and the thread-safe queues that carry them.
//!
//! The core consumes a uniform event stream; any frontend (terminal, GUI)
//! translates its native events into [`Event`] values and pushes them onto an
//! [`EventQueue`]. Keycode values are frontend-independent and stable: they
//! are what the key-binding encoding packs into its 32-bit representation.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

/// Physical key identity for non-text keys. Values fit in 10 bits (max 348)
/// so they pack into the key-event encoding unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Keycode {
    #[default]
    Null = 0,
    Apostrophe = 39,
    Comma = 44,
    Minus = 45,
    Period = 46,
    Slash = 47,
    Zero = 48,
    One = 49,
    Two = 50,
    Three = 51,
    Four = 52,
    Five = 53,
    Six = 54,
    Seven = 55,
    Eight = 56,
    Nine = 57,
    Semicolon = 59,
    Equal = 61,
    A = 65,
    B = 66,
    C = 67,
    D = 68,
    E = 69,
    F = 70,
    G = 71,
    H = 72,
    I = 73,
    J = 74,
    K = 75,
    L = 76,
    M = 77,
    N = 78,
    O = 79,
    P = 80,
    Q = 81,
    R = 82,
    S = 83,
    T = 84,
    U = 85,
    V = 86,
    W = 87,
    X = 88,
    Y = 89,
    Z = 90,
    LeftBracket = 91,
    Backslash = 92,
    RightBracket = 93,
    Grave = 96,
    Space = 32,
    Escape = 256,
    Enter = 257,
    Tab = 258,
    Backspace = 259,
    Insert = 260,
    Delete = 261,
    Right = 262,
    Left = 263,
    Down = 264,
    Up = 265,
    PageUp = 266,
    PageDown = 267,
    Home = 268,
    End = 269,
    CapsLock = 280,
    ScrollLock = 281,
    NumLock = 282,
    PrintScreen = 283,
    Pause = 284,
    F1 = 290,
    F2 = 291,
    F3 = 292,
    F4 = 293,
    F5 = 294,
    F6 = 295,
    F7 = 296,
    F8 = 297,
    F9 = 298,
    F10 = 299,
    F11 = 300,
    F12 = 301,
    LeftShift = 340,
    LeftControl = 341,
    LeftAlt = 342,
    LeftSuper = 343,
    RightShift = 344,
    RightControl = 345,
    RightAlt = 346,
    RightSuper = 347,
    KbMenu = 348,
}

impl Keycode {
    /// Maximum raw value a keycode can take; the packing format reserves 10
    /// bits for it.
    pub const MAX: u16 = 348;

    pub fn from_u16(value: u16) -> Option<Self> {
        use Keycode::*;
        Some(match value {
            0 => Null,
            39 => Apostrophe,
            44 => Comma,
            45 => Minus,
            46 => Period,
            47 => Slash,
            48 => Zero,
            49 => One,
            50 => Two,
            51 => Three,
            52 => Four,
            53 => Five,
            54 => Six,
            55 => Seven,
            56 => Eight,
            57 => Nine,
            59 => Semicolon,
            61 => Equal,
            65 => A,
            66 => B,
            67 => C,
            68 => D,
            69 => E,
            70 => F,
            71 => G,
            72 => H,
            73 => I,
            74 => J,
            75 => K,
            76 => L,
            77 => M,
            78 => N,
            79 => O,
            80 => P,
            81 => Q,
            82 => R,
            83 => S,
            84 => T,
            85 => U,
            86 => V,
            87 => W,
            88 => X,
            89 => Y,
            90 => Z,
            91 => LeftBracket,
            92 => Backslash,
            93 => RightBracket,
            96 => Grave,
            32 => Space,
            256 => Escape,
            257 => Enter,
            258 => Tab,
            259 => Backspace,
            260 => Insert,
            261 => Delete,
            262 => Right,
            263 => Left,
            264 => Down,
            265 => Up,
            266 => PageUp,
            267 => PageDown,
            268 => Home,
            269 => End,
            280 => CapsLock,
            281 => ScrollLock,
            282 => NumLock,
            283 => PrintScreen,
            284 => Pause,
            290 => F1,
            291 => F2,
            292 => F3,
            293 => F4,
            294 => F5,
            295 => F6,
            296 => F7,
            297 => F8,
            298 => F9,
            299 => F10,
            300 => F11,
            301 => F12,
            340 => LeftShift,
            341 => LeftControl,
            342 => LeftAlt,
            343 => LeftSuper,
            344 => RightShift,
            345 => RightControl,
            346 => RightAlt,
            347 => RightSuper,
            348 => KbMenu,
            _ => return None,
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyMods: u8 {
        const CTRL  = 0b001;
        const ALT   = 0b010;
        const SHIFT = 0b100;
    }
}

/// A key press. Exactly one of `unicode` and `code` is meaningful: when
/// `unicode` is non-zero the event is printable text and `code`/`mods` are
/// ignored; otherwise `code` identifies the key and `mods` qualify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyEvent {
    pub unicode: u32,
    pub code: Keycode,
    pub mods: KeyMods,
}

impl KeyEvent {
    pub fn text(unicode: u32) -> Self {
        Self {
            unicode,
            code: Keycode::Null,
            mods: KeyMods::empty(),
        }
    }

    pub fn key(code: Keycode, mods: KeyMods) -> Self {
        Self {
            unicode: 0,
            code,
            mods,
        }
    }

    pub fn is_text(&self) -> bool {
        self.unicode != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub x: usize,
    pub y: usize,
}

/// Events delivered by the frontend to the editor core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Close,
    Resize { width: usize, height: usize },
    Key(KeyEvent),
    Mouse(MouseEvent),
}

/// Unbounded multi-producer FIFO with a blocking consumer. Enqueue wakes one
/// waiter; dequeue blocks while empty; `is_empty` is a snapshot only.
pub struct EventQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// A cloneable producer handle for other threads.
    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    pub fn enqueue(&self, value: T) {
        // Send on an open unbounded channel cannot fail; the queue owns both
        // ends so the receiver outlives every sender clone.
        let _ = self.tx.send(value);
    }

    /// Block until a value is available.
    pub fn dequeue(&self) -> T {
        self.rx
            .recv()
            .expect("event queue senders cannot all disconnect")
    }

    pub fn try_dequeue(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block up to `timeout` for a value; `None` on expiry. The main loop
    /// uses this for frame pacing.
    pub fn dequeue_timeout(&self, timeout: std::time::Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_preserves_fifo_order() {
        let q = EventQueue::new();
        for i in 0..100 {
            q.enqueue(i);
        }
        for i in 0..100 {
            assert_eq!(q.dequeue(), i);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn queue_cross_thread() {
        let q = EventQueue::new();
        let tx = q.sender();
        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                tx.send(i).unwrap();
            }
        });
        let mut got = Vec::new();
        for _ in 0..10 {
            got.push(q.dequeue());
        }
        handle.join().unwrap();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn keycode_round_trips_through_raw_value() {
        for code in [
            Keycode::A,
            Keycode::Escape,
            Keycode::F12,
            Keycode::KbMenu,
            Keycode::Space,
        ] {
            assert_eq!(Keycode::from_u16(code as u16), Some(code));
        }
        assert_eq!(Keycode::from_u16(349), None);
    }

    #[test]
    fn key_event_text_xor_code() {
        let text = KeyEvent::text('a' as u32);
        assert!(text.is_text());
        assert_eq!(text.code, Keycode::Null);
        let key = KeyEvent::key(Keycode::Left, KeyMods::SHIFT);
        assert!(!key.is_text());
        assert_eq!(key.unicode, 0);
    }
}
