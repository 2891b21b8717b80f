//! Raw global key hook
//!
//! [`KeyHook`] is the capability the engine consumes: a stream of keydown /
//! keyup events for every key on the system. The production implementation
//! uses rdev, which hooks the OS event stream on Linux (X11/uinput), macOS
//! (CGEventTap, needs Accessibility permission) and Windows (WH_KEYBOARD_LL).
//! Tests drive the engine with a scripted hook instead.

use super::chord::KeyCode;
use crate::error::HotkeyError;
use rdev::{Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

/// A raw key transition, already mapped to our keycode space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKeyEvent {
    Down(KeyCode),
    Up(KeyCode),
}

/// Source of global key events.
pub trait KeyHook: Send {
    /// Start delivering events. Platform hook refusal is reported here,
    /// once; callers are expected to continue inert on failure.
    fn start(&mut self) -> Result<mpsc::Receiver<RawKeyEvent>, HotkeyError>;

    /// Stop delivering events. Idempotent.
    fn stop(&mut self);
}

/// rdev-based hook running on a dedicated thread.
///
/// rdev's `listen` cannot be interrupted from outside; `stop` flips a flag
/// that silences the callback, and the thread dies with the process.
pub struct RdevHook {
    running: Arc<AtomicBool>,
    started: bool,
}

impl RdevHook {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }
}

impl Default for RdevHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHook for RdevHook {
    fn start(&mut self) -> Result<mpsc::Receiver<RawKeyEvent>, HotkeyError> {
        if self.started {
            // rdev only supports one listener per process
            return Err(HotkeyError::HookFailed("hook already started".to_string()));
        }
        self.started = true;

        let (tx, rx) = mpsc::channel();

        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        std::thread::Builder::new()
            .name("key-hook".to_string())
            .spawn(move || {
                let callback = move |event: Event| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    let mapped = match event.event_type {
                        EventType::KeyPress(key) => map_key(key).map(RawKeyEvent::Down),
                        EventType::KeyRelease(key) => map_key(key).map(RawKeyEvent::Up),
                        _ => None,
                    };
                    if let Some(ev) = mapped {
                        let _ = tx.send(ev);
                    }
                };

                // Blocks for the life of the process. On Wayland without
                // uinput access or macOS without Accessibility permission
                // this fails once and the engine stays inert.
                if let Err(e) = rdev::listen(callback) {
                    tracing::warn!(
                        "global key hook unavailable ({:?}); hotkeys will not fire",
                        e
                    );
                }
            })
            .map_err(|e| HotkeyError::HookFailed(e.to_string()))?;

        Ok(rx)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Map an rdev key to our keycode space. Keys outside the chord syntax
/// (media keys, IME keys) map to None and are invisible to the engine.
fn map_key(key: Key) -> Option<KeyCode> {
    let code = match key {
        // Modifiers
        Key::ControlLeft => 29,
        Key::ControlRight => 3613,
        Key::ShiftLeft => 42,
        Key::ShiftRight => 54,
        Key::Alt => 56,
        Key::AltGr => 3640,
        Key::MetaLeft => 3675,
        Key::MetaRight => 3676,
        // Letters
        Key::KeyA => 30,
        Key::KeyB => 48,
        Key::KeyC => 46,
        Key::KeyD => 32,
        Key::KeyE => 18,
        Key::KeyF => 33,
        Key::KeyG => 34,
        Key::KeyH => 35,
        Key::KeyI => 23,
        Key::KeyJ => 36,
        Key::KeyK => 37,
        Key::KeyL => 38,
        Key::KeyM => 50,
        Key::KeyN => 49,
        Key::KeyO => 24,
        Key::KeyP => 25,
        Key::KeyQ => 16,
        Key::KeyR => 19,
        Key::KeyS => 31,
        Key::KeyT => 20,
        Key::KeyU => 22,
        Key::KeyV => 47,
        Key::KeyW => 17,
        Key::KeyX => 45,
        Key::KeyY => 21,
        Key::KeyZ => 44,
        // Digits
        Key::Num1 => 2,
        Key::Num2 => 3,
        Key::Num3 => 4,
        Key::Num4 => 5,
        Key::Num5 => 6,
        Key::Num6 => 7,
        Key::Num7 => 8,
        Key::Num8 => 9,
        Key::Num9 => 10,
        Key::Num0 => 11,
        // Function keys
        Key::F1 => 59,
        Key::F2 => 60,
        Key::F3 => 61,
        Key::F4 => 62,
        Key::F5 => 63,
        Key::F6 => 64,
        Key::F7 => 65,
        Key::F8 => 66,
        Key::F9 => 67,
        Key::F10 => 68,
        Key::F11 => 69,
        Key::F12 => 70,
        // Special
        Key::Escape => 1,
        Key::Backspace => 14,
        Key::Tab => 15,
        Key::Return => 28,
        Key::Space => 57,
        Key::CapsLock => 58,
        Key::PrintScreen => 3639,
        Key::Pause => 3653,
        // Arrows
        Key::UpArrow => 57416,
        Key::DownArrow => 57424,
        Key::LeftArrow => 57419,
        Key::RightArrow => 57421,
        // Navigation
        Key::Home => 57415,
        Key::End => 57423,
        Key::PageUp => 57417,
        Key::PageDown => 57425,
        Key::Insert => 57426,
        Key::Delete => 57427,
        // Numpad
        Key::Kp7 => 71,
        Key::Kp8 => 72,
        Key::Kp9 => 73,
        Key::Kp4 => 75,
        Key::Kp5 => 76,
        Key::Kp6 => 77,
        Key::Kp1 => 79,
        Key::Kp2 => 80,
        Key::Kp3 => 81,
        Key::Kp0 => 82,
        Key::KpMinus => 74,
        Key::KpPlus => 78,
        Key::KpMultiply => 55,
        Key::KpDivide => 3637,
        Key::KpReturn => 3612,
        // Symbols
        Key::Minus => 12,
        Key::Equal => 13,
        Key::LeftBracket => 26,
        Key::RightBracket => 27,
        Key::BackSlash => 43,
        Key::SemiColon => 39,
        Key::Quote => 40,
        Key::Comma => 51,
        Key::Dot => 52,
        Key::Slash => 53,
        Key::BackQuote => 41,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::chord;

    #[test]
    fn test_mapped_keys_have_chord_names() {
        // Every mappable key must round-trip through the chord tables
        for key in [
            Key::ControlLeft,
            Key::ShiftRight,
            Key::MetaLeft,
            Key::KeyA,
            Key::Num5,
            Key::F12,
            Key::Space,
            Key::Insert,
            Key::Kp0,
            Key::BackQuote,
        ] {
            let code = map_key(key).unwrap();
            assert!(
                chord::key_name(code).is_some(),
                "no chord name for {:?} (code {})",
                key,
                code
            );
        }
    }

    #[test]
    fn test_unmapped_keys_are_invisible() {
        assert_eq!(map_key(Key::NumLock), None);
        assert_eq!(map_key(Key::Function), None);
        assert_eq!(map_key(Key::Unknown(0xffff)), None);
    }
}
