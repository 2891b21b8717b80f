//! Chord parsing and canonicalisation
//!
//! A chord is a `+`-joined set of key names ("ctrl+shift+f1"). Internally a
//! chord is a sorted set of keycodes; the canonical string form puts
//! modifiers first (by keycode ascending), then the remaining keys (by
//! keycode ascending). Parsing is case-insensitive and accepts the usual
//! aliases (cmd/command/meta/win, option, return, escape, del, control).

use crate::error::HotkeyError;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Virtual keycode, matching the libuiohook numbering used on the wire.
pub type KeyCode = u16;

pub const KC_ESCAPE: KeyCode = 1;

/// Modifier keycodes: ctrl, rctrl, shift, rshift, alt, ralt, super, rsuper.
const MODIFIERS: [KeyCode; 8] = [29, 3613, 42, 54, 56, 3640, 3675, 3676];

/// Keycode → display name. One row per key the capture UI can produce.
static KEY_NAMES: &[(KeyCode, &str)] = &[
    // Modifiers
    (29, "ctrl"),
    (3613, "rctrl"),
    (42, "shift"),
    (54, "rshift"),
    (56, "alt"),
    (3640, "ralt"),
    (3675, "super"),
    (3676, "rsuper"),
    // Letters
    (30, "a"),
    (48, "b"),
    (46, "c"),
    (32, "d"),
    (18, "e"),
    (33, "f"),
    (34, "g"),
    (35, "h"),
    (23, "i"),
    (36, "j"),
    (37, "k"),
    (38, "l"),
    (50, "m"),
    (49, "n"),
    (24, "o"),
    (25, "p"),
    (16, "q"),
    (19, "r"),
    (31, "s"),
    (20, "t"),
    (22, "u"),
    (47, "v"),
    (17, "w"),
    (45, "x"),
    (21, "y"),
    (44, "z"),
    // Digits
    (2, "1"),
    (3, "2"),
    (4, "3"),
    (5, "4"),
    (6, "5"),
    (7, "6"),
    (8, "7"),
    (9, "8"),
    (10, "9"),
    (11, "0"),
    // Function keys
    (59, "f1"),
    (60, "f2"),
    (61, "f3"),
    (62, "f4"),
    (63, "f5"),
    (64, "f6"),
    (65, "f7"),
    (66, "f8"),
    (67, "f9"),
    (68, "f10"),
    (69, "f11"),
    (70, "f12"),
    // Special
    (1, "esc"),
    (14, "backspace"),
    (15, "tab"),
    (28, "enter"),
    (57, "space"),
    // Arrows
    (57416, "up"),
    (57424, "down"),
    (57419, "left"),
    (57421, "right"),
    // Navigation
    (57415, "home"),
    (57423, "end"),
    (57417, "pageup"),
    (57425, "pagedown"),
    (57426, "insert"),
    (57427, "delete"),
    // Misc
    (58, "capslock"),
    (3639, "printscreen"),
    (3653, "pause"),
    // Numpad
    (71, "num7"),
    (72, "num8"),
    (73, "num9"),
    (75, "num4"),
    (76, "num5"),
    (77, "num6"),
    (79, "num1"),
    (80, "num2"),
    (81, "num3"),
    (82, "num0"),
    (74, "num-"),
    (78, "num+"),
    (55, "num*"),
    (3637, "num/"),
    (3612, "numenter"),
    // Symbols
    (12, "-"),
    (13, "="),
    (26, "["),
    (27, "]"),
    (43, "\\"),
    (39, ";"),
    (40, "'"),
    (51, ","),
    (52, "."),
    (53, "/"),
    (41, "`"),
];

/// Accepted spellings that map onto canonical keys.
static ALIASES: &[(&str, KeyCode)] = &[
    ("escape", 1),
    ("return", 28),
    ("del", 57427),
    ("control", 29),
    ("cmd", 3675),
    ("command", 3675),
    ("meta", 3675),
    ("win", 3675),
    ("option", 56),
];

fn name_to_code() -> &'static HashMap<&'static str, KeyCode> {
    static MAP: OnceLock<HashMap<&'static str, KeyCode>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut map = HashMap::with_capacity(KEY_NAMES.len() + ALIASES.len());
        for &(code, name) in KEY_NAMES {
            map.insert(name, code);
        }
        for &(name, code) in ALIASES {
            map.insert(name, code);
        }
        map
    })
}

fn code_to_name() -> &'static HashMap<KeyCode, &'static str> {
    static MAP: OnceLock<HashMap<KeyCode, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| KEY_NAMES.iter().map(|&(code, name)| (code, name)).collect())
}

pub fn is_modifier(code: KeyCode) -> bool {
    MODIFIERS.contains(&code)
}

/// Display name for a keycode, if it is one the chord syntax knows.
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    code_to_name().get(&code).copied()
}

/// Keycode for a (lower-cased) key name or alias.
pub fn key_code(name: &str) -> Option<KeyCode> {
    name_to_code().get(name).copied()
}

/// Parse "ctrl+shift+a" into keycodes sorted ascending.
pub fn parse_chord(chord: &str) -> Result<Vec<KeyCode>, HotkeyError> {
    let chord = chord.trim().to_lowercase();
    if chord.is_empty() {
        return Err(HotkeyError::EmptyChord);
    }

    let mut keys = Vec::new();
    for part in chord.split('+') {
        let part = part.trim();
        let code = key_code(part).ok_or_else(|| HotkeyError::UnknownKey(part.to_string()))?;
        if !keys.contains(&code) {
            keys.push(code);
        }
    }
    keys.sort_unstable();
    Ok(keys)
}

/// Canonical string form: modifiers first, then regular keys, each group
/// sorted by keycode. Codes without a name are skipped.
pub fn canonical_chord(keys: &[KeyCode]) -> String {
    let mut keys = keys.to_vec();
    keys.sort_unstable_by_key(|&code| (!is_modifier(code), code));

    let parts: Vec<&str> = keys.iter().filter_map(|&code| key_name(code)).collect();
    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        assert_eq!(parse_chord("a").unwrap(), vec![30]);
        assert_eq!(parse_chord("ctrl+shift+f1").unwrap(), vec![29, 42, 59]);
    }

    #[test]
    fn test_parse_case_insensitive_and_padded() {
        assert_eq!(
            parse_chord(" Ctrl + SHIFT + F1 ").unwrap(),
            parse_chord("ctrl+shift+f1").unwrap()
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_chord("escape").unwrap(), parse_chord("esc").unwrap());
        assert_eq!(parse_chord("return").unwrap(), parse_chord("enter").unwrap());
        assert_eq!(parse_chord("cmd+v").unwrap(), parse_chord("super+v").unwrap());
        assert_eq!(parse_chord("win+v").unwrap(), parse_chord("meta+v").unwrap());
        assert_eq!(parse_chord("option+x").unwrap(), parse_chord("alt+x").unwrap());
        assert_eq!(parse_chord("del").unwrap(), parse_chord("delete").unwrap());
    }

    #[test]
    fn test_parse_unknown_token() {
        assert!(matches!(
            parse_chord("ctrl+nosuchkey"),
            Err(HotkeyError::UnknownKey(k)) if k == "nosuchkey"
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(parse_chord(""), Err(HotkeyError::EmptyChord)));
        assert!(matches!(parse_chord("   "), Err(HotkeyError::EmptyChord)));
    }

    #[test]
    fn test_canonical_modifiers_first() {
        // "v" (47) is numerically below "super" (3675); modifiers still lead
        let keys = parse_chord("v+super").unwrap();
        assert_eq!(canonical_chord(&keys), "super+v");

        let keys = parse_chord("f1+shift+ctrl").unwrap();
        assert_eq!(canonical_chord(&keys), "ctrl+shift+f1");
    }

    #[test]
    fn test_canonical_sorts_within_groups() {
        let keys = parse_chord("shift+ctrl+b+a").unwrap();
        // ctrl (29) < shift (42); e (18) style: a=30 < b=48
        assert_eq!(canonical_chord(&keys), "ctrl+shift+a+b");
    }

    #[test]
    fn test_canonicalisation_idempotent() {
        for chord in [
            "ctrl+shift+f1",
            "F1+CTRL+SHIFT",
            "cmd+space",
            "ralt",
            "num0+numenter",
            "escape",
            "shift+insert",
        ] {
            let parsed = parse_chord(chord).unwrap();
            let canon = canonical_chord(&parsed);
            assert_eq!(
                parse_chord(&canon).unwrap(),
                parsed,
                "round-trip failed for {:?} (canon {:?})",
                chord,
                canon
            );
        }
    }
}
