//! Keyboard layout probe
//!
//! Detects the active keyboard layout on demand and maps it to a
//! recognition language code, so a preset can follow the user's current
//! layout instead of a fixed language. Detection is best-effort; `None`
//! simply means the preset's configured language stays in force.

use regex::Regex;
use std::collections::HashMap;
use std::process::Command;
use std::sync::OnceLock;

/// The capability the orchestrator consumes; one implementation per
/// platform plus mocks in tests.
pub trait LayoutProbe: Send + Sync {
    /// Current layout as a recognition language code ("en", "ru", ...).
    fn detect(&self) -> Option<String>;
}

/// Probe backed by the OS keyboard services.
pub struct SystemLayoutProbe;

impl LayoutProbe for SystemLayoutProbe {
    fn detect(&self) -> Option<String> {
        let raw = current_layout()?;
        let layout = normalize_layout(&raw);
        let lang = layout_to_lang(&layout);
        if lang.is_none() {
            tracing::debug!("unmapped keyboard layout {:?}", raw);
        }
        lang.map(str::to_string)
    }
}

/// Common layout codes → whisper language codes.
fn layout_lang_table() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            ("us", "en"),
            ("gb", "en"),
            ("en", "en"),
            ("ru", "ru"),
            ("de", "de"),
            ("fr", "fr"),
            ("es", "es"),
            ("it", "it"),
            ("pt", "pt"),
            ("nl", "nl"),
            ("pl", "pl"),
            ("uk", "uk"),
            ("ua", "uk"),
            ("tr", "tr"),
            ("ar", "ar"),
            ("cs", "cs"),
            ("cz", "cs"),
            ("da", "da"),
            ("dk", "da"),
            ("fi", "fi"),
            ("el", "el"),
            ("gr", "el"),
            ("he", "he"),
            ("il", "he"),
            ("hi", "hi"),
            ("in", "hi"),
            ("hu", "hu"),
            ("id", "id"),
            ("ja", "ja"),
            ("jp", "ja"),
            ("ko", "ko"),
            ("kr", "ko"),
            ("ms", "ms"),
            ("no", "no"),
            ("ro", "ro"),
            ("sk", "sk"),
            ("sv", "sv"),
            ("se", "sv"),
            ("th", "th"),
            ("vi", "vi"),
            ("vn", "vi"),
            ("zh", "zh"),
            ("cn", "zh"),
            ("tw", "zh"),
        ])
    })
}

/// Map a normalised layout code to a language code.
pub fn layout_to_lang(layout: &str) -> Option<&'static str> {
    layout_lang_table().get(layout).copied()
}

/// Lowercase and cut variants: "US(intl)" → "us", "de-latin1" → "de",
/// "ru_phonetic" → "ru".
pub fn normalize_layout(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let cut = lower
        .find(['(', '-', '_'])
        .filter(|&idx| idx > 0)
        .map(|idx| &lower[..idx])
        .unwrap_or(&lower);
    cut.trim().to_string()
}

#[cfg(target_os = "linux")]
fn current_layout() -> Option<String> {
    detect_layout_kde()
        .or_else(detect_layout_xkb_switch)
        .or_else(detect_layout_setxkbmap)
}

#[cfg(target_os = "macos")]
fn current_layout() -> Option<String> {
    let out = Command::new("osascript")
        .args([
            "-e",
            r#"tell application "System Events" to get name of current input source of keyboard preferences"#,
        ])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
    mac_input_source_to_code(&name)
}

#[cfg(target_os = "windows")]
fn current_layout() -> Option<String> {
    // CurrentInputLanguage reflects the *active* layout, not the list
    let out = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "Add-Type -AssemblyName System.Windows.Forms; \
             [System.Windows.Forms.InputLanguage]::CurrentInputLanguage.Culture.TwoLetterISOLanguageName",
        ])
        .output()
        .ok()?;
    let code = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn current_layout() -> Option<String> {
    None
}

/// KDE Plasma 6: getLayout() yields the active index, getLayoutsList()
/// the layout codes. qdbus6 can't render the a(sss) reply, so the list
/// goes through dbus-send with a --literal fallback.
#[cfg(target_os = "linux")]
fn detect_layout_kde() -> Option<String> {
    let idx_out = Command::new("qdbus6")
        .args([
            "org.kde.keyboard",
            "/Layouts",
            "org.kde.KeyboardLayouts.getLayout",
        ])
        .output()
        .ok()?;
    if !idx_out.status.success() {
        return None;
    }
    let idx: usize = String::from_utf8_lossy(&idx_out.stdout).trim().parse().ok()?;

    let list_out = Command::new("dbus-send")
        .args([
            "--session",
            "--dest=org.kde.keyboard",
            "--print-reply",
            "/Layouts",
            "org.kde.KeyboardLayouts.getLayoutsList",
        ])
        .output();

    match list_out {
        Ok(out) if out.status.success() => {
            let layouts = parse_dbus_send_layouts(&String::from_utf8_lossy(&out.stdout));
            layouts.get(idx).cloned()
        }
        _ => detect_layout_kde_literal(idx),
    }
}

/// Extract layout codes from `dbus-send --print-reply` output. Each
/// `struct { string "us" string "" string "English (US)" }` contributes
/// its first string.
fn parse_dbus_send_layouts(output: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"string "([^"]*)""#).expect("dbus string regex"));

    let mut layouts = Vec::new();
    let mut in_struct = false;
    let mut field_idx = 0;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed == "struct {" {
            in_struct = true;
            field_idx = 0;
            continue;
        }
        if trimmed == "}" {
            in_struct = false;
            continue;
        }
        if in_struct {
            if let Some(caps) = re.captures(trimmed) {
                if field_idx == 0 {
                    layouts.push(caps[1].to_string());
                }
                field_idx += 1;
            }
        }
    }
    layouts
}

/// Fallback parser for `qdbus6 --literal` output:
/// `[Argument: (sss) "us", "", "English (US)"]`.
#[cfg(target_os = "linux")]
fn detect_layout_kde_literal(idx: usize) -> Option<String> {
    let out = Command::new("qdbus6")
        .args([
            "--literal",
            "org.kde.keyboard",
            "/Layouts",
            "org.kde.KeyboardLayouts.getLayoutsList",
        ])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let layouts = parse_qdbus_literal_layouts(&String::from_utf8_lossy(&out.stdout));
    layouts.get(idx).cloned()
}

fn parse_qdbus_literal_layouts(output: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"\[Argument: \(sss\) "([^"]*)""#).expect("qdbus literal regex")
    });
    re.captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(target_os = "linux")]
fn detect_layout_xkb_switch() -> Option<String> {
    let out = Command::new("xkb-switch").output().ok()?;
    if !out.status.success() {
        return None;
    }
    let layout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if layout.is_empty() {
        None
    } else {
        Some(layout)
    }
}

/// X11 last resort; on Wayland setxkbmap reports the configured list, not
/// the active layout, so only the first entry is usable.
#[cfg(target_os = "linux")]
fn detect_layout_setxkbmap() -> Option<String> {
    let out = Command::new("setxkbmap").arg("-query").output().ok()?;
    if !out.status.success() {
        return None;
    }
    parse_setxkbmap_layout(&String::from_utf8_lossy(&out.stdout))
}

fn parse_setxkbmap_layout(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("layout:") {
            let layouts = rest.trim();
            let first = layouts.split(',').next().unwrap_or(layouts).trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    None
}

/// macOS reports input source display names ("U.S.", "Russian"); map the
/// common ones onto layout codes.
#[allow(dead_code)]
fn mac_input_source_to_code(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    let names: &[(&str, &str)] = &[
        ("u.s.", "us"),
        ("abc", "us"),
        ("british", "gb"),
        ("russian", "ru"),
        ("german", "de"),
        ("french", "fr"),
        ("spanish", "es"),
        ("italian", "it"),
        ("portuguese", "pt"),
        ("dutch", "nl"),
        ("polish", "pl"),
        ("ukrainian", "uk"),
        ("turkish", "tr"),
        ("arabic", "ar"),
        ("czech", "cs"),
        ("danish", "da"),
        ("finnish", "fi"),
        ("greek", "el"),
        ("hebrew", "he"),
        ("hindi", "hi"),
        ("hungarian", "hu"),
        ("japanese", "ja"),
        ("korean", "ko"),
        ("norwegian", "no"),
        ("romanian", "ro"),
        ("slovak", "sk"),
        ("swedish", "sv"),
        ("thai", "th"),
        ("vietnamese", "vi"),
        ("chinese", "zh"),
    ];
    names
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|&(_, code)| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_layout() {
        assert_eq!(normalize_layout("us"), "us");
        assert_eq!(normalize_layout("US(intl)"), "us");
        assert_eq!(normalize_layout("de-latin1"), "de");
        assert_eq!(normalize_layout("ru_phonetic"), "ru");
        assert_eq!(normalize_layout("  GB  "), "gb");
    }

    #[test]
    fn test_layout_to_lang() {
        assert_eq!(layout_to_lang("us"), Some("en"));
        assert_eq!(layout_to_lang("gb"), Some("en"));
        assert_eq!(layout_to_lang("ru"), Some("ru"));
        assert_eq!(layout_to_lang("ua"), Some("uk"));
        assert_eq!(layout_to_lang("cz"), Some("cs"));
        assert_eq!(layout_to_lang("se"), Some("sv"));
        assert_eq!(layout_to_lang("xx"), None);
    }

    #[test]
    fn test_parse_dbus_send_layouts() {
        let output = r#"method return time=1700000000.000 sender=:1.42 -> destination=:1.99 serial=7 reply_serial=2
   array [
      struct {
         string "us"
         string ""
         string "English (US)"
      }
      struct {
         string "ru"
         string ""
         string "Russian"
      }
   ]"#;
        assert_eq!(parse_dbus_send_layouts(output), vec!["us", "ru"]);
    }

    #[test]
    fn test_parse_qdbus_literal_layouts() {
        let output = r#"[Argument: a(sss) {[Argument: (sss) "us", "", "English (US)"], [Argument: (sss) "de", "", "German"]}]"#;
        assert_eq!(parse_qdbus_literal_layouts(output), vec!["us", "de"]);
    }

    #[test]
    fn test_parse_setxkbmap_layout() {
        let output = "rules:      evdev\nmodel:      pc105\nlayout:     us,ru\nvariant:    ,\n";
        assert_eq!(parse_setxkbmap_layout(output).as_deref(), Some("us"));

        let single = "layout:     de\n";
        assert_eq!(parse_setxkbmap_layout(single).as_deref(), Some("de"));

        assert_eq!(parse_setxkbmap_layout("model: pc105\n"), None);
    }

    #[test]
    fn test_mac_input_source_to_code() {
        assert_eq!(mac_input_source_to_code("U.S.").as_deref(), Some("us"));
        assert_eq!(mac_input_source_to_code("British").as_deref(), Some("gb"));
        assert_eq!(
            mac_input_source_to_code("Russian – PC").as_deref(),
            Some("ru")
        );
        assert_eq!(mac_input_source_to_code("Dvorak"), None);
    }
}
