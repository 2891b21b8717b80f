//! Linux clipboard and paste keystroke
//!
//! Clipboard goes through wl-copy/wl-paste (Wayland) with an xclip (X11)
//! fallback. The paste keystroke is Shift+Insert, the one chord that works
//! in terminals, TUIs and GUI apps alike, synthesised by the first
//! available of: ydotool (kernel uinput, works everywhere), wtype (Wayland
//! virtual keyboard), xdotool (X11).

use super::{pipe_to_command, Clipboard, PasteKeystroke};
use crate::error::InjectError;
use std::process::{Command, Stdio};
use std::time::Duration;

pub const SETTLE_DELAY: Duration = Duration::from_millis(30);

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read(&self) -> Option<String> {
        let tools: [(&str, &[&str]); 2] = [
            ("wl-paste", &["--no-newline"]),
            ("xclip", &["-selection", "clipboard", "-o"]),
        ];
        for (program, args) in tools {
            if let Ok(out) = Command::new(program).args(args).output() {
                if out.status.success() {
                    return Some(String::from_utf8_lossy(&out.stdout).into_owned());
                }
            }
        }
        None
    }

    fn write(&self, text: &str) -> Result<(), InjectError> {
        if pipe_to_command("wl-copy", &[], text).is_ok() {
            return Ok(());
        }
        if pipe_to_command("xclip", &["-selection", "clipboard"], text).is_ok() {
            return Ok(());
        }
        Err(InjectError::NoClipboardTool)
    }
}

pub struct SystemPaste;

impl PasteKeystroke for SystemPaste {
    fn send_paste(&self) -> Result<(), InjectError> {
        // ydotool scancodes: Shift=42, Insert=110
        if run_tool("ydotool", &["key", "42:1", "110:1", "110:0", "42:0"]) {
            return Ok(());
        }
        if run_tool("wtype", &["-M", "shift", "-k", "Insert"]) {
            return Ok(());
        }
        if run_tool("xdotool", &["key", "--clearmodifiers", "shift+Insert"]) {
            return Ok(());
        }
        Err(InjectError::NoKeystrokeTool)
    }
}

fn run_tool(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
