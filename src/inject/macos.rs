//! macOS clipboard and paste keystroke
//!
//! pbcopy/pbpaste for the clipboard; the Cmd+V keystroke goes through
//! AppleScript, which requires the Accessibility permission the hotkey
//! hook already needs.

use super::{pipe_to_command, Clipboard, PasteKeystroke};
use crate::error::InjectError;
use std::process::Command;
use std::time::Duration;

pub const SETTLE_DELAY: Duration = Duration::from_millis(30);

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read(&self) -> Option<String> {
        let out = Command::new("pbpaste").output().ok()?;
        if out.status.success() {
            Some(String::from_utf8_lossy(&out.stdout).into_owned())
        } else {
            None
        }
    }

    fn write(&self, text: &str) -> Result<(), InjectError> {
        pipe_to_command("pbcopy", &[], text)
    }
}

pub struct SystemPaste;

impl PasteKeystroke for SystemPaste {
    fn send_paste(&self) -> Result<(), InjectError> {
        let status = Command::new("osascript")
            .args([
                "-e",
                r#"tell application "System Events" to keystroke "v" using command down"#,
            ])
            .status()
            .map_err(|e| InjectError::Keystroke(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(InjectError::Keystroke(format!(
                "osascript exited with {}",
                status
            )))
        }
    }
}
