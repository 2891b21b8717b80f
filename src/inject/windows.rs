//! Windows clipboard and paste keystroke
//!
//! Clipboard access and the Ctrl+V keystroke both go through PowerShell;
//! SendKeys delivers via SendInput to the focused window. When that window
//! is elevated, UIPI blocks synthetic input and the injector falls back to
//! leaving the text on the clipboard.

use super::{Clipboard, PasteKeystroke};
use crate::error::InjectError;
use std::process::Command;
use std::time::Duration;

// Windows clipboard propagation is slower than the Unix ones
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

fn powershell(command: &str) -> std::io::Result<std::process::Output> {
    Command::new("powershell")
        .args(["-NoProfile", "-Command", command])
        .output()
}

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read(&self) -> Option<String> {
        let out = powershell("Get-Clipboard -Raw").ok()?;
        if !out.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&out.stdout).into_owned();
        // PowerShell appends a trailing CRLF of its own
        let text = text
            .strip_suffix("\r\n")
            .map(str::to_string)
            .unwrap_or(text);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn write(&self, text: &str) -> Result<(), InjectError> {
        // Single-quoted here-string keeps the payload verbatim
        let script = format!("Set-Clipboard -Value @'\n{}\n'@", text);
        let out = powershell(&script).map_err(|e| InjectError::ClipboardWrite(e.to_string()))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(InjectError::ClipboardWrite(
                String::from_utf8_lossy(&out.stderr).into_owned(),
            ))
        }
    }
}

pub struct SystemPaste;

impl PasteKeystroke for SystemPaste {
    fn send_paste(&self) -> Result<(), InjectError> {
        let out = powershell(
            "Add-Type -AssemblyName System.Windows.Forms; \
             [System.Windows.Forms.SendKeys]::SendWait('^v')",
        )
        .map_err(|e| InjectError::Keystroke(e.to_string()))?;

        if out.status.success() {
            Ok(())
        } else {
            Err(InjectError::Keystroke(
                String::from_utf8_lossy(&out.stderr).into_owned(),
            ))
        }
    }
}
