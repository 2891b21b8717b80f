//! Text injection
//!
//! Inserts a transcription into the focused window without losing the
//! user's clipboard:
//!
//! 1. save the current clipboard value (if any)
//! 2. write the transcription to the clipboard
//! 3. wait a beat for clipboard consistency
//! 4. synthesise the platform paste keystroke
//! 5. restore the saved clipboard asynchronously ~500 ms later
//!
//! When every keystroke path fails (elevated window on Windows, no tool
//! installed) the injection still *succeeds*: the text stays on the
//! clipboard for a manual paste, and the saved clipboard is deliberately
//! not restored.
//!
//! The protocol composes two capabilities, [`Clipboard`] and
//! [`PasteKeystroke`], with one shell-out implementation per platform.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as platform;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as platform;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
use windows as platform;

use crate::error::InjectError;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

/// Read/write access to the system clipboard.
pub trait Clipboard: Send + Sync {
    /// Current clipboard text, or None when empty/unreadable.
    fn read(&self) -> Option<String>;

    fn write(&self, text: &str) -> Result<(), InjectError>;
}

/// Synthesises the platform's paste keystroke into the focused window.
pub trait PasteKeystroke: Send + Sync {
    fn send_paste(&self) -> Result<(), InjectError>;
}

/// How an injection landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// Keystroke delivered; the clipboard will be restored
    Pasted,
    /// Synthetic input was blocked; the text stays on the clipboard
    ClipboardOnly,
}

/// The injection capability the orchestrator depends on.
pub trait TextInject: Send + Sync {
    fn inject(&self, text: &str) -> Result<Injection, InjectError>;
}

/// Clipboard-save / write / keystroke / restore protocol driver.
pub struct ClipboardInjector {
    clipboard: Arc<dyn Clipboard>,
    keystroke: Arc<dyn PasteKeystroke>,
    /// Clipboard consistency delay between write and keystroke
    settle: Duration,
    /// Delay before the saved clipboard is put back
    restore_after: Duration,
}

impl ClipboardInjector {
    /// Injector over the real platform clipboard and input tools.
    pub fn system() -> Self {
        Self::new(
            Arc::new(platform::SystemClipboard),
            Arc::new(platform::SystemPaste),
            platform::SETTLE_DELAY,
            Duration::from_millis(500),
        )
    }

    pub fn new(
        clipboard: Arc<dyn Clipboard>,
        keystroke: Arc<dyn PasteKeystroke>,
        settle: Duration,
        restore_after: Duration,
    ) -> Self {
        Self {
            clipboard,
            keystroke,
            settle,
            restore_after,
        }
    }
}

impl TextInject for ClipboardInjector {
    fn inject(&self, text: &str) -> Result<Injection, InjectError> {
        if text.is_empty() {
            return Ok(Injection::Pasted);
        }

        let saved = self.clipboard.read();
        self.clipboard.write(text)?;
        std::thread::sleep(self.settle);

        match self.keystroke.send_paste() {
            Ok(()) => {
                tracing::info!("text pasted via clipboard ({} chars)", text.chars().count());
                if let Some(saved) = saved {
                    let clipboard = self.clipboard.clone();
                    let delay = self.restore_after;
                    std::thread::Builder::new()
                        .name("clipboard-restore".to_string())
                        .spawn(move || {
                            std::thread::sleep(delay);
                            if let Err(e) = clipboard.write(&saved) {
                                tracing::warn!("clipboard restore failed: {}", e);
                            }
                        })
                        .ok();
                }
                Ok(Injection::Pasted)
            }
            Err(e) => {
                // Not an error: the transcription is on the clipboard and
                // the user can paste it manually.
                tracing::info!("paste keystroke blocked ({}), text left in clipboard", e);
                Ok(Injection::ClipboardOnly)
            }
        }
    }
}

/// Run a command feeding `input` to stdin; used by the shell-out clipboard
/// implementations.
pub(crate) fn pipe_to_command(
    program: &str,
    args: &[&str],
    input: &str,
) -> Result<(), InjectError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InjectError::NoClipboardTool
            } else {
                InjectError::ClipboardWrite(e.to_string())
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| InjectError::ClipboardWrite(e.to_string()))?;
    }

    let status = child
        .wait()
        .map_err(|e| InjectError::ClipboardWrite(e.to_string()))?;
    if !status.success() {
        return Err(InjectError::ClipboardWrite(format!(
            "{} exited with {}",
            program, status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockClipboard {
        value: Mutex<Option<String>>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Clipboard for MockClipboard {
        fn read(&self) -> Option<String> {
            self.value.lock().unwrap().clone()
        }

        fn write(&self, text: &str) -> Result<(), InjectError> {
            *self.value.lock().unwrap() = Some(text.to_string());
            self.events.lock().unwrap().push(format!("write:{}", text));
            Ok(())
        }
    }

    struct MockKeystroke {
        ok: bool,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl PasteKeystroke for MockKeystroke {
        fn send_paste(&self) -> Result<(), InjectError> {
            self.events.lock().unwrap().push("paste".to_string());
            if self.ok {
                Ok(())
            } else {
                Err(InjectError::NoKeystrokeTool)
            }
        }
    }

    fn rig(prev: Option<&str>, paste_ok: bool) -> (Arc<MockClipboard>, ClipboardInjector) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let clipboard = Arc::new(MockClipboard {
            value: Mutex::new(prev.map(String::from)),
            events: events.clone(),
        });
        let keystroke = Arc::new(MockKeystroke {
            ok: paste_ok,
            events,
        });
        let injector = ClipboardInjector::new(
            clipboard.clone(),
            keystroke,
            Duration::from_millis(1),
            Duration::from_millis(50),
        );
        (clipboard, injector)
    }

    #[test]
    fn test_paste_then_restore() {
        let (clipboard, injector) = rig(Some("PREV"), true);

        let outcome = injector.inject("hello world").unwrap();
        assert_eq!(outcome, Injection::Pasted);
        // Immediately after: transcription on the clipboard
        assert_eq!(clipboard.read().as_deref(), Some("hello world"));

        // After the restore window the original value is back
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(clipboard.read().as_deref(), Some("PREV"));

        let events = clipboard.events.lock().unwrap().clone();
        assert_eq!(events, vec!["write:hello world", "paste", "write:PREV"]);
    }

    #[test]
    fn test_keystroke_blocked_keeps_text_in_clipboard() {
        let (clipboard, injector) = rig(Some("PREV"), false);

        let outcome = injector.inject("hello").unwrap();
        assert_eq!(outcome, Injection::ClipboardOnly);

        // No restore: the user still needs the text
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(clipboard.read().as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_clipboard_never_restored() {
        let (clipboard, injector) = rig(None, true);

        injector.inject("hello").unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(clipboard.read().as_deref(), Some("hello"));

        let events = clipboard.events.lock().unwrap().clone();
        assert_eq!(events, vec!["write:hello", "paste"]);
    }

    #[test]
    fn test_empty_text_is_a_no_op() {
        let (clipboard, injector) = rig(Some("PREV"), true);
        injector.inject("").unwrap();
        assert_eq!(clipboard.read().as_deref(), Some("PREV"));
        assert!(clipboard.events.lock().unwrap().is_empty());
    }
}
