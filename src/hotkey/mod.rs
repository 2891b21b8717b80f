//! Global hotkey engine
//!
//! Translates the raw OS key stream into preset-level press/release
//! callbacks. One event-loop thread maintains the set of held keys and
//! matches registered chord bindings against it (a binding fires when its
//! whole keycode set is held, and releases when it no longer is). The same
//! loop implements the interactive single-shot capture mode used by the
//! preset editor to record a new chord.
//!
//! Callbacks are delivered on short-lived worker threads, never on the
//! event loop itself.

pub mod chord;
pub mod hook;

pub use chord::{canonical_chord, parse_chord, KeyCode};
pub use hook::{KeyHook, RawKeyEvent, RdevHook};

use crate::error::HotkeyError;
use chord::KC_ESCAPE;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Callback invoked with the preset id on chord press/release.
pub type BindingCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Binding {
    keys: Vec<KeyCode>,
    matched: bool,
}

#[derive(Default)]
struct Shared {
    bindings: HashMap<String, Binding>,
    capturing: bool,
    /// Modifiers accumulated during capture (for modifier-only chords)
    capture_keys: Vec<KeyCode>,
    capture_tx: Option<mpsc::Sender<String>>,
}

/// Global hotkey engine. See the module docs for the model.
pub struct HotkeyEngine {
    shared: Arc<Mutex<Shared>>,
    hook: Mutex<Box<dyn KeyHook>>,
    running: Arc<AtomicBool>,
    on_press: BindingCallback,
    on_release: BindingCallback,
}

impl HotkeyEngine {
    pub fn new(
        hook: Box<dyn KeyHook>,
        on_press: BindingCallback,
        on_release: BindingCallback,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            hook: Mutex::new(hook),
            running: Arc::new(AtomicBool::new(false)),
            on_press,
            on_release,
        }
    }

    /// Start the event loop. Idempotent. A platform hook refusal is logged
    /// once and the engine stays inert (registrations still succeed).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let events = match self.hook.lock().unwrap().start() {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!("hotkey engine inert: {}", e);
                return;
            }
        };

        let shared = self.shared.clone();
        let running = self.running.clone();
        let on_press = self.on_press.clone();
        let on_release = self.on_release.clone();

        std::thread::Builder::new()
            .name("hotkey-engine".to_string())
            .spawn(move || {
                event_loop(events, shared, running, on_press, on_release);
            })
            .expect("spawn hotkey engine thread");

        tracing::info!("hotkey engine started");
    }

    /// Stop the event loop and cancel any pending capture. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.hook.lock().unwrap().stop();

        let mut shared = self.shared.lock().unwrap();
        if shared.capturing {
            shared.capturing = false;
            shared.capture_keys.clear();
            if let Some(tx) = shared.capture_tx.take() {
                let _ = tx.send(String::new());
            }
        }
        tracing::info!("hotkey engine stopped");
    }

    /// Register (or replace) the chord binding for a preset.
    pub fn register(&self, preset_id: &str, chord_str: &str, mode: &str) -> Result<(), HotkeyError> {
        let keys = parse_chord(chord_str)?;

        let mut shared = self.shared.lock().unwrap();
        shared
            .bindings
            .insert(preset_id.to_string(), Binding { keys, matched: false });
        tracing::debug!(
            "hotkey registered: {:?} for preset {} (mode={})",
            chord_str,
            preset_id,
            mode
        );
        Ok(())
    }

    /// Remove the binding for a preset; no-op when absent.
    pub fn unregister(&self, preset_id: &str) {
        let mut shared = self.shared.lock().unwrap();
        if shared.bindings.remove(preset_id).is_some() {
            tracing::debug!("hotkey unregistered for preset {}", preset_id);
        }
    }

    /// Block until the user presses a key combination and return it in
    /// canonical form, or return "" on cancellation. While capture is
    /// active no binding can match.
    pub fn capture(&self) -> String {
        let (tx, rx) = mpsc::channel();
        {
            let mut shared = self.shared.lock().unwrap();
            // A second capture supersedes a pending one
            if let Some(old) = shared.capture_tx.take() {
                let _ = old.send(String::new());
            }
            shared.capturing = true;
            shared.capture_keys.clear();
            shared.capture_tx = Some(tx);
        }
        rx.recv().unwrap_or_default()
    }

    /// Cancel an in-flight capture; the blocked `capture` call returns "".
    pub fn cancel_capture(&self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.capturing {
            shared.capturing = false;
            shared.capture_keys.clear();
            if let Some(tx) = shared.capture_tx.take() {
                let _ = tx.send(String::new());
            }
        }
    }

    #[cfg(test)]
    fn binding_count(&self) -> usize {
        self.shared.lock().unwrap().bindings.len()
    }

    #[cfg(test)]
    fn is_capturing(&self) -> bool {
        self.shared.lock().unwrap().capturing
    }
}

/// Event-loop body: track held keys, match bindings, service capture mode.
fn event_loop(
    events: mpsc::Receiver<RawKeyEvent>,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    on_press: BindingCallback,
    on_release: BindingCallback,
) {
    let mut pressed: HashSet<KeyCode> = HashSet::new();

    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        };

        match event {
            RawKeyEvent::Down(kc) => {
                pressed.insert(kc);
                handle_key_down(kc, &pressed, &shared, &on_press);
            }
            RawKeyEvent::Up(kc) => {
                pressed.remove(&kc);
                handle_key_up(kc, &pressed, &shared, &on_release);
            }
        }
    }
}

fn handle_key_down(
    kc: KeyCode,
    pressed: &HashSet<KeyCode>,
    shared: &Arc<Mutex<Shared>>,
    on_press: &BindingCallback,
) {
    let mut guard = shared.lock().unwrap();

    if guard.capturing {
        capture_key_down(kc, pressed, &mut guard);
        return;
    }

    for (id, binding) in guard.bindings.iter_mut() {
        if !binding.matched && binding.keys.iter().all(|k| pressed.contains(k)) {
            binding.matched = true;
            spawn_callback(on_press.clone(), id.clone(), "press");
        }
    }
}

fn handle_key_up(
    kc: KeyCode,
    pressed: &HashSet<KeyCode>,
    shared: &Arc<Mutex<Shared>>,
    on_release: &BindingCallback,
) {
    let mut guard = shared.lock().unwrap();

    if guard.capturing {
        capture_key_up(kc, pressed, &mut guard);
        return;
    }

    for (id, binding) in guard.bindings.iter_mut() {
        if binding.matched && !binding.keys.iter().all(|k| pressed.contains(k)) {
            binding.matched = false;
            spawn_callback(on_release.clone(), id.clone(), "release");
        }
    }
}

/// Deliver a callback on its own short-lived thread so the event loop
/// never blocks on orchestrator work.
fn spawn_callback(callback: BindingCallback, preset_id: String, kind: &'static str) {
    let result = std::thread::Builder::new()
        .name(format!("hotkey-{}", kind))
        .spawn(move || callback(&preset_id));
    if let Err(e) = result {
        tracing::error!("failed to spawn {} worker: {}", kind, e);
    }
}

fn capture_key_down(kc: KeyCode, pressed: &HashSet<KeyCode>, shared: &mut Shared) {
    if kc == KC_ESCAPE {
        finish_capture(shared, &[]);
        return;
    }

    if chord::is_modifier(kc) {
        if !shared.capture_keys.contains(&kc) {
            shared.capture_keys.push(kc);
        }
        return;
    }

    // Non-modifier pressed: finalize with everything currently held
    let keys: Vec<KeyCode> = pressed.iter().copied().filter(|&k| k != KC_ESCAPE).collect();
    finish_capture(shared, &keys);
}

/// Finalize a modifier-only capture once every accumulated modifier has
/// been released without a regular key ever arriving.
fn capture_key_up(kc: KeyCode, pressed: &HashSet<KeyCode>, shared: &mut Shared) {
    if shared.capture_keys.is_empty() || !chord::is_modifier(kc) {
        return;
    }
    if shared.capture_keys.iter().any(|k| pressed.contains(k)) {
        return; // other capture modifiers still held
    }

    let keys = shared.capture_keys.clone();
    finish_capture(shared, &keys);
}

fn finish_capture(shared: &mut Shared, keys: &[KeyCode]) {
    let chord_str = canonical_chord(keys);
    shared.capturing = false;
    shared.capture_keys.clear();
    if let Some(tx) = shared.capture_tx.take() {
        let _ = tx.send(chord_str);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender};
    use std::time::Duration;

    /// Hook driven by the test instead of the OS.
    struct ScriptedHook {
        slot: Arc<Mutex<Option<Sender<RawKeyEvent>>>>,
    }

    impl KeyHook for ScriptedHook {
        fn start(&mut self) -> Result<Receiver<RawKeyEvent>, HotkeyError> {
            let (tx, rx) = mpsc::channel();
            *self.slot.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        fn stop(&mut self) {}
    }

    struct Rig {
        engine: Arc<HotkeyEngine>,
        keys: Arc<Mutex<Option<Sender<RawKeyEvent>>>>,
        presses: Receiver<String>,
        releases: Receiver<String>,
    }

    fn rig() -> Rig {
        let slot = Arc::new(Mutex::new(None));
        let hook = Box::new(ScriptedHook { slot: slot.clone() });

        let (press_tx, presses) = mpsc::channel();
        let (release_tx, releases) = mpsc::channel();
        let press_tx = Mutex::new(press_tx);
        let release_tx = Mutex::new(release_tx);

        let engine = Arc::new(HotkeyEngine::new(
            hook,
            Arc::new(move |id: &str| {
                let _ = press_tx.lock().unwrap().send(id.to_string());
            }),
            Arc::new(move |id: &str| {
                let _ = release_tx.lock().unwrap().send(id.to_string());
            }),
        ));
        engine.start();
        Rig {
            engine,
            keys: slot,
            presses,
            releases,
        }
    }

    impl Rig {
        /// Block until a capture() call on another thread has armed
        fn wait_capturing(&self) {
            let deadline = std::time::Instant::now() + WAIT;
            while !self.engine.is_capturing() {
                assert!(std::time::Instant::now() < deadline, "capture never armed");
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        fn key(&self, event: RawKeyEvent) {
            self.keys
                .lock()
                .unwrap()
                .as_ref()
                .expect("hook started")
                .send(event)
                .unwrap();
        }

        fn down(&self, name: &str) {
            self.key(RawKeyEvent::Down(chord::key_code(name).unwrap()));
        }

        fn up(&self, name: &str) {
            self.key(RawKeyEvent::Up(chord::key_code(name).unwrap()));
        }
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_chord_press_and_release() {
        let rig = rig();
        rig.engine.register("p1", "ctrl+shift+f1", "hold").unwrap();

        rig.down("ctrl");
        rig.down("shift");
        rig.down("f1");
        assert_eq!(rig.presses.recv_timeout(WAIT).unwrap(), "p1");

        rig.up("f1");
        assert_eq!(rig.releases.recv_timeout(WAIT).unwrap(), "p1");
        rig.up("shift");
        rig.up("ctrl");

        // No spurious second fire
        assert!(rig.presses.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_key_repeat_does_not_refire() {
        let rig = rig();
        rig.engine.register("p1", "f9", "hold").unwrap();

        rig.down("f9");
        assert_eq!(rig.presses.recv_timeout(WAIT).unwrap(), "p1");
        // OS auto-repeat shows up as more keydowns while matched
        rig.down("f9");
        rig.down("f9");
        assert!(rig.presses.recv_timeout(Duration::from_millis(100)).is_err());

        rig.up("f9");
        assert_eq!(rig.releases.recv_timeout(WAIT).unwrap(), "p1");
    }

    #[test]
    fn test_register_replaces_and_unregister() {
        let rig = rig();
        rig.engine.register("p1", "f1", "hold").unwrap();
        rig.engine.register("p1", "f2", "toggle").unwrap();
        assert_eq!(rig.engine.binding_count(), 1);

        rig.down("f1");
        assert!(rig.presses.recv_timeout(Duration::from_millis(100)).is_err());
        rig.up("f1");

        rig.engine.unregister("p1");
        assert_eq!(rig.engine.binding_count(), 0);
        rig.engine.unregister("p1"); // no-op
    }

    #[test]
    fn test_register_unknown_token_leaves_bindings_untouched() {
        let rig = rig();
        rig.engine.register("p1", "f1", "hold").unwrap();
        let err = rig.engine.register("p2", "ctrl+bogus", "hold");
        assert!(matches!(err, Err(HotkeyError::UnknownKey(_))));
        assert_eq!(rig.engine.binding_count(), 1);
    }

    #[test]
    fn test_capture_with_modifiers_and_key() {
        let rig = rig();
        let engine = rig.engine.clone();
        let capture = std::thread::spawn(move || engine.capture());
        rig.wait_capturing();

        rig.down("shift");
        rig.down("ctrl");
        rig.down("v");
        assert_eq!(capture.join().unwrap(), "ctrl+shift+v");
    }

    #[test]
    fn test_capture_modifier_only() {
        let rig = rig();
        let engine = rig.engine.clone();
        let capture = std::thread::spawn(move || engine.capture());
        rig.wait_capturing();

        rig.down("super");
        rig.down("shift");
        rig.up("shift");
        rig.up("super");
        assert_eq!(capture.join().unwrap(), "shift+super");
    }

    #[test]
    fn test_capture_escape_cancels_and_bindings_survive() {
        let rig = rig();
        rig.engine.register("p1", "f1", "hold").unwrap();

        let engine = rig.engine.clone();
        let capture = std::thread::spawn(move || engine.capture());
        rig.wait_capturing();

        rig.down("esc");
        assert_eq!(capture.join().unwrap(), "");
        assert_eq!(rig.engine.binding_count(), 1);
    }

    #[test]
    fn test_no_binding_match_during_capture() {
        let rig = rig();
        rig.engine.register("p1", "f1", "hold").unwrap();

        let engine = rig.engine.clone();
        let capture = std::thread::spawn(move || engine.capture());
        rig.wait_capturing();

        // f1 finalizes the capture instead of firing the binding
        rig.down("f1");
        assert_eq!(capture.join().unwrap(), "f1");
        assert!(rig.presses.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_cancel_capture() {
        let rig = rig();
        let engine = rig.engine.clone();
        let capture = std::thread::spawn(move || engine.capture());
        rig.wait_capturing();

        rig.engine.cancel_capture();
        assert_eq!(capture.join().unwrap(), "");
    }
}
