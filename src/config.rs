//! Configuration types and JSON persistence
//!
//! The config lives in `config.json`, either next to the executable
//! (portable mode, when that directory is user-writable) or in the
//! OS-standard per-user config directory. Legacy flat configs from the
//! pre-preset era are migrated on load.

use crate::error::SpeakkeyError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

/// Model used for new and migrated presets when none is configured.
pub const DEFAULT_MODEL: &str = "base-q5_1";

/// A user-defined capture profile: one chord, one model, one language policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub keep_model_loaded: bool,
    /// "hold" or "toggle"; empty reads as hold
    #[serde(default)]
    pub input_mode: String,
    /// Canonical chord string like "ctrl+shift+f1"; empty = unbound
    #[serde(default)]
    pub hotkey: String,
    /// "auto" or a whisper language code; empty reads as auto
    #[serde(default)]
    pub language: String,
    #[serde(rename = "useKBLayout", default)]
    pub use_kb_layout: bool,
    #[serde(default)]
    pub keep_history: bool,
    #[serde(default)]
    pub enabled: bool,
}

impl Preset {
    /// A sensible default preset (unbound, disabled).
    pub fn default_preset() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Default".to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            keep_model_loaded: false,
            input_mode: "hold".to_string(),
            hotkey: String::new(),
            language: "auto".to_string(),
            use_kb_layout: false,
            keep_history: true,
            enabled: false,
        }
    }
}

/// Global application settings plus the ordered preset list.
///
/// Theme, UI language, close action and autostart are GUI concerns carried
/// only as pass-through fields so a save never drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Capture device id; empty = OS default
    #[serde(default)]
    pub microphone_id: String,
    /// Override for the models directory; empty = resolved automatically
    #[serde(default)]
    pub models_dir: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_ui_lang")]
    pub ui_lang: String,
    #[serde(default)]
    pub close_action: String,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub start_minimized: bool,
    /// "auto", "cpu", or a GPU backend id
    #[serde(default = "default_backend")]
    pub backend: String,
    pub presets: Vec<Preset>,
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_ui_lang() -> String {
    "en".to_string()
}

fn default_backend() -> String {
    "auto".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            microphone_id: String::new(),
            models_dir: String::new(),
            theme: default_theme(),
            ui_lang: default_ui_lang(),
            close_action: String::new(),
            auto_start: false,
            start_minimized: false,
            backend: default_backend(),
            presets: vec![Preset::default_preset()],
        }
    }
}

impl AppConfig {
    pub fn find_preset(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn find_preset_index(&self, id: &str) -> Option<usize> {
        self.presets.iter().position(|p| p.id == id)
    }
}

/// Shape used to sniff whether a config file is the current format.
/// A missing `presets` field means the legacy flat layout.
#[derive(Deserialize)]
struct RawConfig {
    presets: Option<Vec<Preset>>,
}

/// Legacy flat config from before presets existed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyConfig {
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    models_dir: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    hotkey_mod: String,
    #[serde(default)]
    hotkey_key: String,
    #[serde(default)]
    microphone_id: String,
    #[serde(default)]
    auto_start: bool,
    #[serde(default)]
    record_mode: String,
}

/// Convert a legacy flat config into an AppConfig with a single preset.
fn migrate_legacy(data: &str) -> Option<AppConfig> {
    let old: LegacyConfig = serde_json::from_str(data).ok()?;

    let hotkey = if !old.hotkey_mod.is_empty() && !old.hotkey_key.is_empty() {
        format!("{}+{}", old.hotkey_mod, old.hotkey_key)
    } else {
        old.hotkey_key.clone()
    };

    let language = if old.language.is_empty() {
        "auto".to_string()
    } else {
        old.language
    };
    let input_mode = if old.record_mode.is_empty() {
        "hold".to_string()
    } else {
        old.record_mode
    };
    let model_name = if old.model_name.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        old.model_name
    };

    let enabled = !hotkey.is_empty();
    let preset = Preset {
        id: Uuid::new_v4().to_string(),
        name: "Default".to_string(),
        model_name,
        keep_model_loaded: false,
        input_mode,
        hotkey,
        language,
        use_kb_layout: false,
        keep_history: true,
        enabled,
    };

    Some(AppConfig {
        microphone_id: old.microphone_id,
        models_dir: old.models_dir,
        auto_start: old.auto_start,
        presets: vec![preset],
        ..AppConfig::default()
    })
}

/// Directory of the running executable, if it can be determined.
pub fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

/// Whether the directory accepts a file create (the portable-mode probe).
fn dir_writable(dir: &Path) -> bool {
    let probe = dir.join(".speakkey_write_test");
    match std::fs::File::create(&probe) {
        Ok(f) => {
            drop(f);
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn os_config_dir() -> PathBuf {
    let dir = directories::ProjectDirs::from("", "", "speakkey")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn os_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "speakkey")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config/history directory. Portable mode (the executable's own directory)
/// wins when writable; probed once per process.
pub fn config_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        if let Some(dir) = exe_dir() {
            if dir_writable(&dir) {
                return dir;
            }
        }
        os_config_dir()
    })
}

/// Full path of `config.json`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Resolve the models directory: explicit config value, else
/// `<exe_dir>/models` when creatable, else the per-user data directory.
pub fn resolve_models_dir(cfg: &AppConfig) -> PathBuf {
    if !cfg.models_dir.is_empty() {
        let dir = PathBuf::from(&cfg.models_dir);
        let _ = std::fs::create_dir_all(&dir);
        return dir;
    }

    if let Some(dir) = exe_dir() {
        let models = dir.join("models");
        if std::fs::create_dir_all(&models).is_ok() {
            return models;
        }
    }

    let models = os_data_dir().join("models");
    let _ = std::fs::create_dir_all(&models);
    models
}

/// Load config from the default location. Missing or unreadable files yield
/// defaults; a legacy flat config is migrated and saved back.
pub fn load() -> AppConfig {
    load_from(&config_path())
}

/// Load config from an explicit path (tests and `--config`).
pub fn load_from(path: &Path) -> AppConfig {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return AppConfig::default(),
    };

    let raw: RawConfig = match serde_json::from_str(&data) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("invalid config at {:?}: {}, using defaults", path, e);
            return AppConfig::default();
        }
    };

    if raw.presets.is_none() {
        if let Some(migrated) = migrate_legacy(&data) {
            tracing::info!("migrated legacy config at {:?}", path);
            if let Err(e) = save_to(path, &migrated) {
                tracing::warn!("failed to save migrated config: {}", e);
            }
            return migrated;
        }
        return AppConfig::default();
    }

    match serde_json::from_str(&data) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("invalid config at {:?}: {}, using defaults", path, e);
            AppConfig::default()
        }
    }
}

/// Save config to the default location.
pub fn save(cfg: &AppConfig) -> Result<(), SpeakkeyError> {
    save_to(&config_path(), cfg)
}

/// Save config to an explicit path.
pub fn save_to(path: &Path, cfg: &AppConfig) -> Result<(), SpeakkeyError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SpeakkeyError::Config(format!("create config dir: {}", e)))?;
    }
    let data = serde_json::to_string_pretty(cfg)
        .map_err(|e| SpeakkeyError::Config(format!("serialize config: {}", e)))?;
    std::fs::write(path, data).map_err(|e| SpeakkeyError::Config(format!("write config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.backend, "auto");
        assert_eq!(cfg.theme, "dark");
        assert_eq!(cfg.presets.len(), 1);
        assert_eq!(cfg.presets[0].model_name, DEFAULT_MODEL);
        assert_eq!(cfg.presets[0].input_mode, "hold");
        assert!(!cfg.presets[0].enabled);
        assert!(cfg.presets[0].keep_history);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = AppConfig::default();
        cfg.microphone_id = "front-mic".to_string();
        cfg.backend = "vulkan".to_string();
        cfg.presets.push(Preset {
            id: "p2".to_string(),
            name: "Russian".to_string(),
            model_name: "small".to_string(),
            keep_model_loaded: true,
            input_mode: "toggle".to_string(),
            hotkey: "ctrl+shift+f2".to_string(),
            language: "ru".to_string(),
            use_kb_layout: true,
            keep_history: false,
            enabled: true,
        });

        save_to(&path, &cfg).unwrap();
        let loaded = load_from(&path);
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_preset_order_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = AppConfig::default();
        cfg.presets.clear();
        for name in ["c", "a", "b"] {
            let mut p = Preset::default_preset();
            p.name = name.to_string();
            cfg.presets.push(p);
        }

        save_to(&path, &cfg).unwrap();
        let loaded = load_from(&path);
        let names: Vec<_> = loaded.presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"backend":"cpu","presets":[],"someFutureField":{"x":1}}"#,
        )
        .unwrap();

        let cfg = load_from(&path);
        assert_eq!(cfg.backend, "cpu");
        assert!(cfg.presets.is_empty());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_from(&dir.path().join("nope.json"));
        // Preset ids are random, so compare the stable parts
        assert_eq!(cfg.backend, "auto");
        assert_eq!(cfg.presets.len(), 1);
        assert_eq!(cfg.presets[0].name, "Default");
    }

    #[test]
    fn test_legacy_migration_with_modifier() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"hotkeyMod":"ctrl","hotkeyKey":"f9","recordMode":"toggle",
               "modelName":"small","language":"ru","microphoneId":"usb-mic"}"#,
        )
        .unwrap();

        let cfg = load_from(&path);
        assert_eq!(cfg.presets.len(), 1);
        let p = &cfg.presets[0];
        assert_eq!(p.hotkey, "ctrl+f9");
        assert_eq!(p.input_mode, "toggle");
        assert_eq!(p.model_name, "small");
        assert_eq!(p.language, "ru");
        assert!(p.enabled);
        assert!(p.keep_history);
        assert_eq!(cfg.microphone_id, "usb-mic");

        // Migration is saved back in the new shape
        let reloaded = load_from(&path);
        assert_eq!(reloaded.presets[0].hotkey, "ctrl+f9");
    }

    #[test]
    fn test_legacy_migration_key_only_and_empty() {
        let dir = TempDir::new().unwrap();

        let path = dir.path().join("key_only.json");
        std::fs::write(&path, r#"{"hotkeyKey":"f9"}"#).unwrap();
        let cfg = load_from(&path);
        assert_eq!(cfg.presets[0].hotkey, "f9");
        assert!(cfg.presets[0].enabled);
        assert_eq!(cfg.presets[0].model_name, DEFAULT_MODEL);
        assert_eq!(cfg.presets[0].language, "auto");
        assert_eq!(cfg.presets[0].input_mode, "hold");

        let path = dir.path().join("no_key.json");
        std::fs::write(&path, r#"{"modelName":"tiny"}"#).unwrap();
        let cfg = load_from(&path);
        assert_eq!(cfg.presets[0].hotkey, "");
        assert!(!cfg.presets[0].enabled, "no chord produced means disabled");
    }
}
