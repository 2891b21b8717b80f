//! Compute backend registry
//!
//! The CPU backend is compiled into the binary. Each GPU backend is an
//! optional ggml shared library shipped next to the executable
//! (`ggml-cuda.dll`, `libggml-vulkan.so`, ...), discovered at startup and
//! hot-loadable after the installer collaborator drops a new one in place.
//! The registry reports, per backend, whether the library is present,
//! whether the host runtime and hardware are there, and why not otherwise,
//! so the settings UI can offer exactly the right install button.

pub mod ggml;

#[cfg(target_os = "linux")]
mod detect_linux;
#[cfg(target_os = "linux")]
use detect_linux::probe;

#[cfg(target_os = "windows")]
mod detect_windows;
#[cfg(target_os = "windows")]
use detect_windows::probe;

#[cfg(target_os = "macos")]
mod detect_macos;
#[cfg(target_os = "macos")]
use detect_macos::probe;

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
fn probe() -> GpuDetection {
    GpuDetection::default()
}

use crate::config;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Results of the platform hardware/runtime probes.
#[derive(Debug, Default, Clone)]
pub struct GpuDetection {
    pub has_nvidia: bool,
    pub nvidia_driver: bool,
    pub nvidia_model: String,
    pub cuda_available: bool,
    pub vulkan_available: bool,
    pub has_amd: bool,
    pub amd_model: String,
    pub rocm_available: bool,
    pub opencl_available: bool,
}

/// One compute backend as shown in settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub id: String,
    pub name: String,
    /// Backend library shipped next to the executable (always true for
    /// auto/cpu, which are built in)
    pub present: bool,
    /// Host runtime (driver stack, loader) detected
    pub runtime_available: bool,
    /// Matching hardware detected, for vendor-specific backends
    pub hardware_available: bool,
    /// "" (usable) | "no_hardware" | "no_driver" | "no_runtime" | "not_compiled"
    pub unavailable_reason: String,
    /// Detected device, e.g. "NVIDIA RTX 5070 Ti"
    pub gpu_detected: String,
    /// Approximate library download size for the installer UI
    pub download_size: String,
}

impl BackendInfo {
    /// Usable for inference right now.
    pub fn usable(&self) -> bool {
        self.unavailable_reason.is_empty()
    }
}

/// GPU backends the installer knows how to deliver, in auto-selection
/// priority order.
pub const GPU_BACKENDS: &[(&str, &str, &str)] = &[
    ("cuda", "CUDA", "~310 MB"),
    ("metal", "Metal", "built-in"),
    ("vulkan", "Vulkan", "~18 MB"),
    ("rocm", "ROCm", "~95 MB"),
    ("opencl", "OpenCL", "~9 MB"),
];

/// Registry over the executable's directory.
pub struct BackendRegistry {
    exe_dir: PathBuf,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            exe_dir: config::exe_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Registry rooted at an explicit directory (tests).
    pub fn at(exe_dir: PathBuf) -> Self {
        Self { exe_dir }
    }

    /// All known backends with availability details: `auto`, `cpu`, then
    /// one entry per GPU backend.
    pub fn enumerate(&self) -> Vec<BackendInfo> {
        let det = probe();
        build_backend_infos(&det, &|id| library_present(&self.exe_dir, id))
    }

    /// The backend id engines should load with. `auto` resolves to the
    /// first usable GPU backend, else `cpu`. An explicit id skips the
    /// hardware probes entirely.
    pub fn active(&self, configured: &str) -> String {
        if !configured.is_empty() && configured != "auto" {
            return configured.to_string();
        }
        resolve_active(configured, &self.enumerate())
    }

    /// Dynamically load a freshly delivered backend library and register
    /// it with the inference runtime.
    pub fn hot_load(&self, path: &Path) -> bool {
        let ok = ggml::load_library(path);
        if ok {
            tracing::info!("GPU backend loaded from {:?}", path);
        } else {
            tracing::warn!("GPU backend at {:?} failed to load", path);
        }
        ok
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register every backend library found next to the executable. Runs once
/// per process, before the first engine is created.
pub fn load_backends_from_exe_dir() {
    static LOADED: Once = Once::new();
    LOADED.call_once(|| {
        if let Some(dir) = config::exe_dir() {
            ggml::load_all_from_path(&dir);
        }
    });
}

/// Platform library filename for a backend id.
pub fn library_file_name(id: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        format!("ggml-{}.dll", id)
    }
    #[cfg(target_os = "macos")]
    {
        format!("libggml-{}.dylib", id)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        format!("libggml-{}.so", id)
    }
}

/// Whether the backend's library sits next to the executable. Windows
/// builds may carry arch suffixes (ggml-cuda-sm75.dll), so a prefix match
/// on `.dll` files is accepted there.
pub fn library_present(exe_dir: &Path, id: &str) -> bool {
    if exe_dir.join(library_file_name(id)).is_file() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        let prefix = format!("ggml-{}", id);
        if let Ok(entries) = std::fs::read_dir(exe_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(&prefix) && name.ends_with(".dll") {
                    return true;
                }
            }
        }
    }

    false
}

/// Pure assembly of the backend table from probe results and library
/// presence; split out so tests can drive it without hardware.
pub fn build_backend_infos(
    det: &GpuDetection,
    present: &dyn Fn(&str) -> bool,
) -> Vec<BackendInfo> {
    let builtin = |id: &str, name: &str| BackendInfo {
        id: id.to_string(),
        name: name.to_string(),
        present: true,
        runtime_available: true,
        hardware_available: true,
        unavailable_reason: String::new(),
        gpu_detected: String::new(),
        download_size: String::new(),
    };

    let mut infos = vec![builtin("auto", "Auto"), builtin("cpu", "CPU")];
    for &(id, name, size) in GPU_BACKENDS {
        infos.push(gpu_backend_info(id, name, size, det, present(id)));
    }
    infos
}

fn gpu_backend_info(
    id: &str,
    name: &str,
    size: &str,
    det: &GpuDetection,
    present: bool,
) -> BackendInfo {
    let mut info = BackendInfo {
        id: id.to_string(),
        name: name.to_string(),
        present,
        runtime_available: false,
        hardware_available: false,
        unavailable_reason: String::new(),
        gpu_detected: String::new(),
        download_size: size.to_string(),
    };

    match id {
        "cuda" => {
            info.hardware_available = det.has_nvidia;
            info.runtime_available = det.cuda_available;
            info.gpu_detected = det.nvidia_model.clone();
            if !det.has_nvidia {
                info.unavailable_reason = "no_hardware".to_string();
            } else if !det.nvidia_driver {
                info.unavailable_reason = "no_driver".to_string();
            } else if !det.cuda_available {
                info.unavailable_reason = "no_runtime".to_string();
            }
        }
        "vulkan" => {
            // The Vulkan loader serves any vendor; no hardware gate
            info.hardware_available = true;
            info.runtime_available = det.vulkan_available;
            if !det.vulkan_available {
                info.unavailable_reason = "no_runtime".to_string();
            }
        }
        "metal" => {
            let on_macos = cfg!(target_os = "macos");
            // Built into the macOS binary, never a separate library
            info.present = on_macos;
            info.hardware_available = on_macos;
            info.runtime_available = on_macos;
            if !on_macos {
                info.unavailable_reason = "no_hardware".to_string();
            }
            return info;
        }
        "rocm" => {
            info.hardware_available = det.has_amd;
            info.runtime_available = det.rocm_available;
            info.gpu_detected = det.amd_model.clone();
            if !det.has_amd {
                info.unavailable_reason = "no_hardware".to_string();
            } else if !det.rocm_available {
                info.unavailable_reason = "no_runtime".to_string();
            }
        }
        "opencl" => {
            info.hardware_available = true;
            info.runtime_available = det.opencl_available;
            if !det.opencl_available {
                info.unavailable_reason = "no_runtime".to_string();
            }
        }
        _ => {}
    }

    if info.unavailable_reason.is_empty() && !info.present {
        info.unavailable_reason = "not_compiled".to_string();
    }
    info
}

/// Resolve the configured backend id to the one engines load with.
pub fn resolve_active(configured: &str, infos: &[BackendInfo]) -> String {
    if !configured.is_empty() && configured != "auto" {
        return configured.to_string();
    }
    infos
        .iter()
        .filter(|info| info.id != "auto" && info.id != "cpu")
        .find(|info| info.usable())
        .map(|info| info.id.clone())
        .unwrap_or_else(|| "cpu".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detection_with_nvidia() -> GpuDetection {
        GpuDetection {
            has_nvidia: true,
            nvidia_driver: true,
            nvidia_model: "NVIDIA RTX 5070 Ti".to_string(),
            cuda_available: true,
            vulkan_available: true,
            ..GpuDetection::default()
        }
    }

    #[test]
    fn test_enumerate_always_has_auto_and_cpu() {
        let infos = build_backend_infos(&GpuDetection::default(), &|_| false);
        assert_eq!(infos[0].id, "auto");
        assert_eq!(infos[1].id, "cpu");
        assert!(infos[0].usable());
        assert!(infos[1].usable());
        assert_eq!(infos.len(), 2 + GPU_BACKENDS.len());
    }

    #[test]
    fn test_cuda_reasons() {
        // No hardware at all
        let infos = build_backend_infos(&GpuDetection::default(), &|_| true);
        let cuda = infos.iter().find(|i| i.id == "cuda").unwrap();
        assert_eq!(cuda.unavailable_reason, "no_hardware");

        // Hardware without kernel driver
        let det = GpuDetection {
            has_nvidia: true,
            ..GpuDetection::default()
        };
        let infos = build_backend_infos(&det, &|_| true);
        let cuda = infos.iter().find(|i| i.id == "cuda").unwrap();
        assert_eq!(cuda.unavailable_reason, "no_driver");

        // Driver without CUDA runtime
        let det = GpuDetection {
            has_nvidia: true,
            nvidia_driver: true,
            ..GpuDetection::default()
        };
        let infos = build_backend_infos(&det, &|_| true);
        let cuda = infos.iter().find(|i| i.id == "cuda").unwrap();
        assert_eq!(cuda.unavailable_reason, "no_runtime");

        // Everything there but library not shipped
        let infos = build_backend_infos(&detection_with_nvidia(), &|_| false);
        let cuda = infos.iter().find(|i| i.id == "cuda").unwrap();
        assert_eq!(cuda.unavailable_reason, "not_compiled");
        assert_eq!(cuda.gpu_detected, "NVIDIA RTX 5070 Ti");

        // Fully usable
        let infos = build_backend_infos(&detection_with_nvidia(), &|_| true);
        let cuda = infos.iter().find(|i| i.id == "cuda").unwrap();
        assert!(cuda.usable());
    }

    #[test]
    fn test_resolve_active_explicit_wins() {
        let infos = build_backend_infos(&GpuDetection::default(), &|_| false);
        assert_eq!(resolve_active("cpu", &infos), "cpu");
        assert_eq!(resolve_active("vulkan", &infos), "vulkan");
    }

    // On macOS the built-in Metal backend is always usable, so the auto
    // fallthrough assertions below only hold elsewhere.
    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_resolve_active_auto() {
        // Nothing usable: cpu
        let infos = build_backend_infos(&GpuDetection::default(), &|_| false);
        assert_eq!(resolve_active("auto", &infos), "cpu");
        assert_eq!(resolve_active("", &infos), "cpu");

        // CUDA present and runnable wins over vulkan
        let infos = build_backend_infos(&detection_with_nvidia(), &|_| true);
        assert_eq!(resolve_active("auto", &infos), "cuda");

        // Only the vulkan library shipped: vulkan wins
        let infos = build_backend_infos(&detection_with_nvidia(), &|id| id == "vulkan");
        assert_eq!(resolve_active("auto", &infos), "vulkan");
    }

    #[test]
    fn test_library_present() {
        let dir = TempDir::new().unwrap();
        assert!(!library_present(dir.path(), "vulkan"));

        std::fs::write(dir.path().join(library_file_name("vulkan")), b"").unwrap();
        assert!(library_present(dir.path(), "vulkan"));
        assert!(!library_present(dir.path(), "cuda"));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_library_present_suffix_glob() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ggml-cuda-sm75.dll"), b"").unwrap();
        assert!(library_present(dir.path(), "cuda"));
    }

    #[test]
    fn test_registry_enumerate_at_dir() {
        let dir = TempDir::new().unwrap();
        let registry = BackendRegistry::at(dir.path().to_path_buf());
        let infos = registry.enumerate();
        assert!(infos.iter().any(|i| i.id == "cpu"));
    }
}
