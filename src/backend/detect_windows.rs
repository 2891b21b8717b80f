//! GPU and runtime detection on Windows
//!
//! Hardware comes from the WMI video controller list; CUDA is probed via
//! the environment, the registry and the standard install root; Vulkan and
//! OpenCL are loader DLLs in System32.

use super::GpuDetection;
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn probe() -> GpuDetection {
    let mut det = GpuDetection::default();

    let gpu_names = query_gpu_names();
    let lower = gpu_names.to_lowercase();

    det.has_nvidia = lower.contains("nvidia");
    // The controller only shows up in WMI with a driver installed
    det.nvidia_driver = det.has_nvidia;
    if det.has_nvidia {
        det.nvidia_model = first_name_containing(&gpu_names, "nvidia");
        det.cuda_available = cuda_installed();
    }

    det.has_amd = lower.contains("amd") || lower.contains("radeon");
    if det.has_amd {
        det.amd_model = first_name_containing(&gpu_names, "amd");
        if det.amd_model.is_empty() {
            det.amd_model = first_name_containing(&gpu_names, "radeon");
        }
        det.rocm_available = std::env::var("HIP_PATH").is_ok();
    }

    let sys32 = system32();
    det.vulkan_available = sys32.join("vulkan-1.dll").exists();
    det.opencl_available = sys32.join("OpenCL.dll").exists();

    det
}

fn system32() -> PathBuf {
    let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
    Path::new(&root).join("System32")
}

/// One video controller name per line.
fn query_gpu_names() -> String {
    Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name",
        ])
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
        .unwrap_or_default()
}

fn first_name_containing(names: &str, needle: &str) -> String {
    names
        .lines()
        .map(str::trim)
        .find(|line| line.to_lowercase().contains(needle))
        .unwrap_or_default()
        .to_string()
}

/// CUDA toolkit probe: environment, registry, then a scan of the standard
/// install root.
fn cuda_installed() -> bool {
    if std::env::var("CUDA_PATH").is_ok() {
        return true;
    }

    let reg = Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\NVIDIA Corporation\GPU Computing Toolkit\CUDA",
        ])
        .output();
    if let Ok(out) = reg {
        if out.status.success() {
            return true;
        }
    }

    let root = std::env::var("ProgramFiles").unwrap_or_else(|_| r"C:\Program Files".to_string());
    let install_root = Path::new(&root).join("NVIDIA GPU Computing Toolkit").join("CUDA");
    std::fs::read_dir(install_root)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
