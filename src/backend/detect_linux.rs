//! GPU and runtime detection on Linux
//!
//! Probes are shell-outs and file checks: lspci for hardware,
//! /proc/driver/nvidia for the NVIDIA kernel driver, the dynamic linker
//! cache for runtimes, plus the conventional /opt install roots.

use super::GpuDetection;
use std::process::Command;

pub fn probe() -> GpuDetection {
    let mut det = GpuDetection::default();

    let lspci = lspci_output();

    // NVIDIA hardware and kernel driver
    det.nvidia_driver = file_exists("/proc/driver/nvidia/version");
    det.has_nvidia = det.nvidia_driver || lspci.to_lowercase().contains("nvidia");
    if det.has_nvidia {
        det.nvidia_model = gpu_model_from_lspci(&lspci, &["nvidia"]);
        det.cuda_available =
            ldconfig_has("libcuda.so") || file_exists("/opt/cuda/lib64/libcudart.so");
    }

    // Vulkan loader serves any vendor
    det.vulkan_available = ldconfig_has("libvulkan.so") || file_exists("/usr/lib/libvulkan.so.1");

    // AMD hardware and ROCm
    for line in lspci.lines() {
        let lower = line.to_lowercase();
        if (lower.contains("vga") || lower.contains("display"))
            && (lower.contains("amd") || lower.contains("radeon"))
        {
            det.has_amd = true;
            break;
        }
    }
    if det.has_amd {
        det.amd_model = gpu_model_from_lspci(&lspci, &["amd", "radeon"]);
        det.rocm_available =
            ldconfig_has("libamdhip64.so") || file_exists("/opt/rocm/lib/libamdhip64.so");
    }

    det.opencl_available = ldconfig_has("libOpenCL.so");

    det
}

fn lspci_output() -> String {
    Command::new("lspci")
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
        .unwrap_or_default()
}

fn ldconfig_has(lib: &str) -> bool {
    Command::new("ldconfig")
        .arg("-p")
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(lib))
        .unwrap_or(false)
}

fn file_exists(path: &str) -> bool {
    std::path::Path::new(path).exists()
}

/// Pull a human-readable device name out of an lspci VGA/display line,
/// e.g. "VGA compatible controller: NVIDIA Corporation AD104 ..." →
/// "NVIDIA Corporation AD104 ...".
fn gpu_model_from_lspci(lspci: &str, vendors: &[&str]) -> String {
    for line in lspci.lines() {
        let lower = line.to_lowercase();
        if !(lower.contains("vga") || lower.contains("display") || lower.contains("3d")) {
            continue;
        }
        if vendors.iter().any(|v| lower.contains(v)) {
            if let Some((_, model)) = line.split_once(": ") {
                return model.trim().to_string();
            }
        }
    }
    String::new()
}
