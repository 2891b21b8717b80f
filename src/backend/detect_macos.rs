//! GPU and runtime detection on macOS
//!
//! Metal is a given on every supported macOS; the only probes are MoltenVK
//! (for Vulkan) and older Macs carrying AMD discrete GPUs. Apple dropped
//! NVIDIA support after 10.14, so CUDA never detects here.

use super::GpuDetection;
use std::process::Command;

pub fn probe() -> GpuDetection {
    let mut det = GpuDetection::default();

    det.vulkan_available = file_exists("/usr/local/lib/libvulkan.dylib")
        || file_exists("/usr/local/lib/libMoltenVK.dylib");

    if let Ok(out) = Command::new("system_profiler")
        .arg("SPDisplaysDataType")
        .output()
    {
        let text = String::from_utf8_lossy(&out.stdout).into_owned();
        let lower = text.to_lowercase();
        if lower.contains("amd") || lower.contains("radeon") {
            det.has_amd = true;
            det.amd_model = chipset_model(&text);
        }
    }

    // OpenCL ships with the OS (deprecated but present)
    det.opencl_available = true;

    det
}

fn file_exists(path: &str) -> bool {
    std::path::Path::new(path).exists()
}

/// "Chipset Model: AMD Radeon Pro 5500M" → "AMD Radeon Pro 5500M"
fn chipset_model(profiler_output: &str) -> String {
    profiler_output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("Chipset Model:"))
        .map(str::trim)
        .find(|model| {
            let lower = model.to_lowercase();
            lower.contains("amd") || lower.contains("radeon")
        })
        .unwrap_or_default()
        .to_string()
}
