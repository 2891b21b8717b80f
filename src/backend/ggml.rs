//! ggml dynamic backend loading
//!
//! The CPU backend is statically linked through whisper-rs. GPU backends
//! (CUDA, Vulkan, ...) are optional shared libraries dropped next to the
//! executable and registered into the ggml runtime at startup, or hot-
//! loaded right after the installer collaborator downloads one. The two
//! entry points below are exported by the ggml that whisper-rs links.

use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::path::Path;

extern "C" {
    fn ggml_backend_load(path: *const c_char) -> *mut c_void;
    fn ggml_backend_load_all_from_path(dir: *const c_char);
}

/// Scan a directory for backend libraries and register every one found.
/// Missing or empty directories are fine; only the CPU backend remains.
pub fn load_all_from_path(dir: &Path) {
    let Some(dir_str) = dir.to_str() else {
        return;
    };
    let Ok(c_dir) = CString::new(dir_str) else {
        return;
    };
    unsafe {
        ggml_backend_load_all_from_path(c_dir.as_ptr());
    }
}

/// Load and register a single backend library. Returns whether the ggml
/// runtime accepted it.
pub fn load_library(path: &Path) -> bool {
    let Some(path_str) = path.to_str() else {
        return false;
    };
    let Ok(c_path) = CString::new(path_str) else {
        return false;
    };
    let reg = unsafe { ggml_backend_load(c_path.as_ptr()) };
    !reg.is_null()
}
