//! Accessibility permission check

#[cfg(target_os = "macos")]
#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// Whether this process may observe and post system input
#[cfg(target_os = "macos")]
pub fn is_process_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

#[cfg(not(target_os = "macos"))]
pub fn is_process_trusted() -> bool {
    false
}
