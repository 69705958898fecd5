//! Frontmost-application check
//!
//! The owner of the frontmost normal-layer window is looked up in the
//! window server list and compared with the file manager's bundle id.
//! Both lookups work without an AppKit run loop on the calling thread.

/// Bundle identifier of the file manager whose shortcuts are rewritten
const TARGET_BUNDLE_ID: &str = "com.apple.finder";

/// Whether the file manager owns the frontmost window
pub fn is_target_frontmost() -> bool {
    is_target(frontmost_bundle_id().as_deref())
}

fn is_target(bundle_id: Option<&str>) -> bool {
    bundle_id == Some(TARGET_BUNDLE_ID)
}

#[cfg(not(target_os = "macos"))]
fn frontmost_bundle_id() -> Option<String> {
    None
}

#[cfg(target_os = "macos")]
#[allow(deprecated)]
fn frontmost_bundle_id() -> Option<String> {
    use cocoa::base::nil;
    use cocoa::foundation::NSAutoreleasePool;

    let pid = frontmost_window_pid()?;
    unsafe {
        let pool = NSAutoreleasePool::new(nil);
        let bundle_id = bundle_id_for_pid(pid);
        pool.drain();
        bundle_id
    }
}

/// PID owning the first on-screen layer-0 window; the list is front to back
#[cfg(target_os = "macos")]
fn frontmost_window_pid() -> Option<i32> {
    use core_foundation::array::{CFArrayGetCount, CFArrayGetValueAtIndex};
    use core_foundation::base::CFRelease;
    use core_foundation::dictionary::CFDictionaryRef;
    use core_foundation::string::CFString;
    use core_graphics::window::{
        kCGNullWindowID, kCGWindowListExcludeDesktopElements, kCGWindowListOptionOnScreenOnly,
        CGWindowListCopyWindowInfo,
    };

    let pid_key = CFString::new("kCGWindowOwnerPID");
    let layer_key = CFString::new("kCGWindowLayer");

    unsafe {
        let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
        let windows = CGWindowListCopyWindowInfo(options, kCGNullWindowID);
        if windows.is_null() {
            return None;
        }

        let mut owner = None;
        for i in 0..CFArrayGetCount(windows as _) {
            let info = CFArrayGetValueAtIndex(windows as _, i) as CFDictionaryRef;
            if info.is_null() {
                continue;
            }
            // Menus, the menu bar and overlays live above layer 0
            if number_value(info, &layer_key).unwrap_or(0) != 0 {
                continue;
            }
            if let Some(pid) = number_value(info, &pid_key) {
                owner = Some(pid);
                break;
            }
        }

        CFRelease(windows as *const std::ffi::c_void);
        owner
    }
}

#[cfg(target_os = "macos")]
unsafe fn number_value(
    info: core_foundation::dictionary::CFDictionaryRef,
    key: &core_foundation::string::CFString,
) -> Option<i32> {
    use core_foundation::base::{TCFType, ToVoid};
    use core_foundation::dictionary::CFDictionaryGetValue;
    use core_foundation::number::CFNumber;

    let value = CFDictionaryGetValue(info, key.to_void());
    if value.is_null() {
        return None;
    }
    CFNumber::wrap_under_get_rule(value as _).to_i32()
}

/// Must run inside an autorelease pool
#[cfg(target_os = "macos")]
#[allow(deprecated)]
unsafe fn bundle_id_for_pid(pid: i32) -> Option<String> {
    use cocoa::base::{id, nil};
    use cocoa::foundation::NSString;
    use objc::{class, msg_send, sel, sel_impl};

    let app: id = msg_send![
        class!(NSRunningApplication),
        runningApplicationWithProcessIdentifier: pid
    ];
    if app == nil {
        return None;
    }

    let bundle_id: id = msg_send![app, bundleIdentifier];
    if bundle_id == nil {
        return None;
    }

    let cstr = NSString::UTF8String(bundle_id);
    if cstr.is_null() {
        return None;
    }
    Some(std::ffi::CStr::from_ptr(cstr).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_the_file_manager_counts_as_target() {
        assert!(is_target(Some("com.apple.finder")));
        assert!(!is_target(Some("com.apple.Terminal")));
        assert!(!is_target(Some("com.apple.Finder")));
        assert!(!is_target(None));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_never_frontmost_without_window_server() {
        assert!(frontmost_bundle_id().is_none());
        assert!(!is_target_frontmost());
    }
}
