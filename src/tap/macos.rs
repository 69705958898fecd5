//! CGEventTap backend
//!
//! The tap lives on a dedicated thread with its own CFRunLoop. Consumed
//! events are returned as `CallbackResult::Drop`, which CoreGraphics turns
//! into a NULL event so the keystroke never reaches the foreground app.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPortRef;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult, EventField,
};
use tracing::{error, info, warn};

use super::keys::{KeyEvent, Modifiers};
use super::router::{EventRouter, Verdict};
use super::{EventTap, TapError, TapHandle};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// How often the tap thread checks whether it should exit
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

pub struct CgEventTap;

impl EventTap for CgEventTap {
    fn install(&self, router: Arc<EventRouter>) -> Result<Box<dyn TapHandle>, TapError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = sync_channel(1);

        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || {
                info!("event tap thread started");

                if let Err(e) = run_event_loop(router, Arc::clone(&thread_running), ready_tx) {
                    error!(?e, "event tap error");
                }

                thread_running.store(false, Ordering::SeqCst);
                info!("event tap thread stopped");
            })
            .map_err(|e| TapError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CgTapHandle {
                running,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(TapError::ThreadExited),
        }
    }
}

struct CgTapHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TapHandle for CgTapHandle {
    fn stop(mut self: Box<Self>) {
        self.running.store(false, Ordering::SeqCst);
        // The thread notices within one run loop slice and tears the tap
        // down itself; until then its callback passes everything through.
        drop(self.thread.take());
    }
}

/// Create the tap, report readiness, then spin the run loop until stopped
fn run_event_loop(
    router: Arc<EventRouter>,
    running: Arc<AtomicBool>,
    ready: SyncSender<Result<(), TapError>>,
) -> Result<(), TapError> {
    // Needed to re-enable the tap from inside its own callback
    let port: Arc<AtomicPtr<c_void>> = Arc::new(AtomicPtr::new(std::ptr::null_mut()));

    let cb_running = Arc::clone(&running);
    let cb_port = Arc::clone(&port);
    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![CGEventType::KeyDown],
        move |_proxy, event_type, event| match event_type {
            CGEventType::KeyDown => {
                if !cb_running.load(Ordering::SeqCst) {
                    return CallbackResult::Keep;
                }

                let keycode =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                let modifiers = Modifiers::from_flags(event.get_flags());

                match router.route(&KeyEvent::key_down(keycode, modifiers)) {
                    Verdict::Keep => CallbackResult::Keep,
                    Verdict::Drop => CallbackResult::Drop,
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let p = cb_port.load(Ordering::SeqCst) as CFMachPortRef;
                if !p.is_null() && cb_running.load(Ordering::SeqCst) {
                    warn!(?event_type, "event tap disabled by the system, re-enabling");
                    unsafe { CGEventTapEnable(p, true) };
                }
                CallbackResult::Keep
            }
            _ => CallbackResult::Keep,
        },
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready.send(Err(TapError::EventTapCreation));
            return Err(TapError::EventTapCreation);
        }
    };

    let raw_port = tap.mach_port().as_concrete_TypeRef();
    port.store(raw_port as *mut c_void, Ordering::SeqCst);

    let run_loop_source = match tap.mach_port().create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.send(Err(TapError::RunLoopSource));
            return Err(TapError::RunLoopSource);
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!("event tap created and enabled");
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }
    }

    unsafe {
        CGEventTapEnable(raw_port, false);
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    port.store(std::ptr::null_mut(), Ordering::SeqCst);

    // Tap is released when it goes out of scope
    Ok(())
}
