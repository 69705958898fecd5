//! CoreGraphics key posting
//!
//! Events come from an HID-system-state source and are posted at the HID
//! location, the same level as physical keyboard input. They therefore pass
//! through our own session tap again.

use core_graphics::event::{CGEvent, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use crate::tap::KeyChord;

use super::{InjectError, KeyPoster};

pub struct CgKeyPoster;

impl KeyPoster for CgKeyPoster {
    fn post(&self, chord: KeyChord, key_down: bool) -> Result<(), InjectError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InjectError::EventSource)?;

        let event = CGEvent::new_keyboard_event(source, chord.keycode, key_down)
            .map_err(|_| InjectError::EventCreation(chord.keycode))?;

        // Flags must be explicit: the source would otherwise mix in whatever
        // modifiers the user is physically holding
        event.set_flags(chord.modifiers.to_flags());
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}
