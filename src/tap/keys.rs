//! Key codes, modifier state and key chords
//!
//! Key codes are macOS virtual key codes for the ANSI layout. Only the four
//! chord modifiers are tracked; Caps Lock, Fn and the numeric-pad bit are
//! ignored so they never break an exact match.

#[cfg(target_os = "macos")]
use core_graphics::event::CGEventFlags;

/// Virtual key codes the daemon cares about
pub mod keycode {
    /// kVK_ANSI_X
    pub const X: u16 = 0x07;
    /// kVK_ANSI_C
    pub const C: u16 = 0x08;
    /// kVK_ANSI_V
    pub const V: u16 = 0x09;
}

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
}

/// Which chord modifiers are held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub command: bool,
    pub shift: bool,
    pub option: bool,
    pub control: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        command: false,
        shift: false,
        option: false,
        control: false,
    };

    pub const COMMAND: Modifiers = Modifiers {
        command: true,
        ..Modifiers::NONE
    };

    pub const COMMAND_OPTION: Modifiers = Modifiers {
        command: true,
        option: true,
        ..Modifiers::NONE
    };

    /// Create Modifiers from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(flags: CGEventFlags) -> Self {
        Self {
            command: flags.contains(flags::COMMAND),
            shift: flags.contains(flags::SHIFT),
            option: flags.contains(flags::OPTION),
            control: flags.contains(flags::CONTROL),
        }
    }

    /// CGEventFlags to stamp on a synthetic event
    #[cfg(target_os = "macos")]
    pub fn to_flags(self) -> CGEventFlags {
        let mut out = CGEventFlags::CGEventFlagNull;
        if self.command {
            out |= flags::COMMAND;
        }
        if self.shift {
            out |= flags::SHIFT;
        }
        if self.option {
            out |= flags::OPTION;
        }
        if self.control {
            out |= flags::CONTROL;
        }
        out
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        *self == Modifiers::NONE
    }

    /// Command held and nothing else
    pub fn is_command_only(&self) -> bool {
        *self == Modifiers::COMMAND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

/// A key event as seen at the tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub keycode: u16,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    pub fn key_down(keycode: u16, modifiers: Modifiers) -> Self {
        Self {
            keycode,
            modifiers,
            kind: KeyEventKind::KeyDown,
        }
    }

    #[cfg(test)]
    pub fn key_up(keycode: u16, modifiers: Modifiers) -> Self {
        Self {
            keycode,
            modifiers,
            kind: KeyEventKind::KeyUp,
        }
    }

    pub fn is_key_down(&self) -> bool {
        self.kind == KeyEventKind::KeyDown
    }

    /// `keycode` pressed with Command as the only modifier
    pub fn is_command_chord(&self, keycode: u16) -> bool {
        self.keycode == keycode && self.modifiers.is_command_only()
    }
}

/// A key plus modifiers, pressed and released as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub keycode: u16,
    pub modifiers: Modifiers,
}

impl KeyChord {
    /// Finder's Copy (Cmd+C)
    pub const COPY: KeyChord = KeyChord {
        keycode: keycode::C,
        modifiers: Modifiers::COMMAND,
    };

    /// Finder's "Move Item Here" (Cmd+Option+V)
    pub const MOVE: KeyChord = KeyChord {
        keycode: keycode::V,
        modifiers: Modifiers::COMMAND_OPTION,
    };
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.modifiers;
        for (held, name) in [
            (m.control, "Ctrl+"),
            (m.option, "Opt+"),
            (m.shift, "Shift+"),
            (m.command, "Cmd+"),
        ] {
            if held {
                f.write_str(name)?;
            }
        }
        write!(f, "0x{:02x}", self.keycode)
    }
}
