//! Key-down classification
//!
//! Pure decision over one event, the external signals and the current cut
//! mode. Runs on the tap callback thread so it only compares values.

use super::keys::{keycode, KeyEvent};

/// External preconditions, snapshotted per event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub authorized: bool,
    pub feature_enabled: bool,
    pub target_focused: bool,
}

impl Context {
    pub fn all_met(&self) -> bool {
        self.authorized && self.feature_enabled && self.target_focused
    }
}

/// Work scheduled after an event has been swallowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Simulate copy, then arm cut mode once it settled
    BeginCut,
    /// Disarm cut mode, then simulate the move shortcut
    CompleteMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Deliver the event untouched
    PassThrough,
    /// Deliver the event untouched and abandon any armed cut
    PassThroughClearingCut,
    /// Swallow the event and run the effect
    Consume(Effect),
}

#[cfg(test)]
impl Classification {
    pub fn consumes(&self) -> bool {
        matches!(self, Classification::Consume(_))
    }
}

/// Decide what to do with `event`. First matching rule wins.
pub fn classify(event: &KeyEvent, context: Context, cut_active: bool) -> Classification {
    if !event.is_key_down() || !context.all_met() {
        return Classification::PassThrough;
    }

    if event.is_command_chord(keycode::X) {
        return Classification::Consume(Effect::BeginCut);
    }

    if event.is_command_chord(keycode::V) && cut_active {
        return Classification::Consume(Effect::CompleteMove);
    }

    // The real copy still has to reach the file manager
    if event.is_command_chord(keycode::C) {
        return Classification::PassThroughClearingCut;
    }

    Classification::PassThrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tap::keys::{KeyChord, Modifiers};

    const READY: Context = Context {
        authorized: true,
        feature_enabled: true,
        target_focused: true,
    };

    fn all_modifier_sets() -> Vec<Modifiers> {
        let mut sets = Vec::new();
        for bits in 0u8..16 {
            sets.push(Modifiers {
                command: bits & 1 != 0,
                shift: bits & 2 != 0,
                option: bits & 4 != 0,
                control: bits & 8 != 0,
            });
        }
        sets
    }

    #[test]
    fn test_unmet_preconditions_always_pass_through() {
        let contexts = [
            Context {
                authorized: false,
                ..READY
            },
            Context {
                feature_enabled: false,
                ..READY
            },
            Context {
                target_focused: false,
                ..READY
            },
        ];

        for context in contexts {
            for code in 0u16..128 {
                for modifiers in all_modifier_sets() {
                    for cut_active in [false, true] {
                        let event = KeyEvent::key_down(code, modifiers);
                        assert_eq!(
                            classify(&event, context, cut_active),
                            Classification::PassThrough,
                            "{context:?} {code} {modifiers:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_key_up_passes_through() {
        let event = KeyEvent::key_up(keycode::X, Modifiers::COMMAND);
        assert_eq!(classify(&event, READY, false), Classification::PassThrough);
    }

    #[test]
    fn test_cmd_x_begins_cut() {
        let event = KeyEvent::key_down(keycode::X, Modifiers::COMMAND);
        for cut_active in [false, true] {
            assert_eq!(
                classify(&event, READY, cut_active),
                Classification::Consume(Effect::BeginCut)
            );
        }
    }

    #[test]
    fn test_compound_x_shortcuts_pass_through() {
        for modifiers in all_modifier_sets() {
            if modifiers.is_command_only() {
                continue;
            }
            let event = KeyEvent::key_down(keycode::X, modifiers);
            assert_eq!(classify(&event, READY, false), Classification::PassThrough);
        }
    }

    #[test]
    fn test_cmd_v_without_cut_is_plain_paste() {
        let event = KeyEvent::key_down(keycode::V, Modifiers::COMMAND);
        assert_eq!(classify(&event, READY, false), Classification::PassThrough);
    }

    #[test]
    fn test_cmd_v_with_cut_completes_move() {
        let event = KeyEvent::key_down(keycode::V, Modifiers::COMMAND);
        let result = classify(&event, READY, true);
        assert_eq!(result, Classification::Consume(Effect::CompleteMove));
        assert!(result.consumes());
    }

    #[test]
    fn test_synthetic_move_is_not_a_second_paste() {
        let event = KeyEvent::key_down(KeyChord::MOVE.keycode, KeyChord::MOVE.modifiers);
        assert_eq!(classify(&event, READY, true), Classification::PassThrough);
    }

    #[test]
    fn test_cmd_c_clears_without_consuming() {
        let event = KeyEvent::key_down(keycode::C, Modifiers::COMMAND);
        for cut_active in [false, true] {
            let result = classify(&event, READY, cut_active);
            assert_eq!(result, Classification::PassThroughClearingCut);
            assert!(!result.consumes());
        }
    }

    #[test]
    fn test_plain_typing_passes_through() {
        for code in [keycode::X, keycode::C, keycode::V] {
            let event = KeyEvent::key_down(code, Modifiers::NONE);
            assert_eq!(classify(&event, READY, true), Classification::PassThrough);
        }
    }
}
