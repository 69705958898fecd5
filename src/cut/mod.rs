//! Cut mode state
//!
//! Two states:
//! - Inactive: nothing armed, Cmd+V is an ordinary paste
//! - Active: a cut was taken, the next Cmd+V becomes a move

mod machine;
mod operation;

pub use machine::CutStateMachine;

