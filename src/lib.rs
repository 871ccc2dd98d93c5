// Input manager library
//
// Maps raw device controls onto per-player button states. See `input` for
// the overview.

pub mod input;
pub mod util;

pub use input::{Button, InputError, InputManager, Signal, Target};
