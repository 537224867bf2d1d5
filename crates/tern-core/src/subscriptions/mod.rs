//! Built-in subscription sources.
//!
//! - **Timers** ([`tick`], [`after`]) -- a fixed-rate repeating timer and a
//!   one-shot delay.
//! - **Files** ([`watch_file`]) -- emits a file's contents whenever they
//!   change.
//! - **Keyboard** ([`key_press`]) -- decoded key presses from the terminal.
//!
//! Combine several with [`merge`](crate::subscription::merge).

mod file;
mod terminal;
mod timer;

pub use file::*;
pub use terminal::*;
pub use timer::*;
