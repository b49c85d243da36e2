//! Gonsole CLI library.
//!
//! Configuration, the interactive line editor, script playback and the
//! playground client used by the `gonsole` binary.

pub mod colors;
pub mod config;
pub mod playground;
pub mod repl;
pub mod script;
