//! Infrastructure layer
//!
//! Handles I/O with the outside world: processes, serial devices, and the
//! filesystem.

pub mod dirs;
pub mod filesystem;
pub mod process;
pub mod serial;
