//! Subcommand implementations.
//!
//! Every command returns a process exit code: 0 full success, 1 partial
//! failure, 2 configuration error.

pub mod convert;
pub mod scan;
pub mod submit;
pub mod wait;

pub const EXIT_OK: u8 = 0;
pub const EXIT_PARTIAL: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
