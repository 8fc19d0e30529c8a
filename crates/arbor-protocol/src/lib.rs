//! Arbor Protocol - wire commands and addressing
//!
//! Defines the plain-text command protocol spoken between Arbor nodes:
//! `"<hash> <KEYWORD> <arg>..."`, optionally suffixed with
//! `"@<hex signature>"` when payload authenticity is enabled.

pub mod command;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod types;

pub use command::*;
pub use constants::*;
pub use error::*;
pub use types::*;
