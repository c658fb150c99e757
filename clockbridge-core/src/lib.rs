// lib.rs
#![no_std]

#[macro_use]
pub mod macros;

pub mod button;
pub mod command;
pub mod crc;
pub mod frame;
pub mod protocol;
pub mod status;
pub mod types;

pub use button::{ButtonRing, RepeatMonitor};
pub use command::{Command, CommandId, ParseOutcome, parse_command};
pub use protocol::*;
pub use status::*;
pub use types::*;
