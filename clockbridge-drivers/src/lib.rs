#![no_std]

pub mod channels;
pub mod dgt3000;

pub use dgt3000::{Dgt3000Link, LINK_RX, LISTEN_ADDRESS};
