// src/acquisition/mod.rs
//! Sample windowing and result handoff

pub mod channel_buffer;
pub mod mailbox;

pub use channel_buffer::*;
pub use mailbox::*;
