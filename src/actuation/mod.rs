// src/actuation/mod.rs
//! Maze actuation: action tokens, sinks and the motor dispatcher

pub mod commands;
pub mod dispatcher;
pub mod sink;

pub use commands::*;
pub use dispatcher::*;
pub use sink::*;
