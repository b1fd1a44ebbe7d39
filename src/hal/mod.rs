// src/hal/mod.rs
//! Hardware abstraction layer for acquisition boards

pub mod provider;
pub mod synthetic;
pub mod traits;
pub mod types;

pub use provider::*;
pub use synthetic::*;
pub use traits::*;
pub use types::*;

use parking_lot::Mutex;
use std::sync::Arc;

/// Board handle shared by the session and its processing thread
pub type SharedBoard = Arc<Mutex<Box<dyn BoardSource>>>;
