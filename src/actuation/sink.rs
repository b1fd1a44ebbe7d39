// src/actuation/sink.rs
//! Fire-and-forget delivery of actuator commands

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::actuation::commands::ActuatorCommand;
use crate::error::{GameErrorBuilder, GameResult};

/// Receiver of actuator commands. `send` must not block the caller.
pub trait ActionSink: Send + Sync {
    fn send(&self, command: ActuatorCommand) -> GameResult<()>;
}

/// Bounded channel into a dispatcher thread. A full queue drops the command
/// with a warning rather than stalling the processing loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<ActuatorCommand>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ActuatorCommand>) -> Self {
        Self { sender }
    }
}

/// Bounded sink and the receiving end for a dispatcher
pub fn channel_sink(capacity: usize) -> (ChannelSink, Receiver<ActuatorCommand>) {
    let (sender, receiver) = channel::bounded(capacity.max(1));
    (ChannelSink::new(sender), receiver)
}

impl ActionSink for ChannelSink {
    fn send(&self, command: ActuatorCommand) -> GameResult<()> {
        match self.sender.try_send(command) {
            Ok(()) => {
                debug!(token = command.token(), "Actuator command queued");
                Ok(())
            }
            Err(TrySendError::Full(command)) => {
                warn!(token = command.token(), "Actuator queue full, command dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(GameErrorBuilder::new("actuator", "send")
                .lifecycle("dispatcher has shut down")),
        }
    }
}

/// Keeps every command in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<ActuatorCommand>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.commands.lock().clone()
    }

    pub fn tokens(&self) -> Vec<&'static str> {
        self.commands.lock().iter().map(|c| c.token()).collect()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl ActionSink for RecordingSink {
    fn send(&self, command: ActuatorCommand) -> GameResult<()> {
        self.commands.lock().push(command);
        Ok(())
    }
}
