// src/actuation/commands.rs
//! Action tokens exchanged with the maze controller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete maze tilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Forward,
    Backward,
}

impl Direction {
    pub fn token(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Binary per-player toggle flipped on every confirmed peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Initial,
    Opposite,
}

impl Position {
    pub fn flipped(self) -> Self {
        match self {
            Position::Initial => Position::Opposite,
            Position::Opposite => Position::Initial,
        }
    }
}

/// Which pair of directions a player controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionAxis {
    LeftRight,
    ForwardBackward,
}

impl ActionAxis {
    /// Even players steer left/right, odd players forward/backward
    pub fn for_player(player: usize) -> Self {
        if player % 2 == 0 {
            ActionAxis::LeftRight
        } else {
            ActionAxis::ForwardBackward
        }
    }

    pub fn direction(self, position: Position) -> Direction {
        match (self, position) {
            (ActionAxis::LeftRight, Position::Initial) => Direction::Left,
            (ActionAxis::LeftRight, Position::Opposite) => Direction::Right,
            (ActionAxis::ForwardBackward, Position::Initial) => Direction::Forward,
            (ActionAxis::ForwardBackward, Position::Opposite) => Direction::Backward,
        }
    }
}

/// One player's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub player: usize,
    pub direction: Direction,
}

/// Tokens understood by the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorCommand {
    Move(Action),
    /// Return every servo to its start side
    Reset,
    /// Shut the actuator down
    End,
}

impl ActuatorCommand {
    pub fn token(&self) -> &'static str {
        match self {
            ActuatorCommand::Move(action) => action.direction.token(),
            ActuatorCommand::Reset => "reset",
            ActuatorCommand::End => "end",
        }
    }
}

impl From<Action> for ActuatorCommand {
    fn from(action: Action) -> Self {
        ActuatorCommand::Move(action)
    }
}
