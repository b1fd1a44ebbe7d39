// src/actuation/dispatcher.rs
//! Worker thread turning actuator commands into servo moves

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::actuation::commands::{ActuatorCommand, Direction};
use crate::config::{ActuationConfig, GameMode, ServoAngles, SystemConfig};
use crate::error::{GameErrorBuilder, GameResult};

/// Servo hardware. Implementations own the serial protocol.
pub trait MotorDriver: Send {
    /// Move `servo` to `angle_deg`
    fn set_angle(&mut self, servo: usize, angle_deg: u8) -> GameResult<()>;
}

/// Player to servo and direction to angle mapping
#[derive(Debug, Clone, PartialEq)]
pub struct ServoMap {
    servos: Vec<ServoAngles>,
}

impl ServoMap {
    pub fn new(servos: Vec<ServoAngles>) -> Self {
        Self { servos }
    }

    /// Inner servo for player 0, outer servo for player 1
    pub fn from_config(config: &ActuationConfig) -> Self {
        Self::new(vec![config.inner_servo, config.outer_servo])
    }

    /// Map for the players of a session. Players beyond the servo count are
    /// reported here once; their moves are skipped by the dispatcher.
    pub fn for_session(config: &SystemConfig) -> Self {
        let map = Self::from_config(&config.actuation);
        let players = match config.session.game_mode {
            GameMode::Game => config.session.num_players,
            GameMode::Analysis => 1,
        };
        for player in map.unmapped_players(players) {
            warn!(player, servos = map.servo_count(), "Player has no servo, moves will not be actuated");
        }
        map
    }

    /// Players among the first `num_players` without a servo
    pub fn unmapped_players(&self, num_players: usize) -> Vec<usize> {
        (self.servos.len()..num_players).collect()
    }

    pub fn servo_count(&self) -> usize {
        self.servos.len()
    }

    /// Target `(servo, angle)` of a move
    pub fn target(&self, player: usize, direction: Direction) -> Option<(usize, u8)> {
        let angles = self.servos.get(player)?;
        let angle = match direction {
            Direction::Left | Direction::Forward => angles.left_deg,
            Direction::Right | Direction::Backward => angles.right_deg,
        };
        Some((player, angle))
    }

    /// Start side of every servo
    pub fn start_positions(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.servos.iter().enumerate().map(|(servo, angles)| (servo, angles.left_deg))
    }
}

/// Driver that only logs, for running without the maze attached
#[derive(Debug, Default, Clone)]
pub struct TracingMotorDriver {
    angles: Arc<Mutex<Vec<Option<u8>>>>,
}

impl TracingMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last angle written per servo
    pub fn angles(&self) -> Vec<Option<u8>> {
        self.angles.lock().clone()
    }
}

impl MotorDriver for TracingMotorDriver {
    fn set_angle(&mut self, servo: usize, angle_deg: u8) -> GameResult<()> {
        info!(servo, angle_deg, "Servo move");
        let mut angles = self.angles.lock();
        if angles.len() <= servo {
            angles.resize(servo + 1, None);
        }
        angles[servo] = Some(angle_deg);
        Ok(())
    }
}

/// Handle of the dispatcher thread
pub struct MotorDispatcher {
    handle: Option<JoinHandle<()>>,
}

impl MotorDispatcher {
    /// Drain `receiver` on a new thread until `End` arrives or every sender
    /// is dropped
    pub fn spawn<D: MotorDriver + 'static>(
        receiver: Receiver<ActuatorCommand>,
        mut driver: D,
        servos: ServoMap,
    ) -> GameResult<Self> {
        let handle = thread::Builder::new()
            .name("motor-dispatcher".to_string())
            .spawn(move || {
                for command in receiver.iter() {
                    if command == ActuatorCommand::End {
                        break;
                    }
                    if let Err(e) = execute(&mut driver, &servos, command) {
                        warn!(token = command.token(), error = %e, "Actuator command failed");
                    }
                }
                // Leave the maze at its start position
                if let Err(e) = execute(&mut driver, &servos, ActuatorCommand::Reset) {
                    warn!(error = %e, "Failed to return servos to start");
                }
                info!("Motor dispatcher stopped");
            })
            .map_err(|e| GameErrorBuilder::new("motor_dispatcher", "spawn").lifecycle(&e.to_string()))?;
        Ok(Self { handle: Some(handle) })
    }

    /// Wait for the thread to finish
    pub fn join(mut self) -> GameResult<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> GameResult<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GameErrorBuilder::new("motor_dispatcher", "join").lifecycle("thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for MotorDispatcher {
    fn drop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            let _ = self.join_inner();
        }
    }
}

fn execute<D: MotorDriver>(driver: &mut D, servos: &ServoMap, command: ActuatorCommand) -> GameResult<()> {
    match command {
        ActuatorCommand::Move(action) => {
            let Some((servo, angle)) = servos.target(action.player, action.direction) else {
                trace!(player = action.player, "Move for unmapped player skipped");
                return Ok(());
            };
            debug!(player = action.player, direction = %action.direction, servo, angle, "Executing move");
            driver.set_angle(servo, angle)
        }
        ActuatorCommand::Reset => {
            for (servo, angle) in servos.start_positions() {
                driver.set_angle(servo, angle)?;
            }
            Ok(())
        }
        ActuatorCommand::End => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::commands::Action;
    use crate::actuation::sink::{channel_sink, ActionSink};

    #[test]
    fn test_servo_map_targets() {
        let map = ServoMap::from_config(&ActuationConfig::default());
        assert_eq!(map.target(0, Direction::Left), Some((0, 80)));
        assert_eq!(map.target(0, Direction::Right), Some((0, 120)));
        assert_eq!(map.target(1, Direction::Forward), Some((1, 120)));
        assert_eq!(map.target(1, Direction::Backward), Some((1, 75)));
        assert_eq!(map.target(2, Direction::Left), None);
    }

    #[test]
    fn test_dispatcher_executes_until_end() {
        let (sink, receiver) = channel_sink(16);
        let driver = TracingMotorDriver::new();
        let dispatcher =
            MotorDispatcher::spawn(receiver, driver.clone(), ServoMap::from_config(&ActuationConfig::default())).unwrap();

        sink.send(
            Action {
                player: 0,
                direction: Direction::Right,
            }
            .into(),
        )
        .unwrap();
        sink.send(
            Action {
                player: 1,
                direction: Direction::Backward,
            }
            .into(),
        )
        .unwrap();
        sink.send(ActuatorCommand::End).unwrap();
        dispatcher.join().unwrap();

        // End returns both servos to their start side
        assert_eq!(driver.angles(), vec![Some(80), Some(120)]);
    }

    #[test]
    fn test_players_without_servo() {
        let mut config = SystemConfig::default();
        config.session.num_players = 4;
        config.session.active_channels = vec![1, 2, 3, 4];
        let map = ServoMap::for_session(&config);
        assert_eq!(map.unmapped_players(config.session.num_players), vec![2, 3]);
        assert!(map.unmapped_players(2).is_empty());

        let (sink, receiver) = channel_sink(8);
        let driver = TracingMotorDriver::new();
        let dispatcher = MotorDispatcher::spawn(receiver, driver.clone(), map).unwrap();
        sink.send(
            Action {
                player: 3,
                direction: Direction::Right,
            }
            .into(),
        )
        .unwrap();
        sink.send(
            Action {
                player: 0,
                direction: Direction::Right,
            }
            .into(),
        )
        .unwrap();
        drop(sink);
        dispatcher.join().unwrap();
        // Player 3's move was skipped; the final reset still reaches both servos
        assert_eq!(driver.angles(), vec![Some(80), Some(120)]);
    }

    #[test]
    fn test_dispatcher_stops_when_senders_drop() {
        let (sink, receiver) = channel_sink(4);
        let driver = TracingMotorDriver::new();
        let dispatcher =
            MotorDispatcher::spawn(receiver, driver.clone(), ServoMap::from_config(&ActuationConfig::default())).unwrap();
        sink.send(
            Action {
                player: 0,
                direction: Direction::Right,
            }
            .into(),
        )
        .unwrap();
        drop(sink);
        dispatcher.join().unwrap();
        assert_eq!(driver.angles()[0], Some(80));
    }
}
