// src/session.rs
//! Session lifecycle: settings, board, model and the processing thread
//!
//! `BrainGame` owns the applied settings (the rollback target), the pending
//! settings, the prepared board and, while a game runs, the processing
//! thread. The processing thread owns the model handle, so the model is
//! released exactly once on whatever path ends the loop.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::acquisition::{Mailbox, MailboxReceiver};
use crate::actuation::{ActionSink, ActuatorCommand};
use crate::config::constants::board::{CHANNEL_OFF_SETTINGS, CHANNEL_ON_SETTINGS};
use crate::config::{ModelConfig, SystemConfig};
use crate::error::{GameError, GameErrorBuilder, GameResult};
use crate::hal::{BoardDescriptor, BoardProvider, BoardSource, SharedBoard};
use crate::processing::focus::{build_model, FocusModel, ModelHandle};
use crate::processing::game_loop::{CarryOver, GameLoop, TickResult};
use crate::utils::time::{SystemTimeProvider, TickRateMeter, TimeProvider};

/// Builds an unprepared model from the model settings
pub type ModelFactory = Box<dyn Fn(&ModelConfig) -> GameResult<Box<dyn FocusModel>> + Send + Sync>;

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Everything the processing thread owns
struct ProcessingContext {
    game: GameLoop,
    model: ModelHandle,
    board: SharedBoard,
    mailbox: Mailbox<TickResult>,
    sink: Arc<dyn ActionSink>,
    running: Arc<AtomicBool>,
    interval: Duration,
    carry_over: Arc<Mutex<Option<CarryOver>>>,
    time_provider: Arc<dyn TimeProvider>,
}

pub struct BrainGame {
    provider: Arc<dyn BoardProvider>,
    sink: Arc<dyn ActionSink>,
    time_provider: Arc<dyn TimeProvider>,
    model_factory: ModelFactory,
    applied: Option<SystemConfig>,
    pending: SystemConfig,
    board: Option<SharedBoard>,
    mailbox: Mailbox<TickResult>,
    worker: Option<Worker>,
    carry_over: Arc<Mutex<Option<CarryOver>>>,
}

impl BrainGame {
    pub fn new(provider: Arc<dyn BoardProvider>, sink: Arc<dyn ActionSink>) -> Self {
        Self {
            provider,
            sink,
            time_provider: Arc::new(SystemTimeProvider),
            model_factory: Box::new(build_model),
            applied: None,
            pending: SystemConfig::default(),
            board: None,
            mailbox: Mailbox::new(),
            worker: None,
            carry_over: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn with_model_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ModelConfig) -> GameResult<Box<dyn FocusModel>> + Send + Sync + 'static,
    {
        self.model_factory = Box::new(factory);
        self
    }

    /// Settings of the currently prepared board, if any were applied
    pub fn applied_settings(&self) -> Option<&SystemConfig> {
        self.applied.as_ref()
    }

    pub fn pending_settings(&self) -> &SystemConfig {
        &self.pending
    }

    pub fn set_pending(&mut self, settings: SystemConfig) {
        self.pending = settings;
    }

    pub fn is_board_prepared(&self) -> bool {
        self.board.as_ref().is_some_and(|b| b.lock().is_prepared())
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::Acquire) && !w.handle.is_finished())
    }

    /// Tear down any running session and prepare a board for `settings`.
    ///
    /// Returns `false` when the board cannot be opened, prepared or
    /// configured. The previously applied settings stay in place as the
    /// rollback target; see [`rollback`](Self::rollback).
    pub fn apply_settings(&mut self, settings: SystemConfig) -> bool {
        self.pending = settings.clone();
        if self.applied.as_ref() == Some(&settings) && self.is_board_prepared() {
            debug!("Apply settings: unchanged");
            return true;
        }

        if let Err(e) = self.stop_game() {
            warn!(error = %e, "Apply settings: previous session did not shut down cleanly");
        }

        match self.prepare_board(&settings) {
            Ok(board) => {
                info!(board = %settings.board.board_id, channels = ?settings.session.active_channels, "Settings applied");
                self.board = Some(board);
                self.applied = Some(settings);
                true
            }
            Err(e) => {
                warn!(board = %settings.board.board_id, error = %e, "Apply settings failed");
                false
            }
        }
    }

    /// Re-apply the last settings that prepared a board successfully
    pub fn rollback(&mut self) -> bool {
        match self.applied.clone() {
            Some(previous) => self.apply_settings(previous),
            None => {
                warn!("Rollback: no settings were ever applied");
                false
            }
        }
    }

    /// Reset the pending settings to the applied ones
    pub fn discard_settings(&mut self) {
        self.pending = self.applied.clone().unwrap_or_default();
        info!("Settings discarded");
    }

    fn prepare_board(&self, settings: &SystemConfig) -> GameResult<SharedBoard> {
        settings
            .validate()
            .map_err(|errors| GameError::configuration("session", errors.join("; ")))?;

        let mut board = self.provider.open(&settings.board)?;
        board.prepare_session()?;
        info!(board = %board.descriptor().name, "Board session prepared");

        if let Err(e) = configure_board(board.as_mut(), settings) {
            if let Err(release) = board.release_session() {
                warn!(error = %release, "Failed to release board after a configuration error");
            }
            return Err(e);
        }
        Ok(Arc::new(Mutex::new(board)))
    }

    /// Start streaming and spawn the processing thread.
    ///
    /// Applies the pending settings first when no board is prepared. With
    /// `fresh_start == false` the channel window and focus histories of the
    /// previous run are carried over.
    pub fn start_game(&mut self, fresh_start: bool) -> GameResult<()> {
        if self.is_running() {
            return Err(GameErrorBuilder::new("session", "start_game").invalid_state("game is already running"));
        }
        if let Some(worker) = self.worker.take() {
            // Loop ended on its own (acquisition failure); reap it
            join_worker(worker);
        }

        let needs_apply = self.applied.as_ref() != Some(&self.pending) || !self.is_board_prepared();
        if needs_apply {
            info!("Start game: applying settings first");
            if !self.apply_settings(self.pending.clone()) {
                return Err(GameError::configuration("session", "settings could not be applied"));
            }
        }

        let (Some(config), Some(board)) = (self.applied.clone(), self.board.clone()) else {
            return Err(GameErrorBuilder::new("session", "start_game").invalid_state("no board is prepared"));
        };

        let descriptor = {
            let mut guard = board.lock();
            guard.start_stream(config.board.stream_buffer_size, &config.board.streamer_params)?;
            guard.descriptor().clone()
        };

        match self.spawn_processing(&config, &descriptor, board.clone(), fresh_start) {
            Ok(worker) => {
                self.worker = Some(worker);
                info!(fresh_start, mode = ?config.session.game_mode, "Game started");
                Ok(())
            }
            Err(e) => {
                if let Err(stop) = board.lock().stop_stream() {
                    warn!(error = %stop, "Failed to stop stream after a failed start");
                }
                error!(error = %e, "Start game failed");
                Err(e)
            }
        }
    }

    fn spawn_processing(
        &mut self,
        config: &SystemConfig,
        descriptor: &BoardDescriptor,
        board: SharedBoard,
        fresh_start: bool,
    ) -> GameResult<Worker> {
        let model = ModelHandle::prepare((self.model_factory)(&config.processing.model)?)?;

        let carry = if fresh_start {
            self.carry_over.lock().take();
            None
        } else {
            self.carry_over.lock().clone()
        };
        let game = GameLoop::new(config, descriptor, carry.as_ref(), self.time_provider.clone())?;

        self.mailbox.reopen();
        let running = Arc::new(AtomicBool::new(true));
        let context = ProcessingContext {
            game,
            model,
            board,
            mailbox: self.mailbox.clone(),
            sink: self.sink.clone(),
            running: running.clone(),
            interval: Duration::from_millis(config.session.update_interval_ms),
            carry_over: self.carry_over.clone(),
            time_provider: self.time_provider.clone(),
        };

        let handle = thread::Builder::new()
            .name("braingame-processing".to_string())
            .spawn(move || run_processing(context))
            .map_err(|e| {
                self.mailbox.close();
                GameErrorBuilder::new("session", "spawn").lifecycle(&e.to_string())
            })?;
        Ok(Worker { running, handle })
    }

    /// Stop the processing thread, return the maze to its start position and
    /// release the board. Every step runs even when an earlier one fails; the
    /// first failure is returned.
    pub fn stop_game(&mut self) -> GameResult<()> {
        let mut first_error: Option<GameError> = None;

        match self.worker.take() {
            Some(worker) => {
                worker.running.store(false, Ordering::Release);
                self.mailbox.close();
                if !join_worker(worker) {
                    first_error.get_or_insert(
                        GameErrorBuilder::new("session", "stop_game").lifecycle("processing thread panicked"),
                    );
                }
                info!("Stop game: processing stopped");

                if let Err(e) = self.sink.send(ActuatorCommand::Reset) {
                    warn!(error = %e, "Stop game: reset command not delivered");
                }
            }
            None => debug!("Stop game: no game is running"),
        }

        if let Some(board) = self.board.take() {
            let mut board = board.lock();
            if let Err(e) = board.stop_stream() {
                debug!(error = %e, "Stop game: stream was not running");
            }
            if board.is_prepared() {
                match board.release_session() {
                    Ok(()) => info!("Stop game: board released"),
                    Err(e) => {
                        warn!(error = %e, "Stop game: board release failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop and start again, keeping the focus history
    pub fn restart_game(&mut self) -> GameResult<()> {
        self.stop_game()?;
        self.start_game(false)
    }

    /// Stop the game and shut the actuator down
    pub fn quit(&mut self) -> GameResult<()> {
        let stopped = self.stop_game();
        if let Err(e) = self.sink.send(ActuatorCommand::End) {
            warn!(error = %e, "Quit: end command not delivered");
        }
        info!("Session closed");
        stopped
    }

    /// Receiver for tick results published after this call. The receiver
    /// stays valid across start, stop and restart: `recv` blocks until a new
    /// tick arrives and fails with `Closed` once the game stops.
    pub fn subscribe(&self) -> MailboxReceiver<TickResult> {
        self.mailbox.subscribe()
    }

    /// Most recent tick result, without waiting
    pub fn latest_result(&self) -> Option<Arc<TickResult>> {
        self.mailbox.latest()
    }

    /// State saved when the last game stopped
    pub fn carry_over(&self) -> Option<CarryOver> {
        self.carry_over.lock().clone()
    }
}

impl Drop for BrainGame {
    fn drop(&mut self) {
        if let Err(e) = self.stop_game() {
            warn!(error = %e, "Session dropped with cleanup errors");
        }
    }
}

/// Differential mode for boards that support it: active channels powered up
/// in normal input mode, every other channel powered down
fn configure_board(board: &mut dyn BoardSource, settings: &SystemConfig) -> GameResult<()> {
    let descriptor = board.descriptor().clone();
    if let Err(errors) = settings.validate_for_board(&descriptor) {
        return Err(GameError::configuration("session", errors.join("; ")));
    }
    if !descriptor.board_id.supports_differential_mode() {
        return Ok(());
    }

    let command = differential_mode_command(descriptor.eeg_rows.len(), &settings.session.active_channels);
    let reply = board.config_board(&command)?;
    info!(command = %command, reply = %reply, "Differential mode set");
    Ok(())
}

/// Channel settings string, channels numbered from 1
pub fn differential_mode_command(channel_count: usize, active_channels: &[usize]) -> String {
    (1..=channel_count)
        .map(|ch| {
            let settings = if active_channels.contains(&ch) {
                CHANNEL_ON_SETTINGS
            } else {
                CHANNEL_OFF_SETTINGS
            };
            format!("x{}{}", ch, settings)
        })
        .collect()
}

/// Returns `false` when the thread panicked
fn join_worker(worker: Worker) -> bool {
    match worker.handle.join() {
        Ok(()) => true,
        Err(_) => {
            error!("Processing thread panicked");
            false
        }
    }
}

fn run_processing(context: ProcessingContext) {
    let ProcessingContext {
        mut game,
        mut model,
        board,
        mailbox,
        sink,
        running,
        interval,
        carry_over,
        time_provider,
    } = context;

    info!(model = model.name(), players = game.player_count(), "Processing loop started");
    let mut meter = TickRateMeter::new();

    while running.load(Ordering::Acquire) {
        let outcome = {
            let mut board = board.lock();
            game.tick(&mut **board, &mut model)
        };

        match outcome {
            Ok(Some(tick)) => {
                for action in &tick.actions {
                    if let Err(e) = sink.send((*action).into()) {
                        warn!(error = %e, token = action.direction.token(), "Action not delivered");
                    }
                }
                if let Some(rate) = meter.tick(time_provider.now_nanos()) {
                    trace!(rate_hz = rate, "Tick rate");
                }
                mailbox.publish(tick);
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable() => warn!(error = %e, "Tick skipped"),
            Err(e) => {
                error!(error = %e, "Processing loop stopped");
                break;
            }
        }

        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    running.store(false, Ordering::Release);
    *carry_over.lock() = Some(game.carry_over());
    mailbox.close();
    if let Err(e) = model.release() {
        warn!(error = %e, "Model release failed");
    }
    info!(
        ticks = game.metrics().ticks_processed,
        actions = game.metrics().actions_emitted,
        "Processing loop exited"
    );
}
