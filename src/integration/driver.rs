//! Host loop for a reading session
//!
//! Engines are passive: they say when they next need attention and do their
//! work when polled. `SessionDriver` owns one engine and runs it on a single
//! tokio task, waking for whichever comes first: the engine's next deadline
//! or a command from the UI. Nothing else touches the engine while it runs,
//! so a tick can never overlap a user action.

use crate::playback::state::PlaybackController;
use crate::{ReaderError, Result};
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

type EngineFn<E> = Box<dyn FnOnce(&mut E) -> Result<()> + Send>;

/// Commands accepted by a running session
pub enum DriverCommand<E> {
    /// Toggle playing and paused
    PlayPause,

    /// Reset the engine
    Reset,

    /// Change the engine rate
    SetRate(f64),

    /// Run an engine-specific action, e.g. a skip
    Apply(EngineFn<E>),

    /// Tear the session down and stop the loop
    Shutdown,
}

impl<E> std::fmt::Debug for DriverCommand<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverCommand::PlayPause => write!(f, "PlayPause"),
            DriverCommand::Reset => write!(f, "Reset"),
            DriverCommand::SetRate(rate) => write!(f, "SetRate({})", rate),
            DriverCommand::Apply(_) => write!(f, "Apply(..)"),
            DriverCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Handle for sending commands to a running session
pub struct DriverHandle<E> {
    command_tx: UnboundedSender<DriverCommand<E>>,
}

impl<E> Clone for DriverHandle<E> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
        }
    }
}

impl<E> DriverHandle<E> {
    /// Send a command to the session
    pub fn send(&self, command: DriverCommand<E>) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ReaderError::ChannelError(format!("Session has ended: {:?}", e.0)))
    }

    pub fn play_pause(&self) -> Result<()> {
        self.send(DriverCommand::PlayPause)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(DriverCommand::Reset)
    }

    pub fn set_rate(&self, rate: f64) -> Result<()> {
        self.send(DriverCommand::SetRate(rate))
    }

    /// Run `f` against the engine on the session task
    pub fn apply(&self, f: impl FnOnce(&mut E) -> Result<()> + Send + 'static) -> Result<()> {
        self.send(DriverCommand::Apply(Box::new(f)))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(DriverCommand::Shutdown)
    }

    /// Whether the session is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }
}

/// Runs one engine until shutdown
pub struct SessionDriver<E> {
    engine: E,
    command_rx: UnboundedReceiver<DriverCommand<E>>,
    exit_when_stopped: bool,
}

impl<E: PlaybackController> SessionDriver<E> {
    pub fn new(engine: E) -> (Self, DriverHandle<E>) {
        let (command_tx, command_rx) = unbounded_channel();
        let driver = Self {
            engine,
            command_rx,
            exit_when_stopped: false,
        };
        (driver, DriverHandle { command_tx })
    }

    /// End the loop once a session that has played returns to `Stopped`,
    /// whether it finished or was reset.
    pub fn exit_when_stopped(mut self, exit: bool) -> Self {
        self.exit_when_stopped = exit;
        self
    }

    /// Drive the engine until shutdown, then tear it down and hand it back.
    pub async fn run(mut self) -> E {
        info!("{} session loop started", self.engine.mode());
        let mut has_played = !self.engine.state().is_stopped();

        loop {
            let deadline = self.engine.next_deadline();
            tokio::select! {
                _ = wait_until(deadline) => {
                    self.engine.poll();
                }
                command = self.command_rx.recv() => match command {
                    Some(DriverCommand::Shutdown) => {
                        info!("Session shutdown requested");
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                },
            }

            let stopped = self.engine.state().is_stopped();
            has_played |= !stopped;
            if self.exit_when_stopped && has_played && stopped {
                debug!("Session stopped, leaving loop");
                break;
            }
        }

        self.engine.teardown();
        info!("{} session loop stopped", self.engine.mode());
        self.engine
    }

    fn handle(&mut self, command: DriverCommand<E>) {
        debug!("Session command: {:?}", command);
        let result = match command {
            DriverCommand::PlayPause => {
                self.engine.play_pause();
                Ok(())
            }
            DriverCommand::Reset => self.engine.reset(),
            DriverCommand::SetRate(rate) => {
                self.engine.set_rate(rate);
                Ok(())
            }
            DriverCommand::Apply(f) => f(&mut self.engine),
            DriverCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            warn!("Session command failed: {}", e);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
