// src/system/terminal.rs

use portable_pty::{ChildKiller, CommandBuilder, PtySize, native_pty_system};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

const READ_CHUNK_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Could not open a pseudo-terminal: {0}")]
    Open(String),
    #[error("Could not start '{command}' in a terminal: {message}")]
    Spawn { command: String, message: String },
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("The terminal session is {0:?} and cannot be opened.")]
    InvalidState(SessionState),
}

/// Lifecycle of a [`TerminalSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// The child exited on its own.
    Closed,
    /// The session was torn down by the user. Terminal.
    Disposed,
}

/// Everything needed to start a process inside the pseudo-terminal.
#[derive(Debug, Clone, Default)]
pub struct TerminalLaunch {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Pipe this process's stdin into the terminal.
    pub forward_stdin: bool,
    pub size: Option<(u16, u16)>,
}

/// One interactive terminal running one process.
///
/// `open` blocks until the process exits. `dispose` may be called from any
/// thread at any time; it kills a running child and is a no-op afterwards.
pub struct TerminalSession {
    state: Mutex<SessionState>,
    killer: Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for TerminalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            killer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Runs the process and streams its combined output to `on_output`.
    ///
    /// Returns the exit code, or `None` when the session was disposed while
    /// the process was running.
    pub fn open<F>(&self, launch: &TerminalLaunch, on_output: F) -> Result<Option<i32>, TerminalError>
    where
        F: FnMut(&[u8]) + Send,
    {
        if !self.transition(SessionState::Idle, SessionState::Running) {
            return Err(TerminalError::InvalidState(self.state()));
        }
        let outcome = self.run(launch, on_output);
        // Disposal wins over a natural close.
        self.transition(SessionState::Running, SessionState::Closed);
        self.killer.lock().unwrap_or_else(|p| p.into_inner()).take();

        if outcome.is_ok() && self.state() == SessionState::Disposed {
            return Ok(None);
        }
        outcome
    }

    fn run<F>(&self, launch: &TerminalLaunch, mut on_output: F) -> Result<Option<i32>, TerminalError>
    where
        F: FnMut(&[u8]) + Send,
    {
        let (rows, cols) = launch.size.unwrap_or((24, 80));
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TerminalError::Open(e.to_string()))?;

        let mut builder = CommandBuilder::new(&launch.command);
        builder.args(&launch.args);
        builder.cwd(&launch.cwd);
        for (key, value) in &launch.env {
            builder.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| TerminalError::Spawn {
                command: launch.command.clone(),
                message: e.to_string(),
            })?;
        // Only the child may hold the slave side, or the reader never sees EOF.
        drop(pair.slave);

        *self.killer.lock().unwrap_or_else(|p| p.into_inner()) = Some(child.clone_killer());
        if self.state() == SessionState::Disposed {
            // Disposed between spawn and registering the killer.
            let _ = child.kill();
        }

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TerminalError::Open(e.to_string()))?;

        if launch.forward_stdin {
            match pair.master.take_writer() {
                Ok(writer) => forward_stdin(writer),
                Err(e) => log::warn!("Terminal input is not available: {}", e),
            }
        }

        let master = pair.master;
        std::thread::scope(|scope| {
            scope.spawn(move || {
                let mut buf = [0u8; READ_CHUNK_SIZE];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => on_output(buf.get(..n).unwrap_or_default()),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        // Linux reports a closed slave side as EIO.
                        Err(e) => {
                            log::debug!("Terminal reader stopped: {}", e);
                            break;
                        }
                    }
                }
            });

            let status = child.wait();
            // Closing the master lets platforms that need it deliver EOF.
            drop(master);
            let status = status?;
            log::debug!("Terminal process exited with {:?}.", status);
            Ok(i32::try_from(status.exit_code()).ok())
        })
    }

    /// Tears the session down, killing a still-running child.
    pub fn dispose(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *state, SessionState::Disposed)
        };
        if previous == SessionState::Disposed {
            return;
        }
        if let Some(mut killer) = self.killer.lock().unwrap_or_else(|p| p.into_inner()).take() {
            match killer.kill() {
                Ok(()) => log::debug!("Terminal process killed."),
                Err(e) if e.kind() == ErrorKind::InvalidInput => {}
                Err(e) => log::warn!("Could not kill terminal process: {}", e),
            }
        }
    }
}

fn forward_stdin(mut writer: Box<dyn Write + Send>) {
    // Detached: a blocked stdin read cannot be interrupted portably.
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = buf.get(..n).unwrap_or_default();
                    if writer.write_all(chunk).and_then(|_| writer.flush()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
