//! Execution engine: program → absolute-time scheduling calls.
//!
//! The [`Engine`] owns a parsed [`Program`], an optional [`AudioBackend`], and
//! the configuration. Each [`Engine::execute`] builds a fresh
//! [`ExecutionState`], walks the program with the recursive [`Executor`], and
//! reports how the run ended.
//!
//! The engine never sleeps: it only computes offsets. Real-time triggering is
//! the backend's job.

pub mod backend;
pub mod error;
pub mod executor;
pub mod run_state;
pub mod state;

pub use backend::{AudioBackend, Handle, SampleRequest, SlideRequest, ToneRequest, Waveform};
pub use error::EngineError;
pub use executor::{Executor, Mix};
pub use run_state::{RunReport, RunState};
pub use state::{ExecutionState, StopHandle, TempoState, VariableStore};

use crate::config::EngineConfig;
use crate::dsl::{Dsl, Program};

/// Parses, holds, and executes a program against an audio backend.
pub struct Engine<B: AudioBackend> {
    config: EngineConfig,
    program: Program,
    backend: Option<B>,
    state: ExecutionState,
    running: StopHandle,
    run_state: RunState,
}

impl<B: AudioBackend> Engine<B> {
    /// Create an engine with no backend attached.
    pub fn new(config: EngineConfig) -> Self {
        let running = StopHandle::new();
        Self {
            state: ExecutionState::new(config.default_bpm, running.clone()),
            config,
            program: Program::default(),
            backend: None,
            running,
            run_state: RunState::Idle,
        }
    }

    /// Create an engine with `backend` attached.
    pub fn with_backend(config: EngineConfig, backend: B) -> Self {
        let mut engine = Self::new(config);
        engine.backend = Some(backend);
        engine
    }

    /// Attach (or replace) the audio backend.
    pub fn set_backend(&mut self, backend: B) {
        self.backend = Some(backend);
    }

    /// Parse `source`, replacing the current program.
    pub fn parse(&mut self, source: &str) -> &Program {
        self.load(Dsl::parse(source))
    }

    /// Replace the current program.
    pub fn load(&mut self, program: Program) -> &Program {
        self.program = program;
        self.run_state = RunState::Idle;
        &self.program
    }

    /// Run the current program from the top.
    ///
    /// Fails only when no backend is attached; every other problem becomes a
    /// warning in the returned report.
    pub fn execute(&mut self) -> Result<RunReport, EngineError> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(EngineError::MissingBackend);
        };

        self.running.resume();
        self.state = ExecutionState::new(self.config.default_bpm, self.running.clone());
        self.run_state = RunState::Running;
        log::info!(
            "run started: {} global command(s), {} block(s), {} custom sample(s)",
            self.program.globals.len(),
            self.program.blocks.len(),
            self.program.custom_samples.len()
        );

        let mut executor = Executor::new(&self.program, backend, &mut self.state, &self.config);
        let duration = executor.run();
        let (warnings, dispatched) = executor.finish();

        self.run_state = if self.running.is_running() {
            RunState::Completed
        } else {
            RunState::Stopped
        };
        log::info!(
            "run {:?}: {dispatched} event(s) over {duration:.3}s, {} warning(s)",
            self.run_state,
            warnings.len()
        );

        Ok(RunReport {
            state: self.run_state,
            duration,
            dispatched,
            warnings,
        })
    }

    /// Stop the run and cancel everything the backend has not played yet.
    pub fn stop(&mut self) {
        self.running.stop();
        if let Some(backend) = self.backend.as_mut() {
            backend.stop();
        }
        self.state.active.clear();
        if self.run_state == RunState::Running {
            self.run_state = RunState::Stopped;
        }
    }

    /// Start or resume the backend transport.
    pub fn play(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.play();
        }
    }

    /// Pause the backend transport.
    pub fn pause(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
        }
    }

    /// A cloneable handle that requests a cooperative stop from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.running.clone()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State left behind by the last run.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    /// Detach and return the backend.
    pub fn take_backend(&mut self) -> Option<B> {
        self.backend.take()
    }
}
