//! Per-run mutable state: tempo, variables, effect metadata, active handles.
//!
//! A fresh [`ExecutionState`] is built at the start of every run and dropped
//! when the run ends. Nothing here outlives a single `execute()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dsl::{EffectSpec, Value};

use super::backend::Handle;

/// Tempo used when no valid BPM is available.
pub const DEFAULT_BPM: f64 = 120.0;

/// Current BPM and the beat duration derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoState {
    bpm: f64,
    beat_duration: f64,
}

impl TempoState {
    /// Create a tempo, falling back to [`DEFAULT_BPM`] for non-positive input.
    pub fn new(bpm: f64) -> Self {
        let mut tempo = Self {
            bpm: DEFAULT_BPM,
            beat_duration: 60.0 / DEFAULT_BPM,
        };
        tempo.set_bpm(bpm);
        tempo
    }

    /// Change the BPM. Returns `false` and leaves the tempo untouched when
    /// `bpm` is not a positive finite number.
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !(bpm.is_finite() && bpm > 0.0) {
            return false;
        }
        self.bpm = bpm;
        self.beat_duration = 60.0 / bpm;
        true
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Seconds per beat.
    pub fn beat_duration(&self) -> f64 {
        self.beat_duration
    }

    /// Convert a beat count to seconds at the current tempo.
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.beat_duration
    }
}

impl Default for TempoState {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

/// Name → number mapping written by `set`.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, f64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Resolve a value token: variable first, then numeric literal, then 0.
    pub fn resolve(&self, value: &Value) -> f64 {
        match value {
            Value::Number { value, token } => self.get(token).unwrap_or(*value),
            Value::Name(name) => self.get(name).unwrap_or(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared "keep running" flag, polled between commands.
///
/// Cloning yields another handle to the same flag, so a stop can be requested
/// from another thread (e.g. a Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether execution should continue.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run mutates.
#[derive(Debug)]
pub struct ExecutionState {
    pub tempo: TempoState,
    pub variables: VariableStore,
    /// Effect metadata per block name, header annotations first.
    pub effects: HashMap<String, Vec<EffectSpec>>,
    /// Handles of every event dispatched during this run.
    pub active: Vec<Handle>,
    pub running: StopHandle,
}

impl ExecutionState {
    pub fn new(bpm: f64, running: StopHandle) -> Self {
        Self {
            tempo: TempoState::new(bpm),
            variables: VariableStore::new(),
            effects: HashMap::new(),
            active: Vec::new(),
            running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }
}
