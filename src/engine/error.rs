//! Fatal engine errors.

use thiserror::Error;

/// Errors that abort a run.
///
/// Everything else (unknown blocks, bad arguments, invalid tempo) degrades to a
/// warning in the [`RunReport`](super::RunReport) and execution continues.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `execute()` was called before an audio backend was attached.
    #[error("no audio backend attached; cannot schedule events")]
    MissingBackend,
}
