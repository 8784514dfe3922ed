//! blockbeat: a block-structured music DSL and its scheduling engine.
//!
//! Source text is split into global commands, `[blocks]`, and `<custom samples>`
//! by [`dsl`], then walked by the [`engine`] which resolves tempo, variables,
//! and sequential/parallel composition into absolute start offsets handed to an
//! audio backend. [`event`] provides a recording backend and console playback.

pub mod config;
pub mod dsl;
pub mod engine;
pub mod event;
