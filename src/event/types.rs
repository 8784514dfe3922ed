//! Scheduled events: what the engine handed to the audio backend.
//!
//! A [`ScheduledEvent`] is one backend call frozen as data: its handle, its
//! absolute start offset in seconds, its nominal length, and what it triggers.

use std::fmt;

use serde::Serialize;

use crate::engine::backend::{Handle, SampleRequest, SlideRequest, ToneRequest, Waveform};

/// What the event triggers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// A named sample played at `pitch` and `timescale`.
    Sample {
        name: String,
        pitch: f64,
        timescale: f64,
    },
    /// A fixed-frequency tone.
    Tone { frequency: f64, waveform: Waveform },
    /// A linear frequency ramp.
    Slide {
        from_hz: f64,
        to_hz: f64,
        waveform: Waveform,
    },
}

/// A single event on the schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub handle: Handle,
    /// Seconds from playback start.
    pub start: f64,
    /// Nominal length in seconds; zero for samples.
    pub duration: f64,
    pub trigger: Trigger,
    /// 0.0–1.0
    pub volume: f64,
    /// -1.0 (left) – 1.0 (right)
    pub pan: f64,
}

impl ScheduledEvent {
    pub fn sample(handle: Handle, req: SampleRequest) -> Self {
        Self {
            handle,
            start: req.start,
            duration: 0.0,
            trigger: Trigger::Sample {
                name: req.name,
                pitch: req.pitch,
                timescale: req.timescale,
            },
            volume: req.volume,
            pan: req.pan,
        }
    }

    pub fn tone(handle: Handle, req: ToneRequest) -> Self {
        Self {
            handle,
            start: req.start,
            duration: req.duration,
            trigger: Trigger::Tone {
                frequency: req.frequency,
                waveform: req.waveform,
            },
            volume: req.volume,
            pan: req.pan,
        }
    }

    pub fn slide(handle: Handle, req: SlideRequest) -> Self {
        Self {
            handle,
            start: req.start,
            duration: req.end - req.start,
            trigger: Trigger::Slide {
                from_hz: req.from_hz,
                to_hz: req.to_hz,
                waveform: req.waveform,
            },
            volume: req.volume,
            pan: req.pan,
        }
    }

    /// Seconds from playback start at which the event ends.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Sample {
                name,
                pitch,
                timescale,
            } => write!(f, "sample {name} pitch={pitch} timescale={timescale}"),
            Trigger::Tone {
                frequency,
                waveform,
            } => write!(f, "tone {frequency:.2}Hz {waveform}"),
            Trigger::Slide {
                from_hz,
                to_hz,
                waveform,
            } => write!(f, "slide {from_hz:.2}Hz->{to_hz:.2}Hz {waveform}"),
        }
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9.3}s  {:>7.3}s  {}  vol={:.2} pan={:+.2}",
            self.start, self.duration, self.trigger, self.volume, self.pan
        )
    }
}
