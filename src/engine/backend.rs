//! The audio collaborator seam.
//!
//! The engine never renders audio. Every resolved leaf command becomes exactly
//! one call on an [`AudioBackend`], carrying an absolute start offset in seconds
//! from the playback start instant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsl::note;
use crate::dsl::EffectSpec;

/// Opaque identifier for a scheduled audio event, issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(pub u64);

/// Oscillator shape for tones and slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    #[serde(alias = "saw")]
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parse a waveform name as written in the DSL.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "sawtooth" | "saw" => Some(Waveform::Sawtooth),
            "triangle" => Some(Waveform::Triangle),
            _ => None,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        };
        f.write_str(name)
    }
}

/// `playSample(name, pitch, timescale, start, volume, pan)`
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub name: String,
    pub pitch: f64,
    pub timescale: f64,
    pub start: f64,
    pub volume: f64,
    pub pan: f64,
}

/// `generateTone(frequency, duration, waveform, start, volume, pan)`
#[derive(Debug, Clone, PartialEq)]
pub struct ToneRequest {
    pub frequency: f64,
    pub duration: f64,
    pub waveform: Waveform,
    pub start: f64,
    pub volume: f64,
    pub pan: f64,
}

/// A tone whose frequency ramps linearly from `from_hz` to `to_hz`
/// between `start` and `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRequest {
    pub from_hz: f64,
    pub to_hz: f64,
    pub start: f64,
    pub end: f64,
    pub waveform: Waveform,
    pub volume: f64,
    pub pan: f64,
}

/// Everything the engine needs from an audio output.
pub trait AudioBackend {
    /// Schedule a sample trigger.
    fn play_sample(&mut self, request: SampleRequest) -> Handle;

    /// Schedule a fixed-frequency tone.
    fn generate_tone(&mut self, request: ToneRequest) -> Handle;

    /// Schedule a frequency ramp.
    fn slide(&mut self, request: SlideRequest) -> Handle;

    /// Convert a note name to Hz. Malformed names map to 440 Hz.
    fn note_to_frequency(&self, name: &str) -> f64 {
        note::note_to_frequency(name)
    }

    /// Effect metadata for a block. Backends may apply or ignore it.
    fn apply_effect(&mut self, _block: &str, _effect: &EffectSpec) {}

    /// Start or resume the transport.
    fn play(&mut self);

    /// Pause the transport, keeping scheduled events.
    fn pause(&mut self);

    /// Stop the transport and cancel every event that has not fired yet.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_names() {
        assert_eq!(Waveform::from_name("sine"), Some(Waveform::Sine));
        assert_eq!(Waveform::from_name("saw"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::from_name("triangle"), Some(Waveform::Triangle));
        assert_eq!(Waveform::from_name("noise"), None);
        assert_eq!(Waveform::Sawtooth.to_string(), "sawtooth");
    }

    #[test]
    fn waveform_yaml_alias() {
        let w: Waveform = serde_yaml::from_str("saw").unwrap();
        assert_eq!(w, Waveform::Sawtooth);
        assert_eq!(serde_yaml::to_string(&Waveform::Square).unwrap().trim(), "square");
    }
}
