//! Console playback: walks a recorded timeline in real time.
//!
//! Each event is written to the output when its start offset is reached.
//! Playback polls a [`StopHandle`] between waits, so Ctrl-C (or any other
//! thread) can cut it short; stopping cancels the events not yet printed.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::backend::AudioBackend;
use crate::engine::StopHandle;

use super::timeline::Timeline;

/// How playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every event fired and the longest tail ran out.
    Finished,
    /// A stop was requested first.
    Stopped,
}

/// Longest single sleep between stop-flag polls.
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Play `timeline` from its start, writing each event as it fires.
pub fn play_timeline<W: Write>(
    timeline: &mut Timeline,
    stop: &StopHandle,
    out: &mut W,
    tick: Duration,
) -> io::Result<PlaybackOutcome> {
    timeline.reset_cursor();
    timeline.play();
    let end = timeline.span();
    let started = Instant::now();

    loop {
        if !stop.is_running() {
            log::info!("playback stopped with {} event(s) pending", timeline.remaining());
            timeline.stop();
            return Ok(PlaybackOutcome::Stopped);
        }

        let now = started.elapsed().as_secs_f64();
        for event in timeline.drain_until(now) {
            writeln!(out, "{event}")?;
        }
        out.flush()?;

        if timeline.remaining() == 0 && now >= end {
            timeline.stop();
            return Ok(PlaybackOutcome::Finished);
        }

        let next = timeline.peek_next().map_or(end, |e| e.start);
        let wait = (next - now).max(0.0).min(tick.as_secs_f64());
        thread::sleep(Duration::from_secs_f64(wait));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{SampleRequest, ToneRequest, Waveform};
    use crate::event::timeline::PlayState;

    fn short_timeline() -> Timeline {
        let mut tl = Timeline::new();
        tl.play_sample(SampleRequest {
            name: "kick".into(),
            pitch: 1.0,
            timescale: 1.0,
            start: 0.0,
            volume: 1.0,
            pan: 0.0,
        });
        tl.generate_tone(ToneRequest {
            frequency: 440.0,
            duration: 0.01,
            waveform: Waveform::Sine,
            start: 0.02,
            volume: 0.5,
            pan: 0.0,
        });
        tl
    }

    #[test]
    fn plays_every_event_in_order() {
        let mut tl = short_timeline();
        let mut out = Vec::new();
        let outcome =
            play_timeline(&mut tl, &StopHandle::new(), &mut out, Duration::from_millis(2)).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Finished);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("sample kick"));
        assert!(lines[1].contains("tone 440.00Hz"));
        assert_eq!(tl.state(), PlayState::Stopped);
    }

    #[test]
    fn stop_before_start_cancels_everything() {
        let mut tl = short_timeline();
        let stop = StopHandle::new();
        stop.stop();
        let mut out = Vec::new();
        let outcome = play_timeline(&mut tl, &stop, &mut out, DEFAULT_TICK).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert!(out.is_empty());
        assert!(tl.is_empty());
    }
}
