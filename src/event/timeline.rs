//! Recording backend: keeps every dispatched event on a sorted timeline.
//!
//! [`Timeline`] implements [`AudioBackend`] without producing sound: each
//! scheduling call is stored as a [`ScheduledEvent`], sorted by start offset.
//! A read cursor lets playback consume events in time order, and the
//! transport methods follow the backend contract (`stop` cancels everything
//! not yet consumed).

use crate::dsl::EffectSpec;
use crate::engine::backend::{AudioBackend, Handle, SampleRequest, SlideRequest, ToneRequest};

use super::types::ScheduledEvent;

/// Transport state of the recording backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// A sorted timeline of scheduled events with a read cursor.
#[derive(Debug)]
pub struct Timeline {
    events: Vec<ScheduledEvent>,
    cursor: usize,
    next_handle: u64,
    effects: Vec<(String, EffectSpec)>,
    state: PlayState,
}

impl Timeline {
    /// Create an empty, stopped timeline.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            cursor: 0,
            next_handle: 1,
            effects: Vec::new(),
            state: PlayState::Stopped,
        }
    }

    /// Insert an event after any event with the same start, keeping dispatch
    /// order for simultaneous events.
    pub fn insert(&mut self, event: ScheduledEvent) {
        let pos = self.cursor
            + self.events[self.cursor..].partition_point(|e| e.start <= event.start);
        self.events.insert(pos, event);
    }

    /// Consume every event starting before `until` seconds.
    pub fn drain_until(&mut self, until: f64) -> Vec<ScheduledEvent> {
        let end = self.cursor + self.events[self.cursor..].partition_point(|e| e.start < until);
        let drained = self.events[self.cursor..end].to_vec();
        self.cursor = end;
        drained
    }

    /// Peek at the next unconsumed event without advancing the cursor.
    pub fn peek_next(&self) -> Option<&ScheduledEvent> {
        self.events.get(self.cursor)
    }

    /// Reset the cursor to the beginning.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// All recorded events, in start order.
    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    /// Effect metadata received, in arrival order.
    pub fn effects(&self) -> &[(String, EffectSpec)] {
        &self.effects
    }

    /// Latest end offset of any event.
    pub fn span(&self) -> f64 {
        self.events.iter().map(ScheduledEvent::end).fold(0.0, f64::max)
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Total number of events in the timeline.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of unconsumed events remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.cursor)
    }

    /// Remove all events and effects and reset the cursor.
    pub fn clear(&mut self) {
        self.events.clear();
        self.effects.clear();
        self.cursor = 0;
    }

    fn issue_handle(&mut self) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for Timeline {
    fn play_sample(&mut self, request: SampleRequest) -> Handle {
        let handle = self.issue_handle();
        self.insert(ScheduledEvent::sample(handle, request));
        handle
    }

    fn generate_tone(&mut self, request: ToneRequest) -> Handle {
        let handle = self.issue_handle();
        self.insert(ScheduledEvent::tone(handle, request));
        handle
    }

    fn slide(&mut self, request: SlideRequest) -> Handle {
        let handle = self.issue_handle();
        self.insert(ScheduledEvent::slide(handle, request));
        handle
    }

    fn apply_effect(&mut self, block: &str, effect: &EffectSpec) {
        self.effects.push((block.to_string(), effect.clone()));
    }

    fn play(&mut self) {
        self.state = PlayState::Playing;
    }

    fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.events.truncate(self.cursor);
    }
}
