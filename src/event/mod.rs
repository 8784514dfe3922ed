//! Scheduled events and the backends that consume them.
//!
//! [`Timeline`] is an in-memory [`AudioBackend`](crate::engine::AudioBackend)
//! that records every dispatch; [`playback`] replays a recorded timeline on the
//! console in real time.

pub mod playback;
pub mod timeline;
pub mod types;

pub use playback::{play_timeline, PlaybackOutcome};
pub use timeline::{PlayState, Timeline};
pub use types::{ScheduledEvent, Trigger};
