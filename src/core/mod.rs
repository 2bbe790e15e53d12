//! Core engine modules - playback clock and tick scheduling
//!
//! These modules drive the timeline in time, independent of any host UI.

pub mod clock;
pub mod scheduler;

pub use clock::{PlaybackClock, PlaybackState};
pub use scheduler::{IntervalScheduler, ManualScheduler, Scheduler, Tick};
