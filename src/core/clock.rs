//! Playback clock: frame-accurate stepping at the timeline's fps.
//!
//! **Architecture**: the clock does NOT own the Timeline. It receives
//! `&mut Timeline` when a method needs to read or move the playhead, so the
//! host keeps a single source of truth (and can snapshot it for undo).
//!
//! # States
//!
//! - **Stopped** - playhead at 0, no timer
//! - **Playing** - timer running, one frame per tick
//! - **Paused** - playhead kept, no timer
//!
//! # Timing model
//!
//! Each tick advances exactly one frame, whatever the wall-clock delay, so
//! the frame sequence is deterministic. At the last frame: wrap to 0 when
//! looping, otherwise pause and hold the last frame (the playhead is kept,
//! not rewound).
//!
//! # Timer lifetime
//!
//! The scheduler is cancelled on pause/stop and restarted on fps or frame
//! count changes. Each start bumps the epoch; ticks carrying an older epoch
//! are ignored, so a stale timer can never fire into the timeline.
//!
//! The clock also remembers the fps and frame count its timer was started
//! with. If the host edits them on the `Timeline` directly, the next tick is
//! dropped and the timer restarted at the new rate.

use std::time::Duration;

use log::{debug, trace};

use super::scheduler::{IntervalScheduler, ManualScheduler, Scheduler, Tick};
use crate::entities::Timeline;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Playback state machine driving `Timeline::current_frame`.
pub struct PlaybackClock<S: Scheduler = IntervalScheduler> {
    state: PlaybackState,
    scheduler: S,
    epoch: u64,
    /// (fps, frame_count) the running timer was started with
    timing: (u32, u32),
}

impl PlaybackClock<IntervalScheduler> {
    /// Clock with a real wall-clock timer.
    pub fn new() -> Self {
        Self::with_scheduler(IntervalScheduler::new())
    }
}

impl Default for PlaybackClock<IntervalScheduler> {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock<ManualScheduler> {
    /// Clock driven by explicit `on_tick` calls.
    pub fn manual() -> Self {
        Self::with_scheduler(ManualScheduler::new())
    }
}

impl<S: Scheduler> PlaybackClock<S> {
    pub fn with_scheduler(scheduler: S) -> Self {
        Self {
            state: PlaybackState::Stopped,
            scheduler,
            epoch: 0,
            timing: (0, 0),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn start_timer(&mut self, timeline: &Timeline) {
        self.epoch += 1;
        self.timing = (timeline.fps(), timeline.frame_count());
        let interval = Duration::from_millis(timeline.frame_interval_ms());
        trace!("Clock timer start: {:?} (epoch {})", interval, self.epoch);
        self.scheduler.start(interval, self.epoch);
    }

    fn cancel_timer(&mut self) {
        // Bump so anything already delivered is stale
        self.epoch += 1;
        self.scheduler.cancel();
    }

    /// Stopped/Paused -> Playing.
    pub fn play(&mut self, timeline: &mut Timeline) {
        if self.state == PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Playing;
        timeline.set_playing(true);
        self.start_timer(timeline);
        debug!("Playback started at frame {}", timeline.current_frame());
    }

    /// Playing -> Paused, playhead kept.
    pub fn pause(&mut self, timeline: &mut Timeline) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.cancel_timer();
        self.state = PlaybackState::Paused;
        timeline.set_playing(false);
        debug!("Playback paused at frame {}", timeline.current_frame());
    }

    /// Any -> Stopped, playhead rewound to 0.
    pub fn stop(&mut self, timeline: &mut Timeline) {
        self.cancel_timer();
        self.state = PlaybackState::Stopped;
        timeline.set_playing(false);
        timeline.set_current_frame(0);
        trace!("Playback stopped");
    }

    /// Space-bar style toggle.
    pub fn toggle(&mut self, timeline: &mut Timeline) {
        if self.is_playing() {
            self.pause(timeline);
        } else {
            self.play(timeline);
        }
    }

    /// Step back one frame, clamped at 0.
    pub fn skip_back(&mut self, timeline: &mut Timeline) {
        let current = timeline.current_frame();
        if current > 0 {
            timeline.set_current_frame(current - 1);
        }
    }

    /// Step forward one frame, clamped at the last frame.
    pub fn skip_forward(&mut self, timeline: &mut Timeline) {
        let current = timeline.current_frame();
        if current + 1 < timeline.frame_count() {
            timeline.set_current_frame(current + 1);
        }
    }

    /// Change fps; a running timer is replaced by one at the new rate.
    pub fn set_fps(&mut self, timeline: &mut Timeline, fps: u32) {
        timeline.set_fps(fps);
        self.restart_if_playing(timeline);
    }

    /// Change capacity; a running timer is replaced.
    pub fn set_frame_count(&mut self, timeline: &mut Timeline, frame_count: u32) {
        timeline.set_frame_count(frame_count);
        self.restart_if_playing(timeline);
    }

    fn restart_if_playing(&mut self, timeline: &Timeline) {
        if self.state == PlaybackState::Playing {
            self.cancel_timer();
            self.start_timer(timeline);
        }
    }

    /// Handle a timer tick. Returns the new frame if it changed.
    ///
    /// Ticks from an older epoch, or arriving while not playing, are ignored.
    /// If the timeline was reset externally (e.g. `clear_all`), the clock
    /// halts instead of advancing. If fps or frame count were changed on the
    /// timeline directly, the tick is dropped and the timer restarted.
    pub fn on_tick(&mut self, timeline: &mut Timeline, tick: Tick) -> Option<u32> {
        if tick.epoch != self.epoch || self.state != PlaybackState::Playing {
            trace!("Ignoring stale tick (epoch {} vs {})", tick.epoch, self.epoch);
            return None;
        }
        if !timeline.is_playing() {
            debug!("Timeline stopped externally, halting clock");
            self.cancel_timer();
            self.state = PlaybackState::Stopped;
            return None;
        }
        if self.timing != (timeline.fps(), timeline.frame_count()) {
            debug!(
                "Timing changed outside the clock ({:?} -> {} fps, {} frames), restarting timer",
                self.timing,
                timeline.fps(),
                timeline.frame_count()
            );
            self.cancel_timer();
            self.start_timer(timeline);
            return None;
        }
        self.advance(timeline)
    }

    /// Advance one frame with loop/hold policy.
    fn advance(&mut self, timeline: &mut Timeline) -> Option<u32> {
        let current = timeline.current_frame();
        let next = current + 1;

        if next >= timeline.frame_count() {
            if timeline.looping() {
                trace!("Frame loop: {} -> 0", current);
                timeline.set_current_frame(0);
                return Some(0);
            }
            trace!("Reached last frame, pausing");
            self.pause(timeline);
            return None;
        }

        timeline.set_current_frame(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(clock: &mut PlaybackClock<ManualScheduler>, tl: &mut Timeline) -> Option<u32> {
        let tick = clock.scheduler().fire()?;
        clock.on_tick(tl, tick)
    }

    #[test]
    fn test_play_advances_one_frame_per_tick() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        assert!(tl.is_playing());
        assert_eq!(fire(&mut clock, &mut tl), Some(1));
        assert_eq!(fire(&mut clock, &mut tl), Some(2));
        assert_eq!(tl.current_frame(), 2);
    }

    #[test]
    fn test_non_loop_end_pauses_and_holds() {
        let mut tl = Timeline::with_params(60, 12, false);
        tl.set_current_frame(59);
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        assert_eq!(fire(&mut clock, &mut tl), None);
        assert!(!tl.is_playing());
        assert_eq!(tl.current_frame(), 59);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert!(!clock.scheduler().is_running());
    }

    #[test]
    fn test_loop_wraps_to_zero() {
        let mut tl = Timeline::with_params(3, 12, true);
        tl.set_current_frame(2);
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        assert_eq!(fire(&mut clock, &mut tl), Some(0));
        assert!(tl.is_playing());
    }

    #[test]
    fn test_pause_then_stale_tick_ignored() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        let stale = clock.scheduler().fire().unwrap();
        clock.pause(&mut tl);
        assert_eq!(clock.on_tick(&mut tl, stale), None);
        assert_eq!(tl.current_frame(), 0);

        // Resuming does not revive the old epoch either
        clock.play(&mut tl);
        assert_eq!(clock.on_tick(&mut tl, stale), None);
        assert_eq!(fire(&mut clock, &mut tl), Some(1));
    }

    #[test]
    fn test_stop_rewinds() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        fire(&mut clock, &mut tl);
        fire(&mut clock, &mut tl);
        clock.stop(&mut tl);
        assert_eq!(tl.current_frame(), 0);
        assert_eq!(clock.state(), PlaybackState::Stopped);
        assert!(!tl.is_playing());
    }

    #[test]
    fn test_skip_clamped() {
        let mut tl = Timeline::with_params(5, 12, true);
        let mut clock = PlaybackClock::manual();
        clock.skip_back(&mut tl);
        assert_eq!(tl.current_frame(), 0);
        for _ in 0..10 {
            clock.skip_forward(&mut tl);
        }
        assert_eq!(tl.current_frame(), 4);
        clock.skip_back(&mut tl);
        assert_eq!(tl.current_frame(), 3);
    }

    #[test]
    fn test_fps_change_restarts_timer() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        let old = clock.scheduler().fire().unwrap();
        clock.set_fps(&mut tl, 50);
        assert_eq!(clock.scheduler().interval(), Some(Duration::from_millis(20)));
        assert_eq!(clock.scheduler().starts(), 2);
        assert_eq!(clock.on_tick(&mut tl, old), None);
        assert_eq!(fire(&mut clock, &mut tl), Some(1));
    }

    #[test]
    fn test_fps_change_while_paused_does_not_start() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.set_frame_count(&mut tl, 10);
        clock.set_fps(&mut tl, 30);
        assert!(!clock.scheduler().is_running());
        assert_eq!(tl.fps(), 30);
    }

    #[test]
    fn test_direct_timeline_fps_change_drops_old_timer() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        let old = clock.scheduler().fire().unwrap();
        tl.set_fps(50);

        // Old timer's tick is swallowed and a 20ms timer replaces it
        assert_eq!(clock.on_tick(&mut tl, old), None);
        assert_eq!(tl.current_frame(), 0);
        assert_eq!(clock.scheduler().interval(), Some(Duration::from_millis(20)));
        assert_eq!(clock.scheduler().starts(), 2);
        assert_eq!(clock.on_tick(&mut tl, old), None);
        assert_eq!(fire(&mut clock, &mut tl), Some(1));
    }

    #[test]
    fn test_direct_timeline_frame_count_change_restarts() {
        let mut tl = Timeline::with_params(10, 12, true);
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        fire(&mut clock, &mut tl);
        tl.set_frame_count(2);
        assert_eq!(fire(&mut clock, &mut tl), None);
        assert_eq!(clock.scheduler().starts(), 2);
        assert_eq!(fire(&mut clock, &mut tl), Some(0));
    }

    #[test]
    fn test_external_reset_halts_clock() {
        let mut tl = Timeline::new();
        let mut clock = PlaybackClock::manual();
        clock.play(&mut tl);
        fire(&mut clock, &mut tl);
        tl.clear_all();
        assert_eq!(fire(&mut clock, &mut tl), None);
        assert_eq!(clock.state(), PlaybackState::Stopped);
        assert_eq!(tl.current_frame(), 0);
    }

    #[test]
    fn test_interval_clock_end_to_end() {
        let mut tl = Timeline::with_params(3, 60, false);
        let mut clock = PlaybackClock::new();
        let ticks = clock.scheduler().ticks();
        clock.play(&mut tl);
        while clock.is_playing() {
            let tick = ticks
                .recv_timeout(Duration::from_secs(2))
                .expect("clock stalled");
            clock.on_tick(&mut tl, tick);
        }
        assert_eq!(tl.current_frame(), 2);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert!(!clock.scheduler().is_running());
    }
}
