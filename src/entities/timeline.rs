//! Timeline: ordered threads plus global playback parameters.
//!
//! **Ownership**: the Timeline owns every Thread and Keyframe. All edits go
//! through the methods below so invariants hold after every call:
//! - at least one thread exists
//! - `active_thread_id` names an existing thread
//! - keyframes per thread sorted by frame index, no duplicates
//! - `current_frame < frame_count`, `fps` in `[MIN_FPS, MAX_FPS]`
//!
//! Invalid edits (locked thread, unknown id, missing keyframe, frame outside
//! capacity, removing the last thread) are silent no-ops, logged at debug.
//! They come from routine UI races, not programmer error.
//!
//! Thread order is z-order: first = bottom, last = top.
//!
//! Shrinking `frame_count` does not delete keyframes past the new end. They
//! are still saved and come back if capacity grows again, but playback,
//! `last_keyframe_index` and export never reach them.
//!
//! Undo/redo is the host's concern: `Timeline` is `Clone`, so a host can
//! snapshot before each edit.

use log::{debug, info};

use super::compositor::{self, CompositeLayer, RenderItem};
use super::easing::Easing;
use super::keyframe::Keyframe;
use super::migrate::{SavedThread, migrate_threads};
use super::thread::Thread;
use super::transform::TransformPatch;

/// Default frame capacity
pub const DEFAULT_FRAME_COUNT: u32 = 60;
/// Default playback rate
pub const DEFAULT_FPS: u32 = 12;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

/// Playback parameters for timelines whose document leaves them out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineDefaults {
    pub frame_count: u32,
    pub fps: u32,
    pub looping: bool,
}

impl Default for TimelineDefaults {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            fps: DEFAULT_FPS,
            looping: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    threads: Vec<Thread>,
    current_frame: u32,
    frame_count: u32,
    fps: u32,
    looping: bool,
    is_playing: bool,
    active_thread_id: String,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// Single empty thread, default capacity/rate, looping on.
    pub fn new() -> Self {
        Self::from_defaults(TimelineDefaults::default())
    }

    pub fn from_defaults(defaults: TimelineDefaults) -> Self {
        Self::with_params(defaults.frame_count, defaults.fps, defaults.looping)
    }

    pub fn with_params(frame_count: u32, fps: u32, looping: bool) -> Self {
        let first = Thread::new("Thread 1");
        Self {
            active_thread_id: first.id.clone(),
            threads: vec![first],
            current_frame: 0,
            frame_count: frame_count.max(1),
            fps: fps.clamp(MIN_FPS, MAX_FPS),
            looping,
            is_playing: false,
        }
    }

    // === Accessors ===

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    fn thread_mut(&mut self, id: &str) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }

    pub fn active_thread_id(&self) -> &str {
        &self.active_thread_id
    }

    pub fn active_thread(&self) -> &Thread {
        // Invariant: active id always names an existing thread
        self.thread(&self.active_thread_id).unwrap_or(&self.threads[0])
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Milliseconds between playback ticks.
    pub fn frame_interval_ms(&self) -> u64 {
        1000 / self.fps as u64
    }

    /// Keyframe at exactly `frame_index` on the target thread.
    pub fn keyframe_at(&self, frame_index: u32, thread_id: Option<&str>) -> Option<&Keyframe> {
        let id = thread_id.unwrap_or(&self.active_thread_id);
        self.thread(id)?.keyframe_at(frame_index)
    }

    /// Highest in-capacity keyframe index across visible threads.
    pub fn last_keyframe_index(&self) -> Option<u32> {
        self.threads
            .iter()
            .filter(|t| t.visible)
            .filter_map(|t| t.last_frame_below(self.frame_count))
            .max()
    }

    // === Compositor ===

    /// Static composite at `frame` (raw stored transforms).
    pub fn composite_frame(&self, frame: u32) -> Vec<CompositeLayer<'_>> {
        compositor::composite_frame(&self.threads, frame)
    }

    /// Tweened composite at `frame`; drives preview, scrubbing and export.
    pub fn composite_frame_states(&self, frame: f32) -> Vec<RenderItem> {
        compositor::composite_frame_states(&self.threads, frame)
    }

    // === Thread operations ===

    fn next_thread_name(&self) -> String {
        let mut n = self.threads.len() + 1;
        loop {
            let name = format!("Thread {}", n);
            if !self.threads.iter().any(|t| t.name == name) {
                return name;
            }
            n += 1;
        }
    }

    /// Append an empty thread on top and make it active. Returns its id.
    pub fn add_thread(&mut self) -> String {
        let thread = Thread::new(self.next_thread_name());
        let id = thread.id.clone();
        debug!("Added thread '{}' ({})", thread.name, id);
        self.threads.push(thread);
        self.active_thread_id = id.clone();
        id
    }

    /// Remove a thread unless it is the last one.
    pub fn remove_thread(&mut self, id: &str) {
        if self.threads.len() <= 1 {
            debug!("remove_thread: refusing to remove the last thread");
            return;
        }
        let Some(pos) = self.threads.iter().position(|t| t.id == id) else {
            debug!("remove_thread: unknown thread {}", id);
            return;
        };
        self.threads.remove(pos);
        if self.active_thread_id == id {
            self.active_thread_id = self.threads[0].id.clone();
        }
    }

    pub fn rename_thread(&mut self, id: &str, name: impl Into<String>) {
        if let Some(t) = self.thread_mut(id) {
            t.name = name.into();
        }
    }

    pub fn toggle_visibility(&mut self, id: &str) {
        if let Some(t) = self.thread_mut(id) {
            t.visible = !t.visible;
        }
    }

    pub fn toggle_lock(&mut self, id: &str) {
        if let Some(t) = self.thread_mut(id) {
            t.locked = !t.locked;
        }
    }

    pub fn set_active_thread(&mut self, id: &str) {
        if self.thread(id).is_some() {
            self.active_thread_id = id.to_string();
        } else {
            debug!("set_active_thread: unknown thread {}", id);
        }
    }

    /// Move a thread to `new_index` in z-order (clamped to the list).
    pub fn reorder_thread(&mut self, id: &str, new_index: usize) {
        let Some(pos) = self.threads.iter().position(|t| t.id == id) else {
            return;
        };
        let thread = self.threads.remove(pos);
        let idx = new_index.min(self.threads.len());
        self.threads.insert(idx, thread);
    }

    // === Keyframe operations ===

    /// Target thread: explicit id, or the active thread.
    fn target_mut(&mut self, thread_id: Option<&str>) -> Option<&mut Thread> {
        let id = thread_id.map(str::to_string).unwrap_or_else(|| self.active_thread_id.clone());
        let found = self.thread_mut(&id);
        if found.is_none() {
            debug!("Unknown thread {}", id);
        }
        found
    }

    fn in_capacity(&self, frame_index: u32) -> bool {
        if frame_index >= self.frame_count {
            debug!("Frame {} outside capacity {}", frame_index, self.frame_count);
            return false;
        }
        true
    }

    /// Place an image on a frame slot, replacing any existing keyframe there.
    pub fn add_keyframe(
        &mut self,
        frame_index: u32,
        image_id: impl Into<String>,
        image_url: impl Into<String>,
        thread_id: Option<&str>,
    ) {
        if !self.in_capacity(frame_index) {
            return;
        }
        let kf = Keyframe::new(frame_index, image_id, image_url);
        if let Some(t) = self.target_mut(thread_id)
            && !t.insert(kf)
        {
            debug!("add_keyframe: thread '{}' is locked", t.name);
        }
    }

    pub fn remove_keyframe(&mut self, frame_index: u32, thread_id: Option<&str>) {
        if let Some(t) = self.target_mut(thread_id) {
            t.remove(frame_index);
        }
    }

    /// Relocate a keyframe; last write wins on the target slot.
    pub fn move_keyframe(&mut self, from_index: u32, to_index: u32, thread_id: Option<&str>) {
        if !self.in_capacity(to_index) {
            return;
        }
        if let Some(t) = self.target_mut(thread_id) {
            t.move_keyframe(from_index, to_index);
        }
    }

    pub fn update_keyframe_transform(
        &mut self,
        frame_index: u32,
        patch: &TransformPatch,
        thread_id: Option<&str>,
    ) {
        if let Some(t) = self.target_mut(thread_id) {
            t.update_transform(frame_index, patch);
        }
    }

    pub fn update_keyframe_tween(
        &mut self,
        frame_index: u32,
        tween_to_next: bool,
        easing: Option<Easing>,
        thread_id: Option<&str>,
    ) {
        if let Some(t) = self.target_mut(thread_id) {
            t.update_tween(frame_index, tween_to_next, easing);
        }
    }

    pub fn clear_thread(&mut self, thread_id: Option<&str>) {
        if let Some(t) = self.target_mut(thread_id) {
            t.clear();
        }
    }

    /// Reset to a single empty thread; stops playback and rewinds.
    ///
    /// Capacity, fps and loop settings are kept.
    pub fn clear_all(&mut self) {
        let first = Thread::new("Thread 1");
        self.active_thread_id = first.id.clone();
        self.threads = vec![first];
        self.current_frame = 0;
        self.is_playing = false;
        info!("Timeline cleared");
    }

    /// Replace all threads wholesale (opening a project).
    ///
    /// Each thread is migrated to the current schema. An empty list leaves a
    /// single default thread. The first loaded thread becomes active.
    pub fn load_threads(&mut self, threads: Vec<SavedThread>) {
        let mut migrated = migrate_threads(threads);
        if migrated.is_empty() {
            migrated.push(Thread::new("Thread 1"));
        }
        self.active_thread_id = migrated[0].id.clone();
        info!(
            "Loaded {} threads ({} keyframes)",
            migrated.len(),
            migrated.iter().map(Thread::len).sum::<usize>()
        );
        self.threads = migrated;
        self.current_frame = self.current_frame.min(self.frame_count - 1);
    }

    /// Threads in save-file form.
    pub fn saved_threads(&self) -> Vec<SavedThread> {
        self.threads.iter().map(SavedThread::from).collect()
    }

    // === Playback parameters ===

    /// Scrub to `frame`, clamped to capacity.
    pub fn set_current_frame(&mut self, frame: u32) {
        self.current_frame = frame.min(self.frame_count - 1);
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
    }

    /// Change capacity. Keyframes past the new end are kept but unreachable.
    pub fn set_frame_count(&mut self, frame_count: u32) {
        self.frame_count = frame_count.max(1);
        self.current_frame = self.current_frame.min(self.frame_count - 1);
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Playback flag; driven by the playback clock.
    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::transform::Transform;

    fn timeline_with_keys() -> Timeline {
        let mut tl = Timeline::new();
        tl.add_keyframe(0, "a", "url:a", None);
        tl.add_keyframe(10, "b", "url:b", None);
        tl
    }

    #[test]
    fn test_defaults() {
        let tl = Timeline::new();
        assert_eq!(tl.threads().len(), 1);
        assert_eq!(tl.frame_count(), 60);
        assert_eq!(tl.current_frame(), 0);
        assert!(!tl.is_playing());
        assert_eq!(tl.active_thread_id(), tl.threads()[0].id);
    }

    #[test]
    fn test_add_thread_unique_name_and_active() {
        let mut tl = Timeline::new();
        let id2 = tl.add_thread();
        tl.rename_thread(&id2, "Thread 3");
        let id3 = tl.add_thread();
        assert_eq!(tl.active_thread_id(), id3);
        let names: Vec<_> = tl.threads().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["Thread 1", "Thread 3", "Thread 4"]);
        assert!(tl.thread(&id3).unwrap().visible);
    }

    #[test]
    fn test_remove_last_thread_rejected() {
        let mut tl = Timeline::new();
        let id = tl.threads()[0].id.clone();
        tl.remove_thread(&id);
        assert_eq!(tl.threads().len(), 1);
        assert_eq!(tl.threads()[0].id, id);
    }

    #[test]
    fn test_remove_active_falls_back_to_first() {
        let mut tl = Timeline::new();
        let first = tl.threads()[0].id.clone();
        let second = tl.add_thread();
        tl.remove_thread(&second);
        assert_eq!(tl.active_thread_id(), first);
        tl.remove_thread("missing");
        assert_eq!(tl.threads().len(), 1);
    }

    #[test]
    fn test_keyframe_ops_target_active_thread() {
        let mut tl = timeline_with_keys();
        let other = tl.add_thread();
        tl.add_keyframe(3, "c", "url:c", None);
        assert!(tl.keyframe_at(3, Some(&other)).is_some());
        let first = tl.threads()[0].id.clone();
        assert!(tl.keyframe_at(3, Some(&first)).is_none());
        assert_eq!(tl.threads()[0].len(), 2);
    }

    #[test]
    fn test_out_of_capacity_edits_ignored() {
        let mut tl = timeline_with_keys();
        tl.add_keyframe(60, "z", "url:z", None);
        tl.move_keyframe(0, 75, None);
        let frames: Vec<u32> =
            tl.active_thread().keyframes().iter().map(|k| k.frame_index).collect();
        assert_eq!(frames, vec![0, 10]);
    }

    #[test]
    fn test_locked_thread_edits_are_noops() {
        let mut tl = timeline_with_keys();
        let id = tl.active_thread_id().to_string();
        tl.toggle_lock(&id);
        let before = tl.active_thread().keyframes().to_vec();

        tl.add_keyframe(5, "x", "url:x", None);
        tl.remove_keyframe(0, None);
        tl.move_keyframe(10, 20, None);
        tl.update_keyframe_transform(0, &TransformPatch::position(4.0, 4.0), None);
        tl.update_keyframe_tween(0, true, Some(Easing::EaseIn), None);
        tl.clear_thread(None);

        assert_eq!(tl.active_thread().keyframes(), before.as_slice());

        // Unlocking makes edits apply again
        tl.toggle_lock(&id);
        tl.remove_keyframe(0, None);
        assert_eq!(tl.active_thread().len(), 1);
    }

    #[test]
    fn test_update_transform_merges() {
        let mut tl = timeline_with_keys();
        tl.update_keyframe_transform(
            10,
            &TransformPatch {
                x: Some(100.0),
                opacity: Some(0.5),
                ..Default::default()
            },
            None,
        );
        let t = tl.keyframe_at(10, None).unwrap().transform;
        assert_eq!(
            t,
            Transform {
                x: 100.0,
                opacity: 0.5,
                ..Default::default()
            }
        );
        // Missing keyframe: nothing happens
        tl.update_keyframe_transform(4, &TransformPatch::position(1.0, 1.0), None);
        assert!(tl.keyframe_at(4, None).is_none());
    }

    #[test]
    fn test_tween_scenario_via_timeline() {
        let mut tl = timeline_with_keys();
        tl.update_keyframe_transform(10, &TransformPatch::position(100.0, 0.0), None);
        tl.update_keyframe_tween(0, true, Some(Easing::Linear), None);
        let states = tl.composite_frame_states(5.0);
        assert!((states[0].transform.x - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_clear_all_resets() {
        let mut tl = timeline_with_keys();
        tl.add_thread();
        tl.set_current_frame(30);
        tl.set_playing(true);
        tl.clear_all();
        assert_eq!(tl.threads().len(), 1);
        assert!(tl.threads()[0].is_empty());
        assert_eq!(tl.current_frame(), 0);
        assert!(!tl.is_playing());
        assert_eq!(tl.active_thread_id(), tl.threads()[0].id);
    }

    #[test]
    fn test_load_threads_round_trip_composites() {
        let mut tl = timeline_with_keys();
        let bottom = tl.threads()[0].id.clone();
        let top = tl.add_thread();
        tl.add_keyframe(4, "c", "url:c", None);
        tl.update_keyframe_tween(0, true, Some(Easing::Bounce), Some(&bottom));
        tl.update_keyframe_transform(10, &TransformPatch::position(-30.0, 12.0), Some(&bottom));
        tl.toggle_visibility(&top);

        let mut reloaded = Timeline::new();
        reloaded.load_threads(tl.saved_threads());
        for frame in 0..tl.frame_count() {
            assert_eq!(
                reloaded.composite_frame_states(frame as f32),
                tl.composite_frame_states(frame as f32)
            );
        }
        assert_eq!(reloaded.threads(), tl.threads());
    }

    #[test]
    fn test_load_empty_keeps_one_thread() {
        let mut tl = timeline_with_keys();
        tl.load_threads(Vec::new());
        assert_eq!(tl.threads().len(), 1);
        assert_eq!(tl.active_thread_id(), tl.threads()[0].id);
    }

    #[test]
    fn test_reorder_changes_paint_order_only() {
        let mut tl = Timeline::new();
        let bottom = tl.threads()[0].id.clone();
        tl.add_keyframe(0, "bottom", "url:b", None);
        let top = tl.add_thread();
        tl.add_keyframe(0, "top", "url:t", None);

        tl.reorder_thread(&top, 0);
        let states = tl.composite_frame_states(0.0);
        assert_eq!(states[0].thread_id, top);
        assert_eq!(states[1].thread_id, bottom);
        assert_eq!(states[0].image_id, "top");
    }

    #[test]
    fn test_playback_params_clamped() {
        let mut tl = Timeline::new();
        tl.set_fps(0);
        assert_eq!(tl.fps(), 1);
        tl.set_fps(240);
        assert_eq!(tl.fps(), 60);
        tl.set_current_frame(500);
        assert_eq!(tl.current_frame(), 59);
        tl.set_frame_count(10);
        assert_eq!(tl.current_frame(), 9);
        tl.set_frame_count(0);
        assert_eq!(tl.frame_count(), 1);
    }

    #[test]
    fn test_shrink_keeps_keyframes_past_end() {
        let mut tl = timeline_with_keys();
        tl.add_keyframe(40, "c", "url:c", None);
        tl.set_frame_count(20);
        assert_eq!(tl.last_keyframe_index(), Some(10));
        assert_eq!(tl.active_thread().len(), 3);
        // Past-the-end slots still reject edits
        tl.add_keyframe(30, "d", "url:d", None);
        assert!(tl.keyframe_at(30, None).is_none());

        tl.set_frame_count(60);
        assert_eq!(tl.last_keyframe_index(), Some(40));
    }

    #[test]
    fn test_last_keyframe_index_ignores_hidden() {
        let mut tl = timeline_with_keys();
        let hidden = tl.add_thread();
        tl.add_keyframe(40, "h", "url:h", None);
        assert_eq!(tl.last_keyframe_index(), Some(40));
        tl.toggle_visibility(&hidden);
        assert_eq!(tl.last_keyframe_index(), Some(10));
    }
}
