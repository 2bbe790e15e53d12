//! Thread: one animation layer on the timeline.
//!
//! A thread is an ordered track of keyframes plus visibility/lock flags.
//! Keyframes are kept sorted ascending by `frame_index` with no duplicates;
//! inserting on an occupied slot replaces the previous keyframe.
//!
//! Every structural edit checks `locked` first and reports whether it was
//! applied. Rejected edits leave the thread untouched.

use serde::Serialize;
use uuid::Uuid;

use super::easing::Easing;
use super::keyframe::Keyframe;
use super::transform::TransformPatch;

/// Serialized shape is the save-file contract
/// `{id, name, visible, locked, keyframes}`. Loading goes through
/// `migrate` so deserialized data is always normalized.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Thread {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    keyframes: Vec<Keyframe>,
}

impl Thread {
    /// Empty, visible, unlocked thread with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            visible: true,
            locked: false,
            keyframes: Vec::new(),
        }
    }

    /// Build from already-normalized parts (used by migration).
    ///
    /// Keyframes are sorted and de-duplicated here, later entries win.
    pub(crate) fn from_parts(
        id: String,
        name: String,
        visible: bool,
        locked: bool,
        keyframes: Vec<Keyframe>,
    ) -> Self {
        let mut thread = Self {
            id,
            name,
            visible,
            locked,
            keyframes: Vec::with_capacity(keyframes.len()),
        };
        for kf in keyframes {
            thread.place(kf);
        }
        thread
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn position(&self, frame_index: u32) -> Result<usize, usize> {
        self.keyframes.binary_search_by_key(&frame_index, |k| k.frame_index)
    }

    pub fn keyframe_at(&self, frame_index: u32) -> Option<&Keyframe> {
        self.position(frame_index).ok().map(|i| &self.keyframes[i])
    }

    /// Highest keyframe index strictly below `limit`.
    pub fn last_frame_below(&self, limit: u32) -> Option<u32> {
        let end = self.position(limit).unwrap_or_else(|i| i);
        end.checked_sub(1).map(|i| self.keyframes[i].frame_index)
    }

    /// Insert keeping sort order; replaces on an occupied index. Ignores lock.
    fn place(&mut self, kf: Keyframe) {
        match self.position(kf.frame_index) {
            Ok(i) => self.keyframes[i] = kf,
            Err(i) => self.keyframes.insert(i, kf),
        }
    }

    /// Insert `kf` at its frame index, replacing any occupant.
    pub fn insert(&mut self, kf: Keyframe) -> bool {
        if self.locked {
            return false;
        }
        self.place(kf);
        true
    }

    pub fn remove(&mut self, frame_index: u32) -> Option<Keyframe> {
        if self.locked {
            return None;
        }
        let i = self.position(frame_index).ok()?;
        Some(self.keyframes.remove(i))
    }

    /// Relocate the keyframe at `from` to `to`, overwriting any occupant.
    pub fn move_keyframe(&mut self, from: u32, to: u32) -> bool {
        if self.locked || from == to {
            return false;
        }
        let Ok(i) = self.position(from) else {
            return false;
        };
        let mut kf = self.keyframes.remove(i);
        kf.frame_index = to;
        self.place(kf);
        true
    }

    pub fn update_transform(&mut self, frame_index: u32, patch: &TransformPatch) -> bool {
        if self.locked {
            return false;
        }
        match self.position(frame_index) {
            Ok(i) => {
                self.keyframes[i].transform.apply_patch(patch);
                true
            }
            Err(_) => false,
        }
    }

    /// Set tween flag; easing is kept unless a new one is given.
    pub fn update_tween(
        &mut self,
        frame_index: u32,
        tween_to_next: bool,
        easing: Option<Easing>,
    ) -> bool {
        if self.locked {
            return false;
        }
        match self.position(frame_index) {
            Ok(i) => {
                let kf = &mut self.keyframes[i];
                kf.tween_to_next = tween_to_next;
                if let Some(e) = easing {
                    kf.easing = e;
                }
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.keyframes.clear();
        true
    }

    /// Index of the active keyframe for `frame`: last keyframe with
    /// `frame_index <= frame`.
    pub(crate) fn active_index(&self, frame: f32) -> Option<usize> {
        self.keyframes.iter().rposition(|k| k.frame_index as f32 <= frame)
    }
}
