//! Entities module - timeline data model and pure compositing.
//!
//! - `easing` / `transform` - numeric leaves (curves, tween interpolation)
//! - `keyframe` / `thread` / `timeline` - data model and mutation invariants
//! - `compositor` - resolves per-frame render lists
//! - `migrate` / `project` - save format, versioned migration, file I/O

pub mod compositor;
pub mod easing;
pub mod keyframe;
pub mod migrate;
pub mod project;
pub mod thread;
pub mod timeline;
pub mod transform;

pub use compositor::{
    CompositeLayer, RenderItem, composite_frame, composite_frame_states, resolve_active_keyframe,
};
pub use easing::Easing;
pub use keyframe::{ImageRef, Keyframe};
pub use migrate::{SavedKeyframe, SavedThread};
pub use project::{Canvas, Project, ProjectDocument};
pub use thread::Thread;
pub use timeline::{Timeline, TimelineDefaults};
pub use transform::{Transform, TransformPatch, interpolate};
