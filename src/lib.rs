//! Sprite Loom - sprite animation timeline engine
//!
//! Re-exports all modules for use by the `loom` binary and embedding hosts.

// Playback engine (clock, scheduler)
pub mod core;

// Data model, compositor, save format
pub mod entities;

// Rasterization and encoders
pub mod export;

// App modules
pub mod cli;
pub mod paths;
pub mod settings;

// Re-export commonly used types
pub use self::core::{PlaybackClock, PlaybackState};
pub use entities::{
    Easing, Keyframe, Project, RenderItem, Thread, Timeline, Transform, TransformPatch,
};
pub use export::{ExportArtifact, ExportError, ExportFormat, ExportSettings, export, spawn_export};
