// ── Domain model ──
//
// Explicit attribute records per object kind, plus the patch records
// used to express partial updates against them.

pub mod audio;
pub mod source;

pub use audio::{AudioAttributes, AudioPatch, AudioState};
pub use source::{MixerSource, SourceKind};
