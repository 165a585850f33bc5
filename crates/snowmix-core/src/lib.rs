//! Client-side mirror of the objects held by a Snowmix mixing server.
//!
//! This crate owns the change-tracking data layer that sits on top of a
//! [`snowmix_api::Session`]:
//!
//! - **[`Collection`]**: every object of one kind, keyed by a small integer
//!   id. New ids fill the lowest gap ([`ids::next_id`]). Create-or-update
//!   goes through one path for both local edits and discovery.
//!
//! - **[`Entity`]**: one mirrored object. Local edits mark it dirty;
//!   [`Entity::apply`] renders exactly the pending changes into wire
//!   commands; [`Entity::delete`] removes it remotely, then locally.
//!
//! - **Discovery**: [`Collection::populate`] reads the name listing and the
//!   info dump, merges what it finds as server truth and prunes objects the
//!   server no longer reports.
//!
//! - **[`Kind`]**: the per-kind capability set (wire tag, attribute record,
//!   command rendering, detail parsing). Audio feeds, mixers and sinks are
//!   provided.
//!
//! - **[`Snowmix`]**: facade owning one session and the audio collections.
//!
//! - **[`EntityStream`]**: membership subscriptions carrying versioned
//!   [`Snapshot`]s.

pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod kind;
pub mod model;
pub mod snowmix;
pub mod store;
pub mod stream;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SnowmixConfig;
pub use error::CoreError;
pub use kind::{AudioFeed, AudioKind, AudioMixer, AudioSink, CommandPlan, Kind, Tracking};
pub use model::{AudioAttributes, AudioPatch, AudioState, MixerSource, SourceKind};
pub use snowmix::{PopulateSummary, ResolvedSource, Snowmix};
pub use store::{Collection, CollectionMeta, Entity, PopulateReport};
pub use stream::{EntityStream, EntityWatchStream, Snapshot};
