// ── Entity storage ──
//
// Generic collections of change-tracked entities, plus the discovery
// pass that fills them from the server.

mod audio;
mod collection;
mod discovery;
mod entity;

pub use collection::{Collection, CollectionMeta};
pub use discovery::PopulateReport;
pub use entity::Entity;
