// ── Mixer sources ──
//
// A mixer input is a weak reference: a kind and an id, resolved through
// the owning collection whenever it is needed.

use serde::Serialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Mixer,
}

/// One input attached to an audio mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MixerSource {
    pub kind: SourceKind,
    pub id: u32,
}

impl MixerSource {
    pub fn feed(id: u32) -> Self {
        Self {
            kind: SourceKind::Feed,
            id,
        }
    }

    pub fn mixer(id: u32) -> Self {
        Self {
            kind: SourceKind::Mixer,
            id,
        }
    }
}
