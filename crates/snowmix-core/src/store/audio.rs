// Start/stop pass-through for audio collections.

use snowmix_api::Session;
use tracing::debug;

use super::collection::Collection;
use crate::codec::audio;
use crate::error::CoreError;
use crate::kind::AudioKind;

impl<K: AudioKind, S: Session> Collection<K, S> {
    /// Start processing on object `id`.
    pub async fn start(&self, id: u32) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        debug!(kind = K::TAG, id, "starting");
        entity.send(&audio::render_start(K::TAG, id)).await
    }

    /// Stop processing on object `id`.
    pub async fn stop(&self, id: u32) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        debug!(kind = K::TAG, id, "stopping");
        entity.send(&audio::render_stop(K::TAG, id)).await
    }
}
