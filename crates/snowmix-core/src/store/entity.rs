// ── Entity: local mirror of one server object ──
//
// Holds the attribute record, the pending (not yet applied) changes and
// the dirty flag. A change version is bumped on every tracked edit so an
// apply that raced with a newer edit can tell it must not clear `dirty`.
// Once deleted, a handle refuses further edits: its id may already belong
// to a different object.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use snowmix_api::{SendOptions, Session};
use tracing::debug;

use super::collection::Shared;
use crate::error::CoreError;
use crate::kind::{Attributes, Kind, Patch, PatchOf, Tracking};

struct EntityState<K: Kind> {
    attributes: K::Attributes,
    /// Changed fields not yet confirmed by the server.
    pending: PatchOf<K>,
    dirty: bool,
    version: u64,
    /// The server is known to hold this object.
    on_server: bool,
    deleted: bool,
}

/// What an in-flight apply is sending.
struct ApplySnapshot<K: Kind> {
    pending: PatchOf<K>,
    version: u64,
    on_server: bool,
}

/// One server object of kind `K`, owned by exactly one collection.
pub struct Entity<K: Kind, S: Session> {
    id: u32,
    session: Arc<S>,
    owner: Weak<Shared<K, S>>,
    state: Mutex<EntityState<K>>,
    /// Serializes deletes so a second caller sees the first one's outcome.
    delete_lock: tokio::sync::Mutex<()>,
}

impl<K: Kind, S: Session> Entity<K, S> {
    /// A locally created object: dirty until its first successful apply.
    ///
    /// Every field set in `patch` is pending, including values that equal
    /// the defaults; the server's defaults need not match ours.
    pub(crate) fn staged(
        id: u32,
        patch: PatchOf<K>,
        session: Arc<S>,
        owner: Weak<Shared<K, S>>,
    ) -> Self {
        let mut attributes = K::Attributes::default();
        attributes.merge(patch.clone());
        let pending = patch;
        Self::with_state(
            id,
            session,
            owner,
            EntityState {
                attributes,
                pending,
                dirty: true,
                version: 1,
                on_server: false,
                deleted: false,
            },
        )
    }

    /// An object materialized from a server listing: never dirty.
    pub(crate) fn discovered(
        id: u32,
        patch: PatchOf<K>,
        session: Arc<S>,
        owner: Weak<Shared<K, S>>,
    ) -> Self {
        let mut attributes = K::Attributes::default();
        attributes.merge(patch);
        Self::with_state(
            id,
            session,
            owner,
            EntityState {
                attributes,
                pending: PatchOf::<K>::default(),
                dirty: false,
                version: 0,
                on_server: true,
                deleted: false,
            },
        )
    }

    fn with_state(
        id: u32,
        session: Arc<S>,
        owner: Weak<Shared<K, S>>,
        state: EntityState<K>,
    ) -> Self {
        Self {
            id,
            session,
            owner,
            state: Mutex::new(state),
            delete_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        K::TAG
    }

    /// Copy of the current attribute record.
    pub fn attributes(&self) -> K::Attributes {
        self.lock().attributes.clone()
    }

    pub fn name(&self) -> String {
        self.lock().attributes.name().to_owned()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn is_on_server(&self) -> bool {
        self.lock().on_server
    }

    /// `true` once a delete succeeded. The handle is stale from then on.
    pub fn is_deleted(&self) -> bool {
        self.lock().deleted
    }

    /// Number of tracked edits so far.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Changes waiting for the next apply.
    pub fn pending(&self) -> PatchOf<K> {
        self.lock().pending.clone()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Merge `patch` into the attributes. Returns `true` if any field changed.
    ///
    /// With [`Tracking::Track`] an actual change marks the entity dirty and
    /// queues the changed fields for the next apply. With
    /// [`Tracking::Authoritative`] the patch is server truth: it is merged,
    /// the object is known to exist remotely, and `dirty` is not touched.
    ///
    /// Fails with `NotFound` on a deleted handle.
    pub fn assign(&self, patch: PatchOf<K>, tracking: Tracking) -> Result<bool, CoreError> {
        let mut state = self.lock();
        if state.deleted {
            return Err(self.not_found());
        }
        if tracking == Tracking::Authoritative {
            state.on_server = true;
        }

        let changes = state.attributes.merge(patch);
        if changes.is_empty() {
            return Ok(false);
        }

        if tracking == Tracking::Track {
            state.pending.absorb(changes);
            state.dirty = true;
            state.version += 1;
        }
        Ok(true)
    }

    // ── Server interaction ───────────────────────────────────────────

    /// Push pending changes to the server.
    ///
    /// A clean entity sends nothing. Otherwise exactly the changes pending
    /// when the call started are sent, in order; `dirty` is cleared only if
    /// no newer edit arrived meanwhile. On error the entity keeps its dirty
    /// state and pending changes, so the call can be retried. A deleted
    /// handle fails with `NotFound` and sends nothing.
    pub async fn apply(&self) -> Result<(), CoreError> {
        let Some(snapshot) = self.begin_apply()? else {
            return Ok(());
        };

        let plan = K::render(self.id, &snapshot.pending, snapshot.on_server);
        debug!(kind = K::TAG, id = self.id, commands = plan.len(), "applying");

        if let Some(create) = &plan.create {
            self.send(create).await?;
            // The object exists remotely now, even if a setter fails below.
            self.lock().on_server = true;
        }
        for command in &plan.updates {
            self.send(command).await?;
        }

        self.finish_apply(snapshot.version);
        Ok(())
    }

    /// Remove the object from the server, then from its collection.
    ///
    /// Objects that never reached the server are only dropped locally.
    /// Concurrent calls run one after another: a call that finds the entity
    /// already deleted succeeds without sending anything, and a call that
    /// follows a failed attempt tries again itself. On error the entity
    /// stays in its collection unchanged.
    pub async fn delete(&self) -> Result<(), CoreError> {
        let _serial = self.delete_lock.lock().await;
        if self.lock().deleted {
            debug!(kind = K::TAG, id = self.id, "already deleted");
            return Ok(());
        }

        self.delete_remote().await?;
        {
            let mut state = self.lock();
            state.deleted = true;
            state.on_server = false;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self);
        }
        debug!(kind = K::TAG, id = self.id, "deleted");
        Ok(())
    }

    async fn delete_remote(&self) -> Result<(), CoreError> {
        if !self.is_on_server() {
            return Ok(());
        }
        for command in K::render_delete(self.id) {
            self.send(&command).await?;
        }
        Ok(())
    }

    pub(crate) async fn send(&self, command: &str) -> Result<(), CoreError> {
        self.session
            .send_command(command, SendOptions::command())
            .await?;
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn begin_apply(&self) -> Result<Option<ApplySnapshot<K>>, CoreError> {
        let state = self.lock();
        if state.deleted {
            return Err(self.not_found());
        }
        if !state.dirty {
            return Ok(None);
        }
        Ok(Some(ApplySnapshot {
            pending: state.pending.clone(),
            version: state.version,
            on_server: state.on_server,
        }))
    }

    fn finish_apply(&self, applied_version: u64) {
        let mut state = self.lock();
        if state.deleted {
            return;
        }
        state.on_server = true;
        if state.version == applied_version {
            state.dirty = false;
            state.pending = PatchOf::<K>::default();
        } else {
            debug!(
                kind = K::TAG,
                id = self.id,
                applied_version,
                current_version = state.version,
                "newer change arrived during apply; staying dirty"
            );
        }
    }

    fn not_found(&self) -> CoreError {
        CoreError::NotFound {
            kind: K::TAG,
            id: self.id,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntityState<K>> {
        self.state.lock().expect("entity state lock poisoned")
    }
}

impl<K: Kind, S: Session> fmt::Debug for Entity<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Entity")
            .field("kind", &K::TAG)
            .field("id", &self.id)
            .field("attributes", &state.attributes)
            .field("dirty", &state.dirty)
            .field("version", &state.version)
            .field("on_server", &state.on_server)
            .field("deleted", &state.deleted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kind::AudioMixer;
    use crate::model::AudioPatch;
    use crate::store::Collection;
    use crate::testing::ScriptedSession;
    use pretty_assertions::assert_eq;

    fn mixers() -> (Arc<ScriptedSession>, Collection<AudioMixer, ScriptedSession>) {
        let session = ScriptedSession::new();
        let collection = Collection::new(Arc::clone(&session));
        (session, collection)
    }

    #[tokio::test]
    async fn clean_apply_sends_nothing() {
        let (session, mixers) = mixers();
        let entity = mixers.create(None, AudioPatch::named("Main")).await.unwrap();
        session.clear_sent();

        entity.apply().await.unwrap();
        entity.apply().await.unwrap();

        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn update_renders_only_changed_fields() {
        let (session, mixers) = mixers();
        let entity = mixers
            .create(None, AudioPatch::named("Main").with_rate(48000).with_channels(2))
            .await
            .unwrap();
        session.clear_sent();

        // Same rate, new mute: only the mute flag changed.
        entity
            .assign(AudioPatch::default().with_rate(48000).with_muted(true), Tracking::Track)
            .unwrap();
        entity.apply().await.unwrap();

        assert_eq!(session.sent(), vec!["audio mixer mute on 1"]);
        assert!(!entity.is_dirty());
    }

    #[test]
    fn identical_assign_is_not_a_change() {
        let (_session, mixers) = mixers();
        let entity = mixers.stage(None, AudioPatch::named("Main").with_rate(48000)).unwrap();
        let version = entity.version();

        assert!(!entity.assign(AudioPatch::default().with_rate(48000), Tracking::Track).unwrap());
        assert_eq!(entity.version(), version);
    }

    #[tokio::test]
    async fn authoritative_assign_never_marks_dirty() {
        let (_session, mixers) = mixers();
        let entity = mixers.create(None, AudioPatch::named("Main")).await.unwrap();

        assert!(
            entity
                .assign(AudioPatch::default().with_rate(44100), Tracking::Authoritative)
                .unwrap()
        );

        assert!(!entity.is_dirty());
        assert_eq!(entity.attributes().rate, 44100);
    }

    #[tokio::test]
    async fn failed_apply_keeps_entity_dirty_for_retry() {
        let (session, mixers) = mixers();
        session.fail("audio mixer add 1 Main");

        let err = mixers.create(None, AudioPatch::named("Main")).await.unwrap_err();
        assert!(matches!(err, CoreError::Session(_)));

        let entity = mixers.by_id(1).unwrap();
        assert!(entity.is_dirty());
        assert!(!entity.is_on_server());

        session.heal("audio mixer add 1 Main");
        entity.apply().await.unwrap();
        assert!(!entity.is_dirty());
        assert!(entity.is_on_server());
    }

    #[tokio::test]
    async fn failed_setter_after_create_is_retried_without_create() {
        let (session, mixers) = mixers();
        session.fail("audio mixer rate 1 48000");

        let entity = mixers.stage(None, AudioPatch::named("Main").with_rate(48000)).unwrap();
        assert!(entity.apply().await.is_err());
        assert!(entity.is_on_server());
        assert!(entity.is_dirty());

        session.heal("audio mixer rate 1 48000");
        session.clear_sent();
        entity.apply().await.unwrap();

        assert_eq!(session.sent(), vec!["audio mixer rate 1 48000"]);
    }

    #[tokio::test]
    async fn edit_during_apply_leaves_entity_dirty() {
        let (session, mixers) = mixers();
        let entity = mixers.stage(None, AudioPatch::named("Main").with_rate(48000)).unwrap();

        let gate = Arc::new(tokio::sync::Mutex::new(()));
        session.install_gate(Arc::clone(&gate));
        let held = gate.lock().await;

        let in_flight = tokio::spawn({
            let entity = Arc::clone(&entity);
            async move { entity.apply().await }
        });
        // Let the apply take its snapshot and block on the session.
        tokio::task::yield_now().await;

        entity.assign(AudioPatch::default().with_muted(true), Tracking::Track).unwrap();
        drop(held);
        in_flight.await.unwrap().unwrap();

        assert!(entity.is_dirty());
        assert_eq!(entity.pending().muted, Some(true));
        assert!(!session.sent().contains(&"audio mixer mute on 1".to_owned()));

        session.clear_sent();
        entity.apply().await.unwrap();
        assert!(!entity.is_dirty());
        assert!(session.sent().contains(&"audio mixer mute on 1".to_owned()));
        assert!(!session.sent().iter().any(|c| c.starts_with("audio mixer add")));
    }

    #[tokio::test]
    async fn concurrent_delete_sends_one_command() {
        let (session, mixers) = mixers();
        let entity = mixers.create(None, AudioPatch::named("Main")).await.unwrap();
        session.clear_sent();

        let (first, second) = tokio::join!(entity.delete(), entity.delete());

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(session.sent(), vec!["audio mixer add 1"]);
        assert!(mixers.is_empty());
    }

    #[tokio::test]
    async fn concurrent_delete_after_failure_retries_and_fails() {
        let (session, mixers) = mixers();
        let entity = mixers.create(None, AudioPatch::named("Main")).await.unwrap();
        session.fail("audio mixer add 1");
        session.clear_sent();

        let (first, second) = tokio::join!(entity.delete(), entity.delete());

        assert!(first.is_err() && second.is_err());
        assert_eq!(session.sent(), vec!["audio mixer add 1", "audio mixer add 1"]);
        assert!(!entity.is_deleted());
        assert_eq!(mixers.all_ids(), vec![1]);
    }

    #[tokio::test]
    async fn deleted_handle_refuses_edits_to_reused_id() {
        let (session, mixers) = mixers();
        let a = mixers.create(None, AudioPatch::named("A")).await.unwrap();
        a.delete().await.unwrap();
        let c = mixers.create(None, AudioPatch::named("C")).await.unwrap();
        assert_eq!(c.id(), a.id());
        session.clear_sent();

        let assigned = a.assign(AudioPatch::default().with_muted(true), Tracking::Track);
        let applied = a.apply().await;

        assert!(a.is_deleted());
        assert!(!a.is_on_server());
        assert!(matches!(assigned, Err(CoreError::NotFound { id: 1, .. })));
        assert!(matches!(applied, Err(CoreError::NotFound { id: 1, .. })));
        assert!(session.sent().is_empty());
        assert!(!c.attributes().muted);
        assert!(!c.is_dirty());
    }

    #[tokio::test]
    async fn delete_of_unapplied_entity_is_local_only() {
        let (session, mixers) = mixers();
        let entity = mixers.stage(None, AudioPatch::named("Draft")).unwrap();

        entity.delete().await.unwrap();

        assert!(session.sent().is_empty());
        assert!(mixers.is_empty());
    }

    #[tokio::test]
    async fn failed_delete_leaves_entity_in_place() {
        let (session, mixers) = mixers();
        let entity = mixers.create(None, AudioPatch::named("Main")).await.unwrap();
        session.fail("audio mixer add 1");

        assert!(entity.delete().await.is_err());
        assert_eq!(mixers.all_ids(), vec![1]);

        session.heal("audio mixer add 1");
        entity.delete().await.unwrap();
        assert!(mixers.is_empty());
    }

    #[tokio::test]
    async fn stale_handle_delete_does_not_remove_replacement() {
        let (_session, mixers) = mixers();
        let old = mixers.stage(Some(1), AudioPatch::named("old")).unwrap();
        old.delete().await.unwrap();
        let replacement = mixers.stage(Some(1), AudioPatch::named("new")).unwrap();

        // The old handle is already deleted; deleting it again is a no-op.
        old.delete().await.unwrap();

        assert!(Arc::ptr_eq(&mixers.by_id(1).unwrap(), &replacement));
    }
}
