// ── Generic entity collection ──
//
// One collection per object kind. Membership lives in an insertion-ordered
// map behind a short-lived lock; every membership change publishes a new
// versioned snapshot to subscribers.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use snowmix_api::Session;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::entity::Entity;
use crate::codec::LineGrammar;
use crate::error::{CoreError, collect_batch};
use crate::ids;
use crate::kind::{Kind, Patch, PatchOf, Tracking};
use crate::stream::{EntityStream, Snapshot};

/// Collection-level facts reported by the server's info listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionMeta {
    /// Most objects of this kind the server will hold.
    pub max_count: Option<u32>,
    pub verbose_level: Option<u32>,
}

pub(crate) struct Shared<K: Kind, S: Session> {
    pub(crate) session: Arc<S>,
    pub(crate) grammar: LineGrammar,
    entities: Mutex<IndexMap<u32, Arc<Entity<K, S>>>>,
    pub(crate) meta: Mutex<CollectionMeta>,
    snapshot: watch::Sender<Snapshot<Entity<K, S>>>,
    pub(crate) last_populate: watch::Sender<Option<DateTime<Utc>>>,
}

impl<K: Kind, S: Session> Shared<K, S> {
    pub(crate) fn entities(&self) -> MutexGuard<'_, IndexMap<u32, Arc<Entity<K, S>>>> {
        self.entities.lock().expect("collection lock poisoned")
    }

    /// Remove `entity` if it is still the member registered under its id.
    pub(crate) fn detach(&self, entity: &Entity<K, S>) {
        let removed = {
            let mut entities = self.entities();
            let is_member = entities
                .get(&entity.id())
                .is_some_and(|member| std::ptr::eq(Arc::as_ptr(member), entity));
            if is_member {
                entities.shift_remove(&entity.id());
            }
            is_member
        };
        if removed {
            self.publish();
        }
    }

    /// Rebuild the snapshot under the next version and broadcast it.
    pub(crate) fn publish(&self) {
        let values: Vec<Arc<Entity<K, S>>> = self.entities().values().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot
            .send_modify(|snap| *snap = Snapshot::new(snap.version + 1, values));
    }
}

/// All entities of kind `K` mirrored from one server.
///
/// Cheaply cloneable; clones share the same membership.
pub struct Collection<K: Kind, S: Session> {
    pub(crate) shared: Arc<Shared<K, S>>,
}

impl<K: Kind, S: Session> Clone for Collection<K, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: Kind, S: Session> Collection<K, S> {
    pub fn new(session: Arc<S>) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::empty());
        let (last_populate, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared {
                session,
                grammar: LineGrammar::new(K::TAG),
                entities: Mutex::new(IndexMap::new()),
                meta: Mutex::new(CollectionMeta::default()),
                snapshot,
                last_populate,
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        K::TAG
    }

    pub fn session(&self) -> &Arc<S> {
        &self.shared.session
    }

    // ── Read-only views ──────────────────────────────────────────────

    /// All entities in insertion order.
    pub fn all(&self) -> Vec<Arc<Entity<K, S>>> {
        self.shared.entities().values().cloned().collect()
    }

    /// Ids of all entities, in insertion order.
    pub fn all_ids(&self) -> Vec<u32> {
        self.shared.entities().keys().copied().collect()
    }

    /// Exact-match lookup. `None` is a normal outcome, e.g. for a stale reference.
    pub fn by_id(&self, id: u32) -> Option<Arc<Entity<K, S>>> {
        self.shared.entities().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entities().is_empty()
    }

    pub fn next_available_id(&self) -> u32 {
        ids::next_id(self.shared.entities().keys().copied())
    }

    /// Metadata captured by the last populate.
    pub fn meta(&self) -> CollectionMeta {
        *self.shared.meta.lock().expect("collection meta lock poisoned")
    }

    pub fn last_populate(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_populate.borrow()
    }

    /// Number of membership changes so far.
    pub fn version(&self) -> u64 {
        self.shared.snapshot.borrow().version
    }

    /// Subscribe to membership snapshots.
    pub fn subscribe(&self) -> EntityStream<Entity<K, S>> {
        EntityStream::new(self.shared.snapshot.subscribe())
    }

    // ── Create / update ──────────────────────────────────────────────

    /// Create or update locally, without talking to the server.
    ///
    /// With an id that already exists this is an update. Otherwise a new
    /// dirty entity is added, under `id` or the next free id. Call
    /// [`Entity::apply`] to push the change. Id 0 is never valid.
    pub fn stage(&self, id: Option<u32>, patch: PatchOf<K>) -> Result<Arc<Entity<K, S>>, CoreError> {
        if id == Some(0) {
            return Err(CoreError::InvalidId { kind: K::TAG, id: 0 });
        }
        Ok(self.upsert(id, patch, Tracking::Track))
    }

    /// Create or update, then apply.
    ///
    /// If the apply fails the entity stays in the collection, dirty, so
    /// the caller may retry [`Entity::apply`] or delete it.
    pub async fn create(
        &self,
        id: Option<u32>,
        patch: PatchOf<K>,
    ) -> Result<Arc<Entity<K, S>>, CoreError> {
        let entity = self.stage(id, patch)?;
        entity.apply().await?;
        Ok(entity)
    }

    /// Stage every request in order, then apply them concurrently.
    ///
    /// Ids are allocated in request order. Every apply is attempted; the
    /// batch fails if any of them failed. An invalid id fails the call
    /// before anything is sent; requests ahead of it stay staged.
    pub async fn create_many(
        &self,
        requests: Vec<(Option<u32>, PatchOf<K>)>,
    ) -> Result<Vec<Arc<Entity<K, S>>>, CoreError> {
        let staged = requests
            .into_iter()
            .map(|(id, patch)| self.stage(id, patch))
            .collect::<Result<Vec<_>, _>>()?;

        let results = join_all(staged.iter().map(|entity| async move {
            entity.apply().await.map(|()| Arc::clone(entity))
        }))
        .await;

        collect_batch(K::TAG, results)
    }

    /// Apply every dirty entity.
    pub async fn apply_all(&self) -> Result<(), CoreError> {
        let dirty: Vec<_> = self.all().into_iter().filter(|e| e.is_dirty()).collect();
        let results = join_all(dirty.iter().map(|entity| entity.apply())).await;
        collect_batch(K::TAG, results).map(|_| ())
    }

    /// The create-or-update path shared by local edits and discovery.
    ///
    /// A member whose delete already succeeded counts as absent and is
    /// replaced. Callers keep id 0 out.
    pub(crate) fn upsert(
        &self,
        id: Option<u32>,
        mut patch: PatchOf<K>,
        tracking: Tracking,
    ) -> Arc<Entity<K, S>> {
        let entity = {
            let mut entities = self.shared.entities();

            let live = id
                .and_then(|id| entities.get(&id))
                .filter(|existing| !existing.is_deleted())
                .cloned();
            if let Some(existing) = live {
                drop(entities);
                if let Err(e) = existing.assign(patch, tracking) {
                    debug!(kind = K::TAG, id = existing.id(), error = %e, "update raced a delete");
                }
                return existing;
            }

            // Allocation and insertion happen under one lock.
            let id = id.unwrap_or_else(|| ids::next_id(entities.keys().copied()));
            if patch.name().is_none() {
                patch.set_name(K::default_name(id));
            }

            let session = Arc::clone(&self.shared.session);
            let owner = Arc::downgrade(&self.shared);
            let entity = Arc::new(match tracking {
                Tracking::Track => Entity::staged(id, patch, session, owner),
                Tracking::Authoritative => Entity::discovered(id, patch, session, owner),
            });
            entities.insert(id, Arc::clone(&entity));
            entity
        };

        debug!(kind = K::TAG, id = entity.id(), ?tracking, "entity added");
        self.shared.publish();
        entity
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Delete the entity with `id`.
    pub async fn delete(&self, id: u32) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.delete().await
    }

    /// Delete every entity present when the call starts.
    ///
    /// Deletions run concurrently. All are attempted; entities that were
    /// deleted stay deleted even when others fail.
    pub async fn delete_all(&self) -> Result<(), CoreError> {
        let victims = self.all_ids();
        debug!(kind = K::TAG, count = victims.len(), "deleting all");

        let results = join_all(victims.iter().map(|&id| async move {
            match self.by_id(id) {
                Some(entity) => entity.delete().await,
                None => Ok(()),
            }
        }))
        .await;

        collect_batch(K::TAG, results).map(|_| ()).inspect_err(|e| {
            warn!(kind = K::TAG, error = %e, "delete_all finished with failures");
        })
    }

    /// Drop entities known to be on the server whose id is not in `keep`.
    /// Local entities that were never applied are left alone.
    pub(crate) fn prune_missing(&self, keep: &std::collections::HashSet<u32>) -> usize {
        let pruned = {
            let mut entities = self.shared.entities();
            let before = entities.len();
            entities.retain(|id, entity| keep.contains(id) || !entity.is_on_server());
            before - entities.len()
        };
        if pruned > 0 {
            self.shared.publish();
        }
        pruned
    }

    pub(crate) fn require(&self, id: u32) -> Result<Arc<Entity<K, S>>, CoreError> {
        self.by_id(id)
            .ok_or(CoreError::NotFound { kind: K::TAG, id })
    }
}

impl<K: Kind, S: Session> fmt::Debug for Collection<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &K::TAG)
            .field("ids", &self.all_ids())
            .field("meta", &self.meta())
            .finish_non_exhaustive()
    }
}
