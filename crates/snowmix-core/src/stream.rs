// ── Membership subscriptions ──
//
// A collection publishes a versioned snapshot of its members on every
// membership change. Subscribers either await changes one at a time or turn
// the subscription into a `Stream`.

use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Members of a collection as of one membership change.
pub struct Snapshot<T> {
    /// Membership changes the collection had seen when this was taken.
    pub version: u64,
    pub entities: Arc<Vec<Arc<T>>>,
}

impl<T> Snapshot<T> {
    pub(crate) fn new(version: u64, entities: Vec<Arc<T>>) -> Self {
        Self {
            version,
            entities: Arc::new(entities),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(0, Vec::new())
    }
}

// Derive would demand `T: Clone`; only the `Arc`s are cloned.
impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            entities: Arc::clone(&self.entities),
        }
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [Arc<T>];

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

/// A subscription to the members of one collection.
pub struct EntityStream<T: Send + Sync + 'static> {
    current: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot taken at subscription or by the last `changed()`.
    pub fn current(&self) -> &Snapshot<T> {
        &self.current
    }

    /// Wait for the next membership change. `None` once the collection is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Yields the latest snapshot now, then one per change.
    ///
    /// Changes that land between two polls collapse into the newest
    /// snapshot; compare versions to notice the gap.
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

pub struct EntityWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn stream_starts_with_latest_and_follows_changes() {
        let (tx, rx) = watch::channel(Snapshot::<u32>::empty());
        let mut stream = EntityStream::new(rx).into_stream();

        let first = stream.next().await.unwrap();
        assert_eq!(first.version, 0);
        assert!(first.is_empty());

        tx.send_replace(Snapshot::new(1, vec![Arc::new(7)]));
        let second = stream.next().await.unwrap();
        assert_eq!(second.version, 1);
        assert_eq!(*second[0], 7);

        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn changed_updates_current() {
        let (tx, rx) = watch::channel(Snapshot::<u32>::empty());
        let mut subscription = EntityStream::new(rx);

        tx.send_replace(Snapshot::new(3, vec![Arc::new(1), Arc::new(2)]));
        let snap = subscription.changed().await.unwrap();

        assert_eq!(snap.version, 3);
        assert_eq!(subscription.current().len(), 2);
    }
}
