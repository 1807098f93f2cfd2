// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local mirror of one resource type, fed by list + watch.

use crate::constants::watch::{RELIST_INTERVAL_SECS, RELIST_MAX_INTERVAL_SECS, TOMBSTONE_TTL_SECS};
use crate::error::{ManagerError, Result};
use crate::key::ObjectKey;
use crate::store::{ObjectStore, WatchEvent};
use futures::StreamExt;
use kube::Resource;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A change applied to the cache, handed to the event handler after the cache
/// reflects it.
#[derive(Debug, Clone)]
pub enum Change<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(Arc<K>),
}

struct Contents<K> {
    objects: HashMap<ObjectKey, Arc<K>>,
    /// Keys deleted by the watch, with the version of the delete
    tombstones: HashMap<ObjectKey, (Option<String>, Instant)>,
}

impl<K> Contents<K> {
    fn prune_tombstones(&mut self) {
        let ttl = Duration::from_secs(TOMBSTONE_TTL_SECS);
        self.tombstones.retain(|_, (_, at)| at.elapsed() < ttl);
    }
}

struct Inner<K> {
    kind: String,
    contents: RwLock<Contents<K>>,
    synced: watch::Sender<bool>,
    relist_interval: Duration,
    relist_max_interval: Duration,
}

/// Cloning yields another handle to the same cache.
pub struct WatchCache<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WatchCache<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> Default for WatchCache<K>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Order two resource versions. They are opaque unless both are integers.
fn version_order(a: Option<&str>, b: Option<&str>) -> Option<Ordering> {
    let a: u64 = a?.parse().ok()?;
    let b: u64 = b?.parse().ok()?;
    Some(a.cmp(&b))
}

fn event_version<K: Resource>(event: &WatchEvent<K>) -> Option<String> {
    match event {
        WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
            obj.meta().resource_version.clone()
        }
    }
}

impl<K> WatchCache<K>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_relist_backoff(
            Duration::from_secs(RELIST_INTERVAL_SECS),
            Duration::from_secs(RELIST_MAX_INTERVAL_SECS),
        )
    }

    /// Cache whose failed list/watch rounds back off from `initial`, doubling up to `max`
    pub fn with_relist_backoff(initial: Duration, max: Duration) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                kind: K::kind(&()).to_string(),
                contents: RwLock::new(Contents {
                    objects: HashMap::new(),
                    tombstones: HashMap::new(),
                }),
                synced,
                relist_interval: initial,
                relist_max_interval: max,
            }),
        }
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// Point lookup. Fails if the initial list has not been applied yet.
    pub fn get(&self, key: &ObjectKey) -> Result<Option<Arc<K>>> {
        if !self.has_synced() {
            return Err(ManagerError::CacheNotSynced(self.inner.kind.clone()));
        }
        Ok(self.inner.contents.read().objects.get(key).cloned())
    }

    pub fn has_synced(&self) -> bool {
        *self.inner.synced.borrow()
    }

    /// Block until the initial list is applied and the watch is running.
    ///
    /// Returns false if `cancel` fires first.
    pub async fn wait_for_sync(&self, cancel: &CancellationToken) -> bool {
        let mut synced = self.inner.synced.subscribe();
        tokio::select! {
            _ = cancel.cancelled() => false,
            res = synced.wait_for(|s| *s) => res.is_ok(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.contents.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn mark_synced(&self) {
        self.inner.synced.send_replace(true);
    }

    /// Record an object written by this process before the watch reports it.
    ///
    /// Skipped when the watch already showed the key at the same or a newer
    /// version, or deleted it. Versions that cannot be ordered favour the watch.
    pub fn assume(&self, obj: K) {
        let key = match ObjectKey::for_object(&obj) {
            Ok(key) => key,
            Err(e) => {
                warn!(kind = %self.inner.kind, "Not caching written object: {}", e);
                return;
            }
        };
        let version = obj.meta().resource_version.clone();
        let newer = |seen: Option<&str>| {
            version_order(seen, version.as_deref()) == Some(Ordering::Less)
        };

        let mut contents = self.inner.contents.write();
        contents.prune_tombstones();
        if let Some((deleted, _)) = contents.tombstones.get(&key) {
            if !newer(deleted.as_deref()) {
                debug!(kind = %self.inner.kind, key = %key, "Watch already deleted written object");
                return;
            }
        }
        if let Some(cached) = contents.objects.get(&key) {
            if !newer(cached.meta().resource_version.as_deref()) {
                debug!(kind = %self.inner.kind, key = %key, "Watch already has written object");
                return;
            }
        }
        contents.tombstones.remove(&key);
        contents.objects.insert(key, Arc::new(obj));
    }

    /// Record a delete issued by this process before the watch reports it.
    ///
    /// The entry is only dropped while it is still the version that was deleted.
    pub fn assume_deleted(&self, obj: &K) {
        let Ok(key) = ObjectKey::for_object(obj) else {
            return;
        };
        let mut contents = self.inner.contents.write();
        let unchanged = contents
            .objects
            .get(&key)
            .is_some_and(|cached| cached.meta().resource_version == obj.meta().resource_version);
        if unchanged {
            contents.objects.remove(&key);
        }
    }

    /// Keep the cache in sync with `store` until `cancel` fires.
    ///
    /// A closed watch is resumed from the last version seen. A failed list or
    /// watch leads to a relist after a backoff that doubles per failure.
    pub async fn run<F>(
        &self,
        store: Arc<dyn ObjectStore<K>>,
        namespace: Option<String>,
        on_change: F,
        cancel: CancellationToken,
    ) where
        F: Fn(Change<K>) + Send + Sync,
    {
        let mut interval = self.inner.relist_interval;
        let mut resume: Option<String> = None;

        while !cancel.is_cancelled() {
            let result = match resume.take() {
                Some(version) => {
                    self.watch_from(store.as_ref(), namespace.as_deref(), version, &on_change, &cancel)
                        .await
                }
                None => {
                    self.list_and_watch(store.as_ref(), namespace.as_deref(), &on_change, &cancel)
                        .await
                }
            };

            match result {
                Ok(version) => {
                    interval = self.inner.relist_interval;
                    resume = version;
                    continue;
                }
                Err(e) => {
                    warn!(
                        kind = %self.inner.kind,
                        "List/watch failed: {}, relisting in {:?}...", e, interval
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            interval = (interval * 2).min(self.inner.relist_max_interval);
        }

        debug!(kind = %self.inner.kind, "Watch cache stopped");
    }

    async fn list_and_watch<F>(
        &self,
        store: &dyn ObjectStore<K>,
        namespace: Option<&str>,
        on_change: &F,
        cancel: &CancellationToken,
    ) -> Result<Option<String>>
    where
        F: Fn(Change<K>) + Send + Sync,
    {
        let listing = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            listing = store.list(namespace) => listing?,
        };
        debug!(kind = %self.inner.kind, "Listed {} objects", listing.items.len());
        self.replace(listing.items, on_change);

        let version = listing.resource_version.unwrap_or_else(|| "0".to_string());
        self.watch_from(store, namespace, version, on_change, cancel)
            .await
    }

    /// Follow the watch from `version`.
    ///
    /// Returns the last version seen when the stream closes, `None` on cancel.
    async fn watch_from<F>(
        &self,
        store: &dyn ObjectStore<K>,
        namespace: Option<&str>,
        mut version: String,
        on_change: &F,
        cancel: &CancellationToken,
    ) -> Result<Option<String>>
    where
        F: Fn(Change<K>) + Send + Sync,
    {
        let mut events = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            events = store.watch(namespace, &version) => events?,
        };

        if !self.has_synced() {
            info!(kind = %self.inner.kind, "Cache synced with {} objects", self.len());
            self.inner.synced.send_replace(true);
        }

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                event = events.next() => event,
            };
            match event {
                Some(Ok(event)) => {
                    if let Some(seen) = event_version(&event) {
                        version = seen;
                    }
                    self.apply(event, on_change);
                }
                Some(Err(e)) => return Err(e),
                None => {
                    debug!(kind = %self.inner.kind, version = %version, "Watch stream closed, resuming");
                    return Ok(Some(version));
                }
            }
        }
    }

    /// Replace the whole contents, reporting what changed
    pub fn replace<F>(&self, items: Vec<K>, on_change: &F)
    where
        F: Fn(Change<K>),
    {
        let mut fresh = HashMap::with_capacity(items.len());
        for item in items {
            match ObjectKey::for_object(&item) {
                Ok(key) => {
                    fresh.insert(key, Arc::new(item));
                }
                Err(e) => warn!(kind = %self.inner.kind, "Skipping listed object: {}", e),
            }
        }

        let mut changes = Vec::new();
        {
            let mut contents = self.inner.contents.write();
            for (key, new) in &fresh {
                match contents.objects.get(key) {
                    Some(old) => changes.push(Change::Updated {
                        old: old.clone(),
                        new: new.clone(),
                    }),
                    None => changes.push(Change::Added(new.clone())),
                }
            }
            for (key, old) in contents.objects.iter() {
                if !fresh.contains_key(key) {
                    changes.push(Change::Deleted(old.clone()));
                }
            }
            contents.tombstones.retain(|key, _| !fresh.contains_key(key));
            contents.objects = fresh;
        }

        for change in changes {
            on_change(change);
        }
    }

    /// Apply one watch event, reporting the resulting change
    pub fn apply<F>(&self, event: WatchEvent<K>, on_change: &F)
    where
        F: Fn(Change<K>),
    {
        let (obj, deleted) = match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => (obj, false),
            WatchEvent::Deleted(obj) => (obj, true),
        };
        let key = match ObjectKey::for_object(&obj) {
            Ok(key) => key,
            Err(e) => {
                warn!(kind = %self.inner.kind, "Skipping watch event: {}", e);
                return;
            }
        };
        let obj = Arc::new(obj);

        let change = {
            let mut contents = self.inner.contents.write();
            if deleted {
                contents.objects.remove(&key);
                contents.prune_tombstones();
                let version = obj.meta().resource_version.clone();
                contents.tombstones.insert(key, (version, Instant::now()));
                Change::Deleted(obj)
            } else {
                contents.tombstones.remove(&key);
                match contents.objects.insert(key, obj.clone()) {
                    Some(old) => Change::Updated { old, new: obj },
                    None => Change::Added(obj),
                }
            }
        };
        on_change(change);
    }
}
