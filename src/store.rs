// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store interface consumed by the caches and the reconciler.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Result of a full list: the objects plus the version to start watching from.
#[derive(Debug, Clone)]
pub struct Listing<K> {
    pub items: Vec<K>,
    pub resource_version: Option<String>,
}

/// A single change delivered by a watch stream
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
}

/// List/Watch/Get/Create/Delete for one object type.
///
/// `namespace = None` on list and watch covers all namespaces. `get` reports
/// absence as [`crate::error::ManagerError::NotFound`].
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    async fn list(&self, namespace: Option<&str>) -> Result<Listing<K>>;

    async fn watch(
        &self,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>>;

    async fn get(&self, namespace: &str, name: &str) -> Result<K>;

    async fn create(&self, namespace: &str, object: &K) -> Result<K>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}
