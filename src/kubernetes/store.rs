// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store backed by the Kubernetes API server

use crate::constants::watch::TIMEOUT_SECS;
use crate::error::{ManagerError, Result};
use crate::key::ObjectKey;
use crate::store::{Listing, ObjectStore, WatchEvent};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams, PostParams, WatchEvent as ApiWatchEvent, WatchParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// [`ObjectStore`] for one namespaced resource type, talking to the API server
/// through a [`kube::Client`].
pub struct KubeStore<K> {
    client: Client,
    _resource: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _resource: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn api(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    async fn list(&self, namespace: Option<&str>) -> Result<Listing<K>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        debug!("Listed {} objects", list.items.len());

        Ok(Listing {
            items: list.items,
            resource_version: list.metadata.resource_version,
        })
    }

    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    async fn watch(
        &self,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>> {
        let wp = WatchParams::default().timeout(TIMEOUT_SECS);
        let events = self.api(namespace).watch(&wp, resource_version).await?;

        Ok(events
            .filter_map(|event| async move {
                match event {
                    Ok(ApiWatchEvent::Added(obj)) => Some(Ok(WatchEvent::Added(obj))),
                    Ok(ApiWatchEvent::Modified(obj)) => Some(Ok(WatchEvent::Modified(obj))),
                    Ok(ApiWatchEvent::Deleted(obj)) => Some(Ok(WatchEvent::Deleted(obj))),
                    Ok(ApiWatchEvent::Bookmark(_)) => None,
                    Ok(ApiWatchEvent::Error(err)) => {
                        Some(Err(ManagerError::KubeError(kube::Error::Api(err))))
                    }
                    Err(e) => Some(Err(e.into())),
                }
            })
            .boxed())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        match self.api(Some(namespace)).get_opt(name).await? {
            Some(obj) => Ok(obj),
            None => Err(ManagerError::NotFound {
                kind: K::kind(&()).to_string(),
                key: ObjectKey::new(namespace, name).to_string(),
            }),
        }
    }

    #[instrument(skip(self, object), fields(kind = %K::kind(&())))]
    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        let created = self
            .api(Some(namespace))
            .create(&PostParams::default(), object)
            .await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
