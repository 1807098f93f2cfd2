// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Controller lifecycle: watch caches, sync barrier, worker pool and retry policy.

use crate::cache::WatchCache;
use crate::config::Config;
use crate::error::{ManagerError, Result};
use crate::queue::WorkQueue;
use crate::reconcilers::IngressReconciler;
use crate::store::ObjectStore;
use crate::translator::{EventTranslator, Notification};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the controller reads from and writes to
pub struct Stores {
    pub services: Arc<dyn ObjectStore<Service>>,
    pub ingresses: Arc<dyn ObjectStore<Ingress>>,
}

pub struct IngressController {
    stores: Stores,
    services: WatchCache<Service>,
    ingresses: WatchCache<Ingress>,
    queue: WorkQueue<String>,
    reconciler: IngressReconciler,
    watch_namespace: Option<String>,
    workers: usize,
    max_retries: u32,
}

impl IngressController {
    pub fn new(
        config: &Config,
        stores: Stores,
        services: WatchCache<Service>,
        ingresses: WatchCache<Ingress>,
        queue: WorkQueue<String>,
    ) -> Self {
        let reconciler = IngressReconciler::new(
            services.clone(),
            ingresses.clone(),
            stores.ingresses.clone(),
            config.ingress.clone(),
        );

        Self {
            stores,
            services,
            ingresses,
            queue,
            reconciler,
            watch_namespace: config.watch_namespace.clone(),
            workers: config.workers,
            max_retries: config.max_retries,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Fails if the caches cannot complete their initial sync; no key is
    /// reconciled before both caches are synced.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let translator = Arc::new(EventTranslator::new(self.queue.clone()));
        let context = Arc::new(self);

        let service_watch = {
            let cache = context.services.clone();
            let store = context.stores.services.clone();
            let namespace = context.watch_namespace.clone();
            let translator = translator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cache
                    .run(
                        store,
                        namespace,
                        move |change| translator.handle(Notification::Service(change)),
                        cancel,
                    )
                    .await
            })
        };
        let ingress_watch = {
            let cache = context.ingresses.clone();
            let store = context.stores.ingresses.clone();
            let namespace = context.watch_namespace.clone();
            let translator = translator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cache
                    .run(
                        store,
                        namespace,
                        move |change| translator.handle(Notification::Ingress(change)),
                        cancel,
                    )
                    .await
            })
        };

        info!("Waiting for caches to sync...");
        let synced = if !context.services.wait_for_sync(&cancel).await {
            Err(ManagerError::CacheSyncFailed(context.services.kind().to_string()))
        } else if !context.ingresses.wait_for_sync(&cancel).await {
            Err(ManagerError::CacheSyncFailed(context.ingresses.kind().to_string()))
        } else {
            Ok(())
        };
        if let Err(e) = synced {
            cancel.cancel();
            context.queue.shut_down();
            let _ = tokio::join!(service_watch, ingress_watch);
            return Err(e);
        }

        // Shutting the queue down lets workers drain it and exit
        {
            let queue = context.queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                queue.shut_down();
            });
        }

        info!(queue = %context.queue.name(), "Caches synced, starting {} workers", context.workers);
        let workers = (0..context.workers).map(|id| {
            let context = context.clone();
            tokio::spawn(async move { context.worker(id).await })
        });
        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }

        let (services, ingresses) = tokio::join!(service_watch, ingress_watch);
        for result in [services, ingresses] {
            if let Err(e) = result {
                error!("Watch task failed: {}", e);
            }
        }

        info!("Controller stopped");
        Ok(())
    }

    async fn worker(&self, id: usize) {
        debug!(worker = id, "Worker started");
        while self.process_next_item().await {}
        debug!(worker = id, "Worker stopped");
    }

    /// Handle one key. Returns false once the queue is shut down.
    async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        match self.reconciler.sync(&key).await {
            Ok(()) => self.queue.forget(&key),
            Err(e) => self.handle_error(&key, e),
        }
        self.queue.done(&key);
        true
    }

    fn handle_error(&self, key: &str, error: ManagerError) {
        let requeues = self.queue.num_requeues(key);
        if requeues <= self.max_retries {
            warn!(key = %key, requeues, "Sync failed, retrying: {}", error);
            self.queue.add_rate_limited(key.to_string());
            return;
        }

        error!(key = %key, "Dropping key after {} retries: {}", requeues, error);
        self.queue.forget(key);
    }
}
