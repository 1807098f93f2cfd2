// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use anyhow::Result;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ingress_manager::cache::WatchCache;
use ingress_manager::config::Config;
use ingress_manager::constants::QUEUE_NAME;
use ingress_manager::controller::{IngressController, Stores};
use ingress_manager::kubernetes::KubeStore;
use ingress_manager::queue::{ItemBackoff, WorkQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting ingress manager");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, workers={}, max_retries={}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.workers,
        config.max_retries
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let stores = Stores {
        services: Arc::new(KubeStore::<Service>::new(client.clone())),
        ingresses: Arc::new(KubeStore::<Ingress>::new(client)),
    };
    let queue = WorkQueue::new(QUEUE_NAME, ItemBackoff::default());
    let controller = IngressController::new(
        &config,
        stores,
        WatchCache::new(),
        WatchCache::new(),
        queue,
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    controller.run(cancel).await?;
    info!("Ingress manager stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received, draining work queue");
    cancel.cancel();
}
