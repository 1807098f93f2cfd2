// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns cache changes into work queue keys.

use crate::cache::Change;
use crate::key::ObjectKey;
use crate::queue::WorkQueue;
use crate::types::{owning_service_key, DesiredState};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, error, trace};

/// A cache change, tagged with the resource type it came from
#[derive(Debug, Clone)]
pub enum Notification {
    Service(Change<Service>),
    Ingress(Change<Ingress>),
}

pub struct EventTranslator {
    queue: WorkQueue<String>,
}

impl EventTranslator {
    pub fn new(queue: WorkQueue<String>) -> Self {
        Self { queue }
    }

    pub fn handle(&self, notification: Notification) {
        match notification {
            Notification::Service(Change::Added(service)) => self.enqueue_service(&service),
            Notification::Service(Change::Updated { old, new }) => {
                if DesiredState::new(old).is_equivalent(&DesiredState::new(new.clone())) {
                    trace!("Service {} unchanged, skipping", new.name_any());
                    return;
                }
                self.enqueue_service(&new);
            }
            // Reconciles re-read the cache, a vanished Service needs no work
            Notification::Service(Change::Deleted(_)) => {}
            Notification::Ingress(Change::Deleted(ingress)) => self.enqueue_owner(&ingress),
            Notification::Ingress(Change::Added(_) | Change::Updated { .. }) => {}
        }
    }

    fn enqueue_service(&self, service: &Service) {
        match ObjectKey::for_object(service) {
            Ok(key) => {
                debug!(key = %key, "Enqueueing service");
                self.queue.add(key.to_string());
            }
            Err(e) => error!("Failed to derive key for service: {}", e),
        }
    }

    fn enqueue_owner(&self, ingress: &Ingress) {
        match owning_service_key(ingress) {
            Some(key) => {
                debug!(key = %key, ingress = %ingress.name_any(), "Ingress deleted, enqueueing owner");
                self.queue.add(key.to_string());
            }
            None => trace!("Ingress {} has no owning service, ignoring", ingress.name_any()),
        }
    }
}
