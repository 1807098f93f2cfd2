// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired and actual state snapshots read from the watch caches.

use crate::constants::annotations;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;

/// The Service as last observed by the cache
#[derive(Clone, Debug)]
pub struct DesiredState {
    service: Arc<Service>,
}

impl DesiredState {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Check if the Service asks for an Ingress
    pub fn wants_ingress(&self) -> bool {
        self.service
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(annotations::INGRESS_HTTP))
    }

    /// Deep value comparison of the two snapshots
    pub fn is_equivalent(&self, other: &DesiredState) -> bool {
        Arc::ptr_eq(&self.service, &other.service) || *self.service == *other.service
    }
}

impl PartialEq for DesiredState {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}

/// The Ingress as last observed by the cache, if any
#[derive(Clone, Debug, Default)]
pub enum ActualState {
    #[default]
    Absent,
    Present(Arc<Ingress>),
}

impl ActualState {
    pub fn is_present(&self) -> bool {
        matches!(self, ActualState::Present(_))
    }
}

impl From<Option<Arc<Ingress>>> for ActualState {
    fn from(ingress: Option<Arc<Ingress>>) -> Self {
        ingress.map_or(ActualState::Absent, ActualState::Present)
    }
}
