// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ingress reconciler - keeps one Ingress per annotated Service.

use crate::cache::WatchCache;
use crate::config::IngressTemplate;
use crate::error::{ManagerError, Result};
use crate::key::ObjectKey;
use crate::store::ObjectStore;
use crate::types::{ActualState, DesiredState};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What a sync has to do to converge
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    Create(Box<Ingress>),
    /// Delete the observed Ingress
    Delete(Arc<Ingress>),
    Nothing,
}

/// Decide how to converge the actual state onto the desired one.
///
/// An existing Ingress is left alone even if it differs from the template.
pub fn plan(
    desired: &DesiredState,
    actual: &ActualState,
    template: &IngressTemplate,
) -> Result<RouteAction> {
    match (desired.wants_ingress(), actual) {
        (true, ActualState::Absent) => Ok(RouteAction::Create(Box::new(build_ingress(
            desired.service(),
            template,
        )?))),
        (false, ActualState::Present(ingress)) => Ok(RouteAction::Delete(ingress.clone())),
        (true, ActualState::Present(_)) | (false, ActualState::Absent) => Ok(RouteAction::Nothing),
    }
}

/// Build the Ingress for a Service, controlled by that Service
pub fn build_ingress(service: &Service, template: &IngressTemplate) -> Result<Ingress> {
    let name = service
        .metadata
        .name
        .clone()
        .ok_or_else(|| ManagerError::MissingMetadata {
            kind: Service::kind(&()).to_string(),
            field: "name",
        })?;
    let owner = service.controller_owner_ref(&()).ok_or_else(|| {
        ManagerError::InvalidObject(format!("Service {} has no uid and cannot own an Ingress", name))
    })?;

    Ok(Ingress {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: service.metadata.namespace.clone(),
            owner_references: Some(vec![OwnerReference {
                block_owner_deletion: Some(true),
                ..owner
            }]),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: template.ingress_class.clone(),
            rules: Some(vec![IngressRule {
                host: Some(template.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(template.path.clone()),
                        path_type: template.path_type.clone(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name,
                                port: Some(ServiceBackendPort {
                                    number: Some(template.backend_port),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        status: None,
    })
}

pub struct IngressReconciler {
    services: WatchCache<Service>,
    ingresses: WatchCache<Ingress>,
    store: Arc<dyn ObjectStore<Ingress>>,
    template: IngressTemplate,
}

impl IngressReconciler {
    pub fn new(
        services: WatchCache<Service>,
        ingresses: WatchCache<Ingress>,
        store: Arc<dyn ObjectStore<Ingress>>,
        template: IngressTemplate,
    ) -> Self {
        Self {
            services,
            ingresses,
            store,
            template,
        }
    }

    /// Converge the Ingress of the Service identified by `key`
    #[instrument(skip(self))]
    pub async fn sync(&self, key: &str) -> Result<()> {
        let key: ObjectKey = key.parse()?;

        let Some(service) = self.services.get(&key)? else {
            debug!("Service no longer exists, nothing to do");
            return Ok(());
        };
        let desired = DesiredState::new(service);
        let actual = ActualState::from(self.ingresses.get(&key)?);

        match plan(&desired, &actual, &self.template)? {
            RouteAction::Create(ingress) => {
                let created = self.store.create(&key.namespace, &ingress).await?;
                info!("Created ingress {}", key);
                self.ingresses.assume(created);
            }
            RouteAction::Delete(ingress) => {
                let namespace = ingress.namespace().unwrap_or_default();
                self.store.delete(&namespace, &ingress.name_any()).await?;
                info!("Deleted ingress {}", key);
                self.ingresses.assume_deleted(&ingress);
            }
            RouteAction::Nothing => {
                debug!(
                    wants_ingress = desired.wants_ingress(),
                    has_ingress = actual.is_present(),
                    "Ingress up to date"
                );
            }
        }

        Ok(())
    }
}
