// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owner reference lookups

use crate::constants::OWNER_KIND;
use crate::key::ObjectKey;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// The owner reference marked as controller, if any
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Key of the Service controlling this Ingress.
///
/// `None` when the Ingress has no controller or is controlled by another kind.
pub fn owning_service_key(ingress: &Ingress) -> Option<ObjectKey> {
    let owner = controller_of(&ingress.metadata)?;
    if owner.kind != OWNER_KIND {
        return None;
    }
    Some(ObjectKey::new(
        ingress.metadata.namespace.clone().unwrap_or_default(),
        owner.name.clone(),
    ))
}
