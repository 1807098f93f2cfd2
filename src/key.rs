// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `namespace/name` object keys

use crate::error::{ManagerError, Result};
use kube::Resource;
use std::fmt;
use std::str::FromStr;

/// Identity of a namespaced object. An empty namespace renders as `name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Derive the key of a stored object. Fails when the object has no name.
    pub fn for_object<K>(obj: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = obj.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| ManagerError::MissingMetadata {
                kind: K::kind(&()).to_string(),
                field: "name",
            })?;
        Ok(Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for ObjectKey {
    type Err = ManagerError;

    fn from_str(key: &str) -> Result<Self> {
        let (namespace, name) = match key.split_once('/') {
            None => ("", key),
            Some((namespace, rest)) if namespace.is_empty() || rest.contains('/') => {
                return Err(ManagerError::InvalidKey(key.to_string()))
            }
            Some((namespace, name)) => (namespace, name),
        };
        if name.is_empty() {
            return Err(ManagerError::InvalidKey(key.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}
