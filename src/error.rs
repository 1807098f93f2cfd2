// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("{kind} object is missing metadata.{field}")]
    MissingMetadata { kind: String, field: &'static str },

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("{0} cache has not completed its initial sync")]
    CacheNotSynced(String),

    #[error("Failed to sync {0} cache")]
    CacheSyncFailed(String),
}

impl ManagerError {
    /// True for absence, whether reported by a store or by the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            ManagerError::NotFound { .. } => true,
            ManagerError::KubeError(kube::Error::Api(err)) => err.code == 404,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
