// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{ingress, workers};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Shape of the Ingress generated for an annotated Service
#[derive(Debug, Clone, PartialEq)]
pub struct IngressTemplate {
    pub host: String,
    pub path: String,
    pub path_type: String,
    pub backend_port: i32,
    /// `None` leaves the class to the cluster default
    pub ingress_class: Option<String>,
}

impl Default for IngressTemplate {
    fn default() -> Self {
        Self {
            host: ingress::DEFAULT_HOST.to_string(),
            path: ingress::DEFAULT_PATH.to_string(),
            path_type: ingress::DEFAULT_PATH_TYPE.to_string(),
            backend_port: ingress::DEFAULT_BACKEND_PORT,
            ingress_class: Some(ingress::DEFAULT_CLASS.to_string()),
        }
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Namespace to watch, all namespaces when unset
    pub watch_namespace: Option<String>,
    pub workers: usize,
    /// Rate-limited retries of a failing key before it is dropped
    pub max_retries: u32,
    pub ingress: IngressTemplate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            workers: workers::DEFAULT_WORKERS,
            max_retries: workers::DEFAULT_MAX_RETRIES,
            ingress: IngressTemplate::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        let template = defaults.ingress;

        let workers: usize = parse_or(&lookup, "WORKERS", defaults.workers)?;
        if workers == 0 {
            anyhow::bail!("WORKERS must be at least 1");
        }

        Ok(Config {
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            workers,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            ingress: IngressTemplate {
                host: lookup("INGRESS_HOST").unwrap_or(template.host),
                path: lookup("INGRESS_PATH").unwrap_or(template.path),
                path_type: lookup("INGRESS_PATH_TYPE").unwrap_or(template.path_type),
                backend_port: parse_or(&lookup, "INGRESS_BACKEND_PORT", template.backend_port)?,
                // An empty class disables it
                ingress_class: match lookup("INGRESS_CLASS") {
                    Some(class) if class.is_empty() => None,
                    Some(class) => Some(class),
                    None => template.ingress_class,
                },
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, value)),
        None => Ok(default),
    }
}
