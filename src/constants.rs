// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys used by the ingress manager
pub mod annotations {
    /// Presence (any value) requests an Ingress for the Service
    pub const INGRESS_HTTP: &str = "ingress/http";
}

/// Kind of the object allowed to own a managed Ingress
pub const OWNER_KIND: &str = "Service";

/// Name of the work queue, used in log fields
pub const QUEUE_NAME: &str = "ingressManager";

/// Worker pool and retry defaults
pub mod workers {
    pub const DEFAULT_WORKERS: usize = 5;
    pub const DEFAULT_MAX_RETRIES: u32 = 10;
}

/// Defaults for the generated Ingress
pub mod ingress {
    pub const DEFAULT_HOST: &str = "example.com";
    pub const DEFAULT_PATH: &str = "/";
    pub const DEFAULT_PATH_TYPE: &str = "Prefix";
    pub const DEFAULT_BACKEND_PORT: i32 = 80;
    pub const DEFAULT_CLASS: &str = "nginx";
}

/// Per-key retry backoff of the work queue
pub mod backoff {
    /// Delay of the first retry in milliseconds, doubled on every failure
    pub const BASE_DELAY_MS: u64 = 5;
    /// Maximum delay in seconds
    pub const MAX_DELAY_SECS: u64 = 1000;
}

/// Watch cache list/watch configuration
pub mod watch {
    /// Server-side watch timeout; the cache resumes the watch when the stream closes
    pub const TIMEOUT_SECS: u32 = 290;
    /// Initial relist interval in seconds after a failure
    pub const RELIST_INTERVAL_SECS: u64 = 1;
    /// Maximum relist interval in seconds (exponential backoff cap)
    pub const RELIST_MAX_INTERVAL_SECS: u64 = 30;
    /// How long a delete seen by the watch blocks a stale local write
    pub const TOMBSTONE_TTL_SECS: u64 = 60;
}
