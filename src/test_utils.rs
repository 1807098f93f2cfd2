// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API, an in-memory object store and fixtures.

use crate::constants::annotations;
use crate::error::{ManagerError, Result};
use crate::key::ObjectKey;
use crate::store::{Listing, ObjectStore, WatchEvent};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use http::{Request, Response};
use k8s_openapi::api::core::v1::Service;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::{Client, Resource};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, watch};
use tower::Service as TowerService;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for DELETE requests matching the path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl TowerService<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| {
                (
                    404,
                    r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#
                        .to_string(),
                )
            });
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock Ingress JSON response
pub fn ingress_json(namespace: &str, name: &str) -> String {
    serde_json::json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{name}"),
            "resourceVersion": "1"
        },
        "spec": {
            "rules": [{
                "host": "example.com",
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": { "service": { "name": name, "port": { "number": 80 } } }
                    }]
                }
            }]
        }
    })
    .to_string()
}

/// A Service with a uid, optionally carrying the ingress marker with `marker` as value
pub fn make_service(namespace: &str, name: &str, marker: Option<&str>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            annotations: marker.map(|v| {
                BTreeMap::from([(annotations::INGRESS_HTTP.to_string(), v.to_string())])
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn api_error(code: u16, reason: &str, message: String) -> ManagerError {
    ManagerError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

fn event_object<K>(event: &WatchEvent<K>) -> &K {
    match event {
        WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
    }
}

fn in_namespace<K: Resource>(obj: &K, namespace: Option<&str>) -> bool {
    namespace.map_or(true, |ns| obj.meta().namespace.as_deref() == Some(ns))
}

struct MemoryState<K> {
    revision: u64,
    objects: BTreeMap<ObjectKey, K>,
    history: Vec<(u64, WatchEvent<K>)>,
}

/// What open watch streams receive
#[derive(Clone)]
enum Signal<K> {
    Event(WatchEvent<K>),
    /// End every open watch cleanly, like a server-side timeout
    Close,
    /// Fail every open watch with 410 Gone
    Expire,
}

/// In-memory [`ObjectStore`] with resource versions and a replayable watch history.
///
/// Every call to `list`, `create` and `delete` is counted, including failed ones.
pub struct MemoryStore<K> {
    state: Mutex<MemoryState<K>>,
    signals: broadcast::Sender<Signal<K>>,
    lists_paused: watch::Sender<bool>,
    lists: AtomicUsize,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    failing_lists: AtomicUsize,
    failing_writes: AtomicUsize,
}

/// Consume one injected failure, if any are left
fn take_failure(counter: &AtomicUsize) -> Result<()> {
    match counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
        Ok(_) => Err(api_error(500, "InternalError", "injected failure".to_string())),
        Err(_) => Ok(()),
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(256);
        let (lists_paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(MemoryState {
                revision: 0,
                objects: BTreeMap::new(),
                history: Vec::new(),
            }),
            signals,
            lists_paused,
            lists: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            failing_lists: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
        }
    }

    /// Store an object, emitting Added or Modified
    pub fn insert(&self, obj: K) -> K {
        let key = ObjectKey::for_object(&obj).expect("object needs a name");
        let mut state = self.state.lock();
        let existed = state.objects.contains_key(&key);
        let stored = self.record(&mut state, obj, |o| {
            if existed {
                WatchEvent::Modified(o)
            } else {
                WatchEvent::Added(o)
            }
        });
        state.objects.insert(key, stored.clone());
        stored
    }

    /// Remove an object, emitting Deleted
    pub fn remove(&self, namespace: &str, name: &str) -> Option<K> {
        let mut state = self.state.lock();
        let obj = state.objects.remove(&ObjectKey::new(namespace, name))?;
        Some(self.record(&mut state, obj, WatchEvent::Deleted))
    }

    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.state
            .lock()
            .objects
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make the next `count` list calls fail with a server error
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` create/delete calls fail with a server error
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Hold every list call until [`MemoryStore::resume_lists`]
    pub fn pause_lists(&self) {
        self.lists_paused.send_replace(true);
    }

    pub fn resume_lists(&self) {
        self.lists_paused.send_replace(false);
    }

    /// End open watch streams without an error
    pub fn close_watches(&self) {
        let _ = self.signals.send(Signal::Close);
    }

    /// Fail open watch streams with 410 Gone
    pub fn expire_watches(&self) {
        let _ = self.signals.send(Signal::Expire);
    }

    fn record(
        &self,
        state: &mut MemoryState<K>,
        mut obj: K,
        event: impl FnOnce(K) -> WatchEvent<K>,
    ) -> K {
        state.revision += 1;
        obj.meta_mut().resource_version = Some(state.revision.to_string());
        let event = event(obj.clone());
        state.history.push((state.revision, event.clone()));
        // No receivers is fine
        let _ = self.signals.send(Signal::Event(event));
        obj
    }
}

impl<K> Default for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn list(&self, namespace: Option<&str>) -> Result<Listing<K>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut paused = self.lists_paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;
        take_failure(&self.failing_lists)?;

        let state = self.state.lock();
        Ok(Listing {
            items: state
                .objects
                .values()
                .filter(|o| in_namespace(*o, namespace))
                .cloned()
                .collect(),
            resource_version: Some(state.revision.to_string()),
        })
    }

    async fn watch(
        &self,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>>>> {
        let since: u64 = resource_version.parse().map_err(|_| {
            ManagerError::InvalidObject(format!("invalid resource version {resource_version:?}"))
        })?;
        let namespace = namespace.map(str::to_string);

        let (backlog, rx) = {
            let state = self.state.lock();
            let backlog: Vec<_> = state
                .history
                .iter()
                .filter(|(rev, ev)| {
                    *rev > since && in_namespace(event_object(ev), namespace.as_deref())
                })
                .map(|(_, ev)| Ok(ev.clone()))
                .collect();
            (backlog, self.signals.subscribe())
        };

        let live = stream::unfold(Some((rx, namespace)), |open| async move {
            let Some((mut rx, namespace)) = open else {
                return None;
            };
            loop {
                match rx.recv().await {
                    Ok(Signal::Event(ev)) if in_namespace(event_object(&ev), namespace.as_deref()) => {
                        return Some((Ok(ev), Some((rx, namespace))))
                    }
                    Ok(Signal::Event(_)) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Ok(Signal::Expire) => {
                        let gone = api_error(410, "Expired", "too old resource version".to_string());
                        return Some((Err(gone), None));
                    }
                    Ok(Signal::Close) | Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream::iter(backlog).chain(live).boxed())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.object(namespace, name)
            .ok_or_else(|| ManagerError::NotFound {
                kind: K::kind(&()).to_string(),
                key: ObjectKey::new(namespace, name).to_string(),
            })
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failing_writes)?;

        let mut obj = object.clone();
        obj.meta_mut().namespace = Some(namespace.to_string());
        let key = ObjectKey::for_object(&obj)?;

        let mut state = self.state.lock();
        if state.objects.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists", format!("{key} already exists")));
        }
        let stored = self.record(&mut state, obj, WatchEvent::Added);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failing_writes)?;

        let mut state = self.state.lock();
        let key = ObjectKey::new(namespace, name);
        let obj = state
            .objects
            .remove(&key)
            .ok_or_else(|| api_error(404, "NotFound", format!("{key} not found")))?;
        self.record(&mut state, obj, WatchEvent::Deleted);
        Ok(())
    }
}
