//! In-memory [`StatefulSetStore`] for tests
//!
//! Mimics the API server closely enough for convergence tests: objects get a uid and a
//! resource version on create, unset replica counts are defaulted, updates with a stale
//! resource version conflict, and failures can be injected per operation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::apps::v1::StatefulSetSpec;

use super::statefulset::DEFAULT_REPLICAS;
use super::store::object_key;
use super::ObjectKey;
use super::StatefulSetStore;
use super::StoreError;

/// Operations recorded by [`InMemoryStatefulSets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(ObjectKey),
    Create(ObjectKey),
    Update(ObjectKey),
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, StatefulSet>,
    calls: Vec<Call>,
    fail_get: bool,
    fail_create: bool,
    fail_update: bool,
    touch_after_get: bool,
    next_uid: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryStatefulSets {
    state: Arc<Mutex<State>>,
}

impl InMemoryStatefulSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as if it had been created out of band.
    pub fn insert(&self, mut sts: StatefulSet) {
        let mut state = self.state.lock().unwrap();
        sts.metadata.resource_version.get_or_insert_with(|| "1".to_string());
        apply_defaults(&mut sts);
        state.objects.insert(object_key(&sts), sts);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<StatefulSet> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Get(_)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn set_fail_get(&self, enabled: bool) {
        self.state.lock().unwrap().fail_get = enabled;
    }

    pub fn set_fail_create(&self, enabled: bool) {
        self.state.lock().unwrap().fail_create = enabled;
    }

    pub fn set_fail_update(&self, enabled: bool) {
        self.state.lock().unwrap().fail_update = enabled;
    }

    /// Let a concurrent writer bump the stored object right after the next successful get.
    pub fn touch_after_get(&self) {
        self.state.lock().unwrap().touch_after_get = true;
    }
}

fn touch(sts: &mut StatefulSet) {
    let version = next_version(sts);
    sts.metadata.resource_version = Some(version);
}

/// Fill in `spec.replicas` the way the API server does on admission.
fn apply_defaults(sts: &mut StatefulSet) {
    sts.spec
        .get_or_insert_with(StatefulSetSpec::default)
        .replicas
        .get_or_insert(DEFAULT_REPLICAS);
}

fn next_version(sts: &StatefulSet) -> String {
    let current = sts
        .metadata
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    (current + 1).to_string()
}

fn request_failed(operation: &'static str, key: ObjectKey) -> Report<StoreError> {
    Report::new(StoreError::Request { operation, key })
}

#[async_trait]
impl StatefulSetStore for InMemoryStatefulSets {
    async fn get(&self, key: &ObjectKey) -> Result<StatefulSet, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Get(key.clone()));
        if state.fail_get {
            return Err(request_failed("get", key.clone()));
        }
        let touch_after_get = state.touch_after_get;
        let Some(stored) = state.objects.get_mut(key) else {
            return Err(Report::new(StoreError::NotFound { key: key.clone() }));
        };
        let fetched = stored.clone();
        if touch_after_get {
            touch(stored);
            state.touch_after_get = false;
        }
        Ok(fetched)
    }

    async fn create(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>> {
        let key = object_key(sts);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(key.clone()));
        if state.fail_create {
            return Err(request_failed("create", key));
        }
        if state.objects.contains_key(&key) {
            return Err(Report::new(StoreError::Conflict { key }));
        }

        state.next_uid += 1;
        let mut created = sts.clone();
        apply_defaults(&mut created);
        created.metadata.uid = Some(format!("sts-uid-{}", state.next_uid));
        created.metadata.resource_version = Some("1".to_string());
        created.metadata.generation = Some(1);
        state.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>> {
        let key = object_key(sts);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update(key.clone()));
        if state.fail_update {
            return Err(request_failed("update", key));
        }
        let Some(current) = state.objects.get(&key) else {
            return Err(Report::new(StoreError::NotFound { key }));
        };
        if current.metadata.resource_version != sts.metadata.resource_version {
            return Err(Report::new(StoreError::Conflict { key }));
        }

        let mut updated = sts.clone();
        apply_defaults(&mut updated);
        updated.metadata.resource_version = Some(next_version(current));
        updated.metadata.generation = Some(current.metadata.generation.unwrap_or(1) + 1);
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }
}
