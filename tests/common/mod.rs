#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use dno::cache::FetchGateway;
use dno::error::FetchError;
use dno::model::{RawRecord, ResourceKey, ResourceLevel};

/// One child-list slot in the fake backend: the level plus the parent
/// id (None for the top-level region list).
type SlotId = (ResourceLevel, Option<String>);

#[derive(Default)]
struct MockInner {
    children: Mutex<HashMap<SlotId, Result<Vec<RawRecord>, FetchError>>>,
    details: Mutex<HashMap<String, Result<RawRecord, FetchError>>>,
    gates: Mutex<HashMap<SlotId, Arc<Notify>>>,
    detail_gates: Mutex<HashMap<String, Arc<Notify>>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

/// Deterministic in-memory gateway. Responses are canned per slot;
/// a gated slot holds its fetch in flight until the test releases it,
/// which is how the coalescing and invalidation races are driven.
#[derive(Clone, Default)]
pub struct MockGateway {
    inner: Arc<MockInner>,
}

impl MockGateway {
    pub fn new() -> Self {
        MockGateway::default()
    }

    fn slot(level: ResourceLevel, parent: Option<&str>) -> SlotId {
        (level, parent.map(String::from))
    }

    pub fn set_children(&self, level: ResourceLevel, parent: Option<&str>, records: Vec<RawRecord>) {
        self.inner
            .children
            .lock()
            .unwrap()
            .insert(Self::slot(level, parent), Ok(records));
    }

    pub fn fail_children(&self, level: ResourceLevel, parent: Option<&str>, error: FetchError) {
        self.inner
            .children
            .lock()
            .unwrap()
            .insert(Self::slot(level, parent), Err(error));
    }

    pub fn set_details(&self, id: &str, record: RawRecord) {
        self.inner.details.lock().unwrap().insert(id.to_string(), Ok(record));
    }

    pub fn fail_details(&self, id: &str, error: FetchError) {
        self.inner.details.lock().unwrap().insert(id.to_string(), Err(error));
    }

    /// Hold the next fetch for this slot until the returned Notify is
    /// notified.
    pub fn gate_children(&self, level: ResourceLevel, parent: Option<&str>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner
            .gates
            .lock()
            .unwrap()
            .insert(Self::slot(level, parent), gate.clone());
        gate
    }

    /// Hold the detail fetch for this instance id.
    pub fn gate_details(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner
            .detail_gates
            .lock()
            .unwrap()
            .insert(id.to_string(), gate.clone());
        gate
    }

    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.inner.detail_calls.load(Ordering::SeqCst)
    }
}

impl FetchGateway for MockGateway {
    async fn fetch_children(
        &self,
        level: ResourceLevel,
        parent: Option<&ResourceKey>,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let slot = (level, parent.map(|k| k.id().to_string()));
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.gates.lock().unwrap().remove(&slot);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner
            .children
            .lock()
            .unwrap()
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_details(&self, key: &ResourceKey) -> Result<RawRecord, FetchError> {
        self.inner.detail_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.detail_gates.lock().unwrap().remove(key.id());
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner
            .details
            .lock()
            .unwrap()
            .get(key.id())
            .cloned()
            .unwrap_or_else(|| Ok(RawRecord::new(key.id())))
    }
}
