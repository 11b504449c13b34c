use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::cache::FetchGateway;
use crate::error::FetchError;
use crate::model::{ChildStatus, RawRecord, ResourceKey, ResourceLevel, ResourceNode};

/// Concurrent instance-detail fetches per hydration wave.
const HYDRATE_BATCH: usize = 10;

/// Identifies one child-list slot: a parent key, or `None` for the
/// top-level region list.
type SlotId = Option<ResourceKey>;

/// Snapshot of one slot for the rendering layer.
#[derive(Debug, Clone)]
pub struct SlotView {
    pub status: ChildStatus,
    pub children: Vec<ResourceKey>,
}

struct Inflight {
    generation: u64,
    rx: watch::Receiver<bool>,
}

#[derive(Default)]
struct RootSlot {
    status: ChildStatus,
    children: Vec<ResourceKey>,
    loaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<ResourceKey, ResourceNode>,
    root: RootSlot,
    /// Per-slot fetch generation. Bumped on invalidation; a completing
    /// fetch whose recorded generation no longer matches is discarded.
    /// Entries exist only for slots that have been invalidated with
    /// work still in flight; they are dropped once that work drains.
    generations: HashMap<SlotId, u64>,
    inflight: HashMap<SlotId, Inflight>,
    /// Started-but-unfinished fetches and hydrations per slot. Tracks
    /// whether a stale result could still land for an invalidated key.
    pending: HashMap<SlotId, usize>,
}

impl Inner {
    fn generation(&self, slot: &SlotId) -> u64 {
        self.generations.get(slot).copied().unwrap_or(0)
    }

    fn bump_generation(&mut self, slot: SlotId) {
        *self.generations.entry(slot).or_insert(0) += 1;
    }

    fn status_of(&self, slot: &SlotId) -> ChildStatus {
        match slot {
            None => self.root.status.clone(),
            Some(key) => self
                .nodes
                .get(key)
                .map(|n| n.status.clone())
                .unwrap_or_default(),
        }
    }

    fn children_of(&self, slot: &SlotId) -> Vec<ResourceKey> {
        match slot {
            None => self.root.children.clone(),
            Some(key) => self
                .nodes
                .get(key)
                .map(|n| n.children.clone())
                .unwrap_or_default(),
        }
    }

    fn set_status(&mut self, slot: &SlotId, status: ChildStatus) {
        match slot {
            None => self.root.status = status,
            Some(key) => {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.status = status;
                }
            }
        }
    }

    /// Transition a slot to `Loading` and register the in-flight
    /// channel other callers attach to. Returns what the leader needs
    /// to complete the fetch later.
    fn begin_fetch(&mut self, slot: &SlotId) -> (u64, watch::Sender<bool>) {
        let generation = self.generation(slot);
        let (tx, rx) = watch::channel(false);
        self.inflight.insert(slot.clone(), Inflight { generation, rx });
        *self.pending.entry(slot.clone()).or_insert(0) += 1;
        self.set_status(slot, ChildStatus::Loading);
        (generation, tx)
    }

    fn is_busy(&self, slot: &SlotId) -> bool {
        self.pending.get(slot).is_some_and(|n| *n > 0)
    }

    /// One fetch or hydration for this slot finished. When the last
    /// one drains for a key that no longer has a node, its generation
    /// entry has nothing left to discard and is dropped with it.
    fn finish_pending(&mut self, slot: &SlotId) {
        let drained = match self.pending.get_mut(slot) {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => true,
        };
        if drained {
            self.pending.remove(slot);
            if matches!(slot, Some(key) if !self.nodes.contains_key(key)) {
                self.generations.remove(slot);
            }
        }
    }

    /// Remove the in-flight entry, but only if it still belongs to the
    /// completing fetch (a newer leader may have replaced it).
    fn clear_inflight(&mut self, slot: &SlotId, generation: u64) {
        if let Some(entry) = self.inflight.get(slot) {
            if entry.generation == generation {
                self.inflight.remove(slot);
            }
        }
    }

    /// Create or update one node per record and mark the slot Loaded.
    /// Records that name an already-cached key merge into it so
    /// hydrated details survive a re-list.
    fn commit_children(&mut self, parent: Option<&ResourceKey>, records: &[RawRecord]) -> Vec<ResourceKey> {
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            let key = match parent {
                None => Some(ResourceKey::region(&record.id)),
                Some(p) => p.child(&record.id),
            };
            let Some(key) = key else { continue };
            let node = self
                .nodes
                .entry(key.clone())
                .or_insert_with(|| ResourceNode::placeholder(key.clone()));
            for (name, value) in &record.attributes {
                node.attributes.insert(name.clone(), value.clone());
            }
            keys.push(key);
        }
        let now = Utc::now();
        match parent {
            None => {
                self.root.status = ChildStatus::Loaded;
                self.root.children = keys.clone();
                self.root.loaded_at = Some(now);
            }
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(p) {
                    node.status = ChildStatus::Loaded;
                    node.children = keys.clone();
                    node.loaded_at = Some(now);
                }
            }
        }
        keys
    }
}

/// In-memory cache of the topology tree, keyed by [`ResourceKey`].
///
/// Sole owner of cached node state and sole caller of the fetch
/// gateway. All mutation goes through the published operations; the
/// inner lock is never held across an await point, so overlapping
/// fetches serialize their logical effects through the per-slot
/// generation counters rather than through the lock.
pub struct TreeCache<G: FetchGateway> {
    gateway: G,
    inner: Mutex<Inner>,
}

impl<G: FetchGateway> TreeCache<G> {
    pub fn new(gateway: G) -> Self {
        TreeCache {
            gateway,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Snapshot of one cached node.
    pub fn get(&self, key: &ResourceKey) -> Option<ResourceNode> {
        self.inner.lock().unwrap().nodes.get(key).cloned()
    }

    /// Snapshot of a child-list slot (`None` for the region list) for
    /// the rendering layer: children in display order plus status, with
    /// any fetch error available through the status.
    pub fn view(&self, parent: Option<&ResourceKey>) -> SlotView {
        let inner = self.inner.lock().unwrap();
        let slot = parent.cloned();
        SlotView {
            status: inner.status_of(&slot),
            children: inner.children_of(&slot),
        }
    }

    /// Keys of every cached instance-level node.
    pub fn instance_keys(&self) -> Vec<ResourceKey> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .keys()
            .filter(|k| k.level() == ResourceLevel::Instance)
            .cloned()
            .collect()
    }

    /// Merge attribute updates into an existing node without touching
    /// its fetch status. Returns false if the node is not cached.
    pub fn update_attributes(&self, key: &ResourceKey, partial: Map<String, Value>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.nodes.get_mut(key) {
            Some(node) => {
                for (name, value) in partial {
                    node.attributes.insert(name, value);
                }
                true
            }
            None => false,
        }
    }

    /// Ensure the children of `parent` are cached, fetching them at
    /// most once.
    ///
    /// Already `Loaded` slots answer from cache without a network call;
    /// a slot that is `Loading` attaches the caller to the in-flight
    /// fetch instead of issuing a duplicate; `Idle` and `Failed` slots
    /// fetch (so a failed node is retryable by simply asking again).
    /// Child order is the gateway's order. Instance children are
    /// additionally hydrated with their detail records before this
    /// returns, in batches of [`HYDRATE_BATCH`].
    ///
    /// If the slot is invalidated while its fetch is in flight the
    /// result is discarded and every attached caller gets an empty
    /// list, matching what the invalidated subtree should display.
    pub async fn ensure_children_loaded(
        &self,
        parent: Option<&ResourceKey>,
    ) -> Result<Vec<ResourceKey>, FetchError> {
        let level = match parent {
            None => ResourceLevel::Region,
            Some(key) => match key.level().child() {
                Some(level) => level,
                // Instances are leaves; nothing to load.
                None => return Ok(Vec::new()),
            },
        };
        let slot: SlotId = parent.cloned();

        enum Step {
            Attach(watch::Receiver<bool>),
            Lead(u64, watch::Sender<bool>),
        }

        let mut attached = false;
        loop {
            let step = {
                let mut inner = self.inner.lock().unwrap();
                if let Some(key) = parent {
                    if !attached {
                        // First expansion of an as-yet-unknown key
                        // creates its placeholder. A waiter looping
                        // back must not resurrect a key destroyed
                        // while it slept.
                        inner
                            .nodes
                            .entry(key.clone())
                            .or_insert_with(|| ResourceNode::placeholder(key.clone()));
                    }
                }
                match inner.status_of(&slot) {
                    ChildStatus::Loaded => return Ok(inner.children_of(&slot)),
                    ChildStatus::Idle if attached => return Ok(Vec::new()),
                    ChildStatus::Failed(e) if attached => return Err(e),
                    ChildStatus::Loading => {
                        match inner.inflight.get(&slot) {
                            Some(entry) if entry.rx.has_changed().is_ok() => {
                                Step::Attach(entry.rx.clone())
                            }
                            // The previous leader was dropped mid-fetch;
                            // take the fetch over.
                            _ => {
                                let (generation, tx) = inner.begin_fetch(&slot);
                                Step::Lead(generation, tx)
                            }
                        }
                    }
                    ChildStatus::Idle | ChildStatus::Failed(_) => {
                        let (generation, tx) = inner.begin_fetch(&slot);
                        Step::Lead(generation, tx)
                    }
                }
            };

            match step {
                Step::Attach(mut rx) => {
                    attached = true;
                    while !*rx.borrow_and_update() {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                    // Loop back and read the committed outcome.
                }
                Step::Lead(generation, tx) => {
                    return self.run_fetch(parent, level, slot, generation, tx).await;
                }
            }
        }
    }

    async fn run_fetch(
        &self,
        parent: Option<&ResourceKey>,
        level: ResourceLevel,
        slot: SlotId,
        generation: u64,
        tx: watch::Sender<bool>,
    ) -> Result<Vec<ResourceKey>, FetchError> {
        tracing::debug!(level = %level, parent = parent.map(|k| k.to_string()).unwrap_or_default(), "fetching children");
        let result = self.gateway.fetch_children(level, parent).await;

        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            let stale = inner.generation(&slot) != generation;
            inner.clear_inflight(&slot, generation);
            inner.finish_pending(&slot);
            if stale {
                // The subtree was invalidated while this fetch was in
                // flight; its result must not resurrect the old state.
                tracing::debug!(level = %level, "discarding stale child listing");
                let _ = tx.send(true);
                return Ok(Vec::new());
            }
            match result {
                Ok(records) => {
                    let keys = inner.commit_children(parent, &records);
                    let _ = tx.send(true);
                    Ok(keys)
                }
                Err(e) => {
                    // Children, if any, stay cached as stale-but-available.
                    inner.set_status(&slot, ChildStatus::Failed(e.clone()));
                    let _ = tx.send(true);
                    Err(e)
                }
            }
        };

        if level == ResourceLevel::Instance {
            if let Ok(keys) = &outcome {
                self.hydrate_instances(keys).await;
            }
        }
        outcome
    }

    /// Second phase of instance loading: fan out detail fetches for
    /// placeholder nodes, bounded to [`HYDRATE_BATCH`] at a time, and
    /// merge each result into its node as it completes.
    async fn hydrate_instances(&self, keys: &[ResourceKey]) {
        let targets: Vec<(ResourceKey, u64)> = {
            let mut inner = self.inner.lock().unwrap();
            let mut started = Vec::new();
            for key in keys {
                let slot = Some(key.clone());
                let generation = inner.generation(&slot);
                let Some(node) = inner.nodes.get_mut(key) else {
                    continue;
                };
                // Already hydrated or being hydrated elsewhere.
                if !matches!(node.status, ChildStatus::Idle | ChildStatus::Failed(_)) {
                    continue;
                }
                node.status = ChildStatus::Loading;
                *inner.pending.entry(slot).or_insert(0) += 1;
                started.push((key.clone(), generation));
            }
            started
        };

        futures_util::stream::iter(targets.into_iter().map(|(key, generation)| async move {
            let result = self.gateway.fetch_details(&key).await;
            (key, generation, result)
        }))
        .buffer_unordered(HYDRATE_BATCH)
        .for_each(|(key, generation, result)| {
            self.apply_instance_details(key, generation, result);
            std::future::ready(())
        })
        .await;
    }

    fn apply_instance_details(
        &self,
        key: ResourceKey,
        generation: u64,
        result: Result<RawRecord, FetchError>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let slot = Some(key.clone());
        let stale = inner.generation(&slot) != generation;
        inner.finish_pending(&slot);
        if stale {
            tracing::debug!(%key, "discarding stale instance details");
            return;
        }
        let Some(node) = inner.nodes.get_mut(&key) else {
            // Destroyed by an ancestor invalidation mid-hydration.
            tracing::debug!(%key, "discarding details for evicted instance");
            return;
        };
        match result {
            Ok(record) => {
                for (name, value) in record.attributes {
                    node.attributes.insert(name, value);
                }
                node.status = ChildStatus::Loaded;
                node.loaded_at = Some(Utc::now());
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "instance hydration failed");
                node.status = ChildStatus::Failed(e);
            }
        }
    }

    /// Reset `key` to `Idle` with no children and destroy every cached
    /// descendant. Unrelated subtrees are untouched. Any fetch in
    /// flight for the invalidated slots will find its generation stale
    /// and discard its result.
    pub fn invalidate_subtree(&self, key: &ResourceKey) {
        let mut inner = self.inner.lock().unwrap();
        let descendants: Vec<ResourceKey> = inner
            .nodes
            .keys()
            .filter(|k| k.is_descendant_of(key))
            .cloned()
            .collect();
        for descendant in &descendants {
            inner.nodes.remove(descendant);
            // A bumped generation only matters to work still in
            // flight; quiescent slots drop their entry instead of
            // keeping a tombstone for every key ever destroyed.
            let slot = Some(descendant.clone());
            if inner.is_busy(&slot) {
                inner.bump_generation(slot);
            } else {
                inner.generations.remove(&slot);
            }
        }
        if let Some(node) = inner.nodes.get_mut(key) {
            node.status = ChildStatus::Idle;
            node.children.clear();
            node.loaded_at = None;
        }
        let slot = Some(key.clone());
        if inner.is_busy(&slot) {
            inner.bump_generation(slot);
        } else {
            inner.generations.remove(&slot);
        }
        tracing::debug!(%key, destroyed = descendants.len(), "invalidated subtree");
    }
}
