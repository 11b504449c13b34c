use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{FetchGateway, TreeCache};
use crate::error::FetchError;
use crate::model::ResourceKey;

/// Tracks which tree nodes are currently open in the view.
///
/// Expanding loads children on demand through the cache; collapsing
/// only closes the node — its subtree stays cached for instant
/// re-expand.
pub struct ExpansionController<G: FetchGateway> {
    cache: Arc<TreeCache<G>>,
    expanded: HashSet<ResourceKey>,
}

impl<G: FetchGateway> ExpansionController<G> {
    pub fn new(cache: Arc<TreeCache<G>>) -> Self {
        ExpansionController {
            cache,
            expanded: HashSet::new(),
        }
    }

    pub fn cache(&self) -> &TreeCache<G> {
        &self.cache
    }

    pub fn is_expanded(&self, key: &ResourceKey) -> bool {
        self.expanded.contains(key)
    }

    /// Open a node and make sure its children are cached.
    pub async fn expand(&mut self, key: &ResourceKey) -> Result<Vec<ResourceKey>, FetchError> {
        self.expanded.insert(key.clone());
        self.cache.ensure_children_loaded(Some(key)).await
    }

    pub fn collapse(&mut self, key: &ResourceKey) {
        self.expanded.remove(key);
    }

    /// React to an ancestor selection changing outside the tree (for
    /// example the region dropdown the topology view also tracks):
    /// the old selection's subtree is now semantically void, so drop
    /// its cache and close everything under it.
    pub fn on_selection_changed(&mut self, old: Option<&ResourceKey>) {
        if let Some(old) = old {
            self.cache.invalidate_subtree(old);
            self.expanded.retain(|k| !k.is_descendant_of(old));
        }
    }
}
