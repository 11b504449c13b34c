use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{FetchGateway, TreeCache};
use crate::error::FetchError;
use crate::model::{ResourceKey, ResourceLevel};

/// Cascading region → VPC → subnet → instance selects, as used by the
/// mirror and deploy forms.
///
/// Selecting a parent invalidates the old selection's subtree, clears
/// every selection below it, and pre-populates the next level. A
/// cleared parent disables its descendants (empty option sets) rather
/// than leaving a stale list behind.
pub struct SelectorBinding<G: FetchGateway> {
    cache: Arc<TreeCache<G>>,
    selected: HashMap<ResourceLevel, ResourceKey>,
    source: Option<ResourceKey>,
    target: Option<ResourceKey>,
}

impl<G: FetchGateway> SelectorBinding<G> {
    pub fn new(cache: Arc<TreeCache<G>>) -> Self {
        SelectorBinding {
            cache,
            selected: HashMap::new(),
            source: None,
            target: None,
        }
    }

    pub fn cache(&self) -> &TreeCache<G> {
        &self.cache
    }

    /// Load the region list so the top select has options.
    pub async fn load_regions(&self) -> Result<Vec<ResourceKey>, FetchError> {
        self.cache.ensure_children_loaded(None).await
    }

    pub fn selected(&self, level: ResourceLevel) -> Option<&ResourceKey> {
        self.selected.get(&level)
    }

    /// The source instance pick for the mirror form.
    pub fn source(&self) -> Option<&ResourceKey> {
        self.source.as_ref()
    }

    /// The target instance pick for the mirror form.
    pub fn target(&self) -> Option<&ResourceKey> {
        self.target.as_ref()
    }

    /// Valid options for a select, in display order. Empty (disabled)
    /// while the parent is unselected or its children are not loaded.
    pub fn options(&self, level: ResourceLevel) -> Vec<ResourceKey> {
        let parent = match level.parent() {
            None => None,
            Some(parent_level) => match self.selected.get(&parent_level) {
                Some(key) => Some(key),
                None => return Vec::new(),
            },
        };
        let view = self.cache.view(parent);
        if view.status.is_loaded() {
            view.children
        } else {
            Vec::new()
        }
    }

    /// Change the selection at `level` (Region, Vpc or Subnet) to the
    /// option with the given id, or clear it with `None`. Returns the
    /// pre-populated options for the next level down.
    pub async fn select(
        &mut self,
        level: ResourceLevel,
        id: Option<&str>,
    ) -> Result<Vec<ResourceKey>, FetchError> {
        // The old selection's descendants are void either way.
        if let Some(old) = self.selected.get(&level) {
            self.cache.invalidate_subtree(old);
        }
        self.selected.retain(|l, _| *l < level);
        self.source = None;
        self.target = None;

        let Some(id) = id else {
            // Cleared: descendants stay disabled.
            return Ok(Vec::new());
        };

        let key = match level.parent() {
            None => ResourceKey::region(id),
            Some(parent_level) => {
                let Some(parent) = self.selected.get(&parent_level) else {
                    tracing::warn!(%level, id, "cannot select without a parent selection");
                    return Ok(Vec::new());
                };
                match parent.child(id) {
                    Some(key) => key,
                    None => return Ok(Vec::new()),
                }
            }
        };
        self.selected.insert(level, key.clone());
        self.cache.ensure_children_loaded(Some(&key)).await
    }

    /// Pick the mirror source among the selected subnet's instances.
    pub fn set_source(&mut self, id: Option<&str>) {
        self.source = self.instance_key(id);
    }

    /// Pick the mirror target among the selected subnet's instances.
    pub fn set_target(&mut self, id: Option<&str>) {
        self.target = self.instance_key(id);
    }

    fn instance_key(&self, id: Option<&str>) -> Option<ResourceKey> {
        let id = id?;
        self.selected
            .get(&ResourceLevel::Subnet)
            .and_then(|subnet| subnet.child(id))
    }
}
