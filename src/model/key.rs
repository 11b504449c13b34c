use std::fmt;

use crate::model::ResourceLevel;

/// Composite identifier for one tree node: the provider-assigned id at
/// its level plus the full ancestor chain. Two nodes are the same node
/// iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    level: ResourceLevel,
    id: String,
    parent: Option<Box<ResourceKey>>,
}

impl ResourceKey {
    /// A top-level region key (no parent).
    pub fn region(id: impl Into<String>) -> Self {
        ResourceKey {
            level: ResourceLevel::Region,
            id: id.into(),
            parent: None,
        }
    }

    /// The key one level below this one. `None` for instance keys,
    /// which are leaves.
    pub fn child(&self, id: impl Into<String>) -> Option<ResourceKey> {
        let level = self.level.child()?;
        Some(ResourceKey {
            level,
            id: id.into(),
            parent: Some(Box::new(self.clone())),
        })
    }

    pub fn level(&self) -> ResourceLevel {
        self.level
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&ResourceKey> {
        self.parent.as_deref()
    }

    /// The ancestor at the given level, or this key itself if `level`
    /// is its own level.
    pub fn ancestor(&self, level: ResourceLevel) -> Option<&ResourceKey> {
        let mut current = self;
        loop {
            if current.level == level {
                return Some(current);
            }
            current = current.parent.as_deref()?;
        }
    }

    /// The region id this key lives under.
    pub fn region_id(&self) -> &str {
        self.ancestor(ResourceLevel::Region)
            .map(|k| k.id.as_str())
            .unwrap_or(&self.id)
    }

    /// Strict descendant test: a key is not its own descendant.
    pub fn is_descendant_of(&self, other: &ResourceKey) -> bool {
        let mut current = self.parent.as_deref();
        while let Some(k) = current {
            if k == other {
                return true;
            }
            current = k.parent.as_deref();
        }
        false
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/{}", parent, self.id)
        } else {
            f.write_str(&self.id)
        }
    }
}
