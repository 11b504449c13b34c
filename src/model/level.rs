use std::fmt;

/// The four levels of the topology tree, ordered top-down.
///
/// Every node's children belong exclusively to one parent at the level
/// above; regions have no parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceLevel {
    Region,
    Vpc,
    Subnet,
    Instance,
}

impl ResourceLevel {
    /// The level directly below this one, if any.
    pub fn child(&self) -> Option<ResourceLevel> {
        match self {
            ResourceLevel::Region => Some(ResourceLevel::Vpc),
            ResourceLevel::Vpc => Some(ResourceLevel::Subnet),
            ResourceLevel::Subnet => Some(ResourceLevel::Instance),
            ResourceLevel::Instance => None,
        }
    }

    /// The level directly above this one, if any.
    pub fn parent(&self) -> Option<ResourceLevel> {
        match self {
            ResourceLevel::Region => None,
            ResourceLevel::Vpc => Some(ResourceLevel::Region),
            ResourceLevel::Subnet => Some(ResourceLevel::Vpc),
            ResourceLevel::Instance => Some(ResourceLevel::Subnet),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceLevel::Region => "region",
            ResourceLevel::Vpc => "vpc",
            ResourceLevel::Subnet => "subnet",
            ResourceLevel::Instance => "instance",
        }
    }
}

impl fmt::Display for ResourceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
