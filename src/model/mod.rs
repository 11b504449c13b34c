pub mod key;
pub mod level;
pub mod mirror;
pub mod node;

pub use key::ResourceKey;
pub use level::ResourceLevel;
pub use mirror::{MirrorFilterView, MirrorRequest, MirrorRuleView, MirrorSessionCreated, MirrorSessionView};
pub use node::{ChildStatus, RawRecord, ResourceNode};
