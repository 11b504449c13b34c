// On-demand topology cache and its clients
pub mod expansion;
pub mod gateway;
pub mod refresher;
pub mod selector;
pub mod tree;

pub use expansion::ExpansionController;
pub use gateway::FetchGateway;
pub use refresher::{calculate_uptime, UptimeRefresher};
pub use selector::SelectorBinding;
pub use tree::{SlotView, TreeCache};
