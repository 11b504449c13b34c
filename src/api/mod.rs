// Atomic API modules
pub mod client;
pub mod deploy;
pub mod mirror;

// Re-export commonly used items
pub use client::{set_silent, HttpGateway};
pub use deploy::{deploy_node, DeployRequest};
pub use mirror::{create_mirror_session, delete_mirror_session, list_mirror_filters};
