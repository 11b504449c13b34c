mod common;

use std::sync::Arc;

use common::MockGateway;
use dno::cache::{ExpansionController, TreeCache};
use dno::model::{RawRecord, ResourceKey, ResourceLevel};

fn ids(keys: &[ResourceKey]) -> Vec<&str> {
    keys.iter().map(|k| k.id()).collect()
}

fn seeded_gateway() -> MockGateway {
    let gateway = MockGateway::new();
    gateway.set_children(ResourceLevel::Region, None, vec![RawRecord::new("us-east-1")]);
    gateway.set_children(
        ResourceLevel::Vpc,
        Some("us-east-1"),
        vec![RawRecord::new("vpc-001"), RawRecord::new("vpc-002")],
    );
    gateway.set_children(
        ResourceLevel::Subnet,
        Some("vpc-001"),
        vec![RawRecord::new("subnet-001")],
    );
    gateway.set_children(
        ResourceLevel::Instance,
        Some("subnet-001"),
        vec![RawRecord::new("i-001")],
    );
    gateway
}

fn controller(gateway: &MockGateway) -> ExpansionController<MockGateway> {
    ExpansionController::new(Arc::new(TreeCache::new(gateway.clone())))
}

#[tokio::test]
async fn test_expand_loads_children_and_marks_the_node_open() {
    let gateway = seeded_gateway();
    let mut ctl = controller(&gateway);
    let region = ResourceKey::region("us-east-1");

    let vpcs = ctl.expand(&region).await.unwrap();
    assert_eq!(ids(&vpcs), vec!["vpc-001", "vpc-002"]);
    assert!(ctl.is_expanded(&region));
    assert!(!ctl.is_expanded(&vpcs[0]));
}

#[tokio::test]
async fn test_collapse_keeps_the_subtree_cached_for_instant_reexpand() {
    let gateway = seeded_gateway();
    let mut ctl = controller(&gateway);
    let region = ResourceKey::region("us-east-1");

    let vpcs = ctl.expand(&region).await.unwrap();
    let vpc = vpcs[0].clone();
    let subnets = ctl.expand(&vpc).await.unwrap();
    assert_eq!(ids(&subnets), vec!["subnet-001"]);
    let calls = gateway.list_calls();

    ctl.collapse(&vpc);
    assert!(!ctl.is_expanded(&vpc));
    // The subtree stays cached; closing a node is a view change only.
    assert!(ctl.cache().get(&subnets[0]).is_some());

    let again = ctl.expand(&vpc).await.unwrap();
    assert_eq!(again, subnets);
    assert!(ctl.is_expanded(&vpc));
    assert_eq!(gateway.list_calls(), calls);
}

#[tokio::test]
async fn test_selection_change_evicts_and_collapses_the_old_subtree() {
    let gateway = seeded_gateway();
    let mut ctl = controller(&gateway);
    let region = ResourceKey::region("us-east-1");

    let vpcs = ctl.expand(&region).await.unwrap();
    let vpc = vpcs[0].clone();
    let subnets = ctl.expand(&vpc).await.unwrap();
    let subnet = subnets[0].clone();
    ctl.expand(&subnet).await.unwrap();
    let calls = gateway.list_calls();

    ctl.on_selection_changed(Some(&region));

    // Everything under the old selection is closed and evicted; the
    // selection's own node stays, reset for a fresh load.
    assert!(!ctl.is_expanded(&vpc));
    assert!(!ctl.is_expanded(&subnet));
    assert!(ctl.is_expanded(&region));
    assert!(ctl.cache().get(&vpc).is_none());
    assert!(ctl.cache().get(&subnet).is_none());
    assert!(ctl.cache().view(Some(&region)).children.is_empty());

    // Re-expanding goes back to the gateway instead of the old cache.
    let fresh = ctl.expand(&region).await.unwrap();
    assert_eq!(ids(&fresh), vec!["vpc-001", "vpc-002"]);
    assert_eq!(gateway.list_calls(), calls + 1);
}

#[tokio::test]
async fn test_selection_change_with_no_previous_selection_is_a_no_op() {
    let gateway = seeded_gateway();
    let mut ctl = controller(&gateway);
    let region = ResourceKey::region("us-east-1");

    ctl.expand(&region).await.unwrap();
    let calls = gateway.list_calls();

    ctl.on_selection_changed(None);
    assert!(ctl.is_expanded(&region));
    assert!(ctl.cache().view(Some(&region)).status.is_loaded());
    assert_eq!(gateway.list_calls(), calls);
}
