use std::future::Future;

use crate::error::FetchError;
use crate::model::{RawRecord, ResourceKey, ResourceLevel};

/// The cache's only window onto the backend.
///
/// Implementations perform the network call and normalize payload
/// shapes; they do no caching of their own. An empty child list is a
/// valid answer ("no children") and must not be reported as an error.
pub trait FetchGateway: Send + Sync + 'static {
    /// List the children at `level` under `parent` (`None` for the
    /// top-level region listing), in display order.
    fn fetch_children(
        &self,
        level: ResourceLevel,
        parent: Option<&ResourceKey>,
    ) -> impl Future<Output = Result<Vec<RawRecord>, FetchError>> + Send;

    /// Fetch the detail record for one instance (second phase of the
    /// list-then-hydrate pattern).
    fn fetch_details(
        &self,
        key: &ResourceKey,
    ) -> impl Future<Output = Result<RawRecord, FetchError>> + Send;
}
