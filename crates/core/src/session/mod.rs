pub mod memory;

pub use memory::{InMemorySession, InventoryFixture};

use crate::error::{CoreError, Result};
use crate::model::{
    Children, CounterDescriptor, ObjectKind, ObjectRef, PerfProviderSummary, SampledSeries,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// Property bag returned by inventory property queries
pub type PropertyBag = Map<String, Value>;

/// Authenticated handle to the virtualization management API.
///
/// Every method is one blocking round-trip on the real API; callers bound
/// each call with [`timed`] rather than a single global deadline.
#[async_trait]
pub trait Session: Send + Sync {
    /// Objects directly attached to `tag`. A tag unknown to the tagging
    /// service yields [`CoreError::NotFound`].
    async fn list_tagged_objects(&self, tag: &str) -> Result<Vec<ObjectRef>>;

    /// Child references of a container object
    async fn children(&self, object: &ObjectRef) -> Result<Children>;

    /// Named properties of one object. Unknown names are omitted from the bag.
    async fn properties(&self, object: &ObjectRef, names: &[&str]) -> Result<PropertyBag>;

    /// Every object of one kind
    async fn list_objects(&self, kind: &ObjectKind) -> Result<Vec<ObjectRef>>;

    /// The object of `kind` whose name is exactly `name`
    async fn find_by_name(&self, kind: &ObjectKind, name: &str) -> Result<ObjectRef>;

    async fn provider_summary(&self, object: &ObjectRef) -> Result<PerfProviderSummary>;

    async fn list_counters(&self) -> Result<Vec<CounterDescriptor>>;

    async fn sample_counters(
        &self,
        object: &ObjectRef,
        counters: &[String],
        interval_secs: i32,
        max_samples: i32,
    ) -> Result<Vec<SampledSeries>>;

    /// The server's `maxQueryMetrics` option: `None` when unset, `-1` when
    /// unlimited, an error when the option cannot be read.
    async fn max_query_batch_size(&self) -> Result<Option<i64>>;

    /// Server version string, e.g. `6.7.0`
    async fn server_version(&self) -> Result<String>;
}

/// Run one session call under its own deadline.
pub async fn timed<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, limit);
            Err(CoreError::timeout(operation, limit))
        }
    }
}

/// Fetch `names` for `object` and deserialize the bag into `T`.
pub async fn fetch_properties<T: DeserializeOwned>(
    session: &dyn Session,
    object: &ObjectRef,
    names: &[&str],
    limit: Duration,
) -> Result<T> {
    let bag = timed(
        &format!("properties of {}", object),
        limit,
        session.properties(object, names),
    )
    .await?;
    Ok(serde_json::from_value(Value::Object(bag))?)
}
