use super::{PropertyBag, Session};
use crate::error::{CoreError, Result};
use crate::model::{
    Children, CounterDescriptor, ObjectKind, ObjectRef, PerfProviderSummary, SampledSeries,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::{fs, path::Path, time::Duration};

/// Static inventory served by [`InMemorySession`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFixture {
    pub server_version: String,
    pub max_query_metrics: Option<i64>,
    /// Simulate an option manager that refuses the batch-size query
    pub max_query_metrics_unreadable: bool,
    /// Simulate an unreachable tagging service
    pub tags_unreachable: bool,
    pub tags: BTreeMap<String, Vec<ObjectRef>>,
    pub objects: Vec<FixtureObject>,
    pub counters: Vec<CounterDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureObject {
    #[serde(flatten)]
    pub reference: ObjectRef,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Children,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub perf: PerfProviderSummary,
    #[serde(default)]
    pub series: Vec<SampledSeries>,
    /// Every call touching this object fails, as if it had been deleted
    #[serde(default)]
    pub fail: bool,
    /// Artificial latency for calls touching this object
    #[serde(default)]
    pub delay_ms: u64,
}

impl InventoryFixture {
    pub fn new(server_version: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
            ..Self::default()
        }
    }

    /// Load a fixture from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("Failed to read inventory {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            CoreError::config(format!("Failed to parse inventory {}: {}", path.display(), e))
        })
    }

    pub fn object(mut self, reference: ObjectRef, name: impl Into<String>) -> Self {
        self.objects.push(FixtureObject {
            reference,
            name: name.into(),
            children: Children::default(),
            properties: Map::new(),
            perf: PerfProviderSummary::default(),
            series: Vec::new(),
            fail: false,
            delay_ms: 0,
        });
        self
    }

    pub fn children(mut self, id: &str, children: Children) -> Self {
        if let Some(entry) = self.entry_mut(id) {
            entry.children = children;
        }
        self
    }

    /// Merge the keys of a JSON object into the object's properties
    pub fn properties(mut self, id: &str, properties: Value) -> Self {
        if let (Some(entry), Value::Object(map)) = (self.entry_mut(id), properties) {
            entry.properties.extend(map);
        }
        self
    }

    /// Enable current sampling for the object and set its series
    pub fn series(mut self, id: &str, series: Vec<SampledSeries>) -> Self {
        if let Some(entry) = self.entry_mut(id) {
            entry.perf.current_supported = true;
            entry.series = series;
        }
        self
    }

    pub fn tag(mut self, name: &str, objects: Vec<ObjectRef>) -> Self {
        self.tags.insert(name.to_string(), objects);
        self
    }

    pub fn counter(mut self, counter: CounterDescriptor) -> Self {
        self.counters.push(counter);
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        if let Some(entry) = self.entry_mut(id) {
            entry.fail = true;
        }
        self
    }

    pub fn slow(mut self, id: &str, delay_ms: u64) -> Self {
        if let Some(entry) = self.entry_mut(id) {
            entry.delay_ms = delay_ms;
        }
        self
    }

    fn entry_mut(&mut self, id: &str) -> Option<&mut FixtureObject> {
        self.objects.iter_mut().find(|o| o.reference.id == id)
    }
}

/// Session backed by an [`InventoryFixture`], used for offline runs and tests
pub struct InMemorySession {
    fixture: InventoryFixture,
    index: HashMap<String, usize>,
}

impl InMemorySession {
    pub fn new(fixture: InventoryFixture) -> Self {
        let index = fixture
            .objects
            .iter()
            .enumerate()
            .map(|(pos, o)| (o.reference.id.clone(), pos))
            .collect();
        Self { fixture, index }
    }

    async fn lookup(&self, object: &ObjectRef) -> Result<&FixtureObject> {
        let entry = self
            .index
            .get(&object.id)
            .map(|&pos| &self.fixture.objects[pos])
            .ok_or_else(|| CoreError::not_found(format!("object {} does not exist", object)))?;

        if entry.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(entry.delay_ms)).await;
        }
        if entry.fail {
            return Err(CoreError::query(format!(
                "object {} could not be retrieved",
                object
            )));
        }
        Ok(entry)
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn list_tagged_objects(&self, tag: &str) -> Result<Vec<ObjectRef>> {
        if self.fixture.tags_unreachable {
            return Err(CoreError::query("tagging service unreachable"));
        }
        self.fixture
            .tags
            .get(tag)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("404 Not Found: tag {}", tag)))
    }

    async fn children(&self, object: &ObjectRef) -> Result<Children> {
        Ok(self.lookup(object).await?.children.clone())
    }

    async fn properties(&self, object: &ObjectRef, names: &[&str]) -> Result<PropertyBag> {
        let entry = self.lookup(object).await?;
        let mut bag = PropertyBag::new();
        for &name in names {
            if name == "name" {
                bag.insert(name.to_string(), Value::String(entry.name.clone()));
            } else if let Some(value) = entry.properties.get(name) {
                bag.insert(name.to_string(), value.clone());
            }
        }
        Ok(bag)
    }

    async fn list_objects(&self, kind: &ObjectKind) -> Result<Vec<ObjectRef>> {
        let mut objects: Vec<ObjectRef> = self
            .fixture
            .objects
            .iter()
            .filter(|o| &o.reference.kind == kind)
            .map(|o| o.reference.clone())
            .collect();
        objects.sort();
        Ok(objects)
    }

    async fn find_by_name(&self, kind: &ObjectKind, name: &str) -> Result<ObjectRef> {
        self.fixture
            .objects
            .iter()
            .find(|o| &o.reference.kind == kind && o.name == name)
            .map(|o| o.reference.clone())
            .ok_or_else(|| CoreError::not_found(format!("no {} named {}", kind, name)))
    }

    async fn provider_summary(&self, object: &ObjectRef) -> Result<PerfProviderSummary> {
        let entry = self.lookup(object).await?;
        if matches!(object.kind, ObjectKind::Folder | ObjectKind::Datacenter) {
            return Err(CoreError::not_supported(format!(
                "{} has no performance provider",
                object
            )));
        }
        Ok(entry.perf)
    }

    async fn list_counters(&self) -> Result<Vec<CounterDescriptor>> {
        Ok(self.fixture.counters.clone())
    }

    async fn sample_counters(
        &self,
        object: &ObjectRef,
        counters: &[String],
        _interval_secs: i32,
        max_samples: i32,
    ) -> Result<Vec<SampledSeries>> {
        let entry = self.lookup(object).await?;
        let keep = usize::try_from(max_samples).unwrap_or(0);
        Ok(entry
            .series
            .iter()
            .filter(|s| counters.contains(&s.name))
            .map(|s| SampledSeries {
                name: s.name.clone(),
                instance: s.instance.clone(),
                values: s.values.iter().take(keep).copied().collect(),
            })
            .collect())
    }

    async fn max_query_batch_size(&self) -> Result<Option<i64>> {
        if self.fixture.max_query_metrics_unreadable {
            return Err(CoreError::query(
                "option config.vpxd.stats.maxQueryMetrics is not readable",
            ));
        }
        Ok(self.fixture.max_query_metrics)
    }

    async fn server_version(&self) -> Result<String> {
        Ok(self.fixture.server_version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fixture_from_json() {
        let fixture: InventoryFixture = serde_json::from_value(json!({
            "server_version": "6.7.0",
            "tags": { "prod": [{ "type": "Folder", "value": "group-v1" }] },
            "objects": [
                {
                    "type": "Folder",
                    "value": "group-v1",
                    "name": "vm",
                    "children": { "entities": [{ "type": "VirtualMachine", "value": "vm-16" }] }
                },
                { "type": "VirtualMachine", "value": "vm-16", "name": "web01" }
            ]
        }))
        .unwrap();

        let session = InMemorySession::new(fixture);
        let tagged = session.list_tagged_objects("prod").await.unwrap();
        assert_eq!(tagged, vec![ObjectRef::new("Folder", "group-v1")]);

        let children = session.children(&tagged[0]).await.unwrap();
        assert_eq!(children.entities[0].kind, ObjectKind::VirtualMachine);

        let found = session
            .find_by_name(&ObjectKind::VirtualMachine, "web01")
            .await
            .unwrap();
        assert_eq!(found.id, "vm-16");
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_found() {
        let session = InMemorySession::new(InventoryFixture::new("7.0.3"));
        let err = session.list_tagged_objects("missing").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_properties_only_returns_requested_names() {
        let vm = ObjectRef::new("VirtualMachine", "vm-1");
        let session = InMemorySession::new(
            InventoryFixture::new("7.0.3")
                .object(vm.clone(), "db01")
                .properties(
                    "vm-1",
                    json!({
                        "guest": { "toolsRunningStatus": "guestToolsRunning" },
                        "runtime": {}
                    }),
                ),
        );

        let bag = session.properties(&vm, &["name", "guest"]).await.unwrap();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag["name"], json!("db01"));
        assert!(!bag.contains_key("runtime"));
    }
}
