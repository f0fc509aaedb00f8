use super::vm::{old_snapshots, SnapshotInfo};
use super::{Summarizer, Summary};
use crate::error::Result;
use crate::metrics::Unit;
use crate::model::ObjectKind;
use crate::report::{SensorChannel, SensorReport};
use crate::session::{fetch_properties, timed};
use crate::tags::TagResolver;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

#[derive(Debug, Deserialize)]
struct SnapshotProperties {
    name: String,
    #[serde(default)]
    snapshot: Option<SnapshotInfo>,
}

impl Summarizer {
    /// Count old snapshots on every virtual machine, one channel per VM.
    ///
    /// With `tags` given only VMs carrying at least one of them are
    /// reported. A VM whose properties cannot be read is logged and left out.
    pub async fn snapshot_scan(&self, tags: &[String]) -> Result<Summary> {
        let started = Instant::now();
        let vms = timed(
            "virtual machine list",
            self.config.inventory_timeout(),
            self.session.list_objects(&ObjectKind::VirtualMachine),
        )
        .await?;

        let index = if tags.is_empty() {
            None
        } else {
            let resolver =
                TagResolver::new(Arc::clone(&self.session), self.config.resolver_options());
            Some(resolver.resolve(tags).await?)
        };

        let report = Arc::new(SensorReport::new("snapshots"));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let age = self.config.snapshot_age();
        let limit = self.config.inventory_timeout();
        let mut tasks = Vec::new();

        for vm in vms {
            if let Some(index) = &index {
                if !index.check(&vm.id, tags) {
                    continue;
                }
            }

            let session = Arc::clone(&self.session);
            let report = Arc::clone(&report);
            let semaphore = Arc::clone(&semaphore);
            let limits = self.config.limits.clone();

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let fetched = fetch_properties(session.as_ref(), &vm, &["name", "snapshot"], limit);
                let props: SnapshotProperties = match fetched.await {
                    Ok(props) => props,
                    Err(e) => {
                        tracing::warn!("skipping {}: {}", vm, e);
                        return;
                    }
                };
                let trees = props
                    .snapshot
                    .as_ref()
                    .map(|s| s.root_snapshot_list.as_slice())
                    .unwrap_or_default();
                let count = match old_snapshots(trees, age) {
                    Ok(count) => count,
                    Err(e) => {
                        tracing::warn!("skipping {}: {}", vm, e);
                        return;
                    }
                };

                let channel = SensorChannel::new(props.name.as_str())
                    .unit(Unit::Custom)
                    .custom_unit("Found")
                    .limits(limits);
                if let Err(e) = report.add(count, channel) {
                    tracing::warn!("{}: {}", vm, e);
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("snapshot scan task failed: {}", e);
            }
        }

        Ok(Summary {
            report,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::config::Config;
    use crate::model::{Children, ObjectRef};
    use crate::report::{ChannelValue, RenderMode, EXECUTION_TIME_CHANNEL};
    use crate::session::{InMemorySession, InventoryFixture};
    use chrono::Utc;
    use serde_json::json;

    fn vm(id: &str) -> ObjectRef {
        ObjectRef::new(ObjectKind::VirtualMachine, id)
    }

    fn inventory() -> InventoryFixture {
        let old = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();
        let older = (Utc::now() - chrono::Duration::days(40)).to_rfc3339();
        let folder = ObjectRef::new(ObjectKind::Folder, "group-v3");
        fixtures::server()
            .object(vm("vm-1"), "web01")
            .object(vm("vm-2"), "web02")
            .object(vm("vm-3"), "db01")
            .object(folder.clone(), "web")
            .children(
                "group-v3",
                Children {
                    entities: vec![vm("vm-1"), vm("vm-2")],
                    ..Children::default()
                },
            )
            .properties(
                "vm-1",
                json!({ "snapshot": { "rootSnapshotList": [
                    { "name": "a", "createTime": older, "childSnapshotList": [
                        { "name": "b", "createTime": old }
                    ]}
                ]}}),
            )
            .properties(
                "vm-3",
                json!({ "snapshot": { "rootSnapshotList": [{ "name": "c", "createTime": old }] } }),
            )
            .tag("web", vec![folder])
    }

    fn summarizer(fixture: InventoryFixture) -> Summarizer {
        Summarizer::new(Arc::new(InMemorySession::new(fixture)), Config::default())
    }

    fn counts(summary: &Summary) -> Vec<(String, ChannelValue)> {
        summary
            .report
            .channels()
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect()
    }

    #[tokio::test]
    async fn test_scan_all_vms() {
        let summary = summarizer(inventory()).snapshot_scan(&[]).await.unwrap();

        assert_eq!(summary.report.subject_name(), "snapshots");
        assert_eq!(
            counts(&summary),
            vec![
                ("db01".to_string(), ChannelValue::Integer(1)),
                ("web01".to_string(), ChannelValue::Integer(2)),
                ("web02".to_string(), ChannelValue::Integer(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_filtered_by_tag() {
        let summary = summarizer(inventory())
            .snapshot_scan(&["web".to_string()])
            .await
            .unwrap();

        let names: Vec<String> = counts(&summary).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["web01", "web02"]);
    }

    #[tokio::test]
    async fn test_failing_vm_is_skipped() {
        let summary = summarizer(inventory().failing("vm-2"))
            .snapshot_scan(&[])
            .await
            .unwrap();
        assert_eq!(summary.report.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tag_reports_nothing() {
        let summary = summarizer(inventory())
            .snapshot_scan(&["nope".to_string()])
            .await
            .unwrap();
        assert!(summary.report.is_empty());
    }

    #[tokio::test]
    async fn test_vm_named_like_execution_time_is_left_out() {
        let fixture = fixtures::server()
            .object(vm("vm-1"), EXECUTION_TIME_CHANNEL)
            .object(vm("vm-2"), "web02");
        let summary = summarizer(fixture).snapshot_scan(&[]).await.unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(&summary.render(RenderMode::Compact).unwrap()).unwrap();
        let names: Vec<&str> = payload["prtg"]["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["channel"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["web02", EXECUTION_TIME_CHANNEL]);
    }
}
