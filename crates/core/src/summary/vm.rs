use super::{owned, Summarizer, Summary, VM_COUNTERS};
use crate::error::{CoreError, Result};
use crate::metrics::{snapshot_count, Unit, VolumeSize};
use crate::model::{Limits, ObjectKind, ObjectRef, SnapshotTree, Target};
use crate::report::{SensorChannel, SensorReport};
use chrono::Utc;
use serde::Deserialize;
use std::time::{Duration, Instant};

const TOOLS_LOOKUP: &str = "prtg.standardlookups.exchangedag.yesno.allstatesok";
const TOOLS_RUNNING: &str = "guestToolsRunning";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmProperties {
    name: String,
    #[serde(default)]
    snapshot: Option<SnapshotInfo>,
    #[serde(default)]
    guest: GuestInfo,
    #[serde(default)]
    runtime: VmRuntime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SnapshotInfo {
    #[serde(default)]
    pub root_snapshot_list: Vec<SnapshotTree>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestInfo {
    #[serde(default)]
    tools_running_status: String,
    #[serde(default)]
    disk: Vec<GuestDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestDisk {
    disk_path: String,
    capacity: i64,
    free_space: i64,
}

#[derive(Debug, Default, Deserialize)]
struct VmRuntime {
    host: Option<ObjectRef>,
}

#[derive(Debug, Deserialize)]
struct NameOnly {
    name: String,
}

/// Snapshots of `trees` older than `age`
pub(super) fn old_snapshots(trees: &[SnapshotTree], age: Duration) -> Result<usize> {
    let out_of_range = || CoreError::config(format!("snapshot age {:?} out of range", age));
    let delta = chrono::Duration::from_std(age).map_err(|_| out_of_range())?;
    let cutoff = Utc::now().checked_sub_signed(delta).ok_or_else(out_of_range)?;
    Ok(snapshot_count(cutoff, trees))
}

impl Summarizer {
    /// Snapshot age, guest tools, guest disk space and performance counters
    /// for one virtual machine.
    pub async fn vm_summary(&self, target: &Target) -> Result<Summary> {
        let started = Instant::now();
        let object = self.resolve_target(ObjectKind::VirtualMachine, target).await?;
        let props: VmProperties = self
            .fetch(&object, &["name", "snapshot", "guest", "runtime"])
            .await?;

        let report = SensorReport::new(props.name.as_str()).with_subject_id(object.id.as_str());

        let age = self.config.snapshot_age();
        let trees = props
            .snapshot
            .as_ref()
            .map(|s| s.root_snapshot_list.as_slice())
            .unwrap_or_default();
        report.add(
            old_snapshots(trees, age)?,
            SensorChannel::new(format!(
                "Snapshots Older Than {}",
                humantime::format_duration(age)
            ))
            .unit(Unit::Custom)
            .custom_unit("Found")
            .limits(self.config.limits.clone()),
        )?;

        report.add(
            props.guest.tools_running_status == TOOLS_RUNNING,
            SensorChannel::new("guest tools running")
                .unit(Unit::Custom)
                .lookup(TOOLS_LOOKUP),
        )?;

        match &props.runtime.host {
            Some(host) => {
                let host: NameOnly = self.fetch(host, &["name"]).await?;
                report.set_text(format!("on Host {}", host.name));
            }
            None => tracing::debug!("{} has no runtime host", object),
        }

        let mut counters = owned(VM_COUNTERS);
        counters.extend(self.config.extra_counters.iter().cloned());
        self.collector()
            .collect(&object, &counters, self.config.intervals.vm, &report)
            .await?;

        for disk in &props.guest.disk {
            add_guest_disk(&report, disk);
        }

        Ok(Summary::finish(report, started))
    }
}

fn add_guest_disk(report: &SensorReport, disk: &GuestDisk) {
    let path = &disk.disk_path;
    let free_bytes = SensorChannel::new(format!("free Bytes {}", path))
        .unit(Unit::BytesDisk)
        .volume_size(VolumeSize::KiloByte)
        .hidden();
    if let Err(e) = report.add(disk.free_space / 1000, free_bytes) {
        tracing::warn!("guest disk {}: {}", path, e);
    }

    let one_percent = disk.capacity / 100;
    if one_percent <= 0 {
        tracing::debug!("guest disk {} reports no capacity", path);
        return;
    }
    let free_percent = SensorChannel::new(format!("free Space (Percent) {}", path))
        .unit(Unit::Percent)
        .limits(Limits {
            min_warn: Some(20.0),
            min_err: Some(10.0),
            warn_msg: Some("Warning Low Space".to_string()),
            err_msg: Some("Critical disk space".to_string()),
            ..Limits::default()
        });
    if let Err(e) = report.add(disk.free_space / one_percent, free_percent) {
        tracing::warn!("guest disk {}: {}", path, e);
    }
}
