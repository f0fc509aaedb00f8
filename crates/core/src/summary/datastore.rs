use super::{owned, Summarizer, Summary, DATASTORE_COUNTERS, FALSE_OK_LOOKUP};
use crate::error::Result;
use crate::metrics::{Unit, VolumeSize};
use crate::model::{Limits, ObjectKind, Target};
use crate::report::{SensorChannel, SensorReport};
use serde::Deserialize;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct DatastoreProperties {
    name: String,
    #[serde(default)]
    summary: DatastoreSummaryInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DatastoreSummaryInfo {
    capacity: i64,
    free_space: i64,
    maintenance_mode: String,
}

impl Default for DatastoreSummaryInfo {
    fn default() -> Self {
        Self {
            capacity: 0,
            free_space: 0,
            maintenance_mode: "normal".to_string(),
        }
    }
}

impl Summarizer {
    /// Space usage and maintenance state of one datastore, followed by its
    /// performance counters.
    pub async fn datastore_summary(&self, target: &Target) -> Result<Summary> {
        let started = Instant::now();
        let object = self.resolve_target(ObjectKind::Datastore, target).await?;
        let props: DatastoreProperties = self.fetch(&object, &["name", "summary"]).await?;
        let summary = &props.summary;

        let report = SensorReport::new(props.name.as_str()).with_subject_id(object.id.as_str());

        let one_percent = summary.capacity / 100;
        if one_percent > 0 {
            let free_percent = summary.free_space / one_percent;
            report.add(
                free_percent,
                SensorChannel::new("Free space (Percent)")
                    .unit(Unit::Percent)
                    .limits(Limits {
                        min_warn: self.config.limits.min_warn,
                        min_err: self.config.limits.min_err,
                        warn_msg: Some("Warning Low Space".to_string()),
                        err_msg: Some("Critical disk space".to_string()),
                        ..Limits::default()
                    }),
            )?;
            report.add(
                100 - free_percent,
                SensorChannel::new("Used Space (Percent)").unit(Unit::Percent),
            )?;
        } else {
            tracing::debug!("{} reports no capacity", object);
        }

        report.add(
            summary.capacity,
            SensorChannel::new("Total capacity")
                .unit(Unit::BytesDisk)
                .volume_size(VolumeSize::KiloByte),
        )?;
        report.add(
            summary.free_space,
            SensorChannel::new("Free Bytes")
                .unit(Unit::BytesDisk)
                .volume_size(VolumeSize::KiloByte)
                .hidden(),
        )?;
        report.add(
            summary.maintenance_mode != "normal",
            SensorChannel::new("Maintenance Mode")
                .unit(Unit::Custom)
                .lookup(FALSE_OK_LOOKUP)
                .limits(Limits {
                    max_warn: Some(1.0),
                    ..Limits::default()
                }),
        )?;

        self.collector()
            .collect(
                &object,
                &owned(DATASTORE_COUNTERS),
                self.config.intervals.datastore,
                &report,
            )
            .await?;

        Ok(Summary::finish(report, started))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::config::Config;
    use crate::model::{ObjectRef, SampledSeries};
    use crate::report::ChannelValue;
    use crate::session::InMemorySession;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_datastore_summary() {
        let fixture = fixtures::server()
            .object(ObjectRef::new(ObjectKind::Datastore, "datastore-13"), "ssd01")
            .properties(
                "datastore-13",
                json!({ "summary": {
                    "capacity": 1_000_000,
                    "freeSpace": 250_000,
                    "maintenanceMode": "enteringMaintenance"
                }}),
            )
            .series(
                "datastore-13",
                vec![SampledSeries {
                    name: "datastore.read.average".into(),
                    instance: String::new(),
                    values: vec![4_096],
                }],
            );
        let mut config = Config::default();
        config.limits.min_warn = Some(30.0);
        let summarizer = Summarizer::new(Arc::new(InMemorySession::new(fixture)), config);

        let summary = summarizer
            .datastore_summary(&Target::Name("ssd01".into()))
            .await
            .unwrap();
        let channels = summary.report.channels();
        let find = |name: &str| channels.iter().find(|c| c.name == name).unwrap().clone();

        let free = find("Free space (Percent)");
        assert_eq!(free.value, ChannelValue::Integer(25));
        assert_eq!(free.limits.unwrap().min_warn, Some(30.0));
        assert_eq!(find("Used Space (Percent)").value, ChannelValue::Integer(75));
        assert_eq!(find("Total capacity").value, ChannelValue::Integer(1_000_000));
        assert!(!find("Free Bytes").visible);
        assert_eq!(find("Maintenance Mode").value, ChannelValue::Boolean(true));

        let read = find("datastore.read.average");
        assert_eq!(read.unit, Some(Unit::SpeedDisk));
        assert_eq!(read.value.to_string(), "40.96");
    }

    #[tokio::test]
    async fn test_empty_datastore_skips_percentages() {
        let fixture = fixtures::server()
            .object(ObjectRef::new(ObjectKind::Datastore, "datastore-2"), "nfs");
        let session = Arc::new(InMemorySession::new(fixture));
        let summarizer = Summarizer::new(session, Config::default());

        let summary = summarizer
            .datastore_summary(&Target::Id("datastore-2".into()))
            .await
            .unwrap();
        let names: Vec<String> = summary.report.channels().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Free Bytes", "Maintenance Mode", "Total capacity"]);
    }
}
