use super::{health_value, owned, Summarizer, Summary, HEALTH_LOOKUP, SWITCH_COUNTERS};
use crate::error::Result;
use crate::metrics::Unit;
use crate::model::{ObjectKind, ObjectRef, Target};
use crate::report::{SensorChannel, SensorReport};
use serde::Deserialize;
use std::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchProperties {
    name: String,
    #[serde(default)]
    overall_status: String,
    #[serde(default)]
    config_status: String,
    #[serde(default)]
    portgroup: Vec<ObjectRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortgroupProperties {
    name: String,
    #[serde(default)]
    overall_status: String,
}

fn health(name: &str) -> SensorChannel {
    SensorChannel::new(name)
        .unit(Unit::Custom)
        .custom_unit("Custom")
        .lookup(HEALTH_LOOKUP)
}

impl Summarizer {
    /// Health of a distributed switch and each of its port groups, plus its
    /// throughput counters. Counter failures are logged, not returned.
    pub async fn switch_summary(&self, target: &Target) -> Result<Summary> {
        let started = Instant::now();
        let object = self
            .resolve_target(ObjectKind::DistributedVirtualSwitch, target)
            .await?;
        let props: SwitchProperties = self
            .fetch(&object, &["name", "overallStatus", "configStatus", "portgroup"])
            .await?;

        let report = SensorReport::new(props.name.as_str()).with_subject_id(object.id.as_str());
        report.add(health_value(&props.overall_status), health("Overall Status"))?;
        report.add(health_value(&props.config_status), health("Config Status"))?;

        for portgroup in &props.portgroup {
            let pg: PortgroupProperties = self.fetch(portgroup, &["name", "overallStatus"]).await?;
            if let Err(e) = report.add(health_value(&pg.overall_status), health(&pg.name)) {
                tracing::warn!("port group {}: {}", portgroup, e);
            }
        }

        if let Err(e) = self
            .collector()
            .collect(&object, &owned(SWITCH_COUNTERS), self.config.intervals.switch, &report)
            .await
        {
            tracing::warn!("counters for {} unavailable: {}", object, e);
        }

        Ok(Summary::finish(report, started))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::config::Config;
    use crate::model::SampledSeries;
    use crate::report::ChannelValue;
    use crate::session::{InMemorySession, InventoryFixture};
    use serde_json::json;
    use std::sync::Arc;

    fn portgroup(id: &str) -> ObjectRef {
        ObjectRef::new(ObjectKind::DistributedVirtualPortgroup, id)
    }

    fn switch() -> InventoryFixture {
        fixtures::server()
            .object(ObjectRef::new(ObjectKind::DistributedVirtualSwitch, "dvs-19"), "dvs01")
            .object(portgroup("dvportgroup-20"), "vlan20")
            .object(portgroup("dvportgroup-21"), "vlan21")
            .properties(
                "dvs-19",
                json!({
                    "overallStatus": "green",
                    "configStatus": "yellow",
                    "portgroup": [
                        { "type": "DistributedVirtualPortgroup", "value": "dvportgroup-20" },
                        { "type": "DistributedVirtualPortgroup", "value": "dvportgroup-21" }
                    ]
                }),
            )
            .properties("dvportgroup-20", json!({ "overallStatus": "red" }))
            .properties("dvportgroup-21", json!({ "overallStatus": "gray" }))
    }

    #[tokio::test]
    async fn test_switch_summary() {
        let fixture = switch().series(
            "dvs-19",
            vec![SampledSeries {
                name: "net.throughput.pktsRx.average".into(),
                instance: "dvportgroup-20 7".into(),
                values: vec![1_200],
            }],
        );
        let session = Arc::new(InMemorySession::new(fixture));
        let summarizer = Summarizer::new(session, Config::default());

        let summary = summarizer
            .switch_summary(&Target::Name("dvs01".into()))
            .await
            .unwrap();
        let channels = summary.report.channels();
        let value = |name: &str| channels.iter().find(|c| c.name == name).unwrap().value.clone();

        assert_eq!(value("Overall Status"), ChannelValue::Integer(0));
        assert_eq!(value("Config Status"), ChannelValue::Integer(1));
        assert_eq!(value("vlan20"), ChannelValue::Integer(2));
        assert_eq!(value("vlan21"), ChannelValue::Integer(9));
        assert_eq!(value("dvportgroup-20 Port 7 pktsRx.average").to_string(), "12.00");
    }

    #[tokio::test]
    async fn test_counter_failure_is_not_fatal() {
        let mut fixture = switch().series(
            "dvs-19",
            vec![
                SampledSeries {
                    name: "net.throughput.pktsRx.average".into(),
                    instance: "uplink1".into(),
                    values: vec![1],
                },
                SampledSeries {
                    name: "net.throughput.pktsRx.average".into(),
                    instance: "uplink2".into(),
                    values: vec![1],
                },
            ],
        );
        fixture.max_query_metrics = Some(1);
        let session = Arc::new(InMemorySession::new(fixture));
        let summarizer = Summarizer::new(session, Config::default());

        let summary = summarizer
            .switch_summary(&Target::Id("dvs-19".into()))
            .await
            .unwrap();
        assert_eq!(summary.report.len(), 4);
    }
}
