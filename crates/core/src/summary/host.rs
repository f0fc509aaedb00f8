use super::{owned, Summarizer, Summary, FALSE_OK_LOOKUP, HEALTH_LOOKUP, HOST_COUNTERS};
use crate::error::Result;
use crate::metrics::{Unit, VolumeSize};
use crate::model::{Limits, ObjectKind, Target};
use crate::report::{SensorChannel, SensorReport};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostProperties {
    name: String,
    #[serde(default)]
    runtime: HostRuntime,
    #[serde(default)]
    summary: HostSummaryInfo,
    #[serde(default)]
    triggered_alarm_state: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostRuntime {
    #[serde(default)]
    power_state: String,
    #[serde(default)]
    in_maintenance_mode: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostSummaryInfo {
    hardware: HostHardware,
    quick_stats: QuickStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostHardware {
    /// Bytes
    memory_size: i64,
    cpu_mhz: i64,
    num_cpu_cores: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QuickStats {
    /// MiB
    overall_memory_usage: i64,
    /// MHz
    overall_cpu_usage: i64,
}

/// Power state as reported on the health scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerState {
    On,
    Asleep,
    Unknown,
}

impl PowerState {
    fn parse(state: &str) -> Option<Self> {
        match state {
            "poweredOn" => Some(Self::On),
            "poweredOff" | "standby" => Some(Self::Asleep),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    fn value(self) -> i64 {
        match self {
            Self::On => 0,
            Self::Asleep => 1,
            Self::Unknown => 2,
        }
    }
}

fn mhz(name: &str) -> SensorChannel {
    SensorChannel::new(name)
        .unit(Unit::Custom)
        .volume_size(VolumeSize::One)
        .custom_unit("MHz")
}

impl Summarizer {
    /// Power, memory, CPU, maintenance and alarm state of one host, followed
    /// by its performance counters. A host that is not running reports its
    /// power state only.
    pub async fn host_summary(&self, target: &Target) -> Result<Summary> {
        let started = Instant::now();
        let object = self.resolve_target(ObjectKind::HostSystem, target).await?;
        let props: HostProperties = self
            .fetch(&object, &["name", "runtime", "summary", "triggeredAlarmState"])
            .await?;

        let report = SensorReport::new(props.name.as_str()).with_subject_id(object.id.as_str());

        let power = SensorChannel::new("Power state")
            .unit(Unit::Custom)
            .volume_size(VolumeSize::Custom)
            .lookup(HEALTH_LOOKUP)
            .limits(Limits {
                warn_msg: Some("Host was put to sleep".to_string()),
                err_msg: Some("Host in unknown state, please investigate".to_string()),
                ..Limits::default()
            });
        match PowerState::parse(&props.runtime.power_state) {
            Some(state) => {
                report.add(state.value(), power)?;
                if state != PowerState::On {
                    tracing::info!("{} is not running, skipping its statistics", object);
                    return Ok(Summary::finish(report, started));
                }
            }
            None => tracing::warn!(
                "{} reports unexpected power state {:?}",
                object,
                props.runtime.power_state
            ),
        }

        add_capacity(&report, &props.summary)?;

        report.add(
            props.runtime.in_maintenance_mode,
            SensorChannel::new("Maintenance Mode")
                .unit(Unit::Custom)
                .volume_size(VolumeSize::Custom)
                .lookup(FALSE_OK_LOOKUP),
        )?;
        report.add(
            props.triggered_alarm_state.len(),
            SensorChannel::new("Triggered Alarms")
                .unit(Unit::Count)
                .limits(Limits {
                    max_warn: Some(1.0),
                    warn_msg: Some("triggered alarms present".to_string()),
                    ..Limits::default()
                }),
        )?;

        self.collector()
            .collect(&object, &owned(HOST_COUNTERS), self.config.intervals.host, &report)
            .await?;

        Ok(Summary::finish(report, started))
    }
}

fn add_capacity(report: &SensorReport, summary: &HostSummaryInfo) -> Result<()> {
    let hardware = &summary.hardware;
    let stats = &summary.quick_stats;

    let free_memory = hardware.memory_size - stats.overall_memory_usage * 1024 * 1024;
    report.add(free_memory, SensorChannel::new("Memory Free").unit(Unit::BytesMemory))?;
    let memory_percent = hardware.memory_size / 100;
    if memory_percent > 0 {
        report.add(
            free_memory / memory_percent,
            SensorChannel::new("Memory Free (Percent)").unit(Unit::Percent),
        )?;
    }

    let total_cpu = hardware.cpu_mhz * hardware.num_cpu_cores;
    let free_cpu = total_cpu - stats.overall_cpu_usage;
    let cpu_percent = total_cpu / 100;
    if cpu_percent > 0 {
        report.add(free_cpu / cpu_percent, SensorChannel::new("CPU Free").unit(Unit::Percent))?;
        report.add(
            stats.overall_cpu_usage / cpu_percent,
            SensorChannel::new("CPU Used").unit(Unit::Percent),
        )?;
    }
    report.add(total_cpu - free_cpu, mhz("CPU Used MHz"))?;
    report.add(free_cpu, mhz("CPU Free MHz"))?;
    report.add(total_cpu, mhz("CPU Capacity MHz"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::config::Config;
    use crate::model::{ObjectRef, SampledSeries};
    use crate::report::{ChannelValue, RenderMode};
    use crate::session::{InMemorySession, InventoryFixture};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn host(power_state: &str) -> InventoryFixture {
        fixtures::server()
            .object(ObjectRef::new(ObjectKind::HostSystem, "host-12"), "esx01")
            .properties(
                "host-12",
                json!({
                    "runtime": { "powerState": power_state, "inMaintenanceMode": false },
                    "summary": {
                        "hardware": {
                            "memorySize": 68_719_476_736_i64,
                            "cpuMhz": 2_000,
                            "numCpuCores": 8
                        },
                        "quickStats": { "overallMemoryUsage": 16_384, "overallCpuUsage": 4_000 }
                    },
                    "triggeredAlarmState": [{ "key": "alarm-7.host-12" }]
                }),
            )
            .series(
                "host-12",
                vec![SampledSeries {
                    name: "power.power.average".into(),
                    instance: String::new(),
                    values: vec![180],
                }],
            )
    }

    async fn summarize(fixture: InventoryFixture) -> HashMap<String, ChannelValue> {
        let session = Arc::new(InMemorySession::new(fixture));
        let summarizer = Summarizer::new(session, Config::default());
        let summary = summarizer
            .host_summary(&Target::Id("host-12".into()))
            .await
            .unwrap();
        summary
            .report
            .channels()
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect()
    }

    #[tokio::test]
    async fn test_running_host() {
        let channels = summarize(host("poweredOn")).await;

        assert_eq!(channels["Power state"], ChannelValue::Integer(0));
        assert_eq!(channels["Memory Free"], ChannelValue::Integer(51_539_607_552));
        assert_eq!(channels["Memory Free (Percent)"], ChannelValue::Integer(75));
        assert_eq!(channels["CPU Capacity MHz"], ChannelValue::Integer(16_000));
        assert_eq!(channels["CPU Used MHz"], ChannelValue::Integer(4_000));
        assert_eq!(channels["CPU Free MHz"], ChannelValue::Integer(12_000));
        assert_eq!(channels["CPU Used"], ChannelValue::Integer(25));
        assert_eq!(channels["CPU Free"], ChannelValue::Integer(75));
        assert_eq!(channels["Maintenance Mode"], ChannelValue::Boolean(false));
        assert_eq!(channels["Triggered Alarms"], ChannelValue::Integer(1));
        assert_eq!(channels["power.power.average"].to_string(), "180.00");
    }

    #[tokio::test]
    async fn test_sleeping_host_stops_early() {
        for (state, value) in [("standby", 1), ("poweredOff", 1), ("unknown", 2)] {
            let channels = summarize(host(state)).await;
            assert_eq!(channels.len(), 1, "{}", state);
            assert_eq!(channels["Power state"], ChannelValue::Integer(value));
        }
    }

    #[tokio::test]
    async fn test_power_state_carries_messages_only() {
        let summarizer = Summarizer::new(
            Arc::new(InMemorySession::new(host("standby"))),
            Config::default(),
        );
        let summary = summarizer
            .host_summary(&Target::Id("host-12".into()))
            .await
            .unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(&summary.render(RenderMode::Compact).unwrap()).unwrap();
        let power = &payload["prtg"]["result"][0];
        assert_eq!(power["channel"], "Power state");
        assert_eq!(power["limitwarningmsg"], "Host was put to sleep");
        assert!(power.get("limitmode").is_none());
    }

    #[test]
    fn test_power_state_parse() {
        assert_eq!(PowerState::parse("poweredOn"), Some(PowerState::On));
        assert_eq!(PowerState::parse("standby"), Some(PowerState::Asleep));
        assert_eq!(PowerState::parse("rebooting"), None);
    }
}
