//! Per-object summaries and the tag-filtered snapshot scan.
//!
//! Each summary gathers inventory properties for one subject, derives the
//! status channels, then appends the sampled performance counters.

mod datastore;
mod host;
mod snapshots;
mod switch;
mod vm;

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::metrics::MetricsCollector;
use crate::model::{ObjectKind, ObjectRef, Target};
use crate::report::{RenderMode, SensorReport};
use crate::session::{fetch_properties, timed, Session};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters sampled for a virtual machine
pub const VM_COUNTERS: &[&str] = &[
    "disk.read.average",
    "disk.write.average",
    "disk.usage.average",
    "cpu.readiness.average",
    "cpu.usage.average",
    "mem.active.average",
    "mem.consumed.average",
    "mem.usage.average",
    "net.bytesRx.average",
    "net.bytesTx.average",
    "net.usage.average",
    "datastore.datastoreNormalReadLatency.latest",
    "datastore.datastoreNormalWriteLatency.latest",
    "datastore.datastoreReadIops.latest",
    "datastore.datastoreWriteIops.latest",
];

/// Counters sampled for a host
pub const HOST_COUNTERS: &[&str] = &[
    "cpu.latency.average",
    "cpu.readiness.average",
    "cpu.usage.average",
    "disk.read.average",
    "disk.usage.average",
    "disk.write.average",
    "mem.active.average",
    "mem.consumed.average",
    "mem.llSwapUsed.average",
    "mem.compressionRate.average",
    "net.received.average",
    "net.transmitted.average",
    "net.usage.average",
    "power.power.average",
];

/// Counters sampled for a distributed switch
pub const SWITCH_COUNTERS: &[&str] = &[
    "net.throughput.droppedRx.average",
    "net.throughput.droppedTx.average",
    "net.throughput.pktsRx.average",
    "net.throughput.pktsTx.average",
    "net.throughput.pktsRxBroadcast.average",
    "net.throughput.pktsTxBroadcast.average",
    "net.throughput.pktsRxMulticast.average",
    "net.throughput.pktsTxMulticast.average",
    "net.throughput.vds.droppedRx.average",
    "net.throughput.vds.droppedTx.average",
    "net.throughput.vds.pktsRx.average",
    "net.throughput.vds.pktsTx.average",
    "net.throughput.vds.pktsRxBcast.average",
    "net.throughput.vds.pktsTxBcast.average",
    "net.throughput.vds.pktsRxMcast.average",
    "net.throughput.vds.pktsTxMcast.average",
];

/// Counters sampled for a datastore
pub const DATASTORE_COUNTERS: &[&str] = &[
    "datastore.busResets.summation",
    "datastore.commandsAborted.summation",
    "datastore.datastoreIops.average",
    "datastore.datastoreMaxQueueDepth.latest",
    "datastore.datastoreNormalReadLatency.latest",
    "datastore.datastoreNormalWriteLatency.latest",
    "datastore.datastoreReadBytes.latest",
    "datastore.datastoreReadIops.latest",
    "datastore.datastoreReadLoadMetric.latest",
    "datastore.datastoreReadOIO.latest",
    "datastore.datastoreVMObservedLatency.latest",
    "datastore.datastoreWriteBytes.latest",
    "datastore.datastoreWriteIops.latest",
    "datastore.datastoreWriteLoadMetric.latest",
    "datastore.datastoreWriteOIO.latest",
    "datastore.maxTotalLatency.latest",
    "datastore.numberReadAveraged.average",
    "datastore.numberWriteAveraged.average",
    "datastore.read.average",
    "datastore.siocActiveTimePercentage.average",
    "datastore.sizeNormalizedDatastoreLatency.average",
    "datastore.throughput.contention.average",
    "datastore.throughput.usage.average",
    "datastore.totalReadLatency.average",
    "datastore.totalWriteLatency.average",
    "datastore.unmapIOs.summation",
    "datastore.unmapSize.summation",
    "datastore.write.average",
];

/// Value lookup for green/yellow/red health channels
pub(crate) const HEALTH_LOOKUP: &str = "prtg.standardlookups.Google.Gsa.Health";
/// Value lookup for channels where `0` is the good state
pub(crate) const FALSE_OK_LOOKUP: &str = "prtg.standardlookups.boolean.statefalseok";

/// A finished report and the time taken to build it
#[derive(Debug)]
pub struct Summary {
    pub report: Arc<SensorReport>,
    pub elapsed: Duration,
}

impl Summary {
    fn finish(report: SensorReport, started: Instant) -> Self {
        Self {
            report: Arc::new(report),
            elapsed: started.elapsed(),
        }
    }

    pub fn render(&self, mode: RenderMode) -> Result<String> {
        self.report.render(self.elapsed, mode)
    }
}

/// Builds sensor reports against one session
pub struct Summarizer {
    session: Arc<dyn Session>,
    config: Config,
}

impl Summarizer {
    pub fn new(session: Arc<dyn Session>, config: Config) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Turn an id or exact name into a reference of `kind`
    async fn resolve_target(&self, kind: ObjectKind, target: &Target) -> Result<ObjectRef> {
        match target {
            Target::Id(id) if !id.is_empty() => Ok(ObjectRef::new(kind, id.as_str())),
            Target::Name(name) if !name.is_empty() => {
                timed(
                    &format!("lookup of {} {}", kind, name),
                    self.config.inventory_timeout(),
                    self.session.find_by_name(&kind, name),
                )
                .await
            }
            _ => Err(CoreError::config(format!("no {} id or name given", kind))),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, object: &ObjectRef, names: &[&str]) -> Result<T> {
        fetch_properties(
            self.session.as_ref(),
            object,
            names,
            self.config.inventory_timeout(),
        )
        .await
    }

    fn collector(&self) -> MetricsCollector {
        MetricsCollector::new(Arc::clone(&self.session), self.config.performance_timeout())
    }
}

/// Green, yellow, red as 0, 1, 2; anything else is 9
pub(crate) fn health_value(status: &str) -> i64 {
    match status {
        "green" => 0,
        "yellow" => 1,
        "red" => 2,
        other => {
            tracing::debug!("unexpected health status {:?}", other);
            9
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::CounterDescriptor;
    use crate::session::InventoryFixture;

    /// A 6.7 server knowing a handful of counters
    pub fn server() -> InventoryFixture {
        InventoryFixture::new("6.7.0")
            .counter(CounterDescriptor::new("cpu.usage.average", "%", "cpu"))
            .counter(CounterDescriptor::new("mem.consumed.average", "KB", "mem"))
            .counter(CounterDescriptor::new("power.power.average", "W", "power"))
            .counter(CounterDescriptor::new("datastore.read.average", "KBps", "datastore"))
            .counter(CounterDescriptor::new("net.throughput.pktsRx.average", "num", "net"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySession;

    #[test]
    fn test_health_value() {
        assert_eq!(health_value("green"), 0);
        assert_eq!(health_value("yellow"), 1);
        assert_eq!(health_value("red"), 2);
        assert_eq!(health_value("gray"), 9);
    }

    #[test]
    fn test_counter_lists_have_no_duplicates() {
        for list in [VM_COUNTERS, HOST_COUNTERS, SWITCH_COUNTERS, DATASTORE_COUNTERS] {
            let unique: std::collections::HashSet<_> = list.iter().collect();
            assert_eq!(unique.len(), list.len());
        }
    }

    #[tokio::test]
    async fn test_resolve_target() {
        let session = InMemorySession::new(
            fixtures::server().object(ObjectRef::new(ObjectKind::HostSystem, "host-12"), "esx01"),
        );
        let summarizer = Summarizer::new(Arc::new(session), Config::default());

        let by_name = summarizer
            .resolve_target(ObjectKind::HostSystem, &Target::Name("esx01".into()))
            .await
            .unwrap();
        assert_eq!(by_name.id, "host-12");

        let by_id = summarizer
            .resolve_target(ObjectKind::HostSystem, &Target::Id("host-99".into()))
            .await
            .unwrap();
        assert_eq!(by_id, ObjectRef::new(ObjectKind::HostSystem, "host-99"));

        let missing = summarizer
            .resolve_target(ObjectKind::HostSystem, &Target::Name("esx02".into()))
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));

        assert!(summarizer
            .resolve_target(ObjectKind::HostSystem, &Target::Name(String::new()))
            .await
            .is_err());
    }
}
