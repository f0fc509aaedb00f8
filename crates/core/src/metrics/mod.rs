pub mod batch;
pub mod instance;
pub mod snapshot;
pub mod units;

pub use batch::batch_ceiling;
pub use snapshot::snapshot_count;
pub use units::{normalize, NormalizedUnit, Unit, VolumeSize};

use crate::error::{CoreError, Result};
use crate::model::{CounterDescriptor, ObjectRef};
use crate::report::{SensorChannel, SensorReport};
use crate::session::{timed, Session};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Value reported by the API when a counter has no data for the interval
const NO_DATA: i64 = -1;

/// Samples performance counters for one object into a sensor report
pub struct MetricsCollector {
    session: Arc<dyn Session>,
    timeout: Duration,
}

impl MetricsCollector {
    pub fn new(session: Arc<dyn Session>, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    /// Largest number of series one sample query may return
    pub async fn batch_ceiling(&self) -> usize {
        let option = timed(
            "maxQueryMetrics",
            self.timeout,
            self.session.max_query_batch_size(),
        )
        .await;
        if let Ok(Some(_)) = option {
            return batch_ceiling(option, "");
        }

        let version = timed("server version", self.timeout, self.session.server_version()).await;
        let version = match version {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!("could not read server version: {}", e);
                String::new()
            }
        };
        batch_ceiling(option, &version)
    }

    /// Sample the `wanted` counters of `object` and append them to `report`.
    ///
    /// Returns the number of channels added. Objects without live sampling
    /// add nothing and succeed. A sample wider than the server's batch
    /// ceiling fails with [`CoreError::BatchTooLarge`] before anything is
    /// appended.
    pub async fn collect(
        &self,
        object: &ObjectRef,
        wanted: &[String],
        interval_secs: i32,
        report: &SensorReport,
    ) -> Result<usize> {
        let summary = match timed(
            &format!("provider summary of {}", object),
            self.timeout,
            self.session.provider_summary(object),
        )
        .await
        {
            Ok(summary) => summary,
            Err(CoreError::NotSupported(reason)) => {
                tracing::info!("{} has no performance provider: {}", object, reason);
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        if !summary.current_supported {
            tracing::info!("{} performance metrics not available", object);
            return Ok(0);
        }

        let ceiling = self.batch_ceiling().await;

        let counters = timed("counter list", self.timeout, self.session.list_counters()).await?;
        let names: Vec<String> = counters.iter().map(|c| c.name.clone()).collect();
        let by_name: HashMap<&str, &CounterDescriptor> =
            counters.iter().map(|c| (c.name.as_str(), c)).collect();

        let mut series = timed(
            &format!("sample of {}", object),
            self.timeout,
            self.session.sample_counters(object, &names, interval_secs, 1),
        )
        .await?;
        if series.is_empty() {
            return Err(CoreError::metrics(format!(
                "could not find sample data for {}",
                object
            )));
        }

        let distinct: HashSet<(&str, &str)> = series
            .iter()
            .map(|s| (s.name.as_str(), s.instance.as_str()))
            .collect();
        if distinct.len() > ceiling {
            return Err(CoreError::BatchTooLarge {
                needed: distinct.len(),
                max: ceiling,
            });
        }

        let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
        series.sort_by(|a, b| a.name.cmp(&b.name));

        let mut added = 0;
        for s in &series {
            if !wanted.contains(s.name.as_str()) {
                continue;
            }
            let Some(&raw) = s.values.first() else {
                continue;
            };
            if raw == NO_DATA {
                continue;
            }
            let Some(counter) = by_name.get(s.name.as_str()) else {
                tracing::warn!("sampled counter {} has no descriptor", s.name);
                continue;
            };

            let (name, hidden) = if s.instance.is_empty() {
                (s.name.clone(), false)
            } else {
                match instance::compose(&object.kind, &s.name, &counter.group, &s.instance) {
                    Some(composed) => (composed.name, composed.hidden),
                    None => continue,
                }
            };

            let mut channel = SensorChannel::new(name.as_str())
                .normalized(normalize(&counter.unit, &counter.group));
            if hidden {
                channel = channel.hidden();
            }

            match report.add(display_value(&name, raw), channel) {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!("dropping counter {} for {}: {}", name, object, e),
            }
        }

        tracing::debug!("{} channels collected for {}", added, object);
        Ok(added)
    }
}

/// Counters are fixed-point hundredths, except power and uptime counters
/// which are whole units.
pub fn display_value(counter_name: &str, raw: i64) -> f64 {
    if counter_name.contains("power") || counter_name.contains("uptime") {
        raw as f64
    } else {
        raw as f64 / 100.0
    }
}
