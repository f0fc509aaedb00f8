use crate::model::ObjectKind;

/// Prefix dropped from switch counter names before instance composition
const SWITCH_COUNTER_PREFIX: &str = "net.throughput.";

/// Channel name for an instance-qualified series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub name: String,
    /// Collected but kept out of charts and tables
    pub hidden: bool,
}

/// Compose the channel name for `counter` qualified by `instance`.
///
/// Only switches report instance series; for every other kind the series is
/// dropped and `None` is returned.
pub fn compose(
    kind: &ObjectKind,
    counter: &str,
    group: &str,
    instance: &str,
) -> Option<InstanceName> {
    if *kind != ObjectKind::DistributedVirtualSwitch {
        return None;
    }

    let group_prefix = format!("{}.", group);
    let base = counter
        .strip_prefix(SWITCH_COUNTER_PREFIX)
        .or_else(|| counter.strip_prefix(group_prefix.as_str()))
        .unwrap_or(counter);

    let fields: Vec<&str> = instance.split_whitespace().collect();
    let composed = match fields.as_slice() {
        [] => InstanceName {
            name: base.to_string(),
            hidden: false,
        },
        [single] => InstanceName {
            name: format!("{}.{}", base, single),
            hidden: false,
        },
        [group_id, port] => InstanceName {
            name: format!("{} Port {} {}", group_id, port, base),
            hidden: true,
        },
        many => InstanceName {
            name: format!("[{}] {}", many.join(" "), base),
            hidden: false,
        },
    };
    Some(composed)
}
