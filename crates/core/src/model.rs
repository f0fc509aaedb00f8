use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Managed object type as reported by the inventory API
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectKind {
    VirtualMachine,
    HostSystem,
    Datastore,
    DistributedVirtualSwitch,
    DistributedVirtualPortgroup,
    Folder,
    Datacenter,
    ClusterComputeResource,
    VirtualApp,
    /// Any type name this crate does not model, kept verbatim
    Other(String),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::VirtualMachine => "VirtualMachine",
            Self::HostSystem => "HostSystem",
            Self::Datastore => "Datastore",
            Self::DistributedVirtualSwitch => "VmwareDistributedVirtualSwitch",
            Self::DistributedVirtualPortgroup => "DistributedVirtualPortgroup",
            Self::Folder => "Folder",
            Self::Datacenter => "Datacenter",
            Self::ClusterComputeResource => "ClusterComputeResource",
            Self::VirtualApp => "VirtualApp",
            Self::Other(name) => name,
        }
    }

    /// Leaf objects are collection subjects and end container expansion.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::VirtualMachine
                | Self::Datastore
                | Self::DistributedVirtualSwitch
                | Self::DistributedVirtualPortgroup
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::HostSystem
                | Self::Folder
                | Self::Datacenter
                | Self::ClusterComputeResource
                | Self::VirtualApp
        )
    }
}

impl From<String> for ObjectKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "VirtualMachine" => Self::VirtualMachine,
            "HostSystem" => Self::HostSystem,
            "Datastore" => Self::Datastore,
            "VmwareDistributedVirtualSwitch" | "DistributedVirtualSwitch" => {
                Self::DistributedVirtualSwitch
            }
            "DistributedVirtualPortgroup" => Self::DistributedVirtualPortgroup,
            "Folder" => Self::Folder,
            "Datacenter" => Self::Datacenter,
            "ClusterComputeResource" => Self::ClusterComputeResource,
            "VirtualApp" => Self::VirtualApp,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for ObjectKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one inventory object. Identity is (kind, id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(rename = "value")]
    pub id: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<ObjectKind>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Child references of a container, grouped the way the inventory exposes them.
/// Which lists are followed depends on the parent's kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Children {
    pub vms: Vec<ObjectRef>,
    pub networks: Vec<ObjectRef>,
    pub datastores: Vec<ObjectRef>,
    pub hosts: Vec<ObjectRef>,
    /// Folder child entities
    pub entities: Vec<ObjectRef>,
    pub host_folder: Option<ObjectRef>,
    pub datastore_folder: Option<ObjectRef>,
    pub network_folder: Option<ObjectRef>,
}

/// Performance counter metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDescriptor {
    /// Dotted path, e.g. `cpu.usage.average`
    pub name: String,
    /// Vendor unit label, e.g. `%`, `KBps`
    pub unit: String,
    /// Counter group key, e.g. `cpu`, `net`
    pub group: String,
}

impl CounterDescriptor {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            group: group.into(),
        }
    }
}

/// One sampled series: a counter, optionally qualified by an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledSeries {
    pub name: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub values: Vec<i64>,
}

/// Performance capabilities of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerfProviderSummary {
    pub current_supported: bool,
    #[serde(default)]
    pub summary_supported: bool,
    #[serde(default)]
    pub refresh_rate: Option<i32>,
}

/// Node in a VM snapshot tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTree {
    pub name: String,
    pub create_time: DateTime<Utc>,
    #[serde(default, rename = "childSnapshotList")]
    pub children: Vec<SnapshotTree>,
}

/// Channel thresholds and their messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub min_warn: Option<f64>,
    pub max_warn: Option<f64>,
    pub min_err: Option<f64>,
    pub max_err: Option<f64>,
    pub warn_msg: Option<String>,
    pub err_msg: Option<String>,
}

impl Limits {
    pub fn is_empty(&self) -> bool {
        self.min_warn.is_none()
            && self.max_warn.is_none()
            && self.min_err.is_none()
            && self.max_err.is_none()
            && self.warn_msg.is_none()
            && self.err_msg.is_none()
    }

    /// Any warning or error bound set
    pub fn has_thresholds(&self) -> bool {
        self.min_warn.is_some()
            || self.max_warn.is_some()
            || self.min_err.is_some()
            || self.max_err.is_some()
    }
}

/// How a summary addresses its subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(String),
    Name(String),
}
