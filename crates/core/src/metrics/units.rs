//! Translation of vendor counter units into PRTG channel units.

/// PRTG channel unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    BytesBandwidth,
    BytesDisk,
    BytesMemory,
    BytesFile,
    Temperature,
    Percent,
    TimeResponse,
    TimeSeconds,
    TimeHours,
    Custom,
    Count,
    Cpu,
    SpeedDisk,
    SpeedNet,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BytesBandwidth => "BytesBandwidth",
            Self::BytesDisk => "BytesDisk",
            Self::BytesMemory => "BytesMemory",
            Self::BytesFile => "BytesFile",
            Self::Temperature => "Temperature",
            Self::Percent => "Percent",
            Self::TimeResponse => "TimeResponse",
            Self::TimeSeconds => "TimeSeconds",
            Self::TimeHours => "TimeHours",
            Self::Custom => "Custom",
            Self::Count => "Count",
            Self::Cpu => "CPU",
            Self::SpeedDisk => "SpeedDisk",
            Self::SpeedNet => "SpeedNet",
        }
    }
}

/// PRTG volume or speed scale.
///
/// `Custom` and `Temperature` are not PRTG sizes; the temperature and
/// microsecond counters have always been reported with them and dashboards
/// key off the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeSize {
    One,
    Kilo,
    Mega,
    Giga,
    Tera,
    Byte,
    KiloByte,
    MegaByte,
    GigaByte,
    TeraByte,
    Bit,
    KiloBit,
    MegaBit,
    GigaBit,
    TeraBit,
    Custom,
    Temperature,
}

impl VolumeSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "One",
            Self::Kilo => "Kilo",
            Self::Mega => "Mega",
            Self::Giga => "Giga",
            Self::Tera => "Tera",
            Self::Byte => "Byte",
            Self::KiloByte => "KiloByte",
            Self::MegaByte => "MegaByte",
            Self::GigaByte => "GigaByte",
            Self::TeraByte => "TeraByte",
            Self::Bit => "Bit",
            Self::KiloBit => "KiloBit",
            Self::MegaBit => "MegaBit",
            Self::GigaBit => "GigaBit",
            Self::TeraBit => "TeraBit",
            Self::Custom => "Custom",
            Self::Temperature => "Temperature",
        }
    }
}

/// Result of [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedUnit {
    pub unit: Option<Unit>,
    pub volume_size: Option<VolumeSize>,
    pub custom_unit: Option<String>,
}

impl NormalizedUnit {
    fn unit(unit: Unit) -> Self {
        Self {
            unit: Some(unit),
            ..Self::default()
        }
    }

    fn sized(unit: Unit, size: VolumeSize) -> Self {
        Self {
            unit: Some(unit),
            volume_size: Some(size),
            custom_unit: None,
        }
    }

    fn custom(size: Option<VolumeSize>, label: Option<&str>) -> Self {
        Self {
            unit: Some(Unit::Custom),
            volume_size: size,
            custom_unit: label.map(str::to_string),
        }
    }
}

const BYTE_SIZES: &[(&str, VolumeSize)] = &[
    ("KB", VolumeSize::KiloByte),
    ("MB", VolumeSize::MegaByte),
    ("GB", VolumeSize::GigaByte),
    ("TB", VolumeSize::TeraByte),
];

/// Counter groups whose KBps counters are disk throughput
const DISK_SPEED_GROUPS: &[&str] = &[
    "disk",
    "virtualDisk",
    "datastore",
    "storageAdapter",
    "mem",
    "hbr",
    "storagePath",
];

/// Byte unit for a byte-sized counter in `group`
fn byte_unit(group: &str) -> Unit {
    match group {
        "net" => Unit::BytesBandwidth,
        "disk" | "virtualDisk" | "datastore" => Unit::BytesDisk,
        "mem" => Unit::BytesMemory,
        _ => Unit::Custom,
    }
}

/// Map a counter's raw unit label and group key to a PRTG unit.
///
/// Total: labels not in the table come back as a custom unit carrying the
/// raw label, so new vendor counters never break collection.
pub fn normalize(raw_unit: &str, group: &str) -> NormalizedUnit {
    if let Some(&(_, size)) = BYTE_SIZES.iter().find(|(label, _)| *label == raw_unit) {
        return NormalizedUnit::sized(byte_unit(group), size);
    }

    match raw_unit {
        "num" => NormalizedUnit::unit(Unit::Count),
        "ms" => NormalizedUnit::unit(Unit::TimeResponse),
        "%" => NormalizedUnit::unit(Unit::Percent),
        "s" => NormalizedUnit::unit(Unit::TimeSeconds),
        "KBps" => match group {
            "net" => NormalizedUnit::sized(Unit::SpeedNet, VolumeSize::KiloBit),
            g if DISK_SPEED_GROUPS.contains(&g) => {
                NormalizedUnit::sized(Unit::SpeedDisk, VolumeSize::KiloBit)
            }
            _ => {
                tracing::debug!("KBps counter in unmapped group {}", group);
                NormalizedUnit::custom(Some(VolumeSize::KiloBit), Some(group))
            }
        },
        "MHz" => NormalizedUnit::custom(Some(VolumeSize::One), Some("MHz")),
        "℃" => NormalizedUnit {
            unit: None,
            volume_size: Some(VolumeSize::Temperature),
            custom_unit: None,
        },
        "µs" => NormalizedUnit::custom(None, None),
        "W" => NormalizedUnit::custom(None, Some("Watt")),
        other => {
            tracing::debug!("unmapped counter unit {:?}", other);
            NormalizedUnit::custom(None, Some(other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let n = normalize("%", "cpu");
        assert_eq!(n.unit, Some(Unit::Percent));
        assert_eq!(n.volume_size, None);
    }

    #[test]
    fn test_kbps_by_group() {
        let net = normalize("KBps", "net");
        assert_eq!(net.unit, Some(Unit::SpeedNet));
        assert_eq!(net.volume_size, Some(VolumeSize::KiloBit));

        let disk = normalize("KBps", "storagePath");
        assert_eq!(disk.unit, Some(Unit::SpeedDisk));

        let other = normalize("KBps", "vflashModule");
        assert_eq!(other.unit, Some(Unit::Custom));
        assert_eq!(other.custom_unit.as_deref(), Some("vflashModule"));
    }

    #[test]
    fn test_byte_sizes_follow_group() {
        assert_eq!(
            normalize("KB", "mem"),
            NormalizedUnit::sized(Unit::BytesMemory, VolumeSize::KiloByte)
        );
        assert_eq!(
            normalize("GB", "datastore"),
            NormalizedUnit::sized(Unit::BytesDisk, VolumeSize::GigaByte)
        );
        assert_eq!(normalize("TB", "net").unit, Some(Unit::BytesBandwidth));
        assert_eq!(normalize("MB", "sys").unit, Some(Unit::Custom));
    }

    #[test]
    fn test_fixed_labels() {
        let mhz = normalize("MHz", "cpu");
        assert_eq!(mhz.volume_size, Some(VolumeSize::One));
        assert_eq!(mhz.custom_unit.as_deref(), Some("MHz"));

        assert_eq!(normalize("W", "power").custom_unit.as_deref(), Some("Watt"));
        assert_eq!(normalize("s", "sys").unit, Some(Unit::TimeSeconds));
        assert_eq!(normalize("ms", "disk").unit, Some(Unit::TimeResponse));
        assert_eq!(normalize("num", "cpu").unit, Some(Unit::Count));

        let temp = normalize("℃", "sensor");
        assert_eq!(temp.unit, None);
        assert_eq!(temp.volume_size, Some(VolumeSize::Temperature));
    }

    #[test]
    fn test_unknown_unit_passes_through() {
        let n = normalize("unknownunit", "x");
        assert_eq!(n.unit, Some(Unit::Custom));
        assert_eq!(n.custom_unit.as_deref(), Some("unknownunit"));
    }
}
