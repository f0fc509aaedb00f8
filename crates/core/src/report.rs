//! Sensor report aggregation and PRTG rendering.
//!
//! Collectors append channels concurrently through a shared [`SensorReport`];
//! [`SensorReport::render`] sorts them by name and serializes the result.

use crate::error::{CoreError, Result};
use crate::metrics::units::{NormalizedUnit, Unit, VolumeSize};
use crate::model::Limits;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Name of the synthetic channel appended at render time
pub const EXECUTION_TIME_CHANNEL: &str = "Execution time";

/// Channel value
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl ChannelValue {
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:.2}", v),
            Self::Text(v) => f.write_str(v),
            Self::Boolean(v) => f.write_str(if *v { "1" } else { "0" }),
        }
    }
}

impl From<i64> for ChannelValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for ChannelValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<usize> for ChannelValue {
    fn from(v: usize) -> Self {
        Self::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ChannelValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ChannelValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for ChannelValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ChannelValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One named line of a sensor report
#[derive(Debug, Clone, PartialEq)]
pub struct SensorChannel {
    pub name: String,
    pub value: ChannelValue,
    pub unit: Option<Unit>,
    pub volume_size: Option<VolumeSize>,
    pub custom_unit: Option<String>,
    pub value_lookup: Option<String>,
    pub limits: Option<Limits>,
    pub visible: bool,
    /// Show decimals in PRTG; set automatically for percent channels
    pub decimal_mode: bool,
}

impl SensorChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ChannelValue::Integer(0),
            unit: None,
            volume_size: None,
            custom_unit: None,
            value_lookup: None,
            limits: None,
            visible: true,
            decimal_mode: false,
        }
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn volume_size(mut self, size: VolumeSize) -> Self {
        self.volume_size = Some(size);
        self
    }

    pub fn custom_unit(mut self, label: impl Into<String>) -> Self {
        self.custom_unit = Some(label.into());
        self
    }

    /// Apply a normalized counter unit
    pub fn normalized(mut self, unit: NormalizedUnit) -> Self {
        self.unit = unit.unit;
        self.volume_size = unit.volume_size;
        self.custom_unit = unit.custom_unit;
        self
    }

    pub fn lookup(mut self, lookup: impl Into<String>) -> Self {
        self.value_lookup = Some(lookup.into());
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = (!limits.is_empty()).then_some(limits);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Default)]
struct ReportState {
    text: String,
    error: Option<String>,
    channels: Vec<SensorChannel>,
}

/// Sensor output for one subject, shared by concurrent collectors
#[derive(Debug)]
pub struct SensorReport {
    subject_name: String,
    subject_id: String,
    state: RwLock<ReportState>,
}

/// Output style for [`SensorReport::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Single-line JSON for PRTG
    Compact,
    /// Indented JSON prefixed with the subject, for humans
    Pretty,
}

impl RenderMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl SensorReport {
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_id: String::new(),
            state: RwLock::new(ReportState::default()),
        }
    }

    pub fn with_subject_id(mut self, id: impl Into<String>) -> Self {
        self.subject_id = id.into();
        self
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.write().text = text.into();
    }

    pub fn text(&self) -> String {
        self.state.read().text.clone()
    }

    /// Put the report in error state; rendering then emits only the error.
    pub fn set_error(&self, message: impl Into<String>) {
        self.state.write().error = Some(message.into());
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    /// Append a channel carrying `value`. Channel names are unique per report;
    /// [`EXECUTION_TIME_CHANNEL`] is reserved for the one added at render time.
    pub fn add(&self, value: impl Into<ChannelValue>, mut channel: SensorChannel) -> Result<()> {
        channel.value = value.into();
        if channel.unit == Some(Unit::Percent) {
            channel.decimal_mode = true;
        }

        let mut state = self.state.write();
        if channel.name == EXECUTION_TIME_CHANNEL
            || state.channels.iter().any(|c| c.name == channel.name)
        {
            return Err(CoreError::DuplicateChannel(channel.name));
        }
        state.channels.push(channel);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.read().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the channels, sorted by name
    pub fn channels(&self) -> Vec<SensorChannel> {
        let mut channels = self.state.read().channels.clone();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    /// Serialize the report.
    ///
    /// A report in error state renders only the error payload, returned
    /// inside [`CoreError::ErrorState`] so callers can both print it and fail.
    pub fn render(&self, elapsed: Duration, mode: RenderMode) -> Result<String> {
        if let Some(message) = self.error() {
            let envelope = PrtgEnvelope {
                prtg: PrtgBody {
                    result: Vec::new(),
                    text: message.clone(),
                    error: Some("1"),
                },
            };
            let payload = self.serialize(&envelope, mode)?;
            return Err(CoreError::ErrorState { message, payload });
        }

        let mut result: Vec<PrtgChannel> =
            self.channels().iter().map(PrtgChannel::from).collect();
        let mut execution = SensorChannel::new(EXECUTION_TIME_CHANNEL).unit(Unit::TimeResponse);
        execution.value = ChannelValue::Float(elapsed.as_secs_f64() * 1000.0);
        result.push(PrtgChannel::from(&execution));

        let envelope = PrtgEnvelope {
            prtg: PrtgBody {
                result,
                text: self.text(),
                error: None,
            },
        };
        self.serialize(&envelope, mode)
    }

    fn serialize(&self, envelope: &PrtgEnvelope, mode: RenderMode) -> Result<String> {
        match mode {
            RenderMode::Compact => Ok(serde_json::to_string(envelope)?),
            RenderMode::Pretty => Ok(format!(
                "{} {}\n{}",
                self.subject_name,
                self.subject_id,
                serde_json::to_string_pretty(envelope)?
            )),
        }
    }
}

#[derive(Serialize)]
struct PrtgEnvelope {
    prtg: PrtgBody,
}

#[derive(Serialize)]
struct PrtgBody {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    result: Vec<PrtgChannel>,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// PRTG wire form of a channel; every field is a string
#[derive(Serialize)]
struct PrtgChannel {
    channel: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
    #[serde(rename = "customunit", skip_serializing_if = "Option::is_none")]
    custom_unit: Option<String>,
    #[serde(rename = "volumesize", skip_serializing_if = "Option::is_none")]
    volume_size: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    float: Option<&'static str>,
    #[serde(rename = "decimalmode", skip_serializing_if = "Option::is_none")]
    decimal_mode: Option<&'static str>,
    #[serde(rename = "showchart")]
    show_chart: &'static str,
    #[serde(rename = "showtable")]
    show_table: &'static str,
    #[serde(rename = "valuelookup", skip_serializing_if = "Option::is_none")]
    value_lookup: Option<String>,
    #[serde(rename = "limitmode", skip_serializing_if = "Option::is_none")]
    limit_mode: Option<&'static str>,
    #[serde(rename = "limitminwarning", skip_serializing_if = "Option::is_none")]
    limit_min_warning: Option<String>,
    #[serde(rename = "limitmaxwarning", skip_serializing_if = "Option::is_none")]
    limit_max_warning: Option<String>,
    #[serde(rename = "limitminerror", skip_serializing_if = "Option::is_none")]
    limit_min_error: Option<String>,
    #[serde(rename = "limitmaxerror", skip_serializing_if = "Option::is_none")]
    limit_max_error: Option<String>,
    #[serde(rename = "limitwarningmsg", skip_serializing_if = "Option::is_none")]
    limit_warning_msg: Option<String>,
    #[serde(rename = "limiterrormsg", skip_serializing_if = "Option::is_none")]
    limit_error_msg: Option<String>,
}

impl From<&SensorChannel> for PrtgChannel {
    fn from(c: &SensorChannel) -> Self {
        let flag = |on: bool| on.then_some("1");
        let shown = if c.visible { "1" } else { "0" };
        let limits = c.limits.clone().unwrap_or_default();
        let number = |v: Option<f64>| v.map(|n| n.to_string());

        Self {
            channel: c.name.clone(),
            value: c.value.to_string(),
            unit: c.unit.map(Unit::as_str),
            custom_unit: c.custom_unit.clone(),
            volume_size: c.volume_size.map(VolumeSize::as_str),
            float: flag(c.value.is_float()),
            decimal_mode: flag(c.decimal_mode),
            show_chart: shown,
            show_table: shown,
            value_lookup: c.value_lookup.clone(),
            limit_mode: flag(limits.has_thresholds()),
            limit_min_warning: number(limits.min_warn),
            limit_max_warning: number(limits.max_warn),
            limit_min_error: number(limits.min_err),
            limit_max_error: number(limits.max_err),
            limit_warning_msg: limits.warn_msg,
            limit_error_msg: limits.err_msg,
        }
    }
}
