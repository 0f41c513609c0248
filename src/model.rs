use crate::error::{PinCfgError, Result};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_TIMED_DURATION_MS: &str = "5000";
pub const DEFAULT_SAMPLING_MS: &str = "1000";
pub const DEFAULT_REPORTING_SEC: &str = "300";

/// Entity ids from older snapshots may be numbers or arbitrary strings;
/// anything that is not a UUID gets a fresh one.
fn stored_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Uuid, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StoredId {
        Text(String),
        Other(IgnoredAny),
    }

    Ok(match StoredId::deserialize(deserializer)? {
        StoredId::Text(text) => Uuid::parse_str(&text).unwrap_or_else(|_| Uuid::new_v4()),
        StoredId::Other(_) => Uuid::new_v4(),
    })
}

/// The five global settings, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalKey {
    Debounce,
    Multiclick,
    RelayImpulse,
    Feedback,
    Announcement,
}

impl GlobalKey {
    pub const ALL: [GlobalKey; 5] = [
        GlobalKey::Debounce,
        GlobalKey::Multiclick,
        GlobalKey::RelayImpulse,
        GlobalKey::Feedback,
        GlobalKey::Announcement,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            GlobalKey::Debounce => "CD",
            GlobalKey::Multiclick => "CM",
            GlobalKey::RelayImpulse => "CR",
            GlobalKey::Feedback => "CN",
            GlobalKey::Announcement => "CA",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub fn default_value(self) -> &'static str {
        match self {
            GlobalKey::Debounce => "330",
            GlobalKey::Multiclick => "620",
            GlobalKey::RelayImpulse => "150",
            GlobalKey::Feedback => "1000",
            GlobalKey::Announcement => "1966080",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredSetting")]
pub struct GlobalSetting {
    pub value: String,
    pub enabled: bool,
}

/// Older snapshots stored a bare value string per setting.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSetting {
    Full { value: String, #[serde(default)] enabled: bool },
    Legacy(String),
}

impl From<StoredSetting> for GlobalSetting {
    fn from(stored: StoredSetting) -> Self {
        match stored {
            StoredSetting::Full { value, enabled } => GlobalSetting { value, enabled },
            StoredSetting::Legacy(value) => GlobalSetting { value, enabled: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    #[serde(rename = "CD")]
    pub debounce: GlobalSetting,
    #[serde(rename = "CM")]
    pub multiclick: GlobalSetting,
    #[serde(rename = "CR")]
    pub relay_impulse: GlobalSetting,
    #[serde(rename = "CN")]
    pub feedback: GlobalSetting,
    #[serde(rename = "CA")]
    pub announcement: GlobalSetting,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let setting = |key: GlobalKey| GlobalSetting {
            value: key.default_value().to_string(),
            enabled: false,
        };
        Self {
            debounce: setting(GlobalKey::Debounce),
            multiclick: setting(GlobalKey::Multiclick),
            relay_impulse: setting(GlobalKey::RelayImpulse),
            feedback: setting(GlobalKey::Feedback),
            announcement: setting(GlobalKey::Announcement),
        }
    }
}

impl GlobalConfig {
    pub fn get(&self, key: GlobalKey) -> &GlobalSetting {
        match key {
            GlobalKey::Debounce => &self.debounce,
            GlobalKey::Multiclick => &self.multiclick,
            GlobalKey::RelayImpulse => &self.relay_impulse,
            GlobalKey::Feedback => &self.feedback,
            GlobalKey::Announcement => &self.announcement,
        }
    }

    pub fn get_mut(&mut self, key: GlobalKey) -> &mut GlobalSetting {
        match key {
            GlobalKey::Debounce => &mut self.debounce,
            GlobalKey::Multiclick => &mut self.multiclick,
            GlobalKey::RelayImpulse => &mut self.relay_impulse,
            GlobalKey::Feedback => &mut self.feedback,
            GlobalKey::Announcement => &mut self.announcement,
        }
    }

    /// Legacy snapshots may carry empty values; restore the key defaults.
    pub fn fill_empty_defaults(&mut self) {
        for key in GlobalKey::ALL {
            let setting = self.get_mut(key);
            if setting.value.is_empty() {
                setting.value = key.default_value().to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchKind {
    #[serde(rename = "S")]
    Plain,
    #[serde(rename = "SF")]
    Feedback,
    #[serde(rename = "SI")]
    Impulse,
    #[serde(rename = "SIF")]
    ImpulseFeedback,
    #[serde(rename = "ST")]
    Timed,
    #[serde(rename = "STF")]
    TimedFeedback,
}

impl SwitchKind {
    pub const ALL: [SwitchKind; 6] = [
        SwitchKind::Plain,
        SwitchKind::Feedback,
        SwitchKind::Impulse,
        SwitchKind::ImpulseFeedback,
        SwitchKind::Timed,
        SwitchKind::TimedFeedback,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            SwitchKind::Plain => "S",
            SwitchKind::Feedback => "SF",
            SwitchKind::Impulse => "SI",
            SwitchKind::ImpulseFeedback => "SIF",
            SwitchKind::Timed => "ST",
            SwitchKind::TimedFeedback => "STF",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub fn has_feedback(self) -> bool {
        matches!(
            self,
            SwitchKind::Feedback | SwitchKind::ImpulseFeedback | SwitchKind::TimedFeedback
        )
    }

    pub fn is_timed(self) -> bool {
        matches!(self, SwitchKind::Timed | SwitchKind::TimedFeedback)
    }

    /// Number of wire fields one switch of this kind occupies.
    pub fn stride(self) -> usize {
        2 + usize::from(self.has_feedback()) + usize::from(self.is_timed())
    }
}

impl fmt::Display for SwitchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Switch {
    #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SwitchKind,
    pub name: String,
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_pin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Switch {
    /// New switch with the optional slots its kind requires.
    pub fn new(kind: SwitchKind, name: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            pin: pin.into(),
            feedback_pin: kind.has_feedback().then(String::new),
            duration: kind.is_timed().then(|| DEFAULT_TIMED_DURATION_MS.to_string()),
        }
    }

    pub fn set_feedback_pin(&mut self, pin: impl Into<String>) -> Result<()> {
        if !self.kind.has_feedback() {
            return Err(PinCfgError::Model(format!(
                "Switch type {} has no feedback pin",
                self.kind
            )));
        }
        self.feedback_pin = Some(pin.into());
        Ok(())
    }

    pub fn set_duration(&mut self, duration: impl Into<String>) -> Result<()> {
        if !self.kind.is_timed() {
            return Err(PinCfgError::Model(format!(
                "Switch type {} has no duration",
                self.kind
            )));
        }
        self.duration = Some(duration.into());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
    pub id: Uuid,
    pub name: String,
    pub pin: String,
}

impl Input {
    pub fn new(name: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pin: pin.into(),
        }
    }
}

/// Declares a wire-coded enum that keeps unknown codes verbatim.
macro_rules! wire_code_enum {
    ($name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn code(&self) -> &str {
                match self {
                    $($name::$variant => $code,)+
                    $name::Other(code) => code,
                }
            }
        }

        impl From<String> for $name {
            fn from(code: String) -> Self {
                match code.as_str() {
                    $($code => $name::$variant,)+
                    _ => $name::Other(code),
                }
            }
        }

        impl From<&str> for $name {
            fn from(code: &str) -> Self {
                $name::from(code.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.code().to_string()
            }
        }
    };
}

wire_code_enum!(EventType {
    Down = "0",
    Up = "1",
    Longpress = "2",
    Multiclick = "3",
    All = "4",
});

wire_code_enum!(SwitchAction {
    Toggle = "0",
    On = "1",
    Off = "2",
    Forward = "3",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAction {
    pub switch_name: String,
    pub action: SwitchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
    pub id: Uuid,
    pub name: String,
    /// Name of the input (event source) this trigger listens to
    #[serde(alias = "inputName", alias = "eventSource")]
    pub source: String,
    pub event_type: EventType,
    #[serde(alias = "eventData")]
    pub event_count: String,
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
}

impl Trigger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: String::new(),
            event_type: EventType::Up,
            event_count: "1".to_string(),
            actions: Vec::new(),
        }
    }

    pub fn add_action(&mut self, action: TriggerAction, max_actions: usize) -> Result<()> {
        if self.actions.len() >= max_actions {
            return Err(PinCfgError::Model(format!(
                "Trigger {} already has the maximum of {} actions",
                self.name, max_actions
            )));
        }
        self.actions.push(action);
        Ok(())
    }
}

/// Type-specific acquisition parameters of a measurement source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementParams {
    CpuTemp,
    Analog {
        pin: String,
    },
    I2c {
        address: String,
        register: String,
        data_size: String,
        #[serde(default)]
        cache_ms: String,
        #[serde(default)]
        cmd2: String,
        #[serde(default)]
        cmd3: String,
    },
    Spi {
        chip_select: String,
        #[serde(default)]
        command: String,
        data_size: String,
        delay_ms: String,
    },
    LoopTime,
    /// A type code this tool does not know; its fields are kept as given.
    Other {
        code: String,
        fields: Vec<String>,
    },
}

impl MeasurementParams {
    pub fn code(&self) -> &str {
        match self {
            MeasurementParams::CpuTemp => "0",
            MeasurementParams::Analog { .. } => "1",
            MeasurementParams::I2c { .. } => "3",
            MeasurementParams::Spi { .. } => "4",
            MeasurementParams::LoopTime => "5",
            MeasurementParams::Other { code, .. } => code,
        }
    }

    /// Fresh parameters for a type code, as a newly added source gets them.
    pub fn defaults_for(code: &str) -> Self {
        match code {
            "0" => MeasurementParams::CpuTemp,
            "1" => MeasurementParams::Analog { pin: String::new() },
            "3" => MeasurementParams::I2c {
                address: String::new(),
                register: String::new(),
                data_size: "2".to_string(),
                cache_ms: String::new(),
                cmd2: String::new(),
                cmd3: String::new(),
            },
            "4" => MeasurementParams::Spi {
                chip_select: String::new(),
                command: String::new(),
                data_size: "2".to_string(),
                delay_ms: "0".to_string(),
            },
            "5" => MeasurementParams::LoopTime,
            other => MeasurementParams::Other {
                code: other.to_string(),
                fields: Vec::new(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementParams::CpuTemp => "CPU Temperature",
            MeasurementParams::Analog { .. } => "Analog",
            MeasurementParams::I2c { .. } => "I2C",
            MeasurementParams::Spi { .. } => "SPI",
            MeasurementParams::LoopTime => "Loop Time",
            MeasurementParams::Other { .. } => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredSource")]
pub struct MeasurementSource {
    pub id: Uuid,
    pub name: String,
    pub params: MeasurementParams,
}

/// Older snapshots keep every parameter flat on the source, keyed by type.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSource {
    Tagged {
        #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
        id: Uuid,
        name: String,
        params: MeasurementParams,
    },
    Flat(FlatSource),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatSource {
    #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
    id: Uuid,
    #[serde(rename = "type")]
    code: String,
    name: String,
    #[serde(default)]
    pin: Option<String>,
    #[serde(default)]
    i2c_addr: Option<String>,
    #[serde(default)]
    register: Option<String>,
    #[serde(default)]
    data_size: Option<String>,
    #[serde(default)]
    cache: Option<String>,
    #[serde(default)]
    cmd2: Option<String>,
    #[serde(default)]
    cmd3: Option<String>,
    #[serde(default)]
    spi_cs: Option<String>,
    #[serde(default)]
    spi_cmd: Option<String>,
    #[serde(default)]
    spi_data_size: Option<String>,
    #[serde(default)]
    spi_delay: Option<String>,
}

impl From<StoredSource> for MeasurementSource {
    fn from(stored: StoredSource) -> Self {
        let flat = match stored {
            StoredSource::Tagged { id, name, params } => {
                return MeasurementSource { id, name, params };
            }
            StoredSource::Flat(flat) => flat,
        };
        let or_default = |value: Option<String>, default: &str| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let params = match MeasurementParams::defaults_for(&flat.code) {
            MeasurementParams::Analog { .. } => MeasurementParams::Analog {
                pin: flat.pin.unwrap_or_default(),
            },
            MeasurementParams::I2c { .. } => MeasurementParams::I2c {
                address: flat.i2c_addr.unwrap_or_default(),
                register: flat.register.unwrap_or_default(),
                data_size: or_default(flat.data_size, "2"),
                cache_ms: flat.cache.unwrap_or_default(),
                cmd2: flat.cmd2.unwrap_or_default(),
                cmd3: flat.cmd3.unwrap_or_default(),
            },
            MeasurementParams::Spi { .. } => MeasurementParams::Spi {
                chip_select: flat.spi_cs.unwrap_or_default(),
                command: flat.spi_cmd.unwrap_or_default(),
                data_size: or_default(flat.spi_data_size, "2"),
                delay_ms: or_default(flat.spi_delay, "0"),
            },
            fixed => fixed,
        };
        MeasurementSource {
            id: flat.id,
            name: flat.name,
            params,
        }
    }
}

impl MeasurementSource {
    pub fn new(name: impl Into<String>, params: MeasurementParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            params,
        }
    }

    pub fn is_loop_time(&self) -> bool {
        matches!(self.params, MeasurementParams::LoopTime)
    }
}

/// Common MySensors V_TYPE to S_TYPE pairings.
const VALUE_TO_SENSOR_TYPE: [(&str, &str); 10] = [
    ("0", "6"),   // V_TEMP -> S_TEMP
    ("1", "7"),   // V_HUM -> S_HUM
    ("2", "3"),   // V_STATUS -> S_BINARY
    ("3", "0"),   // V_PERCENTAGE -> S_DOOR
    ("4", "8"),   // V_PRESSURE -> S_BARO
    ("16", "1"),  // V_TRIPPED -> S_MOTION
    ("23", "16"), // V_LIGHT_LEVEL -> S_LIGHT_LEVEL
    ("37", "30"), // V_LEVEL -> S_MULTIMETER
    ("38", "30"), // V_VOLTAGE -> S_MULTIMETER
    ("39", "30"), // V_CURRENT -> S_MULTIMETER
];

pub fn sensor_type_for(value_type: &str) -> Option<&'static str> {
    VALUE_TO_SENSOR_TYPE
        .iter()
        .find(|(v, _)| *v == value_type)
        .map(|(_, s)| *s)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorReporter {
    #[serde(default = "Uuid::new_v4", deserialize_with = "stored_id")]
    pub id: Uuid,
    pub name: String,
    pub measurement_name: String,
    pub v_type: String,
    pub s_type: String,
    pub enableable: bool,
    pub cumulative: bool,
    pub sampling_interval: String,
    pub reporting_interval: String,
    pub scale: String,
    pub offset: String,
    pub precision: String,
    pub unit: String,
    pub byte_offset: String,
    pub byte_count: String,
    pub bit_shift: String,
    pub bit_mask: String,
    pub endianness: String,
}

impl Default for SensorReporter {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            measurement_name: String::new(),
            v_type: "6".to_string(),
            s_type: "6".to_string(),
            enableable: false,
            cumulative: false,
            sampling_interval: DEFAULT_SAMPLING_MS.to_string(),
            reporting_interval: DEFAULT_REPORTING_SEC.to_string(),
            scale: "1.0".to_string(),
            offset: "0.0".to_string(),
            precision: "0".to_string(),
            unit: String::new(),
            byte_offset: "0".to_string(),
            byte_count: "0".to_string(),
            bit_shift: "0".to_string(),
            bit_mask: String::new(),
            endianness: "0".to_string(),
        }
    }
}

impl SensorReporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the value type and pairs the sensor type when a pairing is known.
    pub fn set_value_type(&mut self, value_type: impl Into<String>) {
        self.v_type = value_type.into();
        if let Some(s_type) = sensor_type_for(&self.v_type) {
            self.s_type = s_type.to_string();
        }
    }
}

/// The whole editable configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Plaintext password, kept in memory for display only
    #[serde(skip_serializing)]
    pub auth_password: String,
    pub auth_password_hash: String,
    pub global: GlobalConfig,
    pub switches: Vec<Switch>,
    pub inputs: Vec<Input>,
    pub triggers: Vec<Trigger>,
    pub measurement_sources: Vec<MeasurementSource>,
    pub sensor_reporters: Vec<SensorReporter>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every collection; globals and credentials are kept.
    pub fn clear(&mut self) {
        self.switches.clear();
        self.inputs.clear();
        self.triggers.clear();
        self.measurement_sources.clear();
        self.sensor_reporters.clear();
    }

    pub fn add_switch(&mut self, kind: SwitchKind) -> &mut Switch {
        let name = format!("o{:02}", self.switches.len() + 1);
        self.switches.push(Switch::new(kind, name, ""));
        let last = self.switches.len() - 1;
        &mut self.switches[last]
    }

    pub fn add_input(&mut self) -> &mut Input {
        let name = format!("i{:02}", self.inputs.len() + 1);
        self.inputs.push(Input::new(name, ""));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    pub fn add_trigger(&mut self) -> &mut Trigger {
        let name = format!("t{:02}", self.triggers.len() + 1);
        self.triggers.push(Trigger::new(name));
        let last = self.triggers.len() - 1;
        &mut self.triggers[last]
    }

    pub fn add_measurement_source(&mut self, params: MeasurementParams) -> &mut MeasurementSource {
        let name = format!("ms{}", self.measurement_sources.len() + 1);
        self.measurement_sources
            .push(MeasurementSource::new(name, params));
        let last = self.measurement_sources.len() - 1;
        &mut self.measurement_sources[last]
    }

    pub fn add_sensor_reporter(&mut self) -> &mut SensorReporter {
        let name = format!("sensor{}", self.sensor_reporters.len() + 1);
        self.sensor_reporters.push(SensorReporter::new(name));
        let last = self.sensor_reporters.len() - 1;
        &mut self.sensor_reporters[last]
    }

    pub fn remove_switch(&mut self, id: Uuid) -> bool {
        remove_by(&mut self.switches, |s| s.id == id)
    }

    pub fn remove_input(&mut self, id: Uuid) -> bool {
        remove_by(&mut self.inputs, |i| i.id == id)
    }

    pub fn remove_trigger(&mut self, id: Uuid) -> bool {
        remove_by(&mut self.triggers, |t| t.id == id)
    }

    pub fn remove_measurement_source(&mut self, id: Uuid) -> bool {
        remove_by(&mut self.measurement_sources, |m| m.id == id)
    }

    pub fn remove_sensor_reporter(&mut self, id: Uuid) -> bool {
        remove_by(&mut self.sensor_reporters, |r| r.id == id)
    }

    pub fn switch_mut(&mut self, id: Uuid) -> Option<&mut Switch> {
        self.switches.iter_mut().find(|s| s.id == id)
    }

    pub fn input_mut(&mut self, id: Uuid) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.id == id)
    }

    pub fn trigger_mut(&mut self, id: Uuid) -> Option<&mut Trigger> {
        self.triggers.iter_mut().find(|t| t.id == id)
    }

    pub fn measurement_source_mut(&mut self, id: Uuid) -> Option<&mut MeasurementSource> {
        self.measurement_sources.iter_mut().find(|m| m.id == id)
    }

    pub fn sensor_reporter_mut(&mut self, id: Uuid) -> Option<&mut SensorReporter> {
        self.sensor_reporters.iter_mut().find(|r| r.id == id)
    }

    pub fn measurement_source_named(&self, name: &str) -> Option<&MeasurementSource> {
        self.measurement_sources.iter().find(|m| m.name == name)
    }

    /// Points a reporter at a measurement source. Loop time sources force
    /// cumulative reporting.
    pub fn bind_reporter_source(&mut self, reporter_id: Uuid, source_name: &str) -> Result<()> {
        let loop_time = self
            .measurement_source_named(source_name)
            .is_some_and(MeasurementSource::is_loop_time);
        let reporter = self
            .sensor_reporter_mut(reporter_id)
            .ok_or_else(|| PinCfgError::Model(format!("No sensor reporter {reporter_id}")))?;
        reporter.measurement_name = source_name.to_string();
        if loop_time {
            reporter.cumulative = true;
        }
        Ok(())
    }

    /// Clearing cumulative resets sampling to `sampling_min`. Loop time
    /// reporters stay cumulative.
    pub fn set_reporter_cumulative(
        &mut self,
        reporter_id: Uuid,
        cumulative: bool,
        sampling_min: &str,
    ) -> Result<()> {
        let loop_time = self.reporter_uses_loop_time(reporter_id);
        let reporter = self
            .sensor_reporter_mut(reporter_id)
            .ok_or_else(|| PinCfgError::Model(format!("No sensor reporter {reporter_id}")))?;
        if loop_time {
            reporter.cumulative = true;
            return Ok(());
        }
        reporter.cumulative = cumulative;
        if !cumulative {
            reporter.sampling_interval = sampling_min.to_string();
        }
        Ok(())
    }

    pub fn set_reporter_sampling(&mut self, reporter_id: Uuid, sampling: &str) -> Result<()> {
        let editable = self
            .sensor_reporters
            .iter()
            .find(|r| r.id == reporter_id)
            .map(|r| self.sampling_editable(r))
            .ok_or_else(|| PinCfgError::Model(format!("No sensor reporter {reporter_id}")))?;
        if !editable {
            return Err(PinCfgError::Model(
                "Sampling interval is not editable for this reporter".to_string(),
            ));
        }
        if let Some(reporter) = self.sensor_reporter_mut(reporter_id) {
            reporter.sampling_interval = sampling.to_string();
        }
        Ok(())
    }

    /// Sampling applies to cumulative reporters only, and loop time sources
    /// are measured every loop.
    pub fn sampling_editable(&self, reporter: &SensorReporter) -> bool {
        let loop_time = self
            .measurement_source_named(&reporter.measurement_name)
            .is_some_and(MeasurementSource::is_loop_time);
        !loop_time && reporter.cumulative
    }

    fn reporter_uses_loop_time(&self, reporter_id: Uuid) -> bool {
        self.sensor_reporters
            .iter()
            .find(|r| r.id == reporter_id)
            .and_then(|r| self.measurement_source_named(&r.measurement_name))
            .is_some_and(MeasurementSource::is_loop_time)
    }
}

fn remove_by<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    match items.iter().position(pred) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_slots_follow_kind() {
        let plain = Switch::new(SwitchKind::Plain, "o01", "5");
        assert!(plain.feedback_pin.is_none());
        assert!(plain.duration.is_none());

        let timed_fb = Switch::new(SwitchKind::TimedFeedback, "o02", "6");
        assert_eq!(timed_fb.feedback_pin.as_deref(), Some(""));
        assert_eq!(timed_fb.duration.as_deref(), Some("5000"));
        assert_eq!(SwitchKind::TimedFeedback.stride(), 4);
        assert_eq!(SwitchKind::Impulse.stride(), 2);
    }

    #[test]
    fn test_switch_rejects_inapplicable_fields() {
        let mut sw = Switch::new(SwitchKind::Impulse, "o01", "5");
        assert!(sw.set_feedback_pin("7").is_err());
        assert!(sw.set_duration("100").is_err());
    }

    #[test]
    fn test_default_names_count_up() {
        let mut config = Configuration::new();
        config.add_switch(SwitchKind::Plain);
        let second = config.add_switch(SwitchKind::Feedback).name.clone();
        assert_eq!(second, "o02");
        assert_eq!(config.add_input().name, "i01");
        assert_eq!(config.add_trigger().name, "t01");
        assert_eq!(config.add_measurement_source(MeasurementParams::CpuTemp).name, "ms1");
        assert_eq!(config.add_sensor_reporter().name, "sensor1");
    }

    #[test]
    fn test_remove_does_not_cascade() {
        let mut config = Configuration::new();
        let input_id = config.add_input().id;
        let trigger = config.add_trigger();
        trigger.source = "i01".to_string();
        assert!(config.remove_input(input_id));
        assert!(!config.remove_input(input_id));
        assert_eq!(config.triggers[0].source, "i01");
    }

    #[test]
    fn test_trigger_action_bound() {
        let mut trigger = Trigger::new("t01");
        for _ in 0..2 {
            let action = TriggerAction { switch_name: "o01".into(), action: SwitchAction::Toggle };
            trigger.add_action(action, 2).unwrap();
        }
        let extra = TriggerAction { switch_name: "o01".into(), action: SwitchAction::On };
        assert!(trigger.add_action(extra, 2).is_err());
    }

    #[test]
    fn test_loop_time_forces_cumulative() {
        let mut config = Configuration::new();
        config.add_measurement_source(MeasurementParams::LoopTime);
        let id = config.add_sensor_reporter().id;
        config.bind_reporter_source(id, "ms1").unwrap();
        assert!(config.sensor_reporters[0].cumulative);
        config.set_reporter_cumulative(id, false, "100").unwrap();
        assert!(config.sensor_reporters[0].cumulative);
        assert!(!config.sampling_editable(&config.sensor_reporters[0]));
        assert!(config.set_reporter_sampling(id, "200").is_err());
    }

    #[test]
    fn test_uncumulative_resets_sampling() {
        let mut config = Configuration::new();
        config.add_measurement_source(MeasurementParams::CpuTemp);
        let id = config.add_sensor_reporter().id;
        config.bind_reporter_source(id, "ms1").unwrap();
        config.set_reporter_cumulative(id, true, "100").unwrap();
        config.set_reporter_sampling(id, "2500").unwrap();
        config.set_reporter_cumulative(id, false, "100").unwrap();
        assert_eq!(config.sensor_reporters[0].sampling_interval, "100");
    }

    #[test]
    fn test_value_type_pairs_sensor_type() {
        let mut sr = SensorReporter::new("sensor1");
        sr.set_value_type("38");
        assert_eq!(sr.s_type, "30");
        sr.set_value_type("99");
        assert_eq!(sr.v_type, "99");
        assert_eq!(sr.s_type, "30");
    }

    #[test]
    fn test_unknown_codes_are_kept() {
        assert_eq!(EventType::from("3"), EventType::Multiclick);
        assert_eq!(EventType::from("9").code(), "9");
        assert_eq!(SwitchAction::from("3"), SwitchAction::Forward);
    }

    #[test]
    fn test_legacy_global_setting() {
        let json = r#"{"CD": "250", "CM": {"value": "700", "enabled": true}}"#;
        let global: GlobalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(global.debounce, GlobalSetting { value: "250".into(), enabled: false });
        assert!(global.multiclick.enabled);
        assert_eq!(global.announcement.value, "1966080");
    }

    #[test]
    fn test_numeric_ids_get_fresh_uuids() {
        let json = r#"{"id": 1712345678901, "name": "i01", "pin": "3"}"#;
        let input: Input = serde_json::from_str(json).unwrap();
        assert_eq!(input.name, "i01");
        assert!(!input.id.is_nil());

        let json = r#"{"id": 1712345678901.42, "name": "t01", "eventSource": "i01",
            "eventType": "2", "eventCount": "3"}"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.source, "i01");
        assert_eq!(trigger.event_type, EventType::Longpress);
        assert_eq!(trigger.event_count, "3");

        let id = Uuid::new_v4();
        let json = format!(r#"{{"id": "{}", "name": "i01", "pin": "3"}}"#, id);
        assert_eq!(serde_json::from_str::<Input>(&json).unwrap().id, id);
    }

    #[test]
    fn test_flat_measurement_sources() {
        let json = r#"[
            {"id": 1, "type": "3", "name": "bme", "i2cAddr": "0x76", "register": "0xFA",
             "dataSize": "", "cache": "200", "cmd2": "", "cmd3": ""},
            {"id": 2, "type": "4", "name": "adc", "spiCs": "10", "spiCmd": "0x01"},
            {"id": 3, "type": "1", "name": "pot", "pin": "A0"},
            {"id": 4, "type": "7", "name": "aht"}
        ]"#;
        let sources: Vec<MeasurementSource> = serde_json::from_str(json).unwrap();
        assert_eq!(
            sources[0].params,
            MeasurementParams::I2c {
                address: "0x76".into(),
                register: "0xFA".into(),
                data_size: "2".into(),
                cache_ms: "200".into(),
                cmd2: String::new(),
                cmd3: String::new(),
            }
        );
        assert_eq!(
            sources[1].params,
            MeasurementParams::Spi {
                chip_select: "10".into(),
                command: "0x01".into(),
                data_size: "2".into(),
                delay_ms: "0".into(),
            }
        );
        assert_eq!(sources[2].params, MeasurementParams::Analog { pin: "A0".into() });
        assert_eq!(sources[3].params.code(), "7");
    }

    #[test]
    fn test_tagged_measurement_source_survives_json() {
        let source = MeasurementSource::new("cpu", MeasurementParams::CpuTemp);
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(serde_json::from_str::<MeasurementSource>(&json).unwrap(), source);
    }

    #[test]
    fn test_plain_password_not_serialized() {
        let mut config = Configuration::new();
        config.auth_password = "secret".to_string();
        config.auth_password_hash = "a".repeat(64);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("authPasswordHash"));
    }
}
