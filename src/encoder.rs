use crate::model::{
    Configuration, GlobalKey, MeasurementParams, MeasurementSource, SensorReporter, Switch,
    SwitchKind, Trigger,
};
use log::debug;

pub const LINE_SEPARATOR: char = '/';
pub const VALUE_SEPARATOR: char = ',';

/// Generated configuration, one record per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoded {
    lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeStatus {
    Ok,
    /// Above 90% of the maximum
    Warning,
    /// Above the maximum
    Error,
}

impl Encoded {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Newline-free text as the device receives it.
    pub fn canonical(&self) -> String {
        self.lines.concat()
    }

    /// One record per line, for display only.
    pub fn display(&self) -> String {
        self.lines.join("\n")
    }

    pub fn size(&self) -> usize {
        self.lines.iter().map(String::len).sum()
    }

    pub fn size_status(&self, max_size: usize) -> SizeStatus {
        size_status(self.size(), max_size)
    }
}

pub fn size_status(size: usize, max_size: usize) -> SizeStatus {
    if size > max_size {
        SizeStatus::Error
    } else if size * 10 > max_size * 9 {
        SizeStatus::Warning
    } else {
        SizeStatus::Ok
    }
}

/// Keeps values up to the last one that differs from its default.
///
/// Defaults before that point are kept so later fields stay at their
/// position; an all-default list yields nothing.
pub fn trim_trailing_defaults<'a>(fields: &[(&'a str, bool)]) -> Vec<&'a str> {
    match fields.iter().rposition(|(_, is_default)| !is_default) {
        Some(last) => fields[..=last].iter().map(|(value, _)| *value).collect(),
        None => Vec::new(),
    }
}

pub fn encode(config: &Configuration) -> Encoded {
    let mut lines = Vec::new();

    for key in GlobalKey::ALL {
        let setting = config.global.get(key);
        if setting.enabled && !setting.value.is_empty() {
            lines.push(record(&[key.tag(), &setting.value]));
        }
    }

    let mut kinds: Vec<SwitchKind> = Vec::new();
    for sw in &config.switches {
        if !kinds.contains(&sw.kind) {
            kinds.push(sw.kind);
        }
    }
    for kind in kinds {
        let mut parts = vec![kind.tag()];
        for sw in config.switches.iter().filter(|s| s.kind == kind) {
            push_switch(&mut parts, sw);
        }
        lines.push(record(&parts));
    }

    if !config.inputs.is_empty() {
        let mut parts = vec!["I"];
        for input in &config.inputs {
            parts.push(&input.name);
            parts.push(&input.pin);
        }
        lines.push(record(&parts));
    }

    lines.extend(config.triggers.iter().filter_map(encode_trigger));
    lines.extend(config.measurement_sources.iter().map(encode_measurement_source));
    lines.extend(config.sensor_reporters.iter().filter_map(encode_sensor_reporter));

    debug!("Encoded {} configuration lines", lines.len());
    Encoded { lines }
}

fn record(parts: &[&str]) -> String {
    let mut line = String::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            line.push(VALUE_SEPARATOR);
        }
        line.push_str(part);
    }
    line.push(LINE_SEPARATOR);
    line
}

// Duration precedes the feedback pin for timed switches with feedback.
fn push_switch<'a>(parts: &mut Vec<&'a str>, sw: &'a Switch) {
    parts.push(&sw.name);
    parts.push(&sw.pin);
    if sw.kind.is_timed() {
        parts.push(sw.duration.as_deref().unwrap_or_default());
    }
    if sw.kind.has_feedback() {
        parts.push(sw.feedback_pin.as_deref().unwrap_or_default());
    }
}

fn encode_trigger(trigger: &Trigger) -> Option<String> {
    if trigger.source.is_empty() || trigger.actions.is_empty() {
        return None;
    }
    let mut parts = vec![
        "T",
        trigger.name.as_str(),
        trigger.source.as_str(),
        trigger.event_type.code(),
        trigger.event_count.as_str(),
    ];
    for action in trigger.actions.iter().filter(|a| !a.switch_name.is_empty()) {
        parts.push(&action.switch_name);
        parts.push(action.action.code());
    }
    Some(record(&parts))
}

fn encode_measurement_source(ms: &MeasurementSource) -> String {
    let mut parts = vec!["MS", ms.params.code(), ms.name.as_str()];
    match &ms.params {
        MeasurementParams::CpuTemp | MeasurementParams::LoopTime => {}
        MeasurementParams::Analog { pin } => {
            if !pin.is_empty() {
                parts.push(pin);
            }
        }
        MeasurementParams::I2c { address, register, data_size, cache_ms, cmd2, cmd3 } => {
            let optional = [address, register, data_size, cache_ms, cmd2, cmd3]
                .map(|value| (value.as_str(), value.is_empty()));
            parts.extend(trim_trailing_defaults(&optional));
        }
        MeasurementParams::Spi { chip_select, command, data_size, delay_ms } => {
            let optional = [chip_select, command, data_size, delay_ms]
                .map(|value| (value.as_str(), value.is_empty()));
            parts.extend(trim_trailing_defaults(&optional));
        }
        MeasurementParams::Other { fields, .. } => {
            parts.extend(fields.iter().map(String::as_str));
        }
    }
    record(&parts)
}

fn encode_sensor_reporter(sr: &SensorReporter) -> Option<String> {
    if sr.measurement_name.is_empty() {
        return None;
    }
    let mut parts = vec![
        "SR",
        sr.name.as_str(),
        sr.measurement_name.as_str(),
        sr.v_type.as_str(),
        sr.s_type.as_str(),
        flag(sr.enableable),
        flag(sr.cumulative),
        sr.sampling_interval.as_str(),
        sr.reporting_interval.as_str(),
    ];
    let optional = [
        optional_field(&sr.scale, "1.0", &["1", "1.0"]),
        optional_field(&sr.offset, "0.0", &["0", "0.0"]),
        optional_field(&sr.precision, "0", &["0"]),
        optional_field(&sr.unit, "", &[""]),
        optional_field(&sr.byte_offset, "0", &["0"]),
        optional_field(&sr.byte_count, "0", &["0"]),
        optional_field(&sr.bit_shift, "0", &["0"]),
        optional_field(&sr.bit_mask, "", &[""]),
        optional_field(&sr.endianness, "0", &["0"]),
    ];
    parts.extend(trim_trailing_defaults(&optional));
    Some(record(&parts))
}

/// An empty value stands for the default; `defaults` lists its spellings.
fn optional_field<'a>(
    value: &'a str,
    fallback: &'static str,
    defaults: &[&str],
) -> (&'a str, bool) {
    let value = if value.is_empty() { fallback } else { value };
    (value, defaults.contains(&value))
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
