use crate::auth::Credential;
use crate::encoder::{LINE_SEPARATOR, VALUE_SEPARATOR};
use crate::error::{PinCfgError, Result};
use crate::model::{
    Configuration, GlobalKey, GlobalSetting, Input, MeasurementParams, MeasurementSource,
    SensorReporter, Switch, SwitchKind, Trigger, TriggerAction,
};
use crate::transport::{PayloadKind, COMMAND_PREFIX, CONFIG_PREFIX, ENVELOPE_CLOSE, ENVELOPE_OPEN};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

lazy_static! {
    static ref AUTH_RE: Regex =
        Regex::new(r"^(?:(PWD|AUTH):([^/]+)|([a-fA-F0-9]{64}))/").expect("valid auth pattern");
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail on the first record that would otherwise be skipped
    pub strict: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub config: Configuration,
    /// Password material found in front of the payload, if any
    pub credential: Option<Credential>,
    pub kind: Option<PayloadKind>,
    /// Records that were not understood, as they appeared
    pub skipped: Vec<String>,
}

/// Wire text with the envelope and auth segment taken off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped<'a> {
    pub credential: Option<Credential>,
    pub kind: Option<PayloadKind>,
    pub body: &'a str,
}

pub fn unwrap_envelope(text: &str) -> Unwrapped<'_> {
    let mut body = text.trim();
    body = body.strip_prefix(ENVELOPE_OPEN).unwrap_or(body);
    body = body.strip_suffix(ENVELOPE_CLOSE).unwrap_or(body);
    body = body.trim_start();

    let mut credential = None;
    if let Some(caps) = AUTH_RE.captures(body) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        credential = Some(Credential::from_value(value));
        body = &body[caps.get(0).map_or(0, |m| m.end())..];
    }

    let mut kind = None;
    if let Some(rest) = body.strip_prefix(CONFIG_PREFIX) {
        kind = Some(PayloadKind::Config);
        body = rest;
    } else if let Some(rest) = body.strip_prefix(COMMAND_PREFIX) {
        kind = Some(PayloadKind::Command);
        body = rest;
    }

    Unwrapped {
        credential,
        kind,
        body,
    }
}

/// Splits a payload into records: newlines and `/` both end a record,
/// blank lines and `#` comment lines are dropped.
pub fn split_records(body: &str) -> Vec<&str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(LINE_SEPARATOR))
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .collect()
}

pub fn split_fields(record: &str) -> Vec<&str> {
    record.split(VALUE_SEPARATOR).map(str::trim).collect()
}

/// Lenient decode: anything not understood is skipped.
pub fn decode(text: &str) -> Decoded {
    decode_with(text, DecodeOptions::default()).unwrap_or_default()
}

pub fn decode_with(text: &str, options: DecodeOptions) -> Result<Decoded> {
    let unwrapped = unwrap_envelope(text);
    let mut decoded = Decoded {
        credential: unwrapped.credential,
        kind: unwrapped.kind,
        ..Decoded::default()
    };

    for (index, record) in split_records(unwrapped.body).into_iter().enumerate() {
        let fields = split_fields(record);
        let outcome = apply_record(&mut decoded.config, &fields);
        if outcome == Outcome::Applied {
            continue;
        }
        if options.strict {
            return Err(PinCfgError::Decode(format!(
                "Line {}: malformed record \"{}\"",
                index + 1,
                record
            )));
        }
        match outcome {
            Outcome::Partial => warn!("Dropped incomplete tail of record: {}", record),
            _ => warn!("Skipping malformed record: {}", record),
        }
        decoded.skipped.push(record.to_string());
    }

    debug!(
        "Decoded {} switches, {} inputs, {} triggers, {} measurement sources, {} sensor reporters",
        decoded.config.switches.len(),
        decoded.config.inputs.len(),
        decoded.config.triggers.len(),
        decoded.config.measurement_sources.len(),
        decoded.config.sensor_reporters.len()
    );
    Ok(decoded)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    /// Complete groups were applied; a trailing incomplete group was dropped
    Partial,
    Skipped,
}

impl From<bool> for Outcome {
    fn from(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::Skipped
        }
    }
}

/// Outcome for a strided record: `groups` complete groups, `rest` leftovers.
fn grouped(groups: usize, rest: usize) -> Outcome {
    match (groups, rest) {
        (0, _) => Outcome::Skipped,
        (_, 0) => Outcome::Applied,
        _ => Outcome::Partial,
    }
}

fn apply_record(config: &mut Configuration, fields: &[&str]) -> Outcome {
    let tag = fields[0];
    if let Some(key) = GlobalKey::from_tag(tag) {
        if fields.len() != 2 {
            return Outcome::Skipped;
        }
        *config.global.get_mut(key) = GlobalSetting {
            value: fields[1].to_string(),
            enabled: true,
        };
        return Outcome::Applied;
    }
    if let Some(kind) = SwitchKind::from_tag(tag) {
        return decode_switches(config, kind, &fields[1..]);
    }
    match tag {
        "I" => decode_inputs(config, &fields[1..]),
        "T" => decode_trigger(config, fields),
        "MS" => decode_measurement_source(config, fields).into(),
        "SR" => decode_sensor_reporter(config, fields).into(),
        _ => Outcome::Skipped,
    }
}

fn decode_switches(config: &mut Configuration, kind: SwitchKind, values: &[&str]) -> Outcome {
    let stride = kind.stride();
    let groups = values.chunks_exact(stride);
    let outcome = grouped(groups.len(), groups.remainder().len());
    for group in groups {
        let mut sw = Switch::new(kind, group[0], group[1]);
        let mut rest = group[2..].iter();
        if kind.is_timed() {
            sw.duration = rest.next().map(|d| d.to_string());
        }
        if kind.has_feedback() {
            sw.feedback_pin = rest.next().map(|f| f.to_string());
        }
        config.switches.push(sw);
    }
    outcome
}

fn decode_inputs(config: &mut Configuration, values: &[&str]) -> Outcome {
    let pairs = values.chunks_exact(2);
    let outcome = grouped(pairs.len(), pairs.remainder().len());
    config
        .inputs
        .extend(pairs.map(|pair| Input::new(pair[0], pair[1])));
    outcome
}

fn decode_trigger(config: &mut Configuration, fields: &[&str]) -> Outcome {
    if fields.len() < 6 {
        return Outcome::Skipped;
    }
    let pairs = fields[5..].chunks_exact(2);
    let outcome = if pairs.remainder().is_empty() {
        Outcome::Applied
    } else {
        Outcome::Partial
    };
    let mut trigger = Trigger::new(fields[1]);
    trigger.source = fields[2].to_string();
    trigger.event_type = fields[3].into();
    trigger.event_count = fields[4].to_string();
    trigger.actions = pairs
        .map(|pair| TriggerAction {
            switch_name: pair[0].to_string(),
            action: pair[1].into(),
        })
        .collect();
    config.triggers.push(trigger);
    outcome
}

fn decode_measurement_source(config: &mut Configuration, fields: &[&str]) -> bool {
    if fields.len() < 3 {
        return false;
    }
    let code = fields[1];
    let field = |index: usize, default: &str| -> String {
        match fields.get(index) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    };
    let params = match MeasurementParams::defaults_for(code) {
        MeasurementParams::Analog { .. } => MeasurementParams::Analog { pin: field(3, "") },
        MeasurementParams::I2c { .. } => MeasurementParams::I2c {
            address: field(3, ""),
            register: field(4, ""),
            data_size: field(5, "2"),
            cache_ms: field(6, ""),
            cmd2: field(7, ""),
            cmd3: field(8, ""),
        },
        MeasurementParams::Spi { .. } => MeasurementParams::Spi {
            chip_select: field(3, ""),
            command: field(4, ""),
            data_size: field(5, "2"),
            delay_ms: field(6, "0"),
        },
        MeasurementParams::Other { code, .. } => MeasurementParams::Other {
            code,
            fields: fields[3..].iter().map(|f| f.to_string()).collect(),
        },
        fixed => fixed,
    };
    config
        .measurement_sources
        .push(MeasurementSource::new(fields[2], params));
    true
}

fn decode_sensor_reporter(config: &mut Configuration, fields: &[&str]) -> bool {
    if fields.len() < 9 {
        return false;
    }
    let field = |index: usize, default: &str| -> String {
        match fields.get(index) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    };
    let flag = |index: usize| matches!(fields[index], "1" | "true");
    let sr = SensorReporter {
        name: fields[1].to_string(),
        measurement_name: fields[2].to_string(),
        v_type: fields[3].to_string(),
        s_type: fields[4].to_string(),
        enableable: flag(5),
        cumulative: flag(6),
        sampling_interval: fields[7].to_string(),
        reporting_interval: fields[8].to_string(),
        scale: field(9, "1.0"),
        offset: field(10, "0.0"),
        precision: field(11, "0"),
        unit: field(12, ""),
        byte_offset: field(13, "0"),
        byte_count: field(14, "0"),
        bit_shift: field(15, "0"),
        bit_mask: field(16, ""),
        endianness: field(17, "0"),
        ..SensorReporter::default()
    };
    config.sensor_reporters.push(sr);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, SwitchAction};

    #[test]
    fn test_unwrap_envelope_forms() {
        let hash = "a".repeat(64);
        let framed = format!("#[{}/CFG:CD,330/]#", hash);
        let unwrapped = unwrap_envelope(&framed);
        assert_eq!(unwrapped.credential, Some(Credential::Hash(hash.clone())));
        assert_eq!(unwrapped.kind, Some(PayloadKind::Config));
        assert_eq!(unwrapped.body, "CD,330/");

        let pwd = format!("PWD:{}/CD,330/", hash.to_uppercase());
        assert_eq!(unwrap_envelope(&pwd).credential, Some(Credential::Hash(hash)));

        let plain = unwrap_envelope("CD,330/");
        assert_eq!(plain.credential, None);
        assert_eq!(plain.kind, None);
        assert_eq!(plain.body, "CD,330/");
    }

    #[test]
    fn test_legacy_auth_is_plaintext() {
        let decoded = decode("AUTH:mypassword/CD,330/");
        assert_eq!(decoded.credential, Some(Credential::Legacy("mypassword".into())));
        assert!(decoded.config.auth_password_hash.is_empty());
        assert!(decoded.config.global.debounce.enabled);
    }

    #[test]
    fn test_split_records_both_forms() {
        assert_eq!(split_records("CD,330/I,i01,3/"), ["CD,330", "I,i01,3"]);
        assert_eq!(
            split_records("# comment\nCD,330/\n\n  I,i01,3/  \n"),
            ["CD,330", "I,i01,3"]
        );
    }

    #[test]
    fn test_decode_switch_strides() {
        let decoded = decode("S,o01,5,o02,6/STF,o03,7,2000,8/SF,o04,9,10/");
        let switches = &decoded.config.switches;
        assert_eq!(switches.len(), 4);
        assert_eq!(switches[1].name, "o02");
        assert_eq!(switches[2].duration.as_deref(), Some("2000"));
        assert_eq!(switches[2].feedback_pin.as_deref(), Some("8"));
        assert_eq!(switches[3].feedback_pin.as_deref(), Some("10"));
        assert!(switches[3].duration.is_none());
    }

    #[test]
    fn test_decode_trigger() {
        let decoded = decode("T,t01,i01,3,2,o01,0,o02,1/");
        let trigger = &decoded.config.triggers[0];
        assert_eq!(trigger.source, "i01");
        assert_eq!(trigger.event_type, EventType::Multiclick);
        assert_eq!(trigger.event_count, "2");
        assert_eq!(trigger.actions.len(), 2);
        assert_eq!(trigger.actions[1].action, SwitchAction::On);
    }

    #[test]
    fn test_decode_measurement_sources() {
        let decoded = decode("MS,1,adc,14/MS,3,tmp,0x48,0x00/MS,4,spi,10,,4/MS,5,loop/MS,9,x,a,b/");
        let sources = &decoded.config.measurement_sources;
        assert_eq!(sources[0].params, MeasurementParams::Analog { pin: "14".into() });
        assert_eq!(
            sources[1].params,
            MeasurementParams::I2c {
                address: "0x48".into(),
                register: "0x00".into(),
                data_size: "2".into(),
                cache_ms: String::new(),
                cmd2: String::new(),
                cmd3: String::new(),
            }
        );
        assert_eq!(
            sources[2].params,
            MeasurementParams::Spi {
                chip_select: "10".into(),
                command: String::new(),
                data_size: "4".into(),
                delay_ms: "0".into(),
            }
        );
        assert!(sources[3].is_loop_time());
        assert_eq!(
            sources[4].params,
            MeasurementParams::Other { code: "9".into(), fields: vec!["a".into(), "b".into()] }
        );
    }

    #[test]
    fn test_decode_sensor_defaults() {
        let decoded = decode("SR,temp,ms1,0,6,1,true,1000,60,0.0625/");
        let sr = &decoded.config.sensor_reporters[0];
        assert!(sr.enableable);
        assert!(sr.cumulative);
        assert_eq!(sr.scale, "0.0625");
        assert_eq!(sr.offset, "0.0");
        assert_eq!(sr.byte_count, "0");
        assert_eq!(sr.bit_mask, "");
    }

    #[test]
    fn test_malformed_records_skipped() {
        let decoded = decode("CD,330,1/S,o01/XX,1/T,t01,i01/SR,a,b/I,i01,3/");
        assert_eq!(decoded.skipped.len(), 5);
        assert_eq!(decoded.config.inputs.len(), 1);
        assert!(!decoded.config.global.debounce.enabled);
    }

    #[test]
    fn test_incomplete_groups_keep_complete_ones() {
        let decoded = decode("S,o01,5,o02/SF,o03,5/ST,o04,5/I,i01,3,i02/");
        let names: Vec<&str> = decoded.config.switches.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["o01"]);
        assert_eq!(decoded.config.inputs.len(), 1);
        assert_eq!(decoded.skipped, ["S,o01,5,o02", "SF,o03,5", "ST,o04,5", "I,i01,3,i02"]);

        let err = decode_with("S,o01,5,o02/", DecodeOptions { strict: true }).unwrap_err();
        assert!(err.to_string().contains("Line 1: malformed record \"S,o01,5,o02\""));
    }

    #[test]
    fn test_unpaired_trigger_switch() {
        let decoded = decode("T,t01,i01,0,1,o01,0,o02/");
        assert_eq!(decoded.config.triggers[0].actions.len(), 1);
        assert_eq!(decoded.skipped, ["T,t01,i01,0,1,o01,0,o02"]);

        let strict = DecodeOptions { strict: true };
        assert!(decode_with("T,t01,i01,0,1,o01/", strict).is_err());
        assert!(decode_with("T,t01,i01,0,1,o01,0/", strict).is_ok());
    }

    #[test]
    fn test_strict_mode_reports() {
        let options = DecodeOptions { strict: true };
        let err = decode_with("I,i01,3/XX,1/", options).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
        assert!(decode_with("I,i01,3/", options).is_ok());
    }
}
