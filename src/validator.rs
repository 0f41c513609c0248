use crate::config::Limits;
use crate::decoder::{split_fields, split_records, unwrap_envelope};
use crate::model::SwitchKind;
use log::debug;
use std::collections::HashSet;

const MAX_DECIMALS: usize = 6;
const BYTE_OFFSET_MAX: f64 = 5.0;
const BYTE_COUNT_MAX: f64 = 6.0;

struct TriggerRef<'a> {
    line_ref: String,
    input_name: &'a str,
    switch_names: Vec<&'a str>,
}

struct ReporterRef<'a> {
    line_ref: String,
    source_name: &'a str,
}

/// Checks wire text for structural, range and cross-reference problems.
///
/// Always makes a full pass and returns every problem found, in order;
/// an empty list means the text is valid.
pub fn validate(text: &str, limits: &Limits) -> Vec<String> {
    let unwrapped = unwrap_envelope(text);
    let mut errors = Vec::new();

    let mut switches: HashSet<&str> = HashSet::new();
    let mut inputs: HashSet<&str> = HashSet::new();
    let mut sources: HashSet<&str> = HashSet::new();
    let mut triggers: Vec<TriggerRef> = Vec::new();
    let mut reporters: Vec<ReporterRef> = Vec::new();

    for (index, record) in split_records(unwrapped.body).into_iter().enumerate() {
        let parts = split_fields(record);
        let line_ref = format!("Line {}", index + 1);
        let tag = parts[0];

        if let Some(kind) = SwitchKind::from_tag(tag) {
            let stride = kind.stride();
            let values = &parts[1..];
            if values.len() < stride || values.len() % stride != 0 {
                errors.push(format!(
                    "{}: {} requires {} fields per switch",
                    line_ref,
                    tag,
                    1 + stride
                ));
            }
            for group in values.chunks_exact(stride) {
                if !switches.insert(group[0]) {
                    errors.push(format!("{}: Duplicate switch name \"{}\"", line_ref, group[0]));
                }
                if kind.is_timed() {
                    check_duration(&mut errors, &line_ref, group.get(2).copied(), limits);
                }
            }
        } else if tag == "I" {
            if parts.len() < 3 {
                errors.push(format!(
                    "{}: Input requires at least 3 fields (type,name,pin)",
                    line_ref
                ));
                continue;
            }
            if (parts.len() - 1) % 2 != 0 {
                errors.push(format!("{}: I requires 3 fields per input", line_ref));
            }
            for group in parts[1..].chunks_exact(2) {
                if !inputs.insert(group[0]) {
                    errors.push(format!("{}: Duplicate input name \"{}\"", line_ref, group[0]));
                }
            }
        } else if tag == "T" {
            if parts.len() < 5 {
                errors.push(format!("{}: Trigger requires at least 5 fields", line_ref));
                continue;
            }
            let switch_names: Vec<&str> = parts[5..].iter().step_by(2).copied().collect();
            if switch_names.len() > limits.trigger_max_switches {
                errors.push(format!(
                    "{}: Trigger can have at most {} actions, got: {}",
                    line_ref,
                    limits.trigger_max_switches,
                    switch_names.len()
                ));
            }
            triggers.push(TriggerRef {
                line_ref,
                input_name: parts[2],
                switch_names,
            });
        } else if tag == "MS" {
            if parts.len() < 3 {
                errors.push(format!(
                    "{}: Measurement source requires at least 3 fields",
                    line_ref
                ));
                continue;
            }
            if !sources.insert(parts[2]) {
                errors.push(format!(
                    "{}: Duplicate measurement source name \"{}\"",
                    line_ref, parts[2]
                ));
            }
        } else if tag == "SR" {
            if parts.len() < 9 {
                errors.push(format!(
                    "{}: Sensor reporter requires at least 9 fields (SR,name,ms,vType,sType,enable,cumul,sampling,reporting)",
                    line_ref
                ));
                continue;
            }
            check_reporter(&mut errors, &line_ref, &parts, limits);
            reporters.push(ReporterRef {
                line_ref,
                source_name: parts[2],
            });
        }
    }

    for trigger in &triggers {
        if !inputs.contains(trigger.input_name) {
            errors.push(format!(
                "{}: Trigger references non-existent input \"{}\"",
                trigger.line_ref, trigger.input_name
            ));
        }
        for name in &trigger.switch_names {
            if !name.is_empty() && !switches.contains(name) {
                errors.push(format!(
                    "{}: Trigger references non-existent switch \"{}\"",
                    trigger.line_ref, name
                ));
            }
        }
    }

    for reporter in &reporters {
        if !sources.contains(reporter.source_name) {
            errors.push(format!(
                "{}: Sensor reporter references non-existent measurement source \"{}\"",
                reporter.line_ref, reporter.source_name
            ));
        }
    }

    debug!("Validation finished with {} error(s)", errors.len());
    errors
}

fn check_duration(errors: &mut Vec<String>, line_ref: &str, value: Option<&str>, limits: &Limits) {
    let Some(value) = value else {
        return;
    };
    let min = limits.timed_switch_min_ms as f64;
    let max = limits.timed_switch_max_ms as f64;
    match parse_finite(value) {
        Some(duration) if duration.fract() == 0.0 && (min..=max).contains(&duration) => {}
        _ => errors.push(format!(
            "{}: Timed switch duration must be an integer between {} and {} ms, got: {}",
            line_ref, min, max, value
        )),
    }
}

fn check_reporter(errors: &mut Vec<String>, line_ref: &str, parts: &[&str], limits: &Limits) {
    check_interval(
        errors,
        line_ref,
        parts[7],
        "Sampling interval",
        (limits.sampling_min_ms, limits.sampling_max_ms),
        "ms",
    );
    check_interval(
        errors,
        line_ref,
        parts[8],
        "Reporting interval",
        (limits.reporting_min_sec, limits.reporting_max_sec),
        "seconds",
    );

    if let Some(raw) = optional(parts, 9) {
        match parse_finite(raw) {
            None => errors.push(format!("{}: Invalid scale value: {}", line_ref, raw)),
            Some(scale) if scale == 0.0 => errors.push(format!(
                "{}: Scale cannot be 0 (would zero out measurement). Use 1.0 for no scaling",
                line_ref
            )),
            Some(scale) => {
                if scale < limits.scale_min || scale > limits.scale_max {
                    errors.push(format!(
                        "{}: Scale must be between {} and {}, got: {}",
                        line_ref, limits.scale_min, limits.scale_max, raw
                    ));
                }
                if decimals(raw) > MAX_DECIMALS {
                    errors.push(format!(
                        "{}: Scale can have maximum {} decimal places, got: {}",
                        line_ref, MAX_DECIMALS, raw
                    ));
                }
            }
        }
    }

    if let Some(raw) = optional(parts, 10) {
        match parse_finite(raw) {
            None => errors.push(format!("{}: Invalid offset value: {}", line_ref, raw)),
            Some(offset) => {
                if offset < limits.offset_min || offset > limits.offset_max {
                    errors.push(format!(
                        "{}: Offset must be between {} and {}, got: {}",
                        line_ref, limits.offset_min, limits.offset_max, raw
                    ));
                }
                if decimals(raw) > MAX_DECIMALS {
                    errors.push(format!(
                        "{}: Offset can have maximum {} decimal places, got: {}",
                        line_ref, MAX_DECIMALS, raw
                    ));
                }
            }
        }
    }

    let bounded = [
        (11, "precision", "Precision", limits.precision_min, limits.precision_max),
        (13, "byte offset", "Byte offset", 0.0, BYTE_OFFSET_MAX),
        (14, "byte count", "Byte count", 0.0, BYTE_COUNT_MAX),
    ];
    for (index, lower, label, min, max) in bounded {
        let Some(raw) = optional(parts, index) else {
            continue;
        };
        match parse_finite(raw) {
            None => errors.push(format!("{}: Invalid {} value: {}", line_ref, lower, raw)),
            Some(value) => {
                if value.fract() != 0.0 {
                    errors.push(format!(
                        "{}: {} must be an integer (no decimals), got: {}",
                        line_ref, label, raw
                    ));
                }
                if value < min || value > max {
                    errors.push(format!(
                        "{}: {} must be between {} and {}, got: {}",
                        line_ref, label, min, max, raw
                    ));
                }
            }
        }
    }
}

fn check_interval(
    errors: &mut Vec<String>,
    line_ref: &str,
    raw: &str,
    label: &str,
    (min, max): (f64, f64),
    unit: &str,
) {
    let parsed = parse_finite(raw);
    if !parsed.is_some_and(|v| v.fract() == 0.0) {
        errors.push(format!(
            "{}: {} must be an integer (no decimals), got: {}",
            line_ref, label, raw
        ));
    }
    if let Some(value) = parsed {
        if value < min || value > max {
            errors.push(format!(
                "{}: {} must be between {} and {} {}",
                line_ref, label, min, max, unit
            ));
        }
    }
}

/// `f64::from_str` accepts `NaN` and `inf`; neither is a usable field value.
fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn optional<'a>(parts: &[&'a str], index: usize) -> Option<&'a str> {
    parts.get(index).copied().filter(|value| !value.is_empty())
}

fn decimals(raw: &str) -> usize {
    raw.split_once('.').map_or(0, |(_, fraction)| fraction.len())
}
