use pincfg_tool::auth::{sha256_hex, Credential};
use pincfg_tool::config::Limits;
use pincfg_tool::model::{
    Configuration, EventType, GlobalKey, MeasurementParams, SwitchAction, SwitchKind,
    TriggerAction,
};
use pincfg_tool::{chunk, decode, encode, validate, Envelope};
use uuid::Uuid;

fn sample_config() -> Configuration {
    let mut config = Configuration::new();
    config.global.get_mut(GlobalKey::Debounce).enabled = true;
    config.global.get_mut(GlobalKey::Announcement).enabled = true;

    config.add_switch(SwitchKind::Plain).pin = "5".to_string();
    config.add_switch(SwitchKind::Plain).pin = "6".to_string();
    let sw = config.add_switch(SwitchKind::Feedback);
    sw.pin = "7".to_string();
    sw.set_feedback_pin("8").unwrap();
    let sw = config.add_switch(SwitchKind::TimedFeedback);
    sw.pin = "9".to_string();
    sw.set_duration("3000").unwrap();
    sw.set_feedback_pin("10").unwrap();

    config.add_input().pin = "3".to_string();

    let trigger = config.add_trigger();
    trigger.source = "i01".to_string();
    trigger.event_type = EventType::Longpress;
    trigger
        .add_action(
            TriggerAction {
                switch_name: "o01".to_string(),
                action: SwitchAction::Toggle,
            },
            5,
        )
        .unwrap();

    config.add_measurement_source(MeasurementParams::CpuTemp).name = "cpu".to_string();
    config
        .add_measurement_source(MeasurementParams::I2c {
            address: "0x76".to_string(),
            register: "0xFA".to_string(),
            data_size: "2".to_string(),
            cache_ms: String::new(),
            cmd2: String::new(),
            cmd3: String::new(),
        })
        .name = "bme".to_string();

    let sr = config.add_sensor_reporter();
    sr.measurement_name = "cpu".to_string();
    sr.scale = "0.5".to_string();
    sr.precision = "1".to_string();
    config
}

fn without_ids(mut config: Configuration) -> Configuration {
    config.switches.iter_mut().for_each(|e| e.id = Uuid::nil());
    config.inputs.iter_mut().for_each(|e| e.id = Uuid::nil());
    config.triggers.iter_mut().for_each(|e| e.id = Uuid::nil());
    config.measurement_sources.iter_mut().for_each(|e| e.id = Uuid::nil());
    config.sensor_reporters.iter_mut().for_each(|e| e.id = Uuid::nil());
    config
}

#[test]
fn test_decode_restores_encoded_model() {
    let config = sample_config();
    let text = encode(&config).canonical();
    let decoded = decode(&text);
    assert!(decoded.skipped.is_empty());
    assert_eq!(without_ids(decoded.config.clone()), without_ids(config));
    assert_eq!(encode(&decoded.config).canonical(), text);
}

#[test]
fn test_display_form_decodes_like_canonical() {
    let encoded = encode(&sample_config());
    let from_display = decode(&encoded.display());
    let from_canonical = decode(&encoded.canonical());
    assert_eq!(without_ids(from_display.config), without_ids(from_canonical.config));
}

#[test]
fn test_chunks_reconstruct_envelope() {
    let text = encode(&sample_config()).canonical();
    let envelope = Envelope::config(&"b".repeat(64), &text);
    for size in [1, 7, 18, 64, envelope.len(), envelope.len() + 10] {
        let chunks = chunk(envelope.as_str(), size);
        assert_eq!(chunks.concat(), envelope.as_str());
        assert!(chunks.iter().all(|c| c.chars().count() <= size));
    }
    assert_eq!(chunk(envelope.as_str(), 0).concat(), envelope.as_str());
}

#[test]
fn test_validation_is_repeatable() {
    let text = "S,o01,5,o01,6/T,t01,i09,1,1,o01,0/SR,temp,nope,0,6,0,0,1000,300/";
    let limits = Limits::default();
    let first = validate(text, &limits);
    let second = validate(text, &limits);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_dangling_references_reported_once() {
    let text = "S,o01,5/I,i01,3/MS,0,cpu/T,t01,i09,1,1,o01,0/SR,temp,nope,0,6,0,0,1000,300/";
    let errors = validate(text, &Limits::default());
    let input_errors: Vec<_> = errors.iter().filter(|e| e.contains("\"i09\"")).collect();
    let source_errors: Vec<_> = errors.iter().filter(|e| e.contains("\"nope\"")).collect();
    assert_eq!(input_errors.len(), 1);
    assert_eq!(source_errors.len(), 1);
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_plain_switches_encode_on_one_line() {
    let mut config = Configuration::new();
    config.add_switch(SwitchKind::Plain).pin = "5".to_string();
    config.add_switch(SwitchKind::Plain).pin = "6".to_string();
    assert_eq!(encode(&config).lines(), ["S,o01,5,o02,6/"]);
}

#[test]
fn test_default_sensor_has_nine_fields() {
    let mut config = Configuration::new();
    config.add_measurement_source(MeasurementParams::CpuTemp);
    let name = config.measurement_sources[0].name.clone();
    config.add_sensor_reporter().measurement_name = name;
    let encoded = encode(&config);
    let sr = encoded
        .lines()
        .iter()
        .find(|l| l.starts_with("SR,"))
        .unwrap();
    assert_eq!(sr.trim_end_matches('/').split(',').count(), 9);
}

#[test]
fn test_envelope_carries_hash() {
    let mut config = Configuration::new();
    config.global.get_mut(GlobalKey::Debounce).enabled = true;
    config.auth_password_hash = "a".repeat(64);
    let canonical = encode(&config).canonical();
    assert_eq!(canonical, "CD,330/");
    let envelope = Envelope::config(&config.auth_password_hash, &canonical);
    assert_eq!(
        envelope.as_str(),
        format!("#[{}/CFG:CD,330/]#", "a".repeat(64))
    );
}

#[tokio::test]
async fn test_legacy_auth_is_hashed() {
    let decoded = decode("AUTH:mypassword/CD,330/");
    assert_eq!(
        decoded.credential,
        Some(Credential::Legacy("mypassword".to_string()))
    );
    let mut config = decoded.config;
    config
        .apply_credential(decoded.credential.unwrap())
        .await
        .unwrap();
    assert_eq!(config.auth_password, "mypassword");
    assert_eq!(config.auth_password_hash, sha256_hex("mypassword"));
    assert_ne!(config.auth_password_hash, "mypassword");
    assert!(config.global.debounce.enabled);
}

#[test]
fn test_zero_scale_always_flagged() {
    let limits = Limits::default();
    for line in [
        "MS,0,cpu/SR,temp,cpu,0,6,0,0,1000,300,0/",
        "MS,0,cpu/SR,temp,cpu,0,6,0,0,1000,300,0.000/",
        "SR,temp,missing,0,6,0,0,9,99999,0,abc/",
    ] {
        let errors = validate(line, &limits);
        assert!(
            errors.iter().any(|e| e.contains("Scale cannot be 0")),
            "{:?}",
            errors
        );
    }
}
