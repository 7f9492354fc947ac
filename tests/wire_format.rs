// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge
//
// Schema validation tests for the MQTT wire format.
//
// Hand-written JSON values check the schemas themselves; payloads produced by
// the library check that what we publish and accept matches them.

use serde_json::json;

use gateway_hub::{Command, Device, HubConfig, Panel, StatusDecoder};

fn load_schema(name: &str) -> serde_json::Value {
    let path = format!("{}/schemas/mqtt/{name}", env!("CARGO_MANIFEST_DIR"));
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read schema {path}: {e}"));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Failed to parse schema {path}: {e}"))
}

fn build_validator(schema_name: &str) -> jsonschema::Validator {
    let schema = load_schema(schema_name);
    jsonschema::validator_for(&schema)
        .unwrap_or_else(|e| panic!("Failed to compile schema {schema_name}: {e}"))
}

fn validate(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    let errors: Vec<_> = validator.iter_errors(instance).collect();
    if !errors.is_empty() {
        let msgs: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        panic!(
            "Schema validation failed for {schema_name}:\n{}\nInstance: {}",
            msgs.join("\n"),
            serde_json::to_string_pretty(instance).unwrap()
        );
    }
}

fn validate_fails(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    assert!(
        !validator.is_valid(instance),
        "Expected schema validation to fail for {schema_name}, but it passed.\nInstance: {}",
        serde_json::to_string_pretty(instance).unwrap()
    );
}

fn config() -> HubConfig {
    HubConfig::builder().device_no("c49878f1e235").panel_address("A1").build()
}

fn published(command: &Command) -> serde_json::Value {
    serde_json::from_slice(&command.to_json().unwrap()).unwrap()
}

// =========================================================================
// set_panels
// =========================================================================

#[test]
fn set_panels_valid() {
    validate(
        "set_panels.schema.json",
        &json!({
            "command": "set_panels",
            "serial": "1700000000000",
            "device_no": "c49878f1e235",
            "panels": [{
                "address": "A1",
                "child_dev": [{ "channel": "1", "state": "on" }]
            }],
            "time_stamp": "1700000000000"
        }),
    );
}

#[test]
fn set_panels_non_string_attribute() {
    validate_fails(
        "set_panels.schema.json",
        &json!({
            "command": "set_panels",
            "serial": "1",
            "device_no": "g1",
            "panels": [{ "address": "A1", "child_dev": [{ "channel": 1 }] }],
            "time_stamp": "1"
        }),
    );
}

#[test]
fn set_panels_missing_timestamp() {
    validate_fails(
        "set_panels.schema.json",
        &json!({
            "command": "set_panels",
            "serial": "1",
            "device_no": "g1",
            "panels": []
        }),
    );
}

#[test]
fn set_panels_from_library() {
    let device = Device::new().with("channel", "1").with("state", "on");
    let command = Command::set_panels(&config(), device);
    let value = published(&command);
    validate("set_panels.schema.json", &value);
    assert_eq!(value["panels"][0]["child_dev"][0], json!({ "channel": "1", "state": "on" }));
}

#[test]
fn set_panels_with_several_panels_from_library() {
    let panels = vec![
        Panel::new("A1", vec![Device::new().with("channel", "1")]),
        Panel::new("B2", vec![]),
    ];
    let value = published(&Command::set_panels_with(&config(), panels));
    validate("set_panels.schema.json", &value);
}

// =========================================================================
// read_status
// =========================================================================

#[test]
fn read_status_valid() {
    validate(
        "read_status.schema.json",
        &json!({
            "time_stamp": "1700000000000",
            "command": "read_status",
            "serial": "1700000000000"
        }),
    );
}

#[test]
fn read_status_wrong_command() {
    validate_fails(
        "read_status.schema.json",
        &json!({ "time_stamp": "1", "command": "set_panels", "serial": "1" }),
    );
}

#[test]
fn read_status_from_library() {
    let value = published(&Command::read_status());
    validate("read_status.schema.json", &value);
    assert!(value.get("device_no").is_none());
}

// =========================================================================
// Inbound payloads
// =========================================================================

#[test]
fn status_report_valid_and_accepted() {
    let report = json!({
        "command": "read_status",
        "device_no": "g1",
        "panels": [{
            "address": "A1",
            "child_dev": [{ "channel": "2", "power": "1" }]
        }]
    });
    validate("status_report.schema.json", &report);

    let snapshot = StatusDecoder::default()
        .parse(report.to_string().as_bytes())
        .unwrap();
    assert_eq!(snapshot.device("A1", "2").and_then(|d| d.get("power")), Some("1"));
}

#[test]
fn status_report_missing_device_no() {
    let report = json!({ "command": "read_status", "panels": [] });
    validate_fails("status_report.schema.json", &report);
    assert!(StatusDecoder::default().parse(report.to_string().as_bytes()).is_err());
}

#[test]
fn status_report_roundtrips_through_serde() {
    let report = json!({
        "time_stamp": "1700000000000",
        "command": "read_status",
        "serial": "1700000000000",
        "device_no": "g1",
        "panels": []
    });
    let snapshot = StatusDecoder::default().parse(report.to_string().as_bytes()).unwrap();
    validate("status_report.schema.json", &serde_json::to_value(&snapshot).unwrap());
}

#[test]
fn command_result_valid() {
    validate(
        "command_result.schema.json",
        &json!({ "command": "set_panels", "serial": "1", "device_no": "g1", "result": "1" }),
    );
    validate_fails("command_result.schema.json", &json!({ "result": "maybe" }));
    validate_fails(
        "status_report.schema.json",
        &json!({ "device_no": "g1", "result": "1" }),
    );
}
