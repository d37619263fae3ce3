//! Integration tests for schema evolution
//!
//! These tests verify that the entire schema evolution workflow works correctly:
//! compatibility checks on schema text, plus decoding across versions with
//! both typed and schema-driven readers.

use protolite::{
    check_compatibility, define_message, parse_schema, CodecError, CompatibilityIssue,
    CompatibilityLevel, DynamicMessage, Message, Value, WireType,
};

const READING_V1: &str = "
message Reading {
    int32 sensor = 1;
    float value = 2;
}

message Calibration {
    double offset = 1;
}
";

const READING_V2: &str = "
message Reading {
    int32 sensor = 1;
    float value = 2;
    string unit = 3;
    Calibration calibration = 4;
}

message Calibration {
    double offset = 1;
}
";

define_message! {
    struct ReadingV1 {
        sensor: int32 = 1,
        value: float = 2,
    }
}

define_message! {
    struct Calibration {
        offset: double = 1,
    }
}

define_message! {
    struct ReadingV2 {
        sensor: int32 = 1,
        value: float = 2,
        unit: bytes = 3,
        calibration: message<Calibration> = 4,
    }
}

fn v2_reading() -> ReadingV2 {
    let mut reading = ReadingV2::default();
    reading.set_sensor(17);
    reading.set_value(21.5);
    reading.set_unit("celsius");
    reading.calibration_mut().set_offset(-0.25);
    reading
}

fn v1_reading() -> ReadingV1 {
    let mut reading = ReadingV1::default();
    reading.set_sensor(3);
    reading.set_value(1.5);
    reading
}

#[test]
fn test_forward_compatibility_old_reader_new_data() {
    // Scenario: old reader (v1) receives data from a new writer (v2)
    let v1 = parse_schema(READING_V1).unwrap();
    let v2 = parse_schema(READING_V2).unwrap();

    let compat = check_compatibility(&v2, &v1);
    assert_eq!(compat.level, CompatibilityLevel::ForwardCompatible);
    assert!(compat.is_compatible());
    assert!(compat.issues.is_empty());
    // unit and calibration are dropped by the old reader
    assert_eq!(compat.warnings.len(), 2);

    let bytes = v2_reading().encode_to_vec();
    let old = ReadingV1::decode(&bytes).unwrap();
    assert_eq!(old.sensor(), 17);
    assert_eq!(old.value(), 21.5);
}

#[test]
fn test_new_reader_rejects_old_data() {
    let v1 = parse_schema(READING_V1).unwrap();
    let v2 = parse_schema(READING_V2).unwrap();

    let compat = check_compatibility(&v1, &v2);
    assert_eq!(compat.level, CompatibilityLevel::Incompatible);
    let added: Vec<u32> = compat
        .issues
        .iter()
        .filter_map(|issue| match issue {
            CompatibilityIssue::FieldAdded { tag, .. } => Some(*tag),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec![3, 4]);

    // A v1 stream ends where v2 expects `unit`: key byte plus length byte
    let bytes = v1_reading().encode_to_vec();
    let err = ReadingV2::decode(&bytes).unwrap_err();
    assert_eq!(err, CodecError::TruncatedInput { need: 2, got: 0 });

    let err = DynamicMessage::decode(&v2, "Reading", &bytes).unwrap_err();
    assert!(err.is_truncation());
}

#[test]
fn test_dynamic_reader_keeps_fields_it_does_not_know() {
    let v1 = parse_schema(READING_V1).unwrap();
    let bytes = v2_reading().encode_to_vec();

    let reading = DynamicMessage::decode(&v1, "Reading", &bytes).unwrap();
    assert_eq!(reading.get("sensor").and_then(Value::as_i32), Some(17));

    let unknown: Vec<(u32, WireType)> = reading
        .unknown_fields()
        .iter()
        .map(|field| (field.tag, field.wire_type))
        .collect();
    assert_eq!(
        unknown,
        vec![(3, WireType::LengthDelimited), (4, WireType::LengthDelimited)]
    );

    // Unknowns are re-emitted, so a v2 reader still sees everything
    let relayed = ReadingV2::decode(&reading.encode()).unwrap();
    assert_eq!(relayed, v2_reading());
}

#[test]
fn test_dynamic_v2_reader_shows_unit_as_text() {
    let v2 = parse_schema(READING_V2).unwrap();
    let reading = DynamicMessage::decode(&v2, "Reading", &v2_reading().encode_to_vec()).unwrap();
    assert_eq!(reading.get("unit").and_then(Value::as_str), Some("celsius"));
    assert!(reading.to_string().contains("unit (3): \"celsius\"\n"));
}

#[test]
fn test_breaking_change_detected() {
    let v1 = parse_schema(READING_V1).unwrap();
    let broken = parse_schema(
        "message Reading { int32 sensor = 1; double value = 2; }
         message Calibration { double offset = 1; }",
    )
    .unwrap();

    let compat = check_compatibility(&v1, &broken);
    assert_eq!(compat.level, CompatibilityLevel::Incompatible);
    assert!(matches!(
        compat.issues[..],
        [CompatibilityIssue::FieldTypeChanged { tag: 2, .. }]
    ));

    // Old data read with the new schema fails on the wire type
    let mut writer = ReadingV1::default();
    writer.set_value(2.0);
    let bytes = writer.encode_to_vec();
    let err = DynamicMessage::decode(&broken, "Reading", &bytes).unwrap_err();
    assert!(matches!(err, CodecError::WireTypeMismatch { tag: 2, .. }));
}

#[test]
fn test_removed_message_is_incompatible() {
    let v1 = parse_schema(READING_V1).unwrap();
    let without_calibration =
        parse_schema("message Reading { int32 sensor = 1; float value = 2; }").unwrap();

    let compat = check_compatibility(&v1, &without_calibration);
    assert!(!compat.is_compatible());
    assert!(compat
        .issues
        .iter()
        .any(|issue| matches!(issue, CompatibilityIssue::MessageRemoved { name } if name == "Calibration")));
}
