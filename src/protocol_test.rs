use super::*;

#[test]
fn parse_cursor_accepts_integer_and_float_fields() {
    let pos = parse_cursor(r#"{"x":10,"y":20.5}"#).unwrap();
    assert!((pos.x - 10.0).abs() < f64::EPSILON);
    assert!((pos.y - 20.5).abs() < f64::EPSILON);
}

#[test]
fn parse_cursor_ignores_extra_fields() {
    let pos = parse_cursor(r#"{"x":1,"y":2,"buttons":0}"#).unwrap();
    assert_eq!(pos, CursorPosition::new(1.0, 2.0));
}

#[test]
fn parse_cursor_rejects_missing_field() {
    let err = parse_cursor(r#"{"x":1}"#).unwrap_err();
    assert!(matches!(err, PayloadError::Malformed(_)));
    assert_eq!(err.error_code(), "E_MALFORMED_PAYLOAD");
}

#[test]
fn parse_cursor_rejects_string_coordinates() {
    assert!(parse_cursor(r#"{"x":"10","y":20}"#).is_err());
}

#[test]
fn parse_cursor_rejects_null_coordinates() {
    assert!(parse_cursor(r#"{"x":null,"y":20}"#).is_err());
}

#[test]
fn parse_cursor_rejects_non_json() {
    assert!(parse_cursor("hello").is_err());
    assert!(parse_cursor("").is_err());
    assert!(parse_cursor("[1,2]").is_err());
}

#[test]
fn parse_cursor_bytes_accepts_utf8_json() {
    let pos = parse_cursor_bytes(br#"{"x":3,"y":4}"#).unwrap();
    assert_eq!(pos, CursorPosition::new(3.0, 4.0));
}

#[test]
fn parse_cursor_bytes_rejects_invalid_utf8() {
    let err = parse_cursor_bytes(&[0xff, 0xfe, 0x00]).unwrap_err();
    assert!(matches!(err, PayloadError::NotUtf8));
    assert_eq!(err.error_code(), "E_PAYLOAD_NOT_UTF8");
}

#[test]
fn origin_is_zero() {
    assert_eq!(CursorPosition::ORIGIN, CursorPosition::new(0.0, 0.0));
    assert_eq!(CursorPosition::default(), CursorPosition::ORIGIN);
}

#[test]
fn snapshot_encodes_username_and_nested_cursor() {
    let id = Uuid::new_v4();
    let mut snapshot = Snapshot::new();
    snapshot.insert(id, SessionView { display_name: "alice".into(), cursor: CursorPosition::new(10.0, 20.0) });

    let json: serde_json::Value = serde_json::from_str(&encode_snapshot(&snapshot).unwrap()).unwrap();
    let entry = &json[id.to_string()];
    assert_eq!(entry["username"], "alice");
    assert_eq!(entry["cursor"]["x"], 10.0);
    assert_eq!(entry["cursor"]["y"], 20.0);
    assert!(entry.get("display_name").is_none());
}

#[test]
fn empty_snapshot_encodes_as_empty_object() {
    assert_eq!(encode_snapshot(&Snapshot::new()).unwrap(), "{}");
}

#[test]
fn snapshot_survives_encode_and_parse() {
    let mut snapshot = Snapshot::new();
    snapshot.insert(Uuid::new_v4(), SessionView { display_name: "alice".into(), cursor: CursorPosition::new(1.5, -2.0) });
    snapshot.insert(Uuid::new_v4(), SessionView { display_name: "bob".into(), cursor: CursorPosition::ORIGIN });

    let restored: Snapshot = serde_json::from_str(&encode_snapshot(&snapshot).unwrap()).unwrap();
    assert_eq!(restored, snapshot);
}
