//! Property-based tests for value binding using proptest

use proptest::prelude::*;
use rust_sqlite_driver::prelude::*;

/// Bind `value` to `SELECT ?` and read the single column back.
fn echo(value: Value) -> Value {
    let conn = Connection::open(":memory:").unwrap();
    let mut stmt = conn.prepare("SELECT ?", &[value]).unwrap();
    assert_eq!(stmt.step().unwrap(), StepResult::Row);
    stmt.column(0).unwrap()
}

const ALL_FLAGS: &[OpenFlags] = &[
    OpenFlags::READONLY,
    OpenFlags::READWRITE,
    OpenFlags::CREATE,
    OpenFlags::URI,
    OpenFlags::MEMORY,
    OpenFlags::NOMUTEX,
    OpenFlags::FULLMUTEX,
    OpenFlags::SHAREDCACHE,
    OpenFlags::PRIVATECACHE,
    OpenFlags::NOFOLLOW,
];

// ============================================================================
// Bind-then-read Tests
// ============================================================================

proptest! {
    /// i32 values come back as 64-bit integers
    #[test]
    fn test_int_roundtrip(value in any::<i32>()) {
        prop_assert_eq!(echo(Value::from(value)), Value::Int64(i64::from(value)));
    }

    #[test]
    fn test_int64_roundtrip(value in any::<i64>()) {
        prop_assert_eq!(echo(Value::from(value)), Value::Int64(value));
    }

    /// Finite doubles are stored exactly
    #[test]
    fn test_float_roundtrip(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        prop_assert_eq!(echo(Value::from(value)), Value::Float(value));
    }

    /// Text round-trips byte for byte, embedded NULs included
    #[test]
    fn test_text_roundtrip(value in any::<String>()) {
        prop_assert_eq!(echo(Value::from(value.as_str())), Value::Text(value));
    }

    #[test]
    fn test_blob_roundtrip(value in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(echo(Value::from(value.clone())), Value::Blob(value));
    }

    /// Opaque values come back as blobs that decode to an equal value
    #[test]
    fn test_opaque_roundtrip(value in prop::collection::vec(any::<(i32, String)>(), 0..8)) {
        let read = echo(Value::opaque(value.clone()));
        prop_assert_eq!(read.decode::<Vec<(i32, String)>>().unwrap(), value);
    }
}

// ============================================================================
// Savepoint Identifier Tests
// ============================================================================

proptest! {
    /// Any non-empty identifier without NUL is accepted by the engine
    #[test]
    fn test_savepoint_identifiers(id in "[^\\x00]{1,32}") {
        let conn = Connection::open(":memory:").unwrap();
        conn.mark(id.as_str()).unwrap();
        prop_assert_eq!(conn.savepoints(), vec![id.clone()]);
        conn.release(id.as_str()).unwrap();
        conn.merge_steps(id.as_str()).unwrap();
        prop_assert!(conn.savepoints().is_empty());
    }

    #[test]
    fn test_integer_savepoints(id in any::<u64>()) {
        let conn = Connection::open(":memory:").unwrap();
        conn.mark(id).unwrap();
        prop_assert_eq!(conn.savepoints(), vec![id.to_string()]);
        conn.merge_steps(id).unwrap();
    }
}

// ============================================================================
// OpenFlags Tests
// ============================================================================

proptest! {
    #[test]
    fn test_flags_display_parse_roundtrip(picks in prop::collection::vec(0..ALL_FLAGS.len(), 0..6)) {
        let flags: OpenFlags = picks.iter().map(|&i| ALL_FLAGS[i]).collect();
        let parsed: OpenFlags = flags.to_string().parse().unwrap();
        prop_assert_eq!(parsed, flags);
    }
}
