//! End-to-end scenarios over states, decoders and queues.

use codec::{CodecError, State, StateQueue};
use schema::{DecodedFieldDef, Decoder, FieldDef, IntMap, StateSchema, Value, ValueError};

fn telemetry_schema() -> StateSchema {
    StateSchema::builder()
        .field(FieldDef::uint("STATE_CODE", 2))
        .field(FieldDef::int("CHAR", 8))
        .field(FieldDef::boolean("BOOL"))
        .field(FieldDef::uint("TS_SEC", 48))
        .field(FieldDef::buffer("MSG", 96))
        .decoded_field(DecodedFieldDef::new(
            "MESSAGE",
            Decoder::BufferToString { from: "MSG".into() },
        ))
        .decoded_field(DecodedFieldDef::new(
            "STATE",
            Decoder::IntMap {
                from: "STATE_CODE".into(),
                map_id: "STATE_MAP".into(),
            },
        ))
        .decoded_field(DecodedFieldDef::new(
            "TS_MS",
            Decoder::NumberToUnixTsMs {
                from: "TS_SEC".into(),
                year: 2022,
                factor: 1000.0,
            },
        ))
        .int_map(
            "STATE_MAP",
            IntMap::from([
                (0, serde_json::json!("IDLE")),
                (1, serde_json::json!("STOPPED")),
                (2, serde_json::json!("RUNNING")),
            ]),
        )
        .build()
        .unwrap()
}

const UNIX_MS_2022: u64 = 1_640_995_200_000;

#[test]
fn single_state_roundtrip_with_decoders() {
    let schema = telemetry_schema();
    let mut state = State::new(&schema);
    state.set("STATE_CODE", 2u64).unwrap();
    state.set("CHAR", -1).unwrap();
    state.set("BOOL", true).unwrap();
    state.set("TS_SEC", 0u64).unwrap();
    state.set("MSG", "Hello").unwrap();

    assert_eq!(state.get("STATE").unwrap(), Value::Str("RUNNING".into()));
    assert_eq!(state.get("MESSAGE").unwrap(), Value::Str("Hello".into()));
    assert_eq!(state.get("TS_MS").unwrap(), Value::Uint(UNIX_MS_2022));

    // The decoded views survive a binary round-trip.
    let image = state.to_bytes();
    let mut restored = State::new(&schema);
    restored.load(&image).unwrap();
    assert_eq!(restored.get("STATE_CODE").unwrap(), Value::Uint(2));
    assert_eq!(restored.get("CHAR").unwrap(), Value::Int(-1));
    assert_eq!(restored.get("BOOL").unwrap(), Value::Bool(true));
    assert_eq!(restored.get("STATE").unwrap(), Value::Str("RUNNING".into()));
    assert_eq!(restored.get("MESSAGE").unwrap(), Value::Str("Hello".into()));
    assert_eq!(restored.get("TS_MS").unwrap(), Value::Uint(UNIX_MS_2022));
}

#[test]
fn unix_ts_decoder_encodes_back() {
    let schema = telemetry_schema();
    let mut state = State::new(&schema);

    // factor 1000: the raw field carries whole seconds since 2022.
    state.set("TS_MS", UNIX_MS_2022 + 11_000).unwrap();
    assert_eq!(state.get("TS_SEC").unwrap(), Value::Uint(11));
    assert_eq!(
        state.get("TS_MS").unwrap(),
        Value::Uint(UNIX_MS_2022 + 11_000)
    );

    // A fractional second cannot pass through the integer carrier.
    assert!(state.set("TS_MS", UNIX_MS_2022 + 10_987).is_err());
    assert_eq!(state.get("TS_SEC").unwrap(), Value::Uint(11));
}

#[test]
fn unix_ts_decoder_with_float_source() {
    let schema = StateSchema::builder()
        .field(FieldDef::float64("secs"))
        .decoded_field(DecodedFieldDef::new(
            "ts_ms",
            Decoder::NumberToUnixTsMs {
                from: "secs".into(),
                year: 2022,
                factor: 1000.0,
            },
        ))
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    state.set("ts_ms", UNIX_MS_2022 + 10_987).unwrap();
    assert_eq!(state.get("secs").unwrap(), Value::Float(10.987));
    assert_eq!(
        state.get("ts_ms").unwrap(),
        Value::Uint(UNIX_MS_2022 + 10_987)
    );
}

#[test]
fn int_map_sentinel_for_unmapped_keys() {
    // Signed 2-bit code: the representable range is [-2, 1].
    let schema = StateSchema::builder()
        .field(FieldDef::int("STATE_CODE", 2))
        .decoded_field(DecodedFieldDef::new(
            "STATE",
            Decoder::IntMap {
                from: "STATE_CODE".into(),
                map_id: "STATE_MAP".into(),
            },
        ))
        .int_map(
            "STATE_MAP",
            IntMap::from([
                (0, serde_json::json!("IDLE")),
                (1, serde_json::json!("STOPPED")),
                (2, serde_json::json!("RUNNING")),
            ]),
        )
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    let err = state.set("STATE_CODE", 3).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Value {
            source: ValueError::OutOfRange { .. },
            ..
        }
    ));

    state.set("STATE_CODE", -2).unwrap();
    assert_eq!(state.get("STATE").unwrap(), Value::Str("UNKNOWN".into()));
}

#[test]
fn int_map_is_read_only() {
    let schema = telemetry_schema();
    let mut state = State::new(&schema);
    state.set("STATE_CODE", 1u64).unwrap();

    let err = state.set("STATE", "RUNNING").unwrap_err();
    assert!(matches!(err, CodecError::ReadOnlyDecoder { .. }));
    // The source field is untouched.
    assert_eq!(state.get("STATE").unwrap(), Value::Str("STOPPED".into()));
}

#[test]
fn missing_int_map_reported() {
    let schema = StateSchema::builder()
        .field(FieldDef::int("CODE", 4))
        .decoded_field(DecodedFieldDef::new(
            "LABEL",
            Decoder::IntMap {
                from: "CODE".into(),
                map_id: "NOWHERE".into(),
            },
        ))
        .build()
        .unwrap();
    let state = State::new(&schema);
    assert!(matches!(
        state.get("LABEL"),
        Err(CodecError::MapNotFound { .. })
    ));
}

#[test]
fn fixed_point_roundtrip_at_range_edges() {
    let schema = StateSchema::builder()
        .field(FieldDef::fixed("x", 10, 2))
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    for v in [-5.12, 5.11] {
        state.set("x", v).unwrap();
        let image = state.to_bytes();
        let mut restored = State::new(&schema);
        restored.load(&image).unwrap();
        assert_eq!(restored.get("x").unwrap(), Value::Float(v));
    }

    let err = state.set("x", 5.12).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Value {
            source: ValueError::OutOfRange { .. },
            ..
        }
    ));
}

#[test]
fn queue_compression_beats_raw_on_homogeneous_data() {
    let plain = StateSchema::builder()
        .field(FieldDef::boolean("F_BOOL"))
        .build()
        .unwrap();
    let packed = StateSchema::builder()
        .pipeline("t:z")
        .field(FieldDef::boolean("F_BOOL"))
        .build()
        .unwrap();

    let fill = |schema: &StateSchema| -> Vec<u8> {
        let mut queue = StateQueue::new(schema);
        for i in 0..1000u64 {
            let mut state = State::new(schema);
            state.set("F_BOOL", i % 2).unwrap();
            queue.push(&state).unwrap();
        }
        queue.encode().unwrap()
    };

    let raw = fill(&plain);
    let compressed = fill(&packed);
    assert_eq!(raw.len(), 1000);
    assert!(compressed.len() < raw.len());

    // The alternating pattern survives the pipeline.
    let mut queue = StateQueue::new(&packed);
    queue.decode(&compressed).unwrap();
    assert_eq!(queue.len(), 1000);
    for i in [0usize, 1, 500, 999] {
        assert_eq!(
            queue.state_at(i).unwrap().get("F_BOOL").unwrap(),
            Value::Bool(i % 2 == 1),
            "state {i}"
        );
    }
}

#[test]
fn schema_hash_independent_of_json_key_order() {
    let forward = r#"
    {
        "version": "2.0",
        "encoderPipeline": "",
        "decoderIntMaps": {
            "A_MAP": { "0": "a" },
            "B_MAP": { "0": "b" }
        },
        "decodedFields": [
            { "name": "A", "decoder": "IntMap", "params": { "from": "RAW", "mapId": "A_MAP" } },
            { "name": "B", "decoder": "IntMap", "params": { "from": "RAW", "mapId": "B_MAP" } }
        ],
        "fields": [ { "name": "RAW", "type": "int", "size": 8 } ]
    }
    "#;
    let reordered = r#"
    {
        "fields": [ { "size": 8, "type": "int", "name": "RAW" } ],
        "decodedFields": [
            { "name": "B", "params": { "mapId": "B_MAP", "from": "RAW" }, "decoder": "IntMap" },
            { "name": "A", "params": { "mapId": "A_MAP", "from": "RAW" }, "decoder": "IntMap" }
        ],
        "decoderIntMaps": {
            "B_MAP": { "0": "b" },
            "A_MAP": { "0": "a" }
        },
        "encoderPipeline": "",
        "version": "2.0"
    }
    "#;
    let s1 = StateSchema::from_json_str(forward).unwrap();
    let s2 = StateSchema::from_json_str(reordered).unwrap();
    assert_eq!(s1.hash(), s2.hash());
    assert_eq!(s1.hash_string(), s2.hash_string());
}

#[test]
fn flags_decoder_validates_bit_positions() {
    let schema = StateSchema::builder()
        .field(FieldDef::uint("raw", 4))
        .decoded_field(DecodedFieldDef::new(
            "decoded_flags",
            Decoder::Flags {
                from: "raw".into(),
                flags: [
                    ("a".to_owned(), 0u8),
                    ("b".to_owned(), 1),
                    ("c".to_owned(), 3),
                    ("d".to_owned(), 4),
                ]
                .into_iter()
                .collect(),
            },
        ))
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    state.set("raw", 0b0001u64).unwrap();
    let err = state.get("decoded_flags").unwrap_err();
    assert_eq!(
        err.to_string(),
        "flag \"d\" bit position 4 exceeds field size 4 bits"
    );

    // Encoding only touches the named flags, all of which fit.
    state
        .set("decoded_flags", vec!["a", "c"])
        .unwrap();
    assert_eq!(state.get("raw").unwrap(), Value::Uint(0b1001));

    let err = state.set("decoded_flags", vec!["a", "nope"]).unwrap_err();
    assert!(matches!(err, CodecError::UnknownFlag { .. }));

    let err = state.set("decoded_flags", vec!["d"]).unwrap_err();
    assert!(matches!(err, CodecError::FlagBitOutOfRange { .. }));
}

#[test]
fn flags_decoder_roundtrip_within_range() {
    let schema = StateSchema::builder()
        .field(FieldDef::uint("status_flags", 8))
        .decoded_field(DecodedFieldDef::new(
            "status",
            Decoder::Flags {
                from: "status_flags".into(),
                flags: [
                    ("active".to_owned(), 0u8),
                    ("connected".to_owned(), 1),
                    ("error".to_owned(), 2),
                    ("synced".to_owned(), 3),
                ]
                .into_iter()
                .collect(),
            },
        ))
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    assert_eq!(state.get("status").unwrap(), Value::List(vec![]));

    state.set("status_flags", 0b0101u64).unwrap();
    assert_eq!(
        state.get("status").unwrap(),
        Value::from(vec!["active", "error"])
    );

    state.set("status", vec!["connected", "synced"]).unwrap();
    assert_eq!(state.get("status_flags").unwrap(), Value::Uint(0b1010));

    state.set("status", Vec::<&str>::new()).unwrap();
    assert_eq!(state.get("status_flags").unwrap(), Value::Uint(0));
}

#[test]
fn buffer_to_string_decoder_encodes_back() {
    let schema = StateSchema::builder()
        .field(FieldDef::buffer("message_raw", 512))
        .decoded_field(DecodedFieldDef::new(
            "message",
            Decoder::BufferToString {
                from: "message_raw".into(),
            },
        ))
        .build()
        .unwrap();
    let mut state = State::new(&schema);

    state.set("message_raw", b"hello".to_vec()).unwrap();
    assert_eq!(state.get("message").unwrap(), Value::Str("hello".into()));

    state.set("message", "world").unwrap();
    assert_eq!(state.get("message").unwrap(), Value::Str("world".into()));
    let raw = state.get("message_raw").unwrap();
    let bytes = raw.as_bytes().unwrap();
    assert_eq!(&bytes[..5], b"world");
    assert!(bytes[5..].iter().all(|&b| b == 0));
}

#[test]
fn decoded_fields_work_through_queue_roundtrip() {
    let schema = telemetry_schema();
    let mut queue = StateQueue::new(&schema);
    for code in 0..3u64 {
        let mut state = State::new(&schema);
        state.set("STATE_CODE", code).unwrap();
        state.set("MSG", format!("msg {code}").as_str()).unwrap();
        queue.push(&state).unwrap();
    }

    let data = queue.encode().unwrap();
    let mut decoded = StateQueue::new(&schema);
    decoded.decode(&data).unwrap();

    let labels: Vec<_> = decoded
        .states()
        .unwrap()
        .iter()
        .map(|s| s.get("STATE").unwrap())
        .collect();
    assert_eq!(
        labels,
        vec![
            Value::Str("IDLE".into()),
            Value::Str("STOPPED".into()),
            Value::Str("RUNNING".into()),
        ]
    );
    assert_eq!(
        decoded.state_at(2).unwrap().get("MESSAGE").unwrap(),
        Value::Str("msg 2".into())
    );
}
