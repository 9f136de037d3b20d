use bincode::Options;
use bytes::{BufMut, BytesMut};
use serde_json::{Value, json};

use super::codec::REGISTERED;
use super::*;

fn all_messages() -> Vec<Message> {
    vec![
        Message::subscribe("sensors"),
        Message::publish("sensors/temp", "21.5"),
        Message::publish("empty", ""),
        Message::publish("escapes", "<a href=\"x\">&amp; 'quoted'</a>\nline two"),
        Message::publish("numbers", 21),
        Message::publish("numbers", -3.25),
        Message::publish("flags", false),
        Message::publish("nothing", Value::Null),
        Message::publish("json-looking", "{\"not\": \"parsed\"}"),
        Message::publish(
            "structured",
            json!({"temp": 21.5, "unit": "<C>", "history": [1, 2, {"k": null}]}),
        ),
        Message::unsubscribe("sensors"),
        Message::ListTopics,
        Message::ListTopicsResult { topics: vec![] },
        Message::ListTopicsResult {
            topics: vec!["a".into(), "a/b".into(), "<odd & name>".into()],
        },
    ]
}

#[test]
fn test_every_message_survives_every_encoding() {
    for encoding in REGISTERED {
        for message in all_messages() {
            let bytes = encode(encoding, &message).unwrap();
            let decoded = decode(encoding, &bytes)
                .unwrap_or_else(|e| panic!("{encoding} failed on {message:?}: {e}"));
            assert_eq!(decoded, message, "{encoding}");
        }
    }
}

#[test]
fn test_tag_lookup() {
    assert_eq!(Encoding::from_tag(0).unwrap(), Encoding::Json);
    assert_eq!(Encoding::from_tag(1).unwrap(), Encoding::Xml);
    assert_eq!(Encoding::from_tag(2).unwrap(), Encoding::Binary);
    assert_eq!(
        Encoding::from_tag(3),
        Err(ProtocolError::UnsupportedEncoding(3))
    );
    for encoding in REGISTERED {
        assert_eq!(Encoding::try_from(encoding.tag()).unwrap(), encoding);
    }
}

#[test]
fn test_json_wire_shape() {
    let bytes = encode(Encoding::Json, &Message::publish("t", "hello")).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"command": "publish", "topic": "t", "message": "hello"})
    );

    let bytes = encode(Encoding::Json, &Message::ListTopics).unwrap();
    assert_eq!(bytes, br#"{"command":"listTopics"}"#);
}

#[test]
fn test_json_decodes_hand_written_commands() {
    let message = decode(Encoding::Json, br#"{"topic": "t", "command": "subscribe"}"#).unwrap();
    assert_eq!(message, Message::subscribe("t"));

    let message = decode(Encoding::Json, br#"{"command": "listTopics", "topics": ["x"]}"#).unwrap();
    assert_eq!(
        message,
        Message::ListTopicsResult {
            topics: vec!["x".into()]
        }
    );
}

#[test]
fn test_xml_wire_shape() {
    let bytes = encode(Encoding::Xml, &Message::subscribe("a&b")).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text, r#"<message command="subscribe" topic="a&amp;b"/>"#);

    let message = decode(
        Encoding::Xml,
        br#"<?xml version="1.0"?><message command="publish" topic="t" message="v"></message>"#,
    )
    .unwrap();
    assert_eq!(message, Message::publish("t", "v"));
}

#[test]
fn test_unparseable_bytes_are_malformed() {
    let garbage: &[u8] = b"\xff\x00not anything";
    for encoding in REGISTERED {
        let err = decode(encoding, garbage).unwrap_err();
        assert!(
            matches!(err, ProtocolError::MalformedPayload(_)),
            "{encoding}: {err:?}"
        );
    }

    assert!(matches!(
        decode(Encoding::Json, br#"{"topic": "t"}"#),
        Err(ProtocolError::MalformedPayload(_))
    ));
    assert!(matches!(
        decode(Encoding::Xml, b"<other command=\"subscribe\"/>"),
        Err(ProtocolError::MalformedPayload(_))
    ));
    assert!(matches!(
        decode(Encoding::Xml, b"<message topic=\"t\"/>"),
        Err(ProtocolError::MalformedPayload(_))
    ));
}

#[test]
fn test_unknown_command_is_reported_per_encoding() {
    let record = codec::BinaryRecord {
        command: "shout".into(),
        topic: Some("t".into()),
        message: None,
        topics: None,
    };
    let payloads = [
        (Encoding::Json, br#"{"command": "shout", "topic": "t"}"#.to_vec()),
        (Encoding::Xml, br#"<message command="shout" topic="t"/>"#.to_vec()),
        (
            Encoding::Binary,
            codec::binary_options().serialize(&record).unwrap(),
        ),
    ];

    for (encoding, payload) in payloads {
        assert_eq!(
            decode(encoding, &payload),
            Err(ProtocolError::UnknownCommand("shout".into())),
            "{encoding}"
        );
    }
}

#[test]
fn test_missing_or_empty_fields_are_malformed() {
    let cases: [&[u8]; 4] = [
        br#"{"command": "subscribe"}"#,
        br#"{"command": "unsubscribe", "topic": ""}"#,
        br#"{"command": "publish", "topic": "t"}"#,
        br#"{"command": "publish", "message": "v"}"#,
    ];
    for payload in cases {
        assert!(matches!(
            decode(Encoding::Json, payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }
}

#[test]
fn test_frame_layout() {
    let frame = encode_frame(2, b"abc").unwrap();
    assert_eq!(&frame[..], &[2, 0, 3, b'a', b'b', b'c']);

    let frame = frame_message(Encoding::Json, &Message::ListTopics).unwrap();
    assert_eq!(frame[0], 0);
    assert_eq!(usize::from(u16::from_be_bytes([frame[1], frame[2]])), frame.len() - 3);
}

#[test]
fn test_frame_payload_bounds() {
    assert!(encode_frame(0, &vec![0u8; MAX_PAYLOAD_LEN]).is_ok());
    assert_eq!(
        encode_frame(0, &vec![0u8; MAX_PAYLOAD_LEN + 1]),
        Err(ProtocolError::FrameTooLarge {
            actual: MAX_PAYLOAD_LEN + 1,
            max: MAX_PAYLOAD_LEN
        })
    );
}

#[test]
fn test_decoder_resumes_across_partial_reads() {
    let wire = encode_frame(1, b"hello").unwrap();
    let mut decoder = FrameDecoder::default();
    let mut buf = BytesMut::new();

    assert_eq!(decoder.state(), ReadState::AwaitingTag);

    buf.put_slice(&wire[..1]);
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    assert_eq!(decoder.state(), ReadState::AwaitingLength { tag: 1 });

    buf.put_slice(&wire[1..2]);
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    assert_eq!(decoder.state(), ReadState::AwaitingLength { tag: 1 });

    buf.put_slice(&wire[2..5]);
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    assert_eq!(decoder.state(), ReadState::AwaitingPayload { tag: 1, len: 5 });
    assert!(decoder.is_mid_frame());

    buf.put_slice(&wire[5..]);
    let frame = decoder.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.tag, 1);
    assert_eq!(&frame.payload[..], b"hello");
    assert_eq!(decoder.state(), ReadState::Complete);
    assert!(!decoder.is_mid_frame());

    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    assert_eq!(decoder.state(), ReadState::AwaitingTag);
}

#[test]
fn test_decoder_splits_back_to_back_frames() {
    let mut buf = BytesMut::new();
    buf.put_slice(&encode_frame(0, b"one").unwrap());
    buf.put_slice(&encode_frame(2, b"").unwrap());
    buf.put_slice(&encode_frame(1, b"three").unwrap());

    let mut decoder = FrameDecoder::default();
    let mut frames = Vec::new();
    while let Some(frame) = decoder.decode(&mut buf).unwrap() {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 3);
    assert_eq!(&frames[0].payload[..], b"one");
    assert_eq!(frames[1].tag, 2);
    assert!(frames[1].payload.is_empty());
    assert_eq!(&frames[2].payload[..], b"three");
    assert!(buf.is_empty());
}

#[test]
fn test_decoder_rejects_frames_over_the_limit() {
    let mut decoder = FrameDecoder::new(4);
    let mut buf = BytesMut::from(&[0u8, 0, 5, 1, 2, 3, 4, 5][..]);
    assert_eq!(
        decoder.decode(&mut buf),
        Err(ProtocolError::FrameTooLarge { actual: 5, max: 4 })
    );
}

#[test]
fn test_json_publishes_carry_any_value() {
    let message = decode(
        Encoding::Json,
        br#"{"command": "publish", "topic": "temp", "message": 21}"#,
    )
    .unwrap();
    assert_eq!(message, Message::publish("temp", 21));

    let message = decode(
        Encoding::Json,
        br#"{"command": "publish", "topic": "temp", "message": {"c": 21.5, "ok": true}}"#,
    )
    .unwrap();
    assert_eq!(message, Message::publish("temp", json!({"c": 21.5, "ok": true})));

    let message = decode(
        Encoding::Json,
        br#"{"command": "publish", "topic": "temp", "message": null}"#,
    )
    .unwrap();
    assert_eq!(message, Message::publish("temp", Value::Null));

    let bytes = encode(Encoding::Json, &Message::publish("temp", json!([1, "two"]))).unwrap();
    assert_eq!(bytes, br#"{"command":"publish","topic":"temp","message":[1,"two"]}"#);
}

#[test]
fn test_xml_marks_non_string_values() {
    let bytes = encode(Encoding::Xml, &Message::publish("t", 21)).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(
        text,
        r#"<message command="publish" topic="t" message="21" type="json"/>"#
    );

    // Without the marker the attribute is plain text.
    let message = decode(
        Encoding::Xml,
        br#"<message command="publish" topic="t" message="21"/>"#,
    )
    .unwrap();
    assert_eq!(message, Message::publish("t", "21"));

    assert!(matches!(
        decode(
            Encoding::Xml,
            br#"<message command="publish" topic="t" message="21" type="yaml"/>"#,
        ),
        Err(ProtocolError::MalformedPayload(_))
    ));
    assert!(matches!(
        decode(
            Encoding::Xml,
            br#"<message command="publish" topic="t" message="{oops" type="json"/>"#,
        ),
        Err(ProtocolError::MalformedPayload(_))
    ));
}
