//! Markup encoding.
//!
//! ```xml
//! <message command="publish" topic="sensors/temp" message="21.5"/>
//! <message command="publish" topic="sensors/temp" message="{&quot;c&quot;:21.5}" type="json"/>
//! <message command="listTopics"><topics><topic>a</topic><topic>b</topic></topics></message>
//! ```
//!
//! Attributes only hold text, so a published value that is not a string is
//! written as JSON text and marked with `type="json"`.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::protocol::ProtocolError;
use crate::protocol::message::{Record, value_from_text, value_to_text};

const ROOT: &str = "message";
const TOPICS: &str = "topics";
const TOPIC: &str = "topic";
const JSON_TYPE: &str = "json";

pub(crate) fn encode(record: &Record) -> Result<Vec<u8>, ProtocolError> {
    let mut writer = Writer::new(Vec::new());

    let mut root = BytesStart::new(ROOT);
    root.push_attribute(("command", record.command.as_str()));
    if let Some(topic) = &record.topic {
        root.push_attribute(("topic", topic.as_str()));
    }
    if let Some(value) = &record.message {
        let (text, is_json) = value_to_text(value)?;
        root.push_attribute(("message", &*text));
        if is_json {
            root.push_attribute(("type", JSON_TYPE));
        }
    }

    let Some(topics) = &record.topics else {
        writer
            .write_event(Event::Empty(root))
            .map_err(ProtocolError::encode)?;
        return Ok(writer.into_inner());
    };

    writer
        .write_event(Event::Start(root))
        .map_err(ProtocolError::encode)?;
    writer
        .write_event(Event::Start(BytesStart::new(TOPICS)))
        .map_err(ProtocolError::encode)?;
    for topic in topics {
        writer
            .write_event(Event::Start(BytesStart::new(TOPIC)))
            .map_err(ProtocolError::encode)?;
        writer
            .write_event(Event::Text(BytesText::new(topic)))
            .map_err(ProtocolError::encode)?;
        writer
            .write_event(Event::End(BytesEnd::new(TOPIC)))
            .map_err(ProtocolError::encode)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(TOPICS)))
        .map_err(ProtocolError::encode)?;
    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(ProtocolError::encode)?;

    Ok(writer.into_inner())
}

pub(crate) fn decode(payload: &[u8]) -> Result<Record, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(ProtocolError::malformed)?;
    let mut reader = Reader::from_str(text);

    let mut record: Option<Record> = None;
    let mut topics: Option<Vec<String>> = None;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(ProtocolError::malformed)? {
            Event::Start(element) => match element.name().as_ref() {
                b"message" if record.is_none() => record = Some(root_record(&element)?),
                b"topics" if record.is_some() && topics.is_none() => topics = Some(Vec::new()),
                b"topic" if topics.is_some() && current.is_none() => current = Some(String::new()),
                other => return Err(unexpected_element(other)),
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"message" if record.is_none() => record = Some(root_record(&element)?),
                b"topics" if record.is_some() && topics.is_none() => topics = Some(Vec::new()),
                b"topic" if current.is_none() => match topics.as_mut() {
                    Some(list) => list.push(String::new()),
                    None => return Err(unexpected_element(b"topic")),
                },
                other => return Err(unexpected_element(other)),
            },
            Event::Text(content) => {
                if let Some(name) = current.as_mut() {
                    name.push_str(&content.unescape().map_err(ProtocolError::malformed)?);
                }
            }
            Event::CData(content) => {
                if let Some(name) = current.as_mut() {
                    let raw = content.into_inner();
                    name.push_str(std::str::from_utf8(&raw).map_err(ProtocolError::malformed)?);
                }
            }
            Event::End(element) => {
                if element.name().as_ref() == TOPIC.as_bytes() {
                    if let (Some(name), Some(list)) = (current.take(), topics.as_mut()) {
                        list.push(name);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut record =
        record.ok_or_else(|| ProtocolError::MalformedPayload("missing <message> element".into()))?;
    record.topics = topics;
    Ok(record)
}

fn root_record(element: &BytesStart<'_>) -> Result<Record, ProtocolError> {
    let mut command = None;
    let mut message = None;
    let mut value_type = None;
    let mut record = Record::default();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(ProtocolError::malformed)?;
        let value = attribute
            .unescape_value()
            .map_err(ProtocolError::malformed)?
            .into_owned();
        match attribute.key.as_ref() {
            b"command" => command = Some(value),
            b"topic" => record.topic = Some(value),
            b"message" => message = Some(value),
            b"type" => value_type = Some(value),
            _ => {}
        }
    }

    let is_json = match value_type.as_deref() {
        None => false,
        Some(JSON_TYPE) => true,
        Some(other) => {
            return Err(ProtocolError::MalformedPayload(format!(
                "unknown value type {other:?}"
            )));
        }
    };
    record.message = message
        .map(|text| value_from_text(text, is_json))
        .transpose()?;

    record.command = command
        .ok_or_else(|| ProtocolError::MalformedPayload("missing command attribute".into()))?;
    Ok(record)
}

fn unexpected_element(name: &[u8]) -> ProtocolError {
    ProtocolError::MalformedPayload(format!(
        "unexpected element <{}>",
        String::from_utf8_lossy(name)
    ))
}
