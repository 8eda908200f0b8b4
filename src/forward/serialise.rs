//! MessagePack serialisation of forwarded events.
//!
//! Each event is written as a three element array `[tag, time, record]`.
//! Encoded events are self-delimiting, so several can be concatenated into a
//! single payload and the collector will split them again.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value::{Record, RecordValue};

/// A single event ready for encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub tag: String,
    /// Seconds since the UNIX epoch.
    pub time: i64,
    pub record: RecordValue,
}

impl Event {
    /// Create an event stamped with `time`.
    pub fn new(
        tag: impl Into<String>,
        record: impl Into<RecordValue>,
        time: DateTime<Utc>,
    ) -> Self {
        Self::at_epoch(tag, record, time.timestamp())
    }

    /// Create an event stamped with raw epoch seconds.
    pub fn at_epoch(tag: impl Into<String>, record: impl Into<RecordValue>, time: i64) -> Self {
        Self {
            tag: tag.into(),
            time,
            record: record.into(),
        }
    }

    /// Create an event stamped with the current time.
    pub fn now(tag: impl Into<String>, record: impl Into<RecordValue>) -> Self {
        Self::new(tag, record, Utc::now())
    }
}

/// Errors raised when an event cannot be encoded at all.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The record holds a NaN or infinite float, which has no portable form.
    #[error("non-finite float {0} has no portable representation")]
    NonFiniteFloat(f64),
    #[error(transparent)]
    Msgpack(#[from] rmp_serde::encode::Error),
}

/// Serialise one event into a MessagePack payload.
pub fn encode_event(tag: &str, time: i64, record: &RecordValue) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(64);
    encode_into(&mut buf, tag, time, record)?;
    Ok(buf)
}

/// Serialise several events into one concatenated payload.
///
/// Fails as a whole if any single event cannot be encoded.
pub fn encode_batch(events: &[Event]) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(events.len().saturating_mul(64));
    for event in events {
        encode_into(&mut buf, &event.tag, event.time, &event.record)?;
    }
    Ok(buf)
}

/// Append one encoded event to `buf`.
///
/// The native encoding is tried first. If it fails (the record carries
/// opaque values or non-finite floats) any partial output is discarded and
/// the record is re-encoded with its opaque values replaced by text. On error
/// `buf` is left as it was.
pub(crate) fn encode_into(
    buf: &mut Vec<u8>,
    tag: &str,
    time: i64,
    record: &RecordValue,
) -> Result<(), EncodeError> {
    let start = buf.len();
    if rmp_serde::encode::write(buf, &(tag, time, record)).is_ok() {
        return Ok(());
    }
    buf.truncate(start);
    let portable = to_portable(record)?;
    if let Err(err) = rmp_serde::encode::write(buf, &(tag, time, &portable)) {
        buf.truncate(start);
        return Err(err.into());
    }
    Ok(())
}

/// Replace every opaque value with its canonical text.
///
/// All other values, binary blobs included, are kept as they are so they
/// still encode natively. Non-finite floats cannot be expressed and abort the
/// conversion.
pub fn to_portable(value: &RecordValue) -> Result<RecordValue, EncodeError> {
    Ok(match value {
        RecordValue::Float(v) if !v.is_finite() => return Err(EncodeError::NonFiniteFloat(*v)),
        RecordValue::Array(items) => {
            RecordValue::Array(items.iter().map(to_portable).collect::<Result<_, _>>()?)
        }
        RecordValue::Map(map) => {
            let mut out = Record::new();
            for (key, item) in map {
                out.insert(key.clone(), to_portable(item)?);
            }
            RecordValue::Map(out)
        }
        RecordValue::Opaque(opaque) => RecordValue::Str(opaque.to_text()),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde::Deserialize;

    type Decoded = (String, i64, serde_json::Value);

    fn decode_all(payload: &[u8]) -> Vec<Decoded> {
        let mut de = rmp_serde::Deserializer::new(payload);
        let mut out = Vec::new();
        while let Ok(event) = Decoded::deserialize(&mut de) {
            out.push(event);
        }
        out
    }

    #[rstest]
    fn encodes_tag_time_and_record_as_array() {
        let payload = encode_event("app.tag", 1_220_263_500, &record! { "a" => "b" })
            .expect("encode event");
        assert_eq!(payload[0], 0x93, "payload must start with a fixarray of 3");
        let events = decode_all(&payload);
        assert_eq!(
            events,
            vec![(
                "app.tag".to_string(),
                1_220_263_500,
                serde_json::json!({ "a": "b" })
            )]
        );
    }

    #[rstest]
    fn batch_concatenates_events_in_order() {
        let first = Utc.with_ymd_and_hms(2008, 9, 1, 10, 5, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2008, 9, 1, 10, 6, 0).unwrap();
        let events = vec![
            Event::new("tag1", "message 1", first),
            Event::new("tag2", "message 2", second),
        ];
        let payload = encode_batch(&events).expect("encode batch");
        let decoded = decode_all(&payload);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, "tag1");
        assert_eq!(decoded[0].1, 1_220_263_500);
        assert_eq!(decoded[0].2, serde_json::json!("message 1"));
        assert_eq!(decoded[1].1, 1_220_263_560);
    }

    #[rstest]
    fn batch_matches_concatenated_single_encodings() {
        let events: Vec<Event> = (0i64..5)
            .map(|i| Event::at_epoch("t", record! { "i" => i }, 1_000 + i))
            .collect();
        let mut singles = Vec::new();
        for event in &events {
            singles.extend(encode_event(&event.tag, event.time, &event.record).unwrap());
        }
        assert_eq!(encode_batch(&events).unwrap(), singles);
    }

    #[rstest]
    fn opaque_values_fall_back_to_text() {
        #[derive(Debug)]
        struct Handle;
        let ts = Utc.with_ymd_and_hms(2008, 9, 1, 10, 5, 0).unwrap();
        let record = record! {
            "time" => ts,
            "object" => RecordValue::opaque(&Handle),
            "count" => 2,
        };
        let payload = encode_event("tag", 0, &record).expect("fallback encoding");
        let decoded = decode_all(&payload);
        let body = &decoded[0].2;
        assert_eq!(body["time"], "2008-09-01 10:05:00 UTC");
        assert_eq!(body["object"], "Handle");
        assert_eq!(body["count"], 2);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn non_finite_floats_defeat_the_fallback(#[case] bad: f64) {
        let record = record! { "object" => RecordValue::opaque(&1), "bad" => bad };
        let err = encode_event("tag", 0, &record).expect_err("must fail");
        assert!(matches!(err, EncodeError::NonFiniteFloat(_)));

        let plain = record! { "bad" => bad };
        let err = encode_event("tag", 0, &plain).expect_err("must fail without opaque values");
        assert!(matches!(err, EncodeError::NonFiniteFloat(_)));
    }

    #[rstest]
    fn failed_batch_leaves_no_partial_output() {
        let mut buf = b"prefix".to_vec();
        let record = record! { "t" => RecordValue::opaque(&0), "n" => f64::NAN };
        assert!(encode_into(&mut buf, "tag", 0, &record).is_err());
        assert_eq!(buf, b"prefix".to_vec());
    }

    #[rstest]
    fn portable_form_only_replaces_opaque_values() {
        let ts = Utc.with_ymd_and_hms(2008, 9, 1, 10, 5, 0).unwrap();
        let record = record! {
            "blob" => RecordValue::binary(vec![0xff, 0xfe, 0x00, 0x80]),
            "nested" => vec![RecordValue::from(ts), RecordValue::from(1.5)],
        };
        let expected = record! {
            "blob" => RecordValue::binary(vec![0xff, 0xfe, 0x00, 0x80]),
            "nested" => vec![
                RecordValue::from("2008-09-01 10:05:00 UTC"),
                RecordValue::from(1.5),
            ],
        };
        assert_eq!(to_portable(&record).unwrap(), expected);
    }

    #[rstest]
    fn binary_survives_the_fallback_as_msgpack_bin() {
        let ts = Utc.with_ymd_and_hms(2008, 9, 1, 10, 5, 0).unwrap();
        let record = record! {
            "blob" => RecordValue::binary(vec![0xff, 0xfe, 0x00, 0x80]),
            "at" => ts,
        };
        let payload = encode_event("tag", 0, &record).expect("fallback encoding");
        // bin 8 marker, length, then the raw bytes
        let bin = [0xc4, 0x04, 0xff, 0xfe, 0x00, 0x80];
        assert!(payload.windows(bin.len()).any(|w| w == bin));
        let text = b"2008-09-01 10:05:00 UTC";
        assert!(payload.windows(text.len()).any(|w| w == text));
    }
}
