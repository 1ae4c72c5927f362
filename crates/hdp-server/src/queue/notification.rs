//! Storage-change notification envelope
//!
//! S3 delivers object-created events to SQS as a JSON envelope with a
//! `Records` list; each record names the bucket and the URL-encoded object
//! key. Test events and other envelopes without `Records` decode to an
//! empty list and are simply acknowledged.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EventNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Parse a notification body into `(bucket, decoded key)` pairs.
pub fn parse_notification(body: &str) -> Result<Vec<(String, String)>, String> {
    let notification: EventNotification =
        serde_json::from_str(body).map_err(|e| format!("malformed notification body: {}", e))?;

    notification
        .records
        .into_iter()
        .map(|record| {
            let key = decode_object_key(&record.s3.object.key)?;
            Ok((record.s3.bucket.name, key))
        })
        .collect()
}

/// Decode a URL-encoded object key.
///
/// S3 form-encodes keys in event payloads, so `+` means a space and must be
/// rewritten before percent-decoding.
fn decode_object_key(key: &str) -> Result<String, String> {
    let with_spaces = key.replace('+', " ");
    urlencoding::decode(&with_spaces)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| format!("object key is not valid UTF-8 after decoding: {}", e))
}
