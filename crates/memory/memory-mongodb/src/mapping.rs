//! Conversion between MemoryRecord and BSON documents.
//!
//! The embedding lives under a configurable field; every other field has a
//! fixed name listed in [`RESERVED_FIELDS`].

use chrono::{DateTime, TimeZone, Utc};
use memory_core::MemoryRecord;
use mongodb::bson::{Bson, Document};

use crate::error::{MongoStoreError, Result};

pub const ID_FIELD: &str = "_id";
pub const IS_REFERENCE_FIELD: &str = "is_reference";
pub const EXTERNAL_SOURCE_NAME_FIELD: &str = "external_source_name";
pub const DESCRIPTION_FIELD: &str = "description";
pub const TEXT_FIELD: &str = "text";
pub const ADDITIONAL_METADATA_FIELD: &str = "additional_metadata";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field names the embedding key may not reuse.
pub const RESERVED_FIELDS: [&str; 7] = [
    ID_FIELD,
    IS_REFERENCE_FIELD,
    EXTERNAL_SOURCE_NAME_FIELD,
    DESCRIPTION_FIELD,
    TEXT_FIELD,
    ADDITIONAL_METADATA_FIELD,
    TIMESTAMP_FIELD,
];

/// Converts a record into the document stored in MongoDB.
/// `_id` is only written when the record has an id.
pub fn record_to_document(record: &MemoryRecord, embedding_key: &str) -> Document {
    let mut document = Document::new();
    if let Some(id) = &record.id {
        document.insert(ID_FIELD, id.as_str());
    }
    document.insert(IS_REFERENCE_FIELD, record.is_reference);
    document.insert(EXTERNAL_SOURCE_NAME_FIELD, optional_string(&record.external_source_name));
    document.insert(DESCRIPTION_FIELD, optional_string(&record.description));
    document.insert(TEXT_FIELD, optional_string(&record.text));
    document.insert(ADDITIONAL_METADATA_FIELD, optional_string(&record.additional_metadata));
    document.insert(
        embedding_key,
        record
            .embedding
            .iter()
            .map(|v| Bson::Double(f64::from(*v)))
            .collect::<Vec<_>>(),
    );
    document.insert(
        TIMESTAMP_FIELD,
        record
            .timestamp
            .map(|ts| Bson::String(ts.to_rfc3339()))
            .unwrap_or(Bson::Null),
    );
    document
}

/// Converts a stored document back into a record.
pub fn document_to_record(document: &Document, embedding_key: &str) -> Result<MemoryRecord> {
    let id = match document.get(ID_FIELD) {
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => return Err(malformed(format!("document has no {} field", ID_FIELD))),
    };

    let embedding = match document.get(embedding_key) {
        Some(Bson::Array(values)) => values
            .iter()
            .map(|value| match value {
                Bson::Double(v) => Ok(*v as f32),
                Bson::Int32(v) => Ok(*v as f32),
                Bson::Int64(v) => Ok(*v as f32),
                other => Err(malformed(format!(
                    "document {} has a non-numeric {} component: {}",
                    id, embedding_key, other
                ))),
            })
            .collect::<Result<Vec<f32>>>()?,
        Some(other) => {
            return Err(malformed(format!(
                "document {} field {} is not an array: {}",
                id, embedding_key, other
            )))
        }
        None => {
            return Err(malformed(format!(
                "document {} has no {} field",
                id, embedding_key
            )))
        }
    };

    let timestamp = match document.get(TIMESTAMP_FIELD) {
        None | Some(Bson::Null) => None,
        Some(Bson::String(s)) => Some(
            DateTime::parse_from_rfc3339(s)
                .map_err(|e| malformed(format!("document {} has invalid timestamp: {}", id, e)))?
                .with_timezone(&Utc),
        ),
        Some(Bson::DateTime(dt)) => Utc.timestamp_millis_opt(dt.timestamp_millis()).single(),
        Some(other) => {
            return Err(malformed(format!(
                "document {} has invalid timestamp: {}",
                id, other
            )))
        }
    };

    Ok(MemoryRecord {
        id: Some(id),
        is_reference: document.get_bool(IS_REFERENCE_FIELD).unwrap_or(false),
        external_source_name: string_field(document, EXTERNAL_SOURCE_NAME_FIELD),
        description: string_field(document, DESCRIPTION_FIELD),
        text: string_field(document, TEXT_FIELD),
        additional_metadata: string_field(document, ADDITIONAL_METADATA_FIELD),
        embedding,
        timestamp,
    })
}

fn optional_string(value: &Option<String>) -> Bson {
    match value {
        Some(s) => Bson::String(s.clone()),
        None => Bson::Null,
    }
}

fn string_field(document: &Document, key: &str) -> Option<String> {
    document.get_str(key).ok().map(str::to_string)
}

fn malformed(message: String) -> MongoStoreError {
    MongoStoreError::MalformedDocument(message)
}
