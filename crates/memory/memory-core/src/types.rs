//! # Core Types
//!
//! This module defines the record type stored by memory stores.
//!
//! ## MemoryRecord
//!
//! One stored item: an embedding plus the payload carried alongside it.
//! A record is either *local* (the text lives in the store) or a *reference*
//! (it points at an item held by an external source).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item held by a memory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Unique identifier within a collection. `None` until the store assigns one.
    pub id: Option<String>,
    /// True when the record refers to an item kept in an external source
    pub is_reference: bool,
    /// Name of the external source, for reference records
    pub external_source_name: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// The stored text
    pub text: Option<String>,
    /// Opaque metadata string (often JSON) owned by the caller
    pub additional_metadata: Option<String>,
    /// Vector embedding; its length must match the store's vector size
    pub embedding: Vec<f32>,
    /// When the record was created or last written
    pub timestamp: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Creates a record with no id; the store generates one on upsert.
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: None,
            is_reference: false,
            external_source_name: None,
            description: None,
            text: Some(text.into()),
            additional_metadata: None,
            embedding,
            timestamp: None,
        }
    }

    /// Creates a local record whose text is stored with the embedding.
    pub fn local_record(
        id: impl Into<String>,
        text: impl Into<String>,
        description: Option<String>,
        additional_metadata: Option<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            is_reference: false,
            external_source_name: None,
            description,
            text: Some(text.into()),
            additional_metadata,
            embedding,
            timestamp: None,
        }
    }

    /// Creates a reference record pointing at `external_id` in `source_name`.
    pub fn reference_record(
        external_id: impl Into<String>,
        source_name: impl Into<String>,
        description: Option<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Some(external_id.into()),
            is_reference: true,
            external_source_name: Some(source_name.into()),
            description,
            text: None,
            additional_metadata: None,
            embedding,
            timestamp: None,
        }
    }

    /// Sets the record timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
