use crate::types::DocumentId;
use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

/// A stored record: a BSON payload plus its store-assigned id. The id is
/// mirrored into the payload under `_id` so filters and `$lookup` joins can
/// reference it like any other field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
}

impl Document {
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self::with_id(DocumentId::new(), data)
    }

    #[must_use]
    pub fn with_id(id: DocumentId, mut data: BsonDocument) -> Self {
        if !data.contains_key("_id") {
            data.insert("_id", id.0.to_string());
        }
        Self { id, data }
    }
}
