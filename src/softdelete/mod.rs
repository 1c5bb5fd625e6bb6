//! Logical deletion: schemas opt in at definition time, and from then on
//! every read, update and aggregation against the collection is rewritten to
//! exclude marked documents unless the caller asks otherwise.

mod model;
mod rewrite;
mod schema;

pub use model::{
    DeleteOptions, DeleteOutcome, Model, RestoreOptions, RestoreOutcome, SoftDeletable,
};
pub use rewrite::{QueryGuard, pins_deleted, rewrite_filter, rewrite_pipeline};
pub use schema::{Schema, SchemaOptions, append_soft_delete_index_fields};

/// Discriminator field marking a document as logically removed. Absent reads
/// as false.
pub const DELETED_FLAG: &str = "isDeleted";

/// Deletion timestamp; null while a document is live.
pub const DELETED_AT: &str = "deletedAt";

/// Creation timestamp stamped by [`Model::create`]; a restore refreshes it so
/// downstream consumers see the restoration as a fresh creation event.
pub const CREATED_AT: &str = "createdAt";
