//! TombLite: an embedded, in-memory BSON document store with logical
//! (soft) deletion built in. Collections registered with `soft_delete`
//! never lose data to a delete call: documents are marked
//! (`isDeleted`/`deletedAt`) and every read, update and aggregation is
//! rewritten to exclude the marked ones unless the caller opts out.

pub mod aggregate;
pub mod collection;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod session;
pub mod softdelete;
pub mod telemetry;
pub mod types;

use crate::collection::Collection;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::session::Session;
use crate::softdelete::{Model, QueryGuard, Schema};
use bson::Document as BsonDocument;
use std::sync::Arc;

pub use crate::document::Document;
pub use crate::index::IndexOptions;
pub use crate::query::{FindOptions, QueryOptions, ReturnDocument};
pub use crate::softdelete::{
    DeleteOptions, DeleteOutcome, RestoreOptions, RestoreOutcome, SchemaOptions, SoftDeletable,
};
pub use crate::types::DocumentId;

/// The main database struct: a collection registry plus the schema
/// registration entry point that wires soft-delete interception in.
#[derive(Default)]
pub struct Database {
    engine: Arc<Engine>,
}

impl Database {
    /// Creates a new in-memory database instance.
    #[must_use]
    pub fn new() -> Self {
        Self { engine: Arc::new(Engine::new()) }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Registers a schema: creates (or reuses) the collection, builds its
    /// declared indexes, and returns the model handle whose guard carries
    /// the schema's soft-delete setting. Soft-delete-enabled collections
    /// additionally get a single-field index on `isDeleted`, since every
    /// default read filters on it.
    pub fn register(&self, schema: &Schema) -> Result<Model, DbError> {
        let col = self.engine.create_collection_with(schema.name(), schema.is_soft_delete())?;
        if schema.is_soft_delete() {
            col.create_index(&[softdelete::DELETED_FLAG], IndexOptions::default())?;
        }
        for spec in schema.declared_indexes() {
            let fields: Vec<&str> = spec.fields.iter().map(String::as_str).collect();
            col.create_index(&fields, spec.options)?;
        }
        log::info!(
            "registered collection {} (soft_delete={})",
            schema.name(),
            schema.is_soft_delete()
        );
        Ok(Model::new(self.engine.clone(), col, QueryGuard::new(schema.is_soft_delete())))
    }

    /// Creates a plain (hard-delete) collection without going through a
    /// schema.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.engine.create_collection(name)
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    /// Opens a transaction handle. The store is a transaction participant
    /// only: commit/abort stay with the caller.
    #[must_use]
    pub fn start_session(&self) -> Session {
        self.engine.start_session()
    }

    /// Runs a pipeline directly against a collection, without soft-delete
    /// rewriting. Model handles rewrite through [`Model::aggregate`].
    pub fn aggregate(
        &self,
        collection: &str,
        pipeline: &[BsonDocument],
    ) -> Result<Vec<BsonDocument>, DbError> {
        aggregate::run_pipeline(&self.engine, collection, pipeline)
    }

    pub fn drop_collection(&self, name: &str) -> bool {
        self.engine.delete_collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        self.engine.rename_collection(old, new)
    }
}

/// One-time process setup: logging from `TOMBLITE_LOG_*` environment
/// variables. Call before any other operation; calling it twice is
/// harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::configure_from_env()
}
