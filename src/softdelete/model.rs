use crate::collection::Collection;
use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::query::{self, FindOptions, QueryOptions, ReturnDocument, UpdateReport};
use crate::session::Session;
use bson::{Bson, Document as BsonDocument, doc};
use std::sync::Arc;

use super::rewrite::QueryGuard;
use super::{CREATED_AT, DELETED_AT, DELETED_FLAG};

/// Options for the soft-delete statics. `new_doc` selects the
/// document-result shape over the count/pre-image default.
#[derive(Clone, Copy, Default)]
pub struct DeleteOptions<'s> {
    pub session: Option<&'s Session>,
    pub new_doc: bool,
}

#[derive(Clone, Copy, Default)]
pub struct RestoreOptions<'s> {
    pub session: Option<&'s Session>,
}

/// What `soft_delete` returns: the modified count, or, when `new_doc` was
/// requested, the freshly deleted documents themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Count(u64),
    Documents(Vec<Document>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored: u64,
}

/// The capability a soft-delete-enabled collection exposes beyond plain
/// reads and updates. Every operation fails with a configuration error on a
/// collection registered without `soft_delete`.
pub trait SoftDeletable {
    /// Marks every document matching `filter` as deleted, stamping
    /// `deletedAt`. The filter passes through read interception first, so
    /// already-deleted documents are not re-matched unless explicitly
    /// targeted.
    fn soft_delete(
        &self,
        filter: &BsonDocument,
        opts: &DeleteOptions<'_>,
    ) -> Result<DeleteOutcome, DbError>;

    /// Atomically moves one matching document to the deleted state and
    /// returns its pre-image, or the post-image with `new_doc`.
    fn find_one_and_soft_delete(
        &self,
        filter: &BsonDocument,
        opts: &DeleteOptions<'_>,
    ) -> Result<Option<Document>, DbError>;

    /// Brings documents matching `filter` back from the deleted state,
    /// clearing `deletedAt` and refreshing `createdAt` so consumers see the
    /// restore as a fresh creation event.
    fn restore(
        &self,
        filter: &BsonDocument,
        opts: &RestoreOptions<'_>,
    ) -> Result<RestoreOutcome, DbError>;

    /// Documents matching `filter` among the deleted.
    fn find_deleted(&self, filter: &BsonDocument) -> Result<Vec<Document>, DbError>;
}

/// A live handle to one registered collection: every read, update and
/// aggregation goes through the collection's [`QueryGuard`] before it
/// reaches the store.
pub struct Model {
    engine: Arc<Engine>,
    collection: Arc<Collection>,
    guard: QueryGuard,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").finish_non_exhaustive()
    }
}

impl Model {
    pub(crate) fn new(engine: Arc<Engine>, collection: Arc<Collection>, guard: QueryGuard) -> Self {
        Self { engine, collection, guard }
    }

    /// The underlying collection handle, for store-level access that
    /// deliberately sidesteps interception.
    #[must_use]
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    #[must_use]
    pub fn guard(&self) -> &QueryGuard {
        &self.guard
    }

    /// Inserts a new document. On a soft-delete-enabled collection the
    /// soft-delete defaults are materialized (`isDeleted: false`,
    /// `deletedAt: null`) and `createdAt` is stamped.
    pub fn create(
        &self,
        mut data: BsonDocument,
        session: Option<&Session>,
    ) -> Result<Document, DbError> {
        if !data.contains_key(CREATED_AT) {
            data.insert(CREATED_AT, bson::DateTime::now());
        }
        if self.guard.is_enabled() {
            if !data.contains_key(DELETED_FLAG) {
                data.insert(DELETED_FLAG, false);
            }
            if !data.contains_key(DELETED_AT) {
                data.insert(DELETED_AT, Bson::Null);
            }
        }
        let document = Document::new(data);
        let id = self.collection.insert_document(document, session)?;
        self.collection
            .find_document(&id)
            .ok_or_else(|| DbError::QueryError("inserted document vanished".into()))
    }

    pub fn find(
        &self,
        filter: &BsonDocument,
        find_opts: &FindOptions,
        opts: &QueryOptions<'_>,
    ) -> Vec<Document> {
        let filter = self.guard.filter(filter, opts);
        query::find_docs(&self.collection, &filter, find_opts).to_vec()
    }

    #[must_use]
    pub fn find_one(&self, filter: &BsonDocument, opts: &QueryOptions<'_>) -> Option<Document> {
        let filter = self.guard.filter(filter, opts);
        query::find_one(&self.collection, &filter)
    }

    #[must_use]
    pub fn count(&self, filter: &BsonDocument, opts: &QueryOptions<'_>) -> usize {
        let filter = self.guard.filter(filter, opts);
        query::count_docs(&self.collection, &filter)
    }

    #[must_use]
    pub fn distinct(
        &self,
        field: &str,
        filter: &BsonDocument,
        opts: &QueryOptions<'_>,
    ) -> Vec<Bson> {
        let filter = self.guard.filter(filter, opts);
        query::distinct_values(&self.collection, field, &filter)
    }

    pub fn update_many(
        &self,
        filter: &BsonDocument,
        update: &BsonDocument,
        opts: &QueryOptions<'_>,
    ) -> Result<UpdateReport, DbError> {
        let filter = self.guard.filter(filter, opts);
        query::update_many(&self.collection, &filter, update, opts.session)
    }

    pub fn update_one(
        &self,
        filter: &BsonDocument,
        update: &BsonDocument,
        opts: &QueryOptions<'_>,
    ) -> Result<UpdateReport, DbError> {
        let filter = self.guard.filter(filter, opts);
        query::update_one(&self.collection, &filter, update, opts.session)
    }

    pub fn find_one_and_update(
        &self,
        filter: &BsonDocument,
        update: &BsonDocument,
        ret: ReturnDocument,
        opts: &QueryOptions<'_>,
    ) -> Result<Option<Document>, DbError> {
        let filter = self.guard.filter(filter, opts);
        query::find_one_and_update(&self.collection, &filter, update, ret, opts.session)
    }

    /// Runs an aggregation pipeline through the guard's pipeline rewrite.
    /// The rewrite happens exactly once per call, here.
    pub fn aggregate(&self, pipeline: &[BsonDocument]) -> Result<Vec<BsonDocument>, DbError> {
        let pipeline = self.guard.pipeline(pipeline);
        crate::aggregate::run_pipeline(&self.engine, &self.collection.name_str(), &pipeline)
    }

    fn ensure_soft_delete(&self, operation: &str) -> Result<(), DbError> {
        if self.guard.is_enabled() {
            Ok(())
        } else {
            Err(DbError::Configuration(format!(
                "{operation} requires a soft-delete-enabled collection: {}",
                self.collection.name_str()
            )))
        }
    }
}

/// Re-raises a store failure across the soft-delete boundary, keeping the
/// original category label and message only.
fn store_err(err: DbError) -> DbError {
    match err {
        already @ DbError::StoreOperation { .. } => already,
        other => DbError::StoreOperation {
            category: other.category().to_string(),
            message: other.to_string(),
        },
    }
}

impl SoftDeletable for Model {
    fn soft_delete(
        &self,
        filter: &BsonDocument,
        opts: &DeleteOptions<'_>,
    ) -> Result<DeleteOutcome, DbError> {
        self.ensure_soft_delete("softDelete")?;
        let now = bson::DateTime::now();
        let query_opts = QueryOptions { skip_hook: false, session: opts.session };
        let target = self.guard.filter(filter, &query_opts);
        let update = doc! {"$set": {DELETED_FLAG: true, DELETED_AT: now}};
        let report = query::update_many(&self.collection, &target, &update, opts.session)
            .map_err(store_err)?;
        log::debug!(
            "soft delete on {}: {} matched, {} marked",
            self.collection.name_str(),
            report.matched,
            report.modified
        );
        if !opts.new_doc {
            return Ok(DeleteOutcome::Count(report.modified));
        }
        // Correlate precisely: same filter, now-deleted, with the deletedAt
        // value this very call stamped.
        let mut correlate = filter.clone();
        correlate.insert(DELETED_FLAG, true);
        correlate.insert(DELETED_AT, now);
        let docs = query::find_docs(&self.collection, &correlate, &FindOptions::default()).to_vec();
        Ok(DeleteOutcome::Documents(docs))
    }

    fn find_one_and_soft_delete(
        &self,
        filter: &BsonDocument,
        opts: &DeleteOptions<'_>,
    ) -> Result<Option<Document>, DbError> {
        self.ensure_soft_delete("findOneAndSoftDelete")?;
        let query_opts = QueryOptions { skip_hook: false, session: opts.session };
        let target = self.guard.filter(filter, &query_opts);
        let update = doc! {"$set": {DELETED_FLAG: true, DELETED_AT: bson::DateTime::now()}};
        let ret = if opts.new_doc { ReturnDocument::After } else { ReturnDocument::Before };
        query::find_one_and_update(&self.collection, &target, &update, ret, opts.session)
            .map_err(store_err)
    }

    fn restore(
        &self,
        filter: &BsonDocument,
        opts: &RestoreOptions<'_>,
    ) -> Result<RestoreOutcome, DbError> {
        self.ensure_soft_delete("restore")?;
        // The targets are deleted by definition; pin the flag instead of
        // going through the default exclusion.
        let mut target = filter.clone();
        target.insert(DELETED_FLAG, true);
        let update = doc! {"$set": {
            DELETED_FLAG: false,
            DELETED_AT: Bson::Null,
            CREATED_AT: bson::DateTime::now(),
        }};
        let report = query::update_many(&self.collection, &target, &update, opts.session)
            .map_err(store_err)?;
        log::debug!("restore on {}: {} restored", self.collection.name_str(), report.modified);
        Ok(RestoreOutcome { restored: report.modified })
    }

    fn find_deleted(&self, filter: &BsonDocument) -> Result<Vec<Document>, DbError> {
        self.ensure_soft_delete("findDeleted")?;
        let mut target = filter.clone();
        target.insert(DELETED_FLAG, true);
        Ok(query::find_docs(&self.collection, &target, &FindOptions::default()).to_vec())
    }
}
