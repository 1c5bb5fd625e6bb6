use crate::query::QueryOptions;
use bson::{Bson, Document as BsonDocument, doc};

use super::DELETED_FLAG;

/// True when the filter pins `isDeleted` to the literal boolean `true` — an
/// explicit request for deleted documents. The check is exact equality on
/// the literal: `{isDeleted: {$ne: false}}` or any other truthy-like
/// expression does not count and still receives the exclusion overlay.
#[must_use]
pub fn pins_deleted(filter: &BsonDocument) -> bool {
    matches!(filter.get(DELETED_FLAG), Some(Bson::Boolean(true)))
}

/// Overlay-merges the soft-delete exclusion into a read/update filter.
/// Every caller condition on other fields is preserved; a caller condition
/// on `isDeleted` other than the literal `true` is overwritten.
#[must_use]
pub fn rewrite_filter(filter: &BsonDocument) -> BsonDocument {
    if pins_deleted(filter) {
        return filter.clone();
    }
    let mut out = filter.clone();
    out.insert(DELETED_FLAG, doc! {"$ne": true});
    out
}

/// Derives a pipeline that excludes soft-deleted documents: `$match` stages
/// get the same overlay as [`rewrite_filter`], and every `$lookup` on a
/// non-nested `localField` is followed by an inserted `$addFields` stage
/// that strips deleted elements from the joined array. Stage order is
/// preserved; stages are only inserted, never removed or reordered. Must be
/// applied exactly once per aggregation execution.
#[must_use]
pub fn rewrite_pipeline(pipeline: &[BsonDocument]) -> Vec<BsonDocument> {
    let mut out = Vec::with_capacity(pipeline.len());
    for stage in pipeline {
        if let Some(Bson::Document(filter)) = stage.get("$match") {
            out.push(doc! {"$match": rewrite_filter(filter)});
            continue;
        }
        out.push(stage.clone());
        if let Some(Bson::Document(spec)) = stage.get("$lookup")
            && let Some(filter_stage) = lookup_filter_stage(spec)
        {
            out.push(filter_stage);
        }
    }
    out
}

/// The post-join filtering stage for one `$lookup`: overwrites the `as`
/// array with only the elements whose `isDeleted` is not `true`, leaving
/// element shape untouched. Lookups whose `localField` traverses a nested
/// path are left alone.
fn lookup_filter_stage(spec: &BsonDocument) -> Option<BsonDocument> {
    let local_field = spec.get_str("localField").ok()?;
    if local_field.contains('.') {
        return None;
    }
    let as_field = spec.get_str("as").ok()?;
    Some(doc! {"$addFields": {as_field: {"$filter": {
        "input": format!("${as_field}"),
        "as": "temp",
        "cond": {"$ne": [format!("$$temp.{DELETED_FLAG}"), true]},
    }}}})
}

/// The per-collection interceptor, composed once at registration with the
/// collection's immutable soft-delete flag. One entry point per operation
/// kind: [`QueryGuard::filter`] for read/update filters,
/// [`QueryGuard::pipeline`] for aggregations.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuard {
    enabled: bool,
}

impl QueryGuard {
    pub(crate) const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rewrites a read/update filter, honoring the per-call bypass flag.
    #[must_use]
    pub fn filter(&self, filter: &BsonDocument, opts: &QueryOptions<'_>) -> BsonDocument {
        if !self.enabled || opts.skip_hook {
            return filter.clone();
        }
        rewrite_filter(filter)
    }

    /// Rewrites an aggregation pipeline. Called once per `aggregate`
    /// invocation by the model entry point.
    #[must_use]
    pub fn pipeline(&self, pipeline: &[BsonDocument]) -> Vec<BsonDocument> {
        if !self.enabled {
            return pipeline.to_vec();
        }
        rewrite_pipeline(pipeline)
    }
}
