use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::session::Session;
use crate::telemetry;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;

use super::cursor::Cursor;
use super::eval::{compare_docs, eq_bson, is_operator_doc, matches_filter, path_value, project_fields};
use super::types::{
    FindOptions, MAX_LIMIT, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, ReturnDocument, UpdateReport,
};

pub fn find_docs(col: &Arc<Collection>, filter: &BsonDocument, opts: &FindOptions) -> Cursor {
    telemetry::record_query();
    let needs_projection = opts.projection.is_some();

    if !needs_projection && opts.sort.is_none() {
        let mut ids: Vec<DocumentId> = match plan_index_candidates(col, filter) {
            Some(c) => c,
            None => col.list_ids(),
        };
        ids.retain(|id| col.find_document(id).is_some_and(|d| matches_filter(&d.data, filter)));
        let skip = opts.skip.unwrap_or(0);
        let limit = opts.limit.unwrap_or(usize::MAX).min(MAX_LIMIT);
        let end = skip.saturating_add(limit).min(ids.len());
        let ids = if skip >= ids.len() { Vec::new() } else { ids[skip..end].to_vec() };
        return Cursor { collection: col.clone(), ids, pos: 0, docs: None };
    }

    let mut docs: Vec<Document> = col
        .list_ids()
        .into_iter()
        .filter_map(|id| col.find_document(&id))
        .filter(|d| matches_filter(&d.data, filter))
        .collect();

    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        docs.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    if let Some(fields) = &opts.projection {
        let fields: Vec<String> = fields.iter().take(MAX_PROJECTION_FIELDS).cloned().collect();
        for d in &mut docs {
            d.data = project_fields(&d.data, &fields);
        }
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(usize::MAX).min(MAX_LIMIT);
    let end = skip.saturating_add(limit).min(docs.len());
    let docs = if skip >= docs.len() { Vec::new() } else { docs[skip..end].to_vec() };
    Cursor { collection: col.clone(), ids: Vec::new(), pos: 0, docs: Some(docs) }
}

/// First document matching `filter`, in insertion order.
#[must_use]
pub fn find_one(col: &Arc<Collection>, filter: &BsonDocument) -> Option<Document> {
    telemetry::record_query();
    col.list_ids()
        .into_iter()
        .filter_map(|id| col.find_document(&id))
        .find(|d| matches_filter(&d.data, filter))
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &BsonDocument) -> usize {
    telemetry::record_query();
    let ids = col.list_ids();
    let mut n = 0usize;
    for id in ids {
        if let Some(d) = col.find_document(&id)
            && matches_filter(&d.data, filter)
        {
            n += 1;
        }
    }
    n
}

/// Distinct values of `field` across documents matching `filter`, in first
/// encounter order.
#[must_use]
pub fn distinct_values(col: &Arc<Collection>, field: &str, filter: &BsonDocument) -> Vec<Bson> {
    telemetry::record_query();
    let mut out: Vec<Bson> = Vec::new();
    for id in col.list_ids() {
        if let Some(d) = col.find_document(&id)
            && matches_filter(&d.data, filter)
            && let Some(v) = path_value(&d.data, field)
            && !out.iter().any(|seen| eq_bson(seen, v))
        {
            out.push(v.clone());
        }
    }
    out
}

pub fn update_many(
    col: &Arc<Collection>,
    filter: &BsonDocument,
    update: &BsonDocument,
    session: Option<&Session>,
) -> Result<UpdateReport, DbError> {
    let mut matched = 0u64;
    let mut modified = 0u64;
    let ids: Vec<DocumentId> = col
        .list_ids()
        .into_iter()
        .filter(|id| col.find_document(id).is_some_and(|d| matches_filter(&d.data, filter)))
        .collect();
    for id in ids {
        if let Some(mut doc) = col.find_document(&id) {
            matched += 1;
            let changed = apply_update(&mut doc, update)?;
            col.update_document(&id, doc, session)?;
            if changed {
                modified += 1;
            }
        }
    }
    Ok(UpdateReport { matched, modified })
}

pub fn update_one(
    col: &Arc<Collection>,
    filter: &BsonDocument,
    update: &BsonDocument,
    session: Option<&Session>,
) -> Result<UpdateReport, DbError> {
    if let Some(id) = col
        .list_ids()
        .into_iter()
        .find(|id| col.find_document(id).is_some_and(|d| matches_filter(&d.data, filter)))
        && let Some(mut doc) = col.find_document(&id)
    {
        let changed = apply_update(&mut doc, update)?;
        col.update_document(&id, doc, session)?;
        return Ok(UpdateReport { matched: 1, modified: u64::from(changed) });
    }
    Ok(UpdateReport { matched: 0, modified: 0 })
}

/// Updates the first matching document and returns its pre- or post-image
/// per `ret`; `None` when nothing matched.
pub fn find_one_and_update(
    col: &Arc<Collection>,
    filter: &BsonDocument,
    update: &BsonDocument,
    ret: ReturnDocument,
    session: Option<&Session>,
) -> Result<Option<Document>, DbError> {
    let Some(id) = col
        .list_ids()
        .into_iter()
        .find(|id| col.find_document(id).is_some_and(|d| matches_filter(&d.data, filter)))
    else {
        return Ok(None);
    };
    let Some(mut doc) = col.find_document(&id) else {
        return Ok(None);
    };
    let before = doc.clone();
    apply_update(&mut doc, update)?;
    col.update_document(&id, doc.clone(), session)?;
    Ok(Some(match ret {
        ReturnDocument::Before => before,
        ReturnDocument::After => doc,
    }))
}

/// Applies a `$set`/`$inc`/`$unset` update document in place. Returns
/// whether anything actually changed.
pub fn apply_update(doc: &mut Document, update: &BsonDocument) -> Result<bool, DbError> {
    fn ensure_subdoc<'a>(root: &'a mut BsonDocument, key: &str) -> &'a mut BsonDocument {
        let needs_new = !matches!(root.get(key), Some(Bson::Document(_)));
        if needs_new {
            root.insert(key.to_string(), Bson::Document(BsonDocument::new()));
        }
        match root.get_mut(key) {
            Some(Bson::Document(d)) => d,
            _ => unreachable!(),
        }
    }
    fn traverse_to_parent<'a>(
        root: &'a mut BsonDocument,
        path: &str,
    ) -> (&'a mut BsonDocument, String) {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        let mut last = String::new();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                last = seg.to_string();
                break;
            }
            cur = ensure_subdoc(cur, seg);
        }
        (cur, last)
    }
    fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> bool {
        let (parent, last) = traverse_to_parent(root, path);
        let old = parent.insert(last, value.clone());
        old.as_ref() != Some(&value)
    }
    fn get_path(root: &BsonDocument, path: &str) -> Option<Bson> {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                return cur.get(seg).cloned();
            }
            match cur.get(seg) {
                Some(Bson::Document(d)) => {
                    cur = d;
                }
                _ => return None,
            }
        }
        None
    }
    fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
        let (parent, last) = traverse_to_parent(root, path);
        parent.remove(&last).is_some()
    }
    fn as_f64(v: &Bson) -> f64 {
        match v {
            Bson::Double(f) => *f,
            Bson::Int32(i) => f64::from(*i),
            Bson::Int64(i) => *i as f64,
            Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }
    fn inc_path(root: &mut BsonDocument, path: &str, by: f64) -> bool {
        let cur = get_path(root, path).unwrap_or(Bson::Double(0.0));
        let newv = Bson::Double(as_f64(&cur) + by);
        set_path(root, path, newv)
    }

    let mut changed = false;
    for (op, arg) in update {
        match (op.as_str(), arg) {
            ("$set", Bson::Document(fields)) => {
                for (k, v) in fields {
                    if set_path(&mut doc.data, k, v.clone()) {
                        changed = true;
                    }
                }
            }
            ("$inc", Bson::Document(fields)) => {
                for (k, v) in fields {
                    if inc_path(&mut doc.data, k, as_f64(v)) {
                        changed = true;
                    }
                }
            }
            ("$unset", Bson::Document(fields)) => {
                for (k, _) in fields {
                    if unset_path(&mut doc.data, k) {
                        changed = true;
                    }
                }
            }
            _ => {
                return Err(DbError::QueryError(format!("unsupported update operator: {op}")));
            }
        }
    }
    Ok(changed)
}

/// Candidate ids from a single-field index when the filter carries a plain
/// equality on that field. `None` falls back to a full scan.
fn plan_index_candidates(col: &Arc<Collection>, filter: &BsonDocument) -> Option<Vec<DocumentId>> {
    for (key, cond) in filter {
        if key.starts_with('$') {
            continue;
        }
        match cond {
            Bson::Document(spec) if is_operator_doc(spec) => {}
            literal => {
                let mut mgr = col.indexes.write();
                if let Some(ids) = mgr.single_field_candidates(key, literal) {
                    return Some(ids);
                }
            }
        }
    }
    None
}
