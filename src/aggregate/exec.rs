use super::expr::{Vars, eval_expr};
use crate::engine::Engine;
use crate::errors::DbError;
use crate::query::{compare_bson, eq_bson, matches_filter, path_value};
use crate::telemetry;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

/// Executes an aggregation pipeline against `collection`. Stages are
/// single-key tagged documents applied in order; an unsupported or
/// malformed stage fails the whole pipeline.
pub fn run_pipeline(
    engine: &Engine,
    collection: &str,
    pipeline: &[BsonDocument],
) -> Result<Vec<BsonDocument>, DbError> {
    let col = engine
        .get_collection(collection)
        .ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
    telemetry::record_query();
    let mut docs: Vec<BsonDocument> =
        col.get_all_documents().into_iter().map(|d| d.data).collect();
    for stage in pipeline {
        let mut entries = stage.iter();
        let Some((op, spec)) = entries.next() else {
            return Err(DbError::QueryError("empty pipeline stage".into()));
        };
        if entries.next().is_some() {
            return Err(DbError::QueryError(
                "a pipeline stage must contain exactly one operation".into(),
            ));
        }
        docs = match op.as_str() {
            "$match" => {
                let Bson::Document(filter) = spec else {
                    return Err(DbError::QueryError("$match expects a document".into()));
                };
                docs.into_iter().filter(|d| matches_filter(d, filter)).collect()
            }
            "$lookup" => lookup_stage(engine, docs, spec)?,
            "$addFields" | "$set" => add_fields_stage(docs, spec)?,
            "$project" => project_stage(docs, spec)?,
            "$unwind" => unwind_stage(docs, spec)?,
            "$sort" => sort_stage(docs, spec)?,
            "$skip" => {
                let n = stage_usize(spec, "$skip")?;
                if n >= docs.len() { Vec::new() } else { docs.split_off(n) }
            }
            "$limit" => {
                let n = stage_usize(spec, "$limit")?;
                docs.truncate(n);
                docs
            }
            "$count" => count_stage(&docs, spec)?,
            other => {
                return Err(DbError::QueryError(format!("unsupported pipeline stage: {other}")));
            }
        };
    }
    Ok(docs)
}

fn stage_usize(spec: &Bson, stage: &str) -> Result<usize, DbError> {
    let n = match spec {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        _ => return Err(DbError::QueryError(format!("{stage} expects an integer"))),
    };
    usize::try_from(n).map_err(|_| DbError::QueryError(format!("{stage} must be non-negative")))
}

/// Equality join against another collection; joined matches land under the
/// `as` field as an array of full documents. A missing foreign collection
/// joins as empty.
fn lookup_stage(
    engine: &Engine,
    mut docs: Vec<BsonDocument>,
    spec: &Bson,
) -> Result<Vec<BsonDocument>, DbError> {
    let Bson::Document(spec) = spec else {
        return Err(DbError::QueryError("$lookup expects a document".into()));
    };
    let from = lookup_field(spec, "from")?;
    let local_field = lookup_field(spec, "localField")?;
    let foreign_field = lookup_field(spec, "foreignField")?;
    let as_field = lookup_field(spec, "as")?;
    let foreign: Vec<BsonDocument> = engine
        .get_collection(from)
        .map(|c| c.get_all_documents().into_iter().map(|d| d.data).collect())
        .unwrap_or_default();
    for doc in &mut docs {
        let local = path_value(doc, local_field).cloned().unwrap_or(Bson::Null);
        let joined: Vec<Bson> = foreign
            .iter()
            .filter(|f| {
                let fv = path_value(f, foreign_field).cloned().unwrap_or(Bson::Null);
                eq_bson(&fv, &local)
            })
            .map(|f| Bson::Document(f.clone()))
            .collect();
        set_path(doc, as_field, Bson::Array(joined));
    }
    Ok(docs)
}

fn lookup_field<'a>(spec: &'a BsonDocument, key: &str) -> Result<&'a str, DbError> {
    match spec.get(key) {
        Some(Bson::String(s)) => Ok(s),
        _ => Err(DbError::QueryError(format!("$lookup requires a string {key}"))),
    }
}

/// Computes every field against the stage's input document, then merges;
/// expressions never observe siblings added by the same stage.
fn add_fields_stage(
    mut docs: Vec<BsonDocument>,
    spec: &Bson,
) -> Result<Vec<BsonDocument>, DbError> {
    let Bson::Document(fields) = spec else {
        return Err(DbError::QueryError("$addFields expects a document".into()));
    };
    for doc in &mut docs {
        let mut computed = BsonDocument::new();
        for (k, expr) in fields {
            computed.insert(k.clone(), eval_expr(doc, &Vars::new(), expr)?);
        }
        for (k, v) in computed {
            set_path(doc, &k, v);
        }
    }
    Ok(docs)
}

fn is_exclude_spec(v: &Bson) -> bool {
    match v {
        Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0) => true,
        Bson::Double(f) => *f == 0.0,
        _ => false,
    }
}

fn is_include_spec(v: &Bson) -> bool {
    match v {
        Bson::Boolean(true) => true,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => false,
    }
}

fn project_stage(docs: Vec<BsonDocument>, spec: &Bson) -> Result<Vec<BsonDocument>, DbError> {
    let Bson::Document(spec) = spec else {
        return Err(DbError::QueryError("$project expects a document".into()));
    };
    if spec.is_empty() {
        return Err(DbError::QueryError("$project requires at least one field".into()));
    }
    docs.into_iter().map(|d| project_doc(&d, spec)).collect()
}

/// Mongo projection modes: any non-`_id` inclusion or computed field makes
/// the stage inclusive; a pure exclusion spec strips the listed fields.
fn project_doc(doc: &BsonDocument, spec: &BsonDocument) -> Result<BsonDocument, DbError> {
    let inclusive = spec.iter().any(|(k, v)| k != "_id" && !is_exclude_spec(v));
    if inclusive {
        let mut out = BsonDocument::new();
        let id_excluded = spec.get("_id").is_some_and(is_exclude_spec);
        if !id_excluded && let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
        for (k, v) in spec {
            if k == "_id" || is_exclude_spec(v) {
                continue;
            }
            if is_include_spec(v) {
                if let Some(val) = path_value(doc, k) {
                    out.insert(k.clone(), val.clone());
                }
            } else {
                out.insert(k.clone(), eval_expr(doc, &Vars::new(), v)?);
            }
        }
        Ok(out)
    } else {
        let mut out = doc.clone();
        for (k, _) in spec {
            out.remove(k);
        }
        Ok(out)
    }
}

/// One output document per array element; missing and empty arrays drop the
/// document, a non-array value passes through unchanged.
fn unwind_stage(docs: Vec<BsonDocument>, spec: &Bson) -> Result<Vec<BsonDocument>, DbError> {
    let path = match spec {
        Bson::String(s) if s.starts_with('$') => &s[1..],
        Bson::Document(d) => match d.get("path") {
            Some(Bson::String(s)) if s.starts_with('$') => &s[1..],
            _ => return Err(DbError::QueryError("$unwind requires a $-prefixed path".into())),
        },
        _ => return Err(DbError::QueryError("$unwind requires a $-prefixed path".into())),
    };
    let mut out = Vec::new();
    for doc in docs {
        match path_value(&doc, path).cloned() {
            None | Some(Bson::Null) => {}
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut next = doc.clone();
                    set_path(&mut next, path, item);
                    out.push(next);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

fn sort_stage(mut docs: Vec<BsonDocument>, spec: &Bson) -> Result<Vec<BsonDocument>, DbError> {
    let Bson::Document(keys) = spec else {
        return Err(DbError::QueryError("$sort expects a document".into()));
    };
    for (_, dir) in keys {
        if !matches!(dir, Bson::Int32(1 | -1) | Bson::Int64(1 | -1)) {
            return Err(DbError::QueryError("$sort directions must be 1 or -1".into()));
        }
    }
    docs.sort_by(|a, b| {
        for (field, dir) in keys {
            let ord = match (path_value(a, field), path_value(b, field)) {
                (Some(x), Some(y)) => compare_bson(x, y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                let descending = matches!(dir, Bson::Int32(-1) | Bson::Int64(-1));
                return if descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

fn count_stage(docs: &[BsonDocument], spec: &Bson) -> Result<Vec<BsonDocument>, DbError> {
    let Bson::String(name) = spec else {
        return Err(DbError::QueryError("$count expects a field name".into()));
    };
    if name.is_empty() || name.starts_with('$') {
        return Err(DbError::QueryError("$count field name must be a plain string".into()));
    }
    let mut out = BsonDocument::new();
    out.insert(name.clone(), docs.len() as i64);
    Ok(vec![out])
}

/// Writes `value` at a dot-separated path, materializing intermediate
/// documents as needed.
fn set_path(doc: &mut BsonDocument, path: &str, value: Bson) {
    let mut cur = doc;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            cur.insert(seg.to_string(), value);
            return;
        }
        let needs_new = !matches!(cur.get(seg), Some(Bson::Document(_)));
        if needs_new {
            cur.insert(seg.to_string(), Bson::Document(BsonDocument::new()));
        }
        match cur.get_mut(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return,
        }
    }
}
