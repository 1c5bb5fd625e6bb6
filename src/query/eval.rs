use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{MAX_IN_SET, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, SortSpec};

/// Evaluates a Mongo-style condition document against a BSON document.
/// Top-level entries are ANDed together; `$and`/`$or` take arrays of
/// sub-filters; every other key names a field path paired with either a
/// literal (implicit equality) or an operator sub-document.
pub fn matches_filter(doc: &BsonDocument, filter: &BsonDocument) -> bool {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => match cond {
                Bson::Array(subs) => subs.iter().all(|s| match s {
                    Bson::Document(d) => matches_filter(doc, d),
                    _ => false,
                }),
                _ => false,
            },
            "$or" => match cond {
                Bson::Array(subs) => subs.iter().any(|s| match s {
                    Bson::Document(d) => matches_filter(doc, d),
                    _ => false,
                }),
                _ => false,
            },
            _ => field_matches(doc, key, cond),
        };
        if !ok {
            return false;
        }
    }
    true
}

fn field_matches(doc: &BsonDocument, path: &str, cond: &Bson) -> bool {
    let value = path_value(doc, path);
    match cond {
        Bson::Document(spec) if is_operator_doc(spec) => {
            spec.iter().all(|(op, arg)| operator_matches(value, op, arg))
        }
        literal => literal_matches(value, literal),
    }
}

/// A sub-document whose first key starts with `$` is an operator spec, not
/// an equality literal.
pub(crate) fn is_operator_doc(spec: &BsonDocument) -> bool {
    spec.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Equality against a missing field: only a `null` literal matches.
fn literal_matches(value: Option<&Bson>, literal: &Bson) -> bool {
    match value {
        None => matches!(literal, Bson::Null),
        Some(v) => eq_bson(v, literal),
    }
}

fn operator_matches(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$eq" => literal_matches(value, arg),
        "$ne" => !literal_matches(value, arg),
        "$gt" => value.is_some_and(|v| compare_bson(v, arg) == Ordering::Greater),
        "$gte" => value
            .is_some_and(|v| matches!(compare_bson(v, arg), Ordering::Greater | Ordering::Equal)),
        "$lt" => value.is_some_and(|v| compare_bson(v, arg) == Ordering::Less),
        "$lte" => {
            value.is_some_and(|v| matches!(compare_bson(v, arg), Ordering::Less | Ordering::Equal))
        }
        "$in" => match arg {
            Bson::Array(set) => in_set(value, set),
            _ => false,
        },
        "$nin" => match arg {
            Bson::Array(set) => !in_set(value, set),
            _ => false,
        },
        "$exists" => {
            let want = matches!(arg, Bson::Boolean(true));
            value.is_some() == want
        }
        #[cfg(feature = "regex")]
        "$regex" => {
            if let (Some(Bson::String(s)), Bson::String(pattern)) = (value, arg) {
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(s))
            } else {
                false
            }
        }
        // `$options` rides along with `$regex`; flags go inline in the
        // pattern instead, e.g. `(?i)`.
        "$options" => true,
        // Unknown operators match nothing.
        _ => false,
    }
}

/// `$in` with a `null` member also matches documents missing the field.
fn in_set(value: Option<&Bson>, set: &[Bson]) -> bool {
    let set = &set[..set.len().min(MAX_IN_SET)];
    match value {
        None => set.iter().any(|x| matches!(x, Bson::Null)),
        Some(v) => set.iter().any(|x| eq_bson(v, x)),
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let va = path_value(a, &s.field);
        let vb = path_value(b, &s.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if matches!(s.order, Order::Asc) { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Resolves a dot-separated path, descending through nested documents.
pub(crate) fn path_value<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut segs = path.split('.');
    let mut cur = doc.get(segs.next()?)?;
    let mut depth = 1usize;
    for part in segs {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Equality with Mongo's numeric-type erasure: ints and doubles compare by
/// value, everything else by strict BSON equality.
#[must_use]
pub fn eq_bson(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (T::String(x), T::String(y)) => x.cmp(y),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::Null => 0,
        T::Boolean(_) => 1,
        T::Int32(_) => 2,
        T::Int64(_) => 3,
        T::Double(_) => 4,
        T::String(_) => 5,
        T::Array(_) => 6,
        T::Document(_) => 7,
        T::Binary(_) => 8,
        T::ObjectId(_) => 9,
        T::DateTime(_) => 10,
        T::RegularExpression(_) => 11,
        T::Timestamp(_) => 12,
        T::Symbol(_) => 13,
        T::Decimal128(_) => 14,
        T::Undefined => 15,
        T::DbPointer(_) => 16,
        T::JavaScriptCode(_) => 17,
        T::JavaScriptCodeWithScope(_) => 18,
        T::MaxKey => 250,
        T::MinKey => 251,
    }
}

pub fn project_fields(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for f in fields {
        if let Some(v) = doc.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn implicit_equality_and_operator_docs() {
        let d = doc! {"name": "ada", "age": 36};
        assert!(matches_filter(&d, &doc! {"name": "ada"}));
        assert!(matches_filter(&d, &doc! {"age": {"$gte": 36}}));
        assert!(!matches_filter(&d, &doc! {"age": {"$gt": 36}}));
        assert!(matches_filter(&d, &doc! {}));
    }

    #[test]
    fn ne_true_matches_missing_field() {
        let filter = doc! {"isDeleted": {"$ne": true}};
        assert!(matches_filter(&doc! {"name": "x"}, &filter));
        assert!(matches_filter(&doc! {"isDeleted": false}, &filter));
        assert!(matches_filter(&doc! {"isDeleted": Bson::Null}, &filter));
        assert!(!matches_filter(&doc! {"isDeleted": true}, &filter));
    }

    #[test]
    fn null_equality_matches_missing_field() {
        assert!(matches_filter(&doc! {"a": 1}, &doc! {"deletedAt": Bson::Null}));
        assert!(matches_filter(&doc! {"deletedAt": Bson::Null}, &doc! {"deletedAt": Bson::Null}));
        assert!(!matches_filter(&doc! {"deletedAt": 3}, &doc! {"deletedAt": Bson::Null}));
    }

    #[test]
    fn numeric_types_compare_by_value() {
        let d = doc! {"n": 1_i64};
        assert!(matches_filter(&d, &doc! {"n": 1.0}));
        assert!(matches_filter(&d, &doc! {"n": 1_i32}));
        assert!(!matches_filter(&d, &doc! {"n": 2_i32}));
    }

    #[test]
    fn and_or_combinators() {
        let d = doc! {"a": 1, "b": 2};
        assert!(matches_filter(&d, &doc! {"$and": [{"a": 1}, {"b": 2}]}));
        assert!(matches_filter(&d, &doc! {"$or": [{"a": 9}, {"b": 2}]}));
        assert!(!matches_filter(&d, &doc! {"$or": [{"a": 9}, {"b": 9}]}));
    }

    #[test]
    fn in_with_null_matches_missing() {
        let filter = doc! {"tag": {"$in": ["x", Bson::Null]}};
        assert!(matches_filter(&doc! {"tag": "x"}, &filter));
        assert!(matches_filter(&doc! {}, &filter));
        assert!(!matches_filter(&doc! {"tag": "y"}, &filter));
    }

    #[test]
    fn nested_paths_resolve() {
        let d = doc! {"user": {"address": {"city": "berlin"}}};
        assert!(matches_filter(&d, &doc! {"user.address.city": "berlin"}));
        assert!(matches_filter(&d, &doc! {"user.address": {"city": "berlin"}}));
        assert!(!matches_filter(&d, &doc! {"user.address.zip": {"$exists": true}}));
    }

    #[test]
    fn exists_operator() {
        let d = doc! {"a": Bson::Null};
        assert!(matches_filter(&d, &doc! {"a": {"$exists": true}}));
        assert!(!matches_filter(&d, &doc! {"b": {"$exists": true}}));
        assert!(matches_filter(&d, &doc! {"b": {"$exists": false}}));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_operator_with_inline_flags() {
        let d = doc! {"email": "User1@Mail.com"};
        assert!(matches_filter(&d, &doc! {"email": {"$regex": "(?i)^user1@"}}));
        assert!(!matches_filter(&d, &doc! {"email": {"$regex": "^user1@"}}));
    }
}
