use crate::errors::DbError;
use crate::query::{compare_bson, eq_bson};
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Bound pipeline variables (`$$name`), e.g. the element binding a
/// `$filter` introduces.
pub(crate) type Vars = HashMap<String, Bson>;

/// Evaluates an aggregation expression against one document. Strings
/// starting with `$` read field paths, `$$` reads bound variables, and a
/// single-key `$op` document applies an operator; everything else is a
/// literal.
pub(crate) fn eval_expr(doc: &BsonDocument, vars: &Vars, expr: &Bson) -> Result<Bson, DbError> {
    match expr {
        Bson::String(s) if s.starts_with("$$") => var_value(vars, &s[2..]),
        Bson::String(s) if s.starts_with('$') => {
            Ok(crate::query::path_value(doc, &s[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Array(items) => items
            .iter()
            .map(|e| eval_expr(doc, vars, e))
            .collect::<Result<Vec<_>, _>>()
            .map(Bson::Array),
        Bson::Document(spec) => {
            if let Some(first) = spec.keys().next()
                && first.starts_with('$')
            {
                if spec.len() != 1 {
                    return Err(DbError::QueryError(format!(
                        "an expression specification must contain exactly one operator, found {}",
                        spec.len()
                    )));
                }
                let Some((op, arg)) = spec.iter().next() else {
                    return Ok(Bson::Document(BsonDocument::new()));
                };
                eval_operator(doc, vars, op, arg)
            } else {
                let mut out = BsonDocument::new();
                for (k, v) in spec {
                    out.insert(k.clone(), eval_expr(doc, vars, v)?);
                }
                Ok(Bson::Document(out))
            }
        }
        other => Ok(other.clone()),
    }
}

fn var_value(vars: &Vars, path: &str) -> Result<Bson, DbError> {
    let (root, rest) = match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    };
    let Some(val) = vars.get(root) else {
        return Err(DbError::QueryError(format!("undefined aggregation variable: {root}")));
    };
    match rest {
        None => Ok(val.clone()),
        Some(rest) => match val {
            Bson::Document(d) => {
                Ok(crate::query::path_value(d, rest).cloned().unwrap_or(Bson::Null))
            }
            _ => Ok(Bson::Null),
        },
    }
}

fn eval_operator(doc: &BsonDocument, vars: &Vars, op: &str, arg: &Bson) -> Result<Bson, DbError> {
    match op {
        "$literal" => Ok(arg.clone()),
        "$filter" => eval_filter_op(doc, vars, arg),
        "$size" => {
            let target = match arg {
                Bson::Array(items) if items.len() == 1 => &items[0],
                other => other,
            };
            match eval_expr(doc, vars, target)? {
                Bson::Array(a) => Ok(Bson::Int32(a.len() as i32)),
                _ => Err(DbError::QueryError(
                    "the argument to $size must evaluate to an array".into(),
                )),
            }
        }
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => {
            let (a, b) = binary_args(doc, vars, op, arg)?;
            let result = match op {
                "$eq" => eq_bson(&a, &b),
                "$ne" => !eq_bson(&a, &b),
                "$gt" => compare_bson(&a, &b) == Ordering::Greater,
                "$gte" => matches!(compare_bson(&a, &b), Ordering::Greater | Ordering::Equal),
                "$lt" => compare_bson(&a, &b) == Ordering::Less,
                _ => matches!(compare_bson(&a, &b), Ordering::Less | Ordering::Equal),
            };
            Ok(Bson::Boolean(result))
        }
        "$and" => {
            let Bson::Array(items) = arg else {
                return Err(DbError::QueryError("$and expects an array".into()));
            };
            for item in items {
                if !is_truthy(&eval_expr(doc, vars, item)?) {
                    return Ok(Bson::Boolean(false));
                }
            }
            Ok(Bson::Boolean(true))
        }
        "$or" => {
            let Bson::Array(items) = arg else {
                return Err(DbError::QueryError("$or expects an array".into()));
            };
            for item in items {
                if is_truthy(&eval_expr(doc, vars, item)?) {
                    return Ok(Bson::Boolean(true));
                }
            }
            Ok(Bson::Boolean(false))
        }
        "$not" => {
            let target = match arg {
                Bson::Array(items) if items.len() == 1 => &items[0],
                other => other,
            };
            Ok(Bson::Boolean(!is_truthy(&eval_expr(doc, vars, target)?)))
        }
        _ => Err(DbError::QueryError(format!("unsupported aggregation operator: {op}"))),
    }
}

fn binary_args(
    doc: &BsonDocument,
    vars: &Vars,
    op: &str,
    arg: &Bson,
) -> Result<(Bson, Bson), DbError> {
    let Bson::Array(items) = arg else {
        return Err(DbError::QueryError(format!("{op} expects an array of two expressions")));
    };
    if items.len() != 2 {
        return Err(DbError::QueryError(format!("{op} expects an array of two expressions")));
    }
    Ok((eval_expr(doc, vars, &items[0])?, eval_expr(doc, vars, &items[1])?))
}

fn eval_filter_op(doc: &BsonDocument, vars: &Vars, arg: &Bson) -> Result<Bson, DbError> {
    let Bson::Document(spec) = arg else {
        return Err(DbError::QueryError("$filter expects a document".into()));
    };
    let input = spec
        .get("input")
        .ok_or_else(|| DbError::QueryError("$filter requires an input expression".into()))?;
    let cond = spec
        .get("cond")
        .ok_or_else(|| DbError::QueryError("$filter requires a cond expression".into()))?;
    let binding = match spec.get("as") {
        None => "this".to_string(),
        Some(Bson::String(s)) => s.clone(),
        Some(_) => return Err(DbError::QueryError("$filter 'as' must be a string".into())),
    };
    match eval_expr(doc, vars, input)? {
        Bson::Null => Ok(Bson::Null),
        Bson::Array(items) => {
            let mut kept = Vec::new();
            for item in items {
                let mut scoped = vars.clone();
                scoped.insert(binding.clone(), item.clone());
                if is_truthy(&eval_expr(doc, &scoped, cond)?) {
                    kept.push(item);
                }
            }
            Ok(Bson::Array(kept))
        }
        _ => Err(DbError::QueryError("$filter input must evaluate to an array".into())),
    }
}

/// Aggregation truthiness: null, missing, false and numeric zero are false.
pub(crate) fn is_truthy(v: &Bson) -> bool {
    match v {
        Bson::Null | Bson::Undefined | Bson::Boolean(false) => false,
        Bson::Int32(0) | Bson::Int64(0) => false,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}
