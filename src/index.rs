use crate::errors::DbError;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use std::collections::{HashMap, HashSet};

/// Options recognized when declaring an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
}

/// A declared index: an ordered field list plus options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub fields: Vec<String>,
    pub options: IndexOptions,
}

impl IndexSpec {
    #[must_use]
    pub fn new(fields: Vec<String>, options: IndexOptions) -> Self {
        Self { fields, options }
    }

    /// Mongo-style index name, e.g. `email_1_isDeleted_1`.
    #[must_use]
    pub fn name(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            if !out.is_empty() {
                out.push('_');
            }
            out.push_str(field);
            out.push_str("_1");
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// One component of a composite index key. Missing fields key as `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKeyKind {
    Null,
    Bool(bool),
    I64(i64),
    F64(OrderedFloat<f64>),
    Str(String),
    DateTime(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EqKey(pub Vec<IndexKeyKind>);

/// Maps a BSON value to its index-key form, or `None` when the value has no
/// indexable representation. Integral doubles collapse onto `I64` so `1` and
/// `1.0` share a key.
#[must_use]
pub fn key_from_bson(v: &Bson) -> Option<IndexKeyKind> {
    match v {
        Bson::Null => Some(IndexKeyKind::Null),
        Bson::Boolean(b) => Some(IndexKeyKind::Bool(*b)),
        Bson::Int32(i) => Some(IndexKeyKind::I64(i64::from(*i))),
        Bson::Int64(i) => Some(IndexKeyKind::I64(*i)),
        Bson::Double(f) => {
            if f.fract() == 0.0 && f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64
            {
                Some(IndexKeyKind::I64(*f as i64))
            } else {
                Some(IndexKeyKind::F64(OrderedFloat(*f)))
            }
        }
        Bson::String(s) => Some(IndexKeyKind::Str(s.clone())),
        Bson::DateTime(dt) => Some(IndexKeyKind::DateTime(dt.timestamp_millis())),
        _ => None,
    }
}

fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for p in parts {
        match cur {
            Bson::Document(d) => {
                cur = d.get(p)?;
            }
            _ => return None,
        }
    }
    Some(cur)
}

fn format_key(key: &EqKey) -> String {
    let mut out = String::new();
    for part in &key.0 {
        if !out.is_empty() {
            out.push_str(", ");
        }
        match part {
            IndexKeyKind::Null => out.push_str("null"),
            IndexKeyKind::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            IndexKeyKind::I64(i) => out.push_str(&i.to_string()),
            IndexKeyKind::F64(f) => out.push_str(&f.to_string()),
            IndexKeyKind::Str(s) => out.push_str(s),
            IndexKeyKind::DateTime(ms) => out.push_str(&ms.to_string()),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Index {
    pub spec: IndexSpec,
    pub map: HashMap<EqKey, HashSet<DocumentId>>,
    pub stats: IndexStats,
}

impl Index {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { spec, map: HashMap::new(), stats: IndexStats::default() }
    }

    /// Composite key for `doc`, or `None` when a present value has no
    /// indexable form; such documents stay out of the index entirely.
    fn key_for(&self, doc: &BsonDocument) -> Option<EqKey> {
        let mut parts = Vec::with_capacity(self.spec.fields.len());
        for field in &self.spec.fields {
            match get_path(doc, field) {
                None => parts.push(IndexKeyKind::Null),
                Some(v) => parts.push(key_from_bson(v)?),
            }
        }
        Some(EqKey(parts))
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        if let Some(k) = self.key_for(doc) {
            let set = self.map.entry(k).or_default();
            if set.insert(id.clone()) {
                self.stats.entries += 1;
            }
            self.stats.keys = self.map.len();
        }
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        if let Some(k) = self.key_for(doc)
            && let Some(set) = self.map.get_mut(&k)
        {
            if set.remove(id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
            self.stats.keys = self.map.len();
        }
    }

    /// Fails when a document other than `id` already occupies the composite
    /// key `doc` would take. Only meaningful for unique indexes.
    pub fn ensure_unique(&self, doc: &BsonDocument, id: &DocumentId) -> Result<(), DbError> {
        if let Some(key) = self.key_for(doc)
            && let Some(set) = self.map.get(&key)
            && set.iter().any(|other| other != id)
        {
            return Err(DbError::DuplicateKey {
                index: self.spec.name(),
                key: format_key(&key),
            });
        }
        Ok(())
    }

    pub fn lookup_eq(&mut self, key: &EqKey) -> Option<Vec<DocumentId>> {
        if let Some(set) = self.map.get(key) {
            self.stats.hits += 1;
            return Some(set.iter().cloned().collect());
        }
        self.stats.misses += 1;
        None
    }
}

#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: HashMap<String, Index>, // key: index name per IndexSpec::name
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: HashMap::new() }
    }

    pub fn add_index(&mut self, index: Index) {
        self.indexes.insert(index.spec.name(), index);
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexSpec> {
        self.indexes.values().map(|i| i.spec.clone()).collect()
    }

    pub fn insert_document(&mut self, doc: &BsonDocument, id: &DocumentId) {
        for idx in self.indexes.values_mut() {
            idx.insert(doc, id);
        }
    }

    pub fn remove_document(&mut self, doc: &BsonDocument, id: &DocumentId) {
        for idx in self.indexes.values_mut() {
            idx.remove(doc, id);
        }
    }

    /// Checks `doc` against every unique index before it is stored.
    pub fn check_unique(&self, doc: &BsonDocument, id: &DocumentId) -> Result<(), DbError> {
        for idx in self.indexes.values() {
            if idx.spec.options.unique {
                idx.ensure_unique(doc, id)?;
            }
        }
        Ok(())
    }

    /// Candidate ids for an exact-match lookup on a single-field index.
    /// `None` means no usable index; callers fall back to a scan.
    pub fn single_field_candidates(&mut self, field: &str, value: &Bson) -> Option<Vec<DocumentId>> {
        let key = EqKey(vec![key_from_bson(value)?]);
        let idx = self
            .indexes
            .values_mut()
            .find(|i| i.spec.fields.len() == 1 && i.spec.fields[0] == field)?;
        idx.lookup_eq(&key)
    }
}
