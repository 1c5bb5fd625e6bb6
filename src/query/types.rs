use crate::session::Session;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

/// Per-call options honored by every model read and update. `skip_hook`
/// bypasses soft-delete rewriting for that one call; `session` attaches the
/// write to a transaction.
#[derive(Clone, Copy, Default)]
pub struct QueryOptions<'s> {
    pub skip_hook: bool,
    pub session: Option<&'s Session>,
}

impl QueryOptions<'_> {
    /// Options that bypass soft-delete rewriting.
    #[must_use]
    pub fn raw() -> Self {
        Self { skip_hook: true, session: None }
    }
}

impl<'s> QueryOptions<'s> {
    #[must_use]
    pub fn in_session(session: &'s Session) -> Self {
        Self { skip_hook: false, session: Some(session) }
    }
}

/// Which image `find_one_and_update` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}
