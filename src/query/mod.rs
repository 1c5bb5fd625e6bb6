// Submodules for separation of concerns
mod cursor;
mod eval;
mod exec;
mod types;

// Public API re-exports
pub use cursor::Cursor;
pub use eval::{compare_bson, compare_docs, eq_bson, matches_filter, project_fields};
pub use exec::{
    apply_update, count_docs, distinct_values, find_docs, find_one, find_one_and_update,
    update_many, update_one,
};
pub use types::{FindOptions, Order, QueryOptions, ReturnDocument, SortSpec, UpdateReport};

pub(crate) use eval::path_value;
