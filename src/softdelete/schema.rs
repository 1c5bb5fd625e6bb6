use crate::errors::DbError;
use crate::index::{IndexOptions, IndexSpec};

use super::{DELETED_AT, DELETED_FLAG};

/// Options recognized at schema-definition time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    pub soft_delete: bool,
}

/// A collection definition: name, the immutable soft-delete flag, and the
/// indexes to build at registration. Registered through
/// [`crate::Database::register`], which turns it into a live model handle.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    options: SchemaOptions,
    indexes: Vec<IndexSpec>,
}

impl Schema {
    #[must_use]
    pub fn new(name: impl Into<String>, options: SchemaOptions) -> Self {
        Self { name: name.into(), options, indexes: Vec::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_soft_delete(&self) -> bool {
        self.options.soft_delete
    }

    /// Declares a plain index.
    pub fn index(&mut self, fields: &[&str], options: IndexOptions) -> &mut Self {
        self.indexes
            .push(IndexSpec::new(fields.iter().map(ToString::to_string).collect(), options));
        self
    }

    /// Declares an index that automatically includes the soft-delete
    /// discriminator, and the deletion timestamp as well when unique — so a
    /// record re-created with the same unique key after a soft delete does
    /// not collide with the deleted one.
    pub fn soft_delete_index(
        &mut self,
        fields: &[&str],
        options: IndexOptions,
    ) -> Result<&mut Self, DbError> {
        if !self.options.soft_delete {
            return Err(DbError::Configuration(
                "cannot use soft-delete index with hard-delete schema".into(),
            ));
        }
        self.indexes.push(IndexSpec::new(append_soft_delete_index_fields(fields, options), options));
        Ok(self)
    }

    pub(crate) fn declared_indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}

/// The bare field-set augmentation behind [`Schema::soft_delete_index`]:
/// appends `isDeleted` always, `deletedAt` additionally for unique indexes.
#[must_use]
pub fn append_soft_delete_index_fields(fields: &[&str], options: IndexOptions) -> Vec<String> {
    let mut out: Vec<String> = fields.iter().map(ToString::to_string).collect();
    out.push(DELETED_FLAG.to_string());
    if options.unique {
        out.push(DELETED_AT.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_fields_gain_both_discriminators() {
        let unique = IndexOptions { unique: true };
        assert_eq!(
            append_soft_delete_index_fields(&["email"], unique),
            vec!["email", "isDeleted", "deletedAt"]
        );
        assert_eq!(
            append_soft_delete_index_fields(&["email"], IndexOptions::default()),
            vec!["email", "isDeleted"]
        );
    }

    #[test]
    fn soft_delete_index_rejects_hard_delete_schema() {
        let mut schema = Schema::new("users", SchemaOptions::default());
        let err = schema.soft_delete_index(&["email"], IndexOptions { unique: true }).unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));
        assert!(schema.declared_indexes().is_empty());
    }

    #[test]
    fn soft_delete_index_declares_augmented_fields() {
        let mut schema = Schema::new("users", SchemaOptions { soft_delete: true });
        schema.soft_delete_index(&["email"], IndexOptions { unique: true }).unwrap();
        let specs = schema.declared_indexes();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].fields, vec!["email", "isDeleted", "deletedAt"]);
        assert!(specs[0].options.unique);
    }
}
