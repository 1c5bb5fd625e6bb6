use super::core::Collection;
use crate::errors::DbError;
use crate::index::{Index, IndexOptions, IndexSpec};

impl Collection {
    // --- Index admin helpers ---

    /// Declares an index and builds it over the current contents. A unique
    /// index fails if existing documents already collide, leaving the
    /// collection's indexes unchanged.
    pub fn create_index(&self, fields: &[&str], options: IndexOptions) -> Result<(), DbError> {
        let spec = IndexSpec::new(fields.iter().map(ToString::to_string).collect(), options);
        let docs = self.docs.read();
        let mut mgr = self.indexes.write();
        let mut index = Index::new(spec);
        for id in &docs.order {
            if let Some(doc) = docs.map.get(id) {
                if index.spec.options.unique {
                    index.ensure_unique(&doc.data, id)?;
                }
                index.insert(&doc.data, id);
            }
        }
        mgr.add_index(index);
        Ok(())
    }

    pub fn drop_index(&self, name: &str) -> bool {
        self.indexes.write().drop_index(name)
    }
}
