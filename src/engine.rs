use crate::collection::Collection;
use crate::errors::DbError;
use crate::types::CollectionName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The collection registry. Holds every in-memory collection and hands out
/// shared handles.
#[derive(Default)]
pub struct Engine {
    pub(crate) collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("collections", &self.list_collection_names())
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self { collections: RwLock::new(HashMap::new()) }
    }

    /// Create a collection if it doesn't exist; returns the shared handle.
    pub fn create_collection(&self, name: impl Into<String>) -> Arc<Collection> {
        let name = name.into();
        let mut cols = self.collections.write();
        cols.entry(name.clone())
            .or_insert_with(|| Arc::new(Collection::new(name, false)))
            .clone()
    }

    /// Create or reuse a collection with an explicit soft-delete setting.
    /// Reuse with a conflicting setting is a configuration error.
    pub fn create_collection_with(
        &self,
        name: impl Into<String>,
        soft_delete: bool,
    ) -> Result<Arc<Collection>, DbError> {
        let name = name.into();
        let mut cols = self.collections.write();
        if let Some(existing) = cols.get(&name) {
            if existing.is_soft_delete() == soft_delete {
                return Ok(existing.clone());
            }
            return Err(DbError::Configuration(format!(
                "collection {name} already registered with a different soft-delete setting"
            )));
        }
        let col = Arc::new(Collection::new(name.clone(), soft_delete));
        cols.insert(name, col.clone());
        Ok(col)
    }

    /// Opens a transaction handle bound to this engine. The handle records
    /// inverse operations for every write made under it; see
    /// [`crate::session::Session`].
    #[must_use]
    pub fn start_session(self: &Arc<Self>) -> crate::session::Session {
        crate::session::Session::new(self.clone())
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    pub fn rename_collection(&self, old_name: &str, new_name: &str) -> Result<(), DbError> {
        let mut cols = self.collections.write();
        if cols.contains_key(new_name) {
            return Err(DbError::CollectionAlreadyExists(new_name.to_string()));
        }
        let Some(col) = cols.remove(old_name) else {
            return Err(DbError::NoSuchCollection(old_name.to_string()));
        };
        col.set_name(new_name.to_string());
        cols.insert(new_name.to_string(), col);
        Ok(())
    }
}
