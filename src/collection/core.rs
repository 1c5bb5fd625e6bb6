use crate::document::Document;
use crate::index::IndexManager;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Insertion-ordered in-memory document set.
#[derive(Debug, Default)]
pub(crate) struct DocSet {
    pub order: Vec<DocumentId>,
    pub map: HashMap<DocumentId, Document>,
}

impl DocSet {
    pub fn insert(&mut self, document: Document) {
        if !self.map.contains_key(&document.id) {
            self.order.push(document.id.clone());
        }
        self.map.insert(document.id.clone(), document);
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let removed = self.map.remove(id);
        if removed.is_some() {
            self.order.retain(|d| d != id);
        }
        removed
    }
}

pub struct Collection {
    pub name: Arc<RwLock<String>>,
    pub(crate) docs: RwLock<DocSet>,
    pub indexes: RwLock<IndexManager>,
    soft_delete: bool,
}

impl Collection {
    #[must_use]
    pub fn new(name: String, soft_delete: bool) -> Self {
        Self {
            name: Arc::new(RwLock::new(name)),
            docs: RwLock::new(DocSet::default()),
            indexes: RwLock::new(IndexManager::new()),
            soft_delete,
        }
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    /// Returns the collection's name as a String (cloned), hiding the `RwLock`.
    #[must_use]
    pub fn name_str(&self) -> String {
        self.name.read().clone()
    }

    /// Whether reads against this collection are subject to soft-delete
    /// rewriting when accessed through a model handle.
    #[must_use]
    pub const fn is_soft_delete(&self) -> bool {
        self.soft_delete
    }
}
