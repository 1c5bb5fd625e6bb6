use super::core::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::session::{Session, UndoOp};
use crate::telemetry;
use crate::types::DocumentId;

impl Collection {
    /// Inserts a document, enforcing unique indexes. With a session attached
    /// the write is recorded for rollback.
    pub fn insert_document(
        &self,
        document: Document,
        session: Option<&Session>,
    ) -> Result<DocumentId, DbError> {
        if let Some(s) = session {
            s.ensure_active()?;
        }
        let doc_id = document.id.clone();
        {
            let mut docs = self.docs.write();
            let mut indexes = self.indexes.write();
            indexes.check_unique(&document.data, &doc_id)?;
            indexes.insert_document(&document.data, &doc_id);
            docs.insert(document);
        }
        telemetry::log_audit("insert", &self.name_str(), &doc_id.0.to_string());
        if let Some(s) = session {
            s.record(&self.name_str(), UndoOp::Remove(doc_id.clone()));
        }
        Ok(doc_id)
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.docs.read().map.get(id).cloned()
    }

    /// Replaces the stored document under `id`, keeping the id stable.
    /// Returns `Ok(false)` when no such document exists.
    pub fn update_document(
        &self,
        id: &DocumentId,
        new_document: Document,
        session: Option<&Session>,
    ) -> Result<bool, DbError> {
        if let Some(s) = session {
            s.ensure_active()?;
        }
        let old = {
            let mut docs = self.docs.write();
            let mut indexes = self.indexes.write();
            let Some(old) = docs.map.get(id).cloned() else {
                return Ok(false);
            };
            let mut new_doc_same_id = new_document;
            new_doc_same_id.id = id.clone();
            indexes.check_unique(&new_doc_same_id.data, id)?;
            indexes.remove_document(&old.data, id);
            indexes.insert_document(&new_doc_same_id.data, id);
            docs.insert(new_doc_same_id);
            old
        };
        telemetry::log_audit("update", &self.name_str(), &id.0.to_string());
        if let Some(s) = session {
            s.record(&self.name_str(), UndoOp::Overwrite(old));
        }
        Ok(true)
    }

    /// Physically removes a document. The soft-delete layer never calls this;
    /// it exists for store-level maintenance and rollback.
    pub fn delete_document(
        &self,
        id: &DocumentId,
        session: Option<&Session>,
    ) -> Result<bool, DbError> {
        if let Some(s) = session {
            s.ensure_active()?;
        }
        let old = {
            let mut docs = self.docs.write();
            let mut indexes = self.indexes.write();
            let Some(old) = docs.remove(id) else {
                return Ok(false);
            };
            indexes.remove_document(&old.data, id);
            old
        };
        telemetry::log_audit("delete", &self.name_str(), &id.0.to_string());
        if let Some(s) = session {
            s.record(&self.name_str(), UndoOp::Reinstate(old));
        }
        Ok(true)
    }

    /// All documents in insertion order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        let docs = self.docs.read();
        docs.order.iter().filter_map(|id| docs.map.get(id)).cloned().collect()
    }

    /// Return only the IDs of all documents without cloning each document.
    #[must_use]
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.docs.read().order.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().map.is_empty()
    }

    // Rollback primitives. Uniqueness is not re-checked: restoring the prior
    // state must always win.

    pub(crate) fn apply_insert(&self, document: Document) {
        let mut docs = self.docs.write();
        let mut indexes = self.indexes.write();
        indexes.insert_document(&document.data, &document.id);
        docs.insert(document);
    }

    pub(crate) fn apply_overwrite(&self, document: Document) {
        let mut docs = self.docs.write();
        let mut indexes = self.indexes.write();
        if let Some(current) = docs.map.get(&document.id) {
            indexes.remove_document(&current.data, &document.id);
        }
        indexes.insert_document(&document.data, &document.id);
        docs.insert(document);
    }

    pub(crate) fn apply_remove(&self, id: &DocumentId) {
        let mut docs = self.docs.write();
        let mut indexes = self.indexes.write();
        if let Some(old) = docs.remove(id) {
            indexes.remove_document(&old.data, id);
        }
    }
}
