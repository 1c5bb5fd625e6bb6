use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::types::{CollectionName, DocumentId};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Committed,
    Aborted,
}

/// Inverse of one recorded write, applied in reverse order on abort.
pub(crate) enum UndoOp {
    /// Rolls back an insert.
    Remove(DocumentId),
    /// Rolls back an update.
    Overwrite(Document),
    /// Rolls back a delete.
    Reinstate(Document),
}

pub(crate) struct UndoRecord {
    pub collection: CollectionName,
    pub op: UndoOp,
}

/// A transaction handle. Writes performed with a session attached are
/// visible immediately; aborting replays the undo log so the store returns
/// to its pre-session state. Dropping an active session with pending writes
/// aborts it.
pub struct Session {
    id: Uuid,
    engine: Arc<Engine>,
    state: Mutex<SessionState>,
    undo: Mutex<Vec<UndoRecord>>,
}

impl Session {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine,
            state: Mutex::new(SessionState::Active),
            undo: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub(crate) fn ensure_active(&self) -> Result<(), DbError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DbError::SessionError(format!("session {} is no longer active", self.id)))
        }
    }

    pub(crate) fn record(&self, collection: &str, op: UndoOp) {
        self.undo.lock().push(UndoRecord { collection: collection.to_string(), op });
    }

    /// Discards the undo log; every write made under this session stands.
    pub fn commit_transaction(&self) -> Result<(), DbError> {
        let mut state = self.state.lock();
        if *state != SessionState::Active {
            return Err(DbError::SessionError(format!("cannot commit session {} twice", self.id)));
        }
        *state = SessionState::Committed;
        self.undo.lock().clear();
        Ok(())
    }

    /// Replays the undo log newest-first, reverting every write made under
    /// this session.
    pub fn abort_transaction(&self) -> Result<(), DbError> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Active {
                return Err(DbError::SessionError(format!(
                    "cannot abort session {} twice",
                    self.id
                )));
            }
            *state = SessionState::Aborted;
        }
        let records = std::mem::take(&mut *self.undo.lock());
        for rec in records.into_iter().rev() {
            let Some(col) = self.engine.get_collection(&rec.collection) else {
                log::warn!("rollback skipped: collection {} no longer exists", rec.collection);
                continue;
            };
            match rec.op {
                UndoOp::Remove(id) => col.apply_remove(&id),
                UndoOp::Overwrite(doc) => col.apply_overwrite(doc),
                UndoOp::Reinstate(doc) => col.apply_insert(doc),
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_active() && !self.undo.lock().is_empty() {
            let _ = self.abort_transaction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_abort_is_an_error() {
        let engine = Arc::new(Engine::new());
        let session = Session::new(engine);
        session.commit_transaction().unwrap();
        assert_eq!(session.state(), SessionState::Committed);
        assert!(session.abort_transaction().is_err());
        assert!(session.ensure_active().is_err());
    }

    #[test]
    fn abort_without_writes_is_fine() {
        let engine = Arc::new(Engine::new());
        let session = Session::new(engine);
        session.abort_transaction().unwrap();
        assert_eq!(session.state(), SessionState::Aborted);
    }
}
