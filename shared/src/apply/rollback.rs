use crate::{ObjectId, Session, Value};

/// One undoable step of an apply
#[derive(Clone, Debug, PartialEq)]
pub enum UndoRecord {
    /// A property held `prior` before the apply overwrote it
    Property {
        object_id: ObjectId,
        property: String,
        prior: Value,
    },
    /// A stub object created during the apply
    Created { object_id: ObjectId },
}

/// Undo buffer of an in-progress apply, replayed in reverse on failure
#[derive(Debug, Default)]
pub struct RollbackLog {
    records: Vec<UndoRecord>,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: UndoRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Restores every prior value and removes every created stub, newest first
    pub fn replay(self, session: &mut Session) {
        for record in self.records.into_iter().rev() {
            match record {
                UndoRecord::Property {
                    object_id,
                    property,
                    prior,
                } => {
                    if let Some(object) = session.object_mut(object_id.as_str()) {
                        object.set_raw(&property, prior);
                    }
                }
                UndoRecord::Created { object_id } => {
                    session.remove_object(&object_id);
                }
            }
        }
    }
}
