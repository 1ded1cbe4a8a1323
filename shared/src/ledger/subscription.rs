use serde::{Deserialize, Serialize};

use super::change_group::{ArrayGroup, ChangeGroup};
use crate::Role;

/// The three logs a subscription accumulates between drains
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Scalar and reference `[old, new]` pairs
    Change,
    /// Precise array snapshots taken before the first mutation
    Array,
    /// Arrays to be replaced wholesale
    ArrayDirty,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLog {
    pub change: ChangeGroup,
    pub array: ArrayGroup,
    pub array_dirty: ArrayGroup,
}

impl ChangeLog {
    pub fn is_empty(&self) -> bool {
        self.change.is_empty() && self.array.is_empty() && self.array_dirty.is_empty()
    }

    pub fn clear(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Change => self.change = ChangeGroup::new(),
            ChangeKind::Array => self.array = ArrayGroup::default(),
            ChangeKind::ArrayDirty => self.array_dirty = ArrayGroup::default(),
        }
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Change => self.change.change_count(),
            ChangeKind::Array => self.array.len(),
            ChangeKind::ArrayDirty => self.array_dirty.len(),
        }
    }
}

/// A named view into a session's change stream, drained when the changes
/// are sent to the peer playing `role`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub role: Role,
    pub log: ChangeLog,
}

impl Subscription {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            log: ChangeLog::default(),
        }
    }
}
