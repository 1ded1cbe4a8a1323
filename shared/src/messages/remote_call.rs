use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{codec, Message, MessageType, ObjectId, ReplicaError};

/// A method invocation on a shared object, with the caller's pending
/// changes applied before it executes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub id: ObjectId,
    pub name: String,
    pub sequence: u64,
    /// Serialized ChangeGroup
    pub changes: String,
    /// Serialized argument list
    pub args: String,
}

impl RemoteCall {
    pub fn has_changes(&self) -> bool {
        self.changes.len() > 2
    }

    /// Template names of the objects the carried changes touch
    pub fn changed_templates(&self) -> BTreeSet<String> {
        let mut templates = BTreeSet::new();
        if let Ok(changes) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
            &self.changes,
        ) {
            for object_id in changes.keys() {
                if let Ok(object_id) = ObjectId::parse(object_id) {
                    templates.insert(object_id.template_name().to_string());
                }
            }
        }
        templates
    }

    /// The target plus any object passed as an argument
    pub fn referenced_ids(&self) -> Vec<ObjectId> {
        let mut ids = vec![self.id.clone()];
        ids.extend(codec::argument_references(&self.args));
        ids
    }
}

impl TryFrom<&Message> for RemoteCall {
    type Error = ReplicaError;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        if message.kind != MessageType::Call {
            return Err(ReplicaError::Sync {
                reason: format!("expected a call message, got {:?}", message.kind),
            });
        }
        let id = message.id.clone().ok_or_else(|| ReplicaError::Sync {
            reason: "call message without a target object".to_string(),
        })?;
        let name = message.name.clone().ok_or_else(|| ReplicaError::Sync {
            reason: "call message without a method name".to_string(),
        })?;
        Ok(Self {
            id,
            name,
            sequence: message.sequence.unwrap_or_default(),
            changes: message.changes.clone().unwrap_or_default(),
            args: message.args.clone().unwrap_or_default(),
        })
    }
}
