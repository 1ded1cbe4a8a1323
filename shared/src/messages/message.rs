use serde::{Deserialize, Serialize};

use crate::{ObjectId, RemoteCall, RemoteCallId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Invoke a method on the peer
    Call,
    /// Result of a call, or `sync: false` when its changes were rejected
    Response,
    /// Terminal update conflict after the callee ran out of retries
    Retry,
    /// The call failed; `value` holds the error payload
    Error,
    /// Carries changes only
    Sync,
}

/// Everything exchanged between peers. Which fields are set depends on
/// `kind`; absent fields are left out of the serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
    /// Serialized ChangeGroup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
    /// Serialized return value or error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_call_id: Option<RemoteCallId>,
    /// Target object of a call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Serialized argument list of a call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            sync: None,
            changes: None,
            value: None,
            name: None,
            remote_call_id: None,
            id: None,
            sequence: None,
            args: None,
        }
    }

    pub fn call(remote_call_id: RemoteCallId, remote_call: &RemoteCall) -> Self {
        Self {
            name: Some(remote_call.name.clone()),
            remote_call_id: Some(remote_call_id),
            id: Some(remote_call.id.clone()),
            sequence: Some(remote_call.sequence),
            changes: Some(remote_call.changes.clone()),
            args: Some(remote_call.args.clone()),
            ..Self::new(MessageType::Call)
        }
    }

    pub fn response(name: &str, remote_call_id: RemoteCallId, value: String) -> Self {
        Self {
            sync: Some(true),
            value: Some(value),
            name: Some(name.to_string()),
            remote_call_id: Some(remote_call_id),
            ..Self::new(MessageType::Response)
        }
    }

    pub fn unsynced(remote_call_id: RemoteCallId) -> Self {
        Self {
            sync: Some(false),
            changes: Some(String::new()),
            remote_call_id: Some(remote_call_id),
            ..Self::new(MessageType::Response)
        }
    }

    pub fn retry(remote_call_id: RemoteCallId) -> Self {
        Self {
            sync: Some(false),
            remote_call_id: Some(remote_call_id),
            ..Self::new(MessageType::Retry)
        }
    }

    pub fn error(name: &str, remote_call_id: RemoteCallId, payload: String) -> Self {
        Self {
            sync: Some(true),
            value: Some(payload),
            name: Some(name.to_string()),
            remote_call_id: Some(remote_call_id),
            ..Self::new(MessageType::Error)
        }
    }

    pub fn sync(changes: String) -> Self {
        Self {
            changes: Some(changes),
            ..Self::new(MessageType::Sync)
        }
    }

    /// `false` only when the peer explicitly flagged the message unsynced
    pub fn is_synced(&self) -> bool {
        self.sync != Some(false)
    }

    pub fn has_changes(&self) -> bool {
        self.changes.as_ref().is_some_and(|changes| changes.len() > 2)
    }
}
