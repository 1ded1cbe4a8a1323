use thiserror::Error;

use crate::{SessionId, SubscriptionId};

/// Errors raised by the change ledger, the delta codec, the apply/rollback
/// engine and the session manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// A changeset could not be applied at all (structural mismatch)
    #[error("Sync Error: {reason}")]
    Sync { reason: String },

    /// The incoming old value does not match the local current value
    #[error("Update Conflict")]
    UpdateConflict { object_id: String, property: String },

    /// A property or method is not permitted for the caller's role
    #[error("Not authorized: {reason}")]
    Authorization { reason: String },

    /// A custom validator declined the operation
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// An object id or lookup named a template the Protocol does not know
    #[error("Template {template_name} is not registered with the Protocol. Must call `add_template()` during protocol initialization")]
    UnknownTemplate { template_name: String },

    /// A changeset named a property the template does not declare
    #[error("Property {property} is not defined on template {template_name}")]
    UnknownProperty {
        template_name: String,
        property: String,
    },

    /// A value could not be converted to or from its transport form
    #[error("Cannot serialize value: {reason}")]
    Serialization { reason: String },

    /// An object id is not of the form `role-Template-ordinal`
    #[error("Malformed object id '{id}', expected <role>-<Template>-<ordinal>")]
    InvalidObjectId { id: String },

    /// A role name other than `client` or `server`
    #[error("Unknown role '{role}'")]
    InvalidRole { role: String },

    #[error("Object {object_id} not found in session")]
    ObjectNotFound { object_id: String },

    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: SessionId },

    #[error("Subscription {subscription_id} not found in session")]
    SubscriptionNotFound { subscription_id: SubscriptionId },

    #[error("No current session. Call `create_session()` or `set_session()` first")]
    NoCurrentSession,
}

impl ReplicaError {
    pub fn is_update_conflict(&self) -> bool {
        matches!(self, ReplicaError::UpdateConflict { .. })
    }

    pub(crate) fn serialization(error: impl std::fmt::Display) -> Self {
        ReplicaError::Serialization {
            reason: error.to_string(),
        }
    }
}

/// Errors raised while a remote call moves through the call pipeline,
/// including errors returned by method bodies and controller hooks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The changes sent with the call could not be applied
    #[error("Sync Error")]
    Sync {
        #[source]
        cause: ReplicaError,
    },

    /// The caller's view of the data was stale; the call may be retried
    #[error("Update Conflict")]
    UpdateConflict,

    /// The method exists but is not exposed to the caller's role
    #[error("Invalid Function Call; not an API function")]
    NotCallable { name: String },

    #[error("{name} function does not exist.")]
    MethodNotFound { name: String },

    #[error("Cannot find object for remote call {object_id}")]
    TargetNotFound { object_id: String },

    /// Validation declined the call
    #[error("{name} refused")]
    Refused { name: String },

    /// Raised by a method body or a controller hook
    #[error("{message}")]
    Application {
        code: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Replica(#[from] ReplicaError),
}

/// How the call pipeline reacts to a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorKind {
    /// Changes rejected outright, answered with `sync: false`, never retried
    Sync,
    /// Retryable stale-data conflict
    UpdateConflict,
    /// Anything else, answered with an `error` message
    Other,
}

impl CallError {
    pub fn application(message: impl Into<String>) -> Self {
        CallError::Application {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        CallError::Application {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> CallErrorKind {
        match self {
            CallError::Sync { .. } => CallErrorKind::Sync,
            CallError::UpdateConflict => CallErrorKind::UpdateConflict,
            CallError::Replica(error) if error.is_update_conflict() => {
                CallErrorKind::UpdateConflict
            }
            _ => CallErrorKind::Other,
        }
    }

    /// Unexpected failures are logged as exceptions; expected refusals
    /// (coded application errors, calls to non-API functions) are not
    pub fn is_exception(&self) -> bool {
        !matches!(
            self,
            CallError::NotCallable { .. } | CallError::Application { code: Some(_), .. }
        )
    }

    /// Sanitized form sent back to the caller
    pub fn payload(&self) -> ErrorPayload {
        let code = match self {
            CallError::Application { code, .. } => code.clone(),
            _ => None,
        };
        ErrorPayload {
            code,
            message: self.to_string(),
        }
    }
}

/// Error details carried in the `value` of an `error` message
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ErrorPayload {
    pub fn to_json_string(&self) -> Result<String, ReplicaError> {
        serde_json::to_string(self).map_err(ReplicaError::serialization)
    }

    /// Parses the `value` of an `error` message. A value that is not a
    /// payload becomes the message of an uncoded one.
    pub fn from_json_str(value: &str) -> Self {
        serde_json::from_str(value).unwrap_or_else(|_| ErrorPayload {
            code: None,
            message: value.to_string(),
        })
    }
}

/// Why a deferred remote call result was rejected on the calling side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCallError {
    /// The callee answered with an `error` message
    #[error("Remote call {name} failed: {}", .payload.message)]
    Remote { name: String, payload: ErrorPayload },

    /// The callee could not apply the changes sent with the call
    #[error("Sync Error")]
    Sync,

    /// The callee gave up after exhausting its update conflict retries
    #[error("Update Conflict")]
    UpdateConflict,

    /// The call was discarded before an answer arrived
    #[error("Pending remote call {remote_call_id} was cleared")]
    Cleared { remote_call_id: u64 },

    #[error(transparent)]
    Replica(#[from] ReplicaError),
}
