use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use ripple_shared::{CallContext, CallError, MessageType, RemoteCallId, TrackedObject};

/// Application hooks around every incoming remote call. Each hook may
/// suspend; an error from `pre_server_call` or `post_server_call` fails the
/// call like an error from the method itself.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Before the carried changes are applied. `force_update` is set on
    /// every retry after an update conflict.
    async fn pre_server_call(
        &self,
        _has_changes: bool,
        _changed_templates: &BTreeSet<String>,
        _context: &CallContext,
        _force_update: bool,
    ) -> Result<(), CallError> {
        Ok(())
    }

    /// After the method returned, typically to commit its changes
    async fn post_server_call(
        &self,
        _has_changes: bool,
        _context: &CallContext,
        _change_summary: &BTreeMap<String, usize>,
    ) -> Result<(), CallError> {
        Ok(())
    }

    /// After any failure, with the kind of message the failure produced.
    /// Errors returned here are logged and otherwise ignored.
    async fn post_server_error_handler(
        &self,
        _error_type: MessageType,
        _remote_call_id: RemoteCallId,
        _target: Option<&TrackedObject>,
        _function_name: &str,
        _context: &CallContext,
        _change_summary: &BTreeMap<String, usize>,
    ) -> Result<(), CallError> {
        Ok(())
    }
}
