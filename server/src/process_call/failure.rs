use log::{error, info, warn};

use ripple_shared::{CallContext, CallError, CallErrorKind, Message, MessageType, ReplicaError};

use super::{package_changes, CallTarget};
use crate::Server;

pub(super) enum FailureAction {
    /// Restore the session and run the call again with forced updates
    Retry,
    /// The caller has been answered
    Done,
}

/// Answers a failed call, or asks for a retry when an update conflict
/// still has attempts left. Every answer carries the accumulated changes.
pub(super) async fn post_call_failure(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &mut CallContext,
    call_error: CallError,
) -> Result<FailureAction, ReplicaError> {
    let remote_call = target.remote_call;
    let remote_call_id = context.remote_call_id;

    let reply = match call_error.kind() {
        CallErrorKind::Sync => {
            error!(
                "Sync Error in {} (sequence {}, remote call {}): {:?}",
                remote_call.name, remote_call.sequence, remote_call_id, call_error
            );
            Some(Message::unsynced(remote_call_id))
        }
        CallErrorKind::UpdateConflict => {
            let attempt = context.retries;
            context.retries += 1;
            if attempt < server.config.max_conflict_retries {
                warn!(
                    "Update Conflict in {} (sequence {}, remote call {}), retry {}",
                    remote_call.name, remote_call.sequence, remote_call_id, context.retries
                );
                None
            } else {
                error!(
                    "Update Conflict in {} (sequence {}, remote call {}), giving up after {} retries",
                    remote_call.name, remote_call.sequence, remote_call_id, attempt
                );
                Some(Message::retry(remote_call_id))
            }
        }
        CallErrorKind::Other => {
            if call_error.is_exception() {
                error!("Exception in {} - {}", remote_call.name, call_error);
            } else {
                info!("Refused {} - {}", remote_call.name, call_error);
            }
            let payload = call_error.payload();
            let value = payload
                .to_json_string()
                .unwrap_or_else(|_| payload.message.clone());
            Some(Message::error(&remote_call.name, remote_call_id, value))
        }
    };

    let error_type = reply
        .as_ref()
        .map_or(MessageType::Retry, |message| message.kind);
    post_server_error_handler(server, target, context, error_type).await;

    match reply {
        Some(message) => {
            package_changes(server, target, message)?;
            Ok(FailureAction::Done)
        }
        None => Ok(FailureAction::Retry),
    }
}

async fn post_server_error_handler(
    server: &Server,
    target: CallTarget<'_>,
    context: &CallContext,
    error_type: MessageType,
) {
    let Some(controller) = server.controller.clone() else {
        return;
    };
    let Ok(session) = server.replicator.try_session(target.session_id) else {
        return;
    };
    let remote_call = target.remote_call;
    let object = session.object(remote_call.id.as_str()).cloned();
    let change_summary = session.change_summary().clone();

    if let Err(handler_error) = controller
        .post_server_error_handler(
            error_type,
            context.remote_call_id,
            object.as_ref(),
            &remote_call.name,
            context,
            &change_summary,
        )
        .await
    {
        error!(
            "postServerErrorHandler failed for {}: {}",
            remote_call.name, handler_error
        );
    }
}
