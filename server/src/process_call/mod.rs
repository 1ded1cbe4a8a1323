//! The stages an incoming remote call moves through. Any stage failing
//! short-circuits to failure handling, which either answers the caller or,
//! on an update conflict with retries left, runs the call again.

use ripple_shared::{
    CallContext, Message, RemoteCall, RemoteCallId, ReplicaError, SessionId, SubscriptionId,
};

use crate::{server::RestoreSessionCallback, Server};

mod failure;
mod stages;

use failure::FailureAction;

/// Which call is being processed, and for which session and subscription
#[derive(Clone, Copy)]
pub(crate) struct CallTarget<'a> {
    pub session_id: SessionId,
    pub subscription_id: SubscriptionId,
    pub remote_call: &'a RemoteCall,
}

pub(crate) async fn process_call(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &mut CallContext,
    mut restore_session: Option<&mut RestoreSessionCallback>,
) -> Result<(), ReplicaError> {
    let mut force_update = false;
    loop {
        match stages::run(server, target, context, force_update).await {
            Ok(value) => return stages::post_call_success(server, target, context, value),
            Err(error) => match failure::post_call_failure(server, target, context, error).await? {
                FailureAction::Retry => {
                    tokio::time::sleep(server.config.retry_backoff * context.retries).await;
                    if let Some(restore_session) = restore_session.as_deref_mut() {
                        restore_session(&mut server.replicator, target.session_id);
                    }
                    force_update = true;
                }
                FailureAction::Done => return Ok(()),
            },
        }
    }
}

/// Sends `message` with the subscription's accumulated changes, clears them
/// and flushes any queued outbound calls
pub(crate) fn package_changes(
    server: &mut Server,
    target: CallTarget<'_>,
    message: Message,
) -> Result<(), ReplicaError> {
    send_with_changes(server, target.session_id, Some(target.subscription_id), message)
}

/// Answers a call that never reached the pipeline. Its changes were not
/// applied, so the caller is told it is out of sync.
pub(crate) fn reject_call(
    server: &mut Server,
    session_id: SessionId,
    subscription_id: SubscriptionId,
    remote_call_id: RemoteCallId,
) -> Result<(), ReplicaError> {
    let subscription_id = server
        .replicator
        .try_session(session_id)?
        .ledger()
        .subscription(subscription_id)
        .map(|_| subscription_id);
    send_with_changes(
        server,
        session_id,
        subscription_id,
        Message::unsynced(remote_call_id),
    )
}

fn send_with_changes(
    server: &mut Server,
    session_id: SessionId,
    subscription_id: Option<SubscriptionId>,
    mut message: Message,
) -> Result<(), ReplicaError> {
    let session = server.replicator.try_session_mut(session_id)?;
    let changes = match subscription_id {
        Some(subscription_id) => session.drain_changes(subscription_id)?.to_json_string()?,
        None => "{}".to_string(),
    };
    message.changes = Some(changes);
    session.send(message);
    session.process_queue();
    Ok(())
}
