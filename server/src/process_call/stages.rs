use std::sync::Arc;

use log::{debug, info};

use ripple_shared::{
    apply::{self, RollbackLog},
    codec, CallContext, CallError, CallScope, ChangeGroup, Message, ReplicaError, Role,
};

use super::{package_changes, CallTarget};
use crate::Server;

/// Runs every stage of one attempt, returning the encoded return value
pub(super) async fn run(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &CallContext,
    force_update: bool,
) -> Result<String, CallError> {
    pre_call_hook(server, target, context, force_update).await?;
    let valid = apply_changes_and_validate_call(server, target, context)?;
    let valid = custom_validation(server, target, context, valid)?;
    let value = call_if_valid(server, target, context, valid)?;
    post_call_hook(server, target, context).await?;
    Ok(value)
}

/// Lets the controller see which object types the call changes
async fn pre_call_hook(
    server: &Server,
    target: CallTarget<'_>,
    context: &CallContext,
    force_update: bool,
) -> Result<(), CallError> {
    let remote_call = target.remote_call;
    info!(
        "preServerCall {} (sequence {}, remote call {})",
        remote_call.name, remote_call.sequence, context.remote_call_id
    );

    let Some(controller) = server.controller.clone() else {
        return Ok(());
    };
    controller
        .pre_server_call(
            remote_call.has_changes(),
            &remote_call.changed_templates(),
            context,
            force_update,
        )
        .await
}

/// Applies the carried changes, then checks the method may be called from
/// the caller's side. Returns the target's own verdict on the call, if it
/// has a call validator.
fn apply_changes_and_validate_call(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &CallContext,
) -> Result<bool, CallError> {
    let remote_call = target.remote_call;
    info!(
        "applyChangesAndValidateCall {} (sequence {}, remote call {}, target {})",
        remote_call.name, remote_call.sequence, context.remote_call_id, remote_call.id
    );

    let protocol = Arc::clone(server.replicator.protocol());
    let session = server.replicator.try_session_mut(target.session_id)?;
    let changes = ChangeGroup::from_json_str(&remote_call.changes)
        .map_err(|cause| CallError::Sync { cause })?;
    session.clear_change_summary();
    let force = session.role() == Role::Client;
    session
        .apply_changes(&changes, force)
        .map_err(|cause| CallError::Sync { cause })?;

    let object = session
        .object(remote_call.id.as_str())
        .ok_or_else(|| CallError::TargetNotFound {
            object_id: remote_call.id.to_string(),
        })?;
    let template = protocol.try_template(object.template_name())?;
    let method = template
        .remote_method(&remote_call.name)
        .ok_or_else(|| CallError::MethodNotFound {
            name: remote_call.name.clone(),
        })?;
    if method.on != session.role() {
        return Err(CallError::NotCallable {
            name: remote_call.name.clone(),
        });
    }

    if session.role() == Role::Server {
        if let Some(validator) = template.call_validator() {
            return Ok(validator(
                &*session,
                &remote_call.id,
                &remote_call.name,
                context,
            ));
        }
    }
    Ok(true)
}

/// Runs the method's own server-side validator against the arguments
fn custom_validation(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &CallContext,
    valid: bool,
) -> Result<bool, CallError> {
    let remote_call = target.remote_call;
    info!(
        "customValidation {} (sequence {}, remote call {}, valid {})",
        remote_call.name, remote_call.sequence, context.remote_call_id, valid
    );
    if !valid {
        return Ok(false);
    }

    let protocol = Arc::clone(server.replicator.protocol());
    let session = server.replicator.try_session_mut(target.session_id)?;
    if session.role() != Role::Server {
        return Ok(true);
    }
    let template = protocol.try_template(remote_call.id.template_name())?;
    let Some(validator) = template
        .remote_method(&remote_call.name)
        .and_then(|method| method.server_validation.as_ref())
    else {
        return Ok(true);
    };

    let mut stubs = RollbackLog::new();
    let args = match apply::resolve_arguments(session, &remote_call.args, &mut stubs) {
        Ok(args) => args,
        Err(err) => {
            stubs.replay(session);
            return Err(err.into());
        }
    };
    let valid = validator(&*session, &remote_call.id, &args);
    if !valid && !stubs.is_empty() {
        debug!(
            "Discarding {} argument stubs of refused {}",
            stubs.len(),
            remote_call.name
        );
        stubs.replay(session);
    }
    Ok(valid)
}

/// Invokes the method if every validation passed
fn call_if_valid(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &CallContext,
    valid: bool,
) -> Result<String, CallError> {
    let remote_call = target.remote_call;
    info!(
        "callIfValid {} (sequence {}, remote call {}, target {})",
        remote_call.name, remote_call.sequence, context.remote_call_id, remote_call.id
    );

    let protocol = Arc::clone(server.replicator.protocol());
    let session = server.replicator.try_session_mut(target.session_id)?;
    let template = protocol.try_template(remote_call.id.template_name())?;
    let method = template
        .remote_method(&remote_call.name)
        .ok_or_else(|| CallError::MethodNotFound {
            name: remote_call.name.clone(),
        })?;
    if !valid {
        return Err(CallError::Refused {
            name: remote_call.name.clone(),
        });
    }

    let args = codec::extract_arguments(&remote_call.args, session)?;
    let mut scope = CallScope::new(session, remote_call.id.clone(), context);
    let value = method.invoke(&mut scope, &args)?;
    Ok(codec::encode_value(&value)?)
}

/// Lets the controller commit what the call did
async fn post_call_hook(
    server: &Server,
    target: CallTarget<'_>,
    context: &CallContext,
) -> Result<(), CallError> {
    let Some(controller) = server.controller.clone() else {
        return Ok(());
    };
    let change_summary = server
        .replicator
        .try_session(target.session_id)?
        .change_summary()
        .clone();
    controller
        .post_server_call(target.remote_call.has_changes(), context, &change_summary)
        .await
}

/// Answers the caller with the return value and every change made since
/// the subscription was last drained
pub(super) fn post_call_success(
    server: &mut Server,
    target: CallTarget<'_>,
    context: &CallContext,
    value: String,
) -> Result<(), ReplicaError> {
    let remote_call = target.remote_call;
    info!(
        "postCall.success {} (callTime {:?}, sequence {}, remote call {})",
        remote_call.name,
        context.elapsed(),
        remote_call.sequence,
        context.remote_call_id
    );
    package_changes(
        server,
        target,
        Message::response(&remote_call.name, context.remote_call_id, value),
    )
}
