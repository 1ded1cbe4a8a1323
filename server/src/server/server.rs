use std::sync::Arc;

use log::{info, warn};

use ripple_shared::{
    CallContext, Message, MessageSender, MessageType, Protocol, RemoteCall, ReplicaError,
    Replicator, Role, SavedSession, Session, SessionId, SubscriptionId,
};

use crate::{process_call, Controller, ServerConfig};

/// Called before a call is retried after an update conflict, to put the
/// session back into the state it had before the failed attempt
pub type RestoreSessionCallback = Box<dyn FnMut(&mut Replicator, SessionId) + Send>;

/// The authoritative side of a ripple connection: owns a session per client
/// and processes the remote calls those clients send
pub struct Server {
    pub(crate) replicator: Replicator,
    pub(crate) config: ServerConfig,
    pub(crate) controller: Option<Arc<dyn Controller>>,
}

impl Server {
    /// Create a new Server
    pub fn new<P: Into<Protocol>>(server_config: ServerConfig, protocol: P) -> Self {
        let protocol: Protocol = protocol.into();
        Self {
            replicator: Replicator::new(protocol),
            config: server_config,
            controller: None,
        }
    }

    pub fn set_controller<C: Controller + 'static>(&mut self, controller: C) {
        self.controller = Some(Arc::new(controller));
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    pub fn replicator_mut(&mut self) -> &mut Replicator {
        &mut self.replicator
    }

    /// Creates a session for a newly connected client along with the
    /// subscription whose changes are sent to it
    pub fn create_session(
        &mut self,
        send_message: Arc<dyn MessageSender>,
        session_id: Option<SessionId>,
    ) -> Result<(SessionId, SubscriptionId), ReplicaError> {
        let session_id = self
            .replicator
            .create_session(Role::Server, Some(send_message), session_id);
        let subscription_id = self.replicator.subscribe(Role::Client)?;
        Ok((session_id, subscription_id))
    }

    pub fn delete_session(&mut self, session_id: SessionId) -> Result<(), ReplicaError> {
        self.replicator.delete_session(session_id)
    }

    pub fn session(&self, session_id: SessionId) -> Result<&Session, ReplicaError> {
        self.replicator.try_session(session_id)
    }

    pub fn session_mut(&mut self, session_id: SessionId) -> Result<&mut Session, ReplicaError> {
        self.replicator.try_session_mut(session_id)
    }

    pub fn save_session(&mut self, session_id: SessionId) -> Result<SavedSession, ReplicaError> {
        self.replicator.save_session(session_id)
    }

    pub fn restore_session(
        &mut self,
        session_id: SessionId,
        saved: &SavedSession,
        send_message: Arc<dyn MessageSender>,
    ) -> Result<bool, ReplicaError> {
        self.replicator
            .restore_session(session_id, saved, Some(send_message))
    }

    /// Pushes the subscription's pending changes to the client
    pub fn sync_session(
        &mut self,
        session_id: SessionId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, ReplicaError> {
        self.replicator.sync_session(session_id, subscription_id)
    }

    /// Processes one incoming message for a session. Calls run through the
    /// call pipeline and are always answered; a call that cannot be read is
    /// answered unsynced. Other message kinds are not expected from clients
    /// and are dropped.
    pub async fn process_message(
        &mut self,
        session_id: SessionId,
        subscription_id: SubscriptionId,
        message: Message,
        mut restore_session: Option<RestoreSessionCallback>,
    ) -> Result<(), ReplicaError> {
        if message.kind != MessageType::Call {
            warn!(
                "Session {} ignoring unexpected {:?} message",
                session_id, message.kind
            );
            return Ok(());
        }

        let remote_call = match RemoteCall::try_from(&message).and_then(|remote_call| {
            self.replicator
                .try_session(session_id)?
                .ledger()
                .try_subscription(subscription_id)?;
            Ok(remote_call)
        }) {
            Ok(remote_call) => remote_call,
            Err(err) => {
                let Some(remote_call_id) = message.remote_call_id else {
                    return Err(err);
                };
                warn!(
                    "Session {} rejecting remote call {}: {}",
                    session_id, remote_call_id, err
                );
                return process_call::reject_call(
                    self,
                    session_id,
                    subscription_id,
                    remote_call_id,
                );
            }
        };
        let remote_call_id = message.remote_call_id.unwrap_or_default();
        let session = self.replicator.try_session_mut(session_id)?;
        session.increment_call_count();
        info!(
            "Session {} received call {} (sequence {}, remote call {})",
            session_id, remote_call.name, remote_call.sequence, remote_call_id
        );

        let mut context = CallContext::new(remote_call_id, remote_call.sequence);
        process_call::process_call(
            self,
            process_call::CallTarget {
                session_id,
                subscription_id,
                remote_call: &remote_call,
            },
            &mut context,
            restore_session.as_mut(),
        )
        .await
    }
}
