use std::sync::Arc;

use log::{debug, info, warn};

use ripple_shared::{
    codec, ChangeGroup, ErrorPayload, Message, MessageSender, MessageType, ObjectId, Protocol,
    RemoteCallError, RemoteCallResult, ReplicaError, Replicator, Role, SavedSession, Session,
    SessionId, SubscriptionId, Value,
};

use crate::{ClientConfig, RemoteCallHandle};

/// The calling side of a ripple connection. Owns a single client-role
/// session whose changes ride along with every outgoing call.
pub struct Client {
    replicator: Replicator,
    session_id: SessionId,
    subscription_id: SubscriptionId,
}

impl Client {
    /// Create a new Client
    pub fn new<P: Into<Protocol>>(
        client_config: ClientConfig,
        protocol: P,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<Self, ReplicaError> {
        let mut replicator = Replicator::new(protocol.into());
        let session_id = replicator.create_session(Role::Client, send_message, None);
        let subscription_id = replicator.subscribe(Role::Server)?;
        replicator.enable_send_message(client_config.start_enabled, None)?;

        Ok(Self {
            replicator,
            session_id,
            subscription_id,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    pub fn session(&self) -> Result<&Session, ReplicaError> {
        self.replicator.try_session(self.session_id)
    }

    pub fn session_mut(&mut self) -> Result<&mut Session, ReplicaError> {
        self.replicator.try_session_mut(self.session_id)
    }

    pub fn create_object(&mut self, template_name: &str) -> Result<ObjectId, ReplicaError> {
        self.session_mut()?.create_object(template_name)
    }

    pub fn get(&self, object_id: &ObjectId, property: &str) -> Result<&Value, ReplicaError> {
        self.session()?.get(object_id.as_str(), property)
    }

    pub fn set(
        &mut self,
        object_id: &ObjectId,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), ReplicaError> {
        self.session_mut()?.set(object_id, property, value)
    }

    /// Calls `name` on `target` on the server. The call carries every local
    /// change made since the previous call, and is held back in order while
    /// sending is disabled.
    pub fn call(
        &mut self,
        target: &ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<RemoteCallHandle, ReplicaError> {
        let (remote_call_id, receiver) = self.session_mut()?.queue_call(target, name, args)?;
        Ok(RemoteCallHandle::new(remote_call_id, receiver))
    }

    /// Enables or disables sending, optionally binding a new transport.
    /// Enabling flushes every queued call in issue order.
    pub fn enable_send_message(
        &mut self,
        enabled: bool,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<(), ReplicaError> {
        info!(
            "Client session {} sending {}",
            self.session_id,
            if enabled { "enabled" } else { "disabled" }
        );
        self.replicator.set_session(self.session_id)?;
        self.replicator.enable_send_message(enabled, send_message)
    }

    /// Rejects and discards every call that has not been answered
    pub fn clear_pending_calls(&mut self) -> Result<usize, ReplicaError> {
        Ok(self.session_mut()?.clear_pending_calls())
    }

    pub fn pending_call_count(&self) -> usize {
        self.session()
            .map(Session::pending_call_count)
            .unwrap_or_default()
    }

    pub fn save(&mut self) -> Result<SavedSession, ReplicaError> {
        self.replicator.save_session(self.session_id)
    }

    /// Replaces the session with a saved snapshot. Unanswered calls of the
    /// replaced session are rejected.
    pub fn restore(
        &mut self,
        saved: &SavedSession,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<bool, ReplicaError> {
        self.replicator
            .restore_session(self.session_id, saved, send_message)
    }

    /// Applies an incoming message: the carried changes are applied
    /// unconditionally, then the matching call, if any, is resolved
    pub fn handle_message(&mut self, message: Message) -> Result<(), ReplicaError> {
        let session_id = self.session_id;
        let applied = self.apply_incoming_changes(&message);

        match message.kind {
            MessageType::Sync => return applied,
            MessageType::Call => {
                warn!("Client session {} ignoring call from server", session_id);
                return applied;
            }
            MessageType::Response | MessageType::Retry | MessageType::Error => {}
        }

        let Some(remote_call_id) = message.remote_call_id else {
            warn!(
                "Client session {} received {:?} without a remote call id",
                session_id, message.kind
            );
            return applied;
        };
        let session = self.session_mut()?;
        let Some(pending) = session.take_pending_call(remote_call_id) else {
            debug!(
                "Client session {} has no pending call {}",
                session_id, remote_call_id
            );
            return applied;
        };

        let result = match &applied {
            Ok(()) => Self::call_result(session, &message, &pending.name),
            Err(error) => Err(RemoteCallError::Replica(error.clone())),
        };
        debug!(
            "Client session {} resolved {} ({}): {}",
            session_id,
            pending.name,
            remote_call_id,
            if result.is_ok() { "ok" } else { "err" }
        );
        pending.resolve(result);
        applied
    }

    fn apply_incoming_changes(&mut self, message: &Message) -> Result<(), ReplicaError> {
        let Some(changes) = message.changes.as_deref().filter(|_| message.has_changes()) else {
            return Ok(());
        };
        let changes = ChangeGroup::from_json_str(changes)?;
        let session = self.session_mut()?;
        session.clear_change_summary();
        session.apply_changes(&changes, true).map(|_| ())
    }

    fn call_result(session: &mut Session, message: &Message, name: &str) -> RemoteCallResult {
        match message.kind {
            MessageType::Response if message.is_synced() => {
                Ok(codec::decode_value(message.value.as_deref().unwrap_or_default(), session)?)
            }
            MessageType::Response => Err(RemoteCallError::Sync),
            MessageType::Retry => Err(RemoteCallError::UpdateConflict),
            MessageType::Error => Err(RemoteCallError::Remote {
                name: message.name.clone().unwrap_or_else(|| name.to_string()),
                payload: ErrorPayload::from_json_str(message.value.as_deref().unwrap_or_default()),
            }),
            MessageType::Call | MessageType::Sync => Ok(Value::Null),
        }
    }
}
