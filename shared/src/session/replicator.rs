use std::{collections::HashMap, sync::Arc};

use log::{info, warn};

use super::{SavedSession, Session};
use crate::{
    ledger::ChangeGroup,
    messages::{Message, MessageSender},
    Protocol, ReplicaError, Role, SessionId, SubscriptionId,
};

/// Owns every session of a process and tracks which one is current
pub struct Replicator {
    protocol: Arc<Protocol>,
    sessions: HashMap<SessionId, Session>,
    next_session_id: SessionId,
    current_session: Option<SessionId>,
}

impl Replicator {
    pub fn new(protocol: Protocol) -> Self {
        Self::with_protocol(Arc::new(protocol))
    }

    pub fn with_protocol(protocol: Arc<Protocol>) -> Self {
        Self {
            protocol,
            sessions: HashMap::new(),
            next_session_id: 1,
            current_session: None,
        }
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    /// Creates a session, replacing any session that already has the id,
    /// and makes it current
    pub fn create_session(
        &mut self,
        role: Role,
        send_message: Option<Arc<dyn MessageSender>>,
        session_id: Option<SessionId>,
    ) -> SessionId {
        let session_id = match session_id {
            Some(session_id) => session_id,
            None => {
                while self.sessions.contains_key(&self.next_session_id) {
                    self.next_session_id += 1;
                }
                self.next_session_id
            }
        };
        self.next_session_id = self.next_session_id.max(session_id + 1);

        let session = Session::new(session_id, role, Arc::clone(&self.protocol), send_message);
        if let Some(mut replaced) = self.sessions.insert(session_id, session) {
            warn!("Replacing existing session {}", session_id);
            replaced.clear_pending_calls();
        }
        self.current_session = Some(session_id);
        info!("Created {} session {}", role, session_id);
        session_id
    }

    /// Removes a session, rejecting its unanswered calls
    pub fn delete_session(&mut self, session_id: SessionId) -> Result<(), ReplicaError> {
        let mut session = self
            .sessions
            .remove(&session_id)
            .ok_or(ReplicaError::SessionNotFound { session_id })?;
        session.clear_pending_calls();
        if self.current_session == Some(session_id) {
            self.current_session = None;
        }
        info!("Deleted session {}", session_id);
        Ok(())
    }

    pub fn set_session(&mut self, session_id: SessionId) -> Result<(), ReplicaError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(ReplicaError::SessionNotFound { session_id });
        }
        self.current_session = Some(session_id);
        Ok(())
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current_session
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions.keys()
    }

    pub fn session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn session_mut(&mut self, session_id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    pub fn try_session(&self, session_id: SessionId) -> Result<&Session, ReplicaError> {
        self.sessions
            .get(&session_id)
            .ok_or(ReplicaError::SessionNotFound { session_id })
    }

    pub fn try_session_mut(&mut self, session_id: SessionId) -> Result<&mut Session, ReplicaError> {
        self.sessions
            .get_mut(&session_id)
            .ok_or(ReplicaError::SessionNotFound { session_id })
    }

    pub fn current(&self) -> Result<&Session, ReplicaError> {
        let session_id = self.current_session.ok_or(ReplicaError::NoCurrentSession)?;
        self.try_session(session_id)
    }

    pub fn current_mut(&mut self) -> Result<&mut Session, ReplicaError> {
        let session_id = self.current_session.ok_or(ReplicaError::NoCurrentSession)?;
        self.try_session_mut(session_id)
    }

    pub fn subscribe(&mut self, role: Role) -> Result<SubscriptionId, ReplicaError> {
        Ok(self.current_mut()?.subscribe(role))
    }

    /// Drains the current session's subscription
    pub fn get_changes(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<ChangeGroup, ReplicaError> {
        self.current_mut()?.drain_changes(subscription_id)
    }

    pub fn serialize_and_garbage_collect(&mut self) -> Result<SavedSession, ReplicaError> {
        self.current_mut()?.save()
    }

    pub fn save_session(&mut self, session_id: SessionId) -> Result<SavedSession, ReplicaError> {
        self.try_session_mut(session_id)?.save()
    }

    /// Replaces the session with a saved snapshot and makes it current.
    /// Returns false, leaving the live session alone, when the live session
    /// was saved at a later revision than the snapshot.
    pub fn restore_session(
        &mut self,
        session_id: SessionId,
        saved: &SavedSession,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<bool, ReplicaError> {
        if let Some(live) = self.sessions.get(&session_id) {
            if live.saved_session_id() > saved.revision {
                warn!(
                    "Not restoring session {}: snapshot revision {} is older than saved revision {}",
                    session_id,
                    saved.revision,
                    live.saved_session_id()
                );
                return Ok(false);
            }
        }

        let mut session = Session::restore(saved, Arc::clone(&self.protocol), send_message)?;
        session.id = session_id;
        if let Some(mut replaced) = self.sessions.insert(session_id, session) {
            replaced.clear_pending_calls();
        }
        self.next_session_id = self.next_session_id.max(session_id + 1);
        self.current_session = Some(session_id);
        info!(
            "Restored session {} from revision {}",
            session_id, saved.revision
        );
        Ok(true)
    }

    pub fn set_minimum_sequence(&mut self, next_obj_id: u64) -> Result<(), ReplicaError> {
        self.current_mut()?.set_minimum_sequence(next_obj_id);
        Ok(())
    }

    /// Enables or disables the current session's transport, rebinding it
    /// when `send_message` is given. Enabling flushes queued calls.
    pub fn enable_send_message(
        &mut self,
        enabled: bool,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<(), ReplicaError> {
        let session = self.current_mut()?;
        if send_message.is_some() {
            session.set_send_message(send_message);
        }
        session.enable_send_message(enabled);
        Ok(())
    }

    pub fn clear_pending_calls(&mut self) -> Result<usize, ReplicaError> {
        Ok(self.current_mut()?.clear_pending_calls())
    }

    pub fn pending_call_count(&self) -> usize {
        self.current()
            .map(Session::pending_call_count)
            .unwrap_or_default()
    }

    /// Pushes a subscription's pending changes to the peer as a `sync`
    /// message. Returns false when there was nothing to send.
    pub fn sync_session(
        &mut self,
        session_id: SessionId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, ReplicaError> {
        let session = self.try_session_mut(session_id)?;
        let changes = session.drain_changes(subscription_id)?;
        if changes.is_empty() {
            return Ok(false);
        }
        let message = Message::sync(changes.to_json_string()?);
        Ok(session.send(message))
    }

    /// Sends every tracked property of the session, for a peer that starts
    /// from an empty graph
    pub fn sync_full(&mut self, session_id: SessionId) -> Result<bool, ReplicaError> {
        let session = self.try_session_mut(session_id)?;
        let changes = session.full_change_group();
        if changes.is_empty() {
            return Ok(false);
        }
        session.mark_synced(changes.object_ids());
        let message = Message::sync(changes.to_json_string()?);
        Ok(session.send(message))
    }
}
