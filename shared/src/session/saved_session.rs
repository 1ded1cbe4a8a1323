use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::info;
use serde::{Deserialize, Serialize};

use super::Session;
use crate::{
    ledger::ChangeLedger,
    messages::{CallQueue, MessageSender},
    ObjectId, Protocol, ReplicaError, Role, SessionId, TrackedObject,
};

/// A serialized session together with its revision bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub revision: u64,
    pub data: String,
    pub call_count: u64,
    /// Number of holders of this snapshot
    pub referenced: u32,
}

impl SavedSession {
    pub fn reference(&mut self) {
        self.referenced += 1;
    }

    pub fn release(&mut self) {
        self.referenced = self.referenced.saturating_sub(1);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSnapshotRef<'a> {
    id: SessionId,
    role: Role,
    objects: &'a IndexMap<ObjectId, TrackedObject>,
    next_obj_id: u64,
    ledger: &'a ChangeLedger,
    roots: &'a IndexSet<ObjectId>,
    synced: &'a IndexSet<ObjectId>,
    next_save_session_id: u64,
    saved_session_id: u64,
    call_count: u64,
    calls: &'a CallQueue,
    send_message_enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSnapshot {
    id: SessionId,
    role: Role,
    objects: IndexMap<ObjectId, TrackedObject>,
    next_obj_id: u64,
    ledger: ChangeLedger,
    roots: IndexSet<ObjectId>,
    #[serde(default)]
    synced: IndexSet<ObjectId>,
    next_save_session_id: u64,
    saved_session_id: u64,
    call_count: u64,
    calls: CallQueue,
    send_message_enabled: bool,
}

impl Session {
    /// Garbage collects, then serializes the session under the next revision
    pub fn save(&mut self) -> Result<SavedSession, ReplicaError> {
        self.collect_garbage();

        let revision = self.next_save_session_id;
        self.next_save_session_id += 1;
        self.saved_session_id = revision;

        let data = serde_json::to_string(&SessionSnapshotRef {
            id: self.id,
            role: self.role,
            objects: &self.objects,
            next_obj_id: self.next_obj_id,
            ledger: &self.ledger,
            roots: &self.roots,
            synced: &self.synced,
            next_save_session_id: self.next_save_session_id,
            saved_session_id: self.saved_session_id,
            call_count: self.call_count,
            calls: &self.calls,
            send_message_enabled: self.send_message_enabled,
        })
        .map_err(ReplicaError::serialization)?;

        info!(
            "Saved session {} at revision {} ({} objects)",
            self.id,
            revision,
            self.objects.len()
        );
        Ok(SavedSession {
            revision,
            data,
            call_count: self.call_count,
            referenced: 0,
        })
    }

    /// Rehydrates a saved session and binds it to `send_message`. Pending
    /// call results are not part of a snapshot.
    pub fn restore(
        saved: &SavedSession,
        protocol: Arc<Protocol>,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Result<Session, ReplicaError> {
        let snapshot: SessionSnapshot =
            serde_json::from_str(&saved.data).map_err(ReplicaError::serialization)?;

        for object in snapshot.objects.values() {
            protocol.try_template(object.template_name())?;
        }

        let mut session = Session::new(snapshot.id, snapshot.role, protocol, send_message);
        session.objects = snapshot.objects;
        session.next_obj_id = snapshot.next_obj_id;
        session.ledger = snapshot.ledger;
        session.roots = snapshot.roots;
        session.synced = snapshot.synced;
        session.next_save_session_id = snapshot.next_save_session_id;
        session.saved_session_id = snapshot.saved_session_id;
        session.call_count = snapshot.call_count;
        session.calls = snapshot.calls;
        session.send_message_enabled = snapshot.send_message_enabled;
        Ok(session)
    }
}
