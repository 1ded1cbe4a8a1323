use std::collections::{BTreeMap, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{error::RemoteCallError, ObjectId, RemoteCall, RemoteCallId, Value};

pub type RemoteCallResult = Result<Value, RemoteCallError>;

/// A call waiting for the transport to be enabled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCall {
    pub remote_call_id: RemoteCallId,
    pub call: RemoteCall,
}

/// The deferred result of a call that has not been answered yet
#[derive(Debug)]
pub struct PendingCall {
    pub name: String,
    sender: oneshot::Sender<RemoteCallResult>,
}

impl PendingCall {
    pub fn resolve(self, result: RemoteCallResult) {
        if self.sender.send(result).is_err() {
            debug!("Result of remote call {} was dropped by the caller", self.name);
        }
    }
}

/// Outbound calls in issue order, plus the deferred results of every call
/// not yet answered. Deferred results are never serialized.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallQueue {
    queued: VecDeque<QueuedCall>,
    #[serde(skip)]
    pending: BTreeMap<RemoteCallId, PendingCall>,
    next_pending_remote_call_id: RemoteCallId,
    sequence: u64,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a call, returning its id and the receiving end of its result
    pub fn push(
        &mut self,
        id: ObjectId,
        name: &str,
        args: String,
    ) -> (RemoteCallId, oneshot::Receiver<RemoteCallResult>) {
        self.next_pending_remote_call_id += 1;
        self.sequence += 1;
        let remote_call_id = self.next_pending_remote_call_id;

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            remote_call_id,
            PendingCall {
                name: name.to_string(),
                sender,
            },
        );
        self.queued.push_back(QueuedCall {
            remote_call_id,
            call: RemoteCall {
                id,
                name: name.to_string(),
                sequence: self.sequence,
                changes: String::new(),
                args,
            },
        });
        (remote_call_id, receiver)
    }

    pub fn pop_front(&mut self) -> Option<QueuedCall> {
        self.queued.pop_front()
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedCall> {
        self.queued.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn take_pending(&mut self, remote_call_id: RemoteCallId) -> Option<PendingCall> {
        self.pending.remove(&remote_call_id)
    }

    /// Rejects every pending result and drops every queued call
    pub fn clear(&mut self) -> usize {
        self.queued.clear();
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (remote_call_id, call) in pending {
            call.resolve(Err(RemoteCallError::Cleared { remote_call_id }));
        }
        count
    }

    pub fn referenced_ids(&self) -> Vec<ObjectId> {
        self.queued
            .iter()
            .flat_map(|queued| queued.call.referenced_ids())
            .collect()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
