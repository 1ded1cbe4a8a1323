use std::{collections::BTreeMap, fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::{
    apply,
    codec::{self, ObjectResolver},
    ledger::{ArrayGroup, ChangeGroup, ChangeKind, ChangeLedger},
    messages::{CallQueue, Message, MessageSender, PendingCall, RemoteCallResult},
    protocol::template::{PropertyDescriptor, PropertyKind},
    ObjectId, Protocol, RemoteCallId, ReplicaError, Role, SessionId, SubscriptionId, Template,
    TrackedObject, Value,
};

mod call_scope;
mod gc;
mod replicator;
mod saved_session;

pub use call_scope::CallScope;
pub use replicator::Replicator;
pub use saved_session::SavedSession;

/// One peer's live object graph, its change subscriptions, its outbound
/// call queue and the transport bound to it
pub struct Session {
    id: SessionId,
    role: Role,
    protocol: Arc<Protocol>,
    objects: IndexMap<ObjectId, TrackedObject>,
    next_obj_id: u64,
    ledger: ChangeLedger,
    roots: IndexSet<ObjectId>,
    /// Objects sent to or received from a peer
    synced: IndexSet<ObjectId>,
    next_save_session_id: u64,
    saved_session_id: u64,
    call_count: u64,
    change_summary: BTreeMap<String, usize>,
    calls: CallQueue,
    send_message: Option<Arc<dyn MessageSender>>,
    send_message_enabled: bool,
    change_tracking: bool,
}

impl Session {
    pub fn new(
        id: SessionId,
        role: Role,
        protocol: Arc<Protocol>,
        send_message: Option<Arc<dyn MessageSender>>,
    ) -> Self {
        Self {
            id,
            role,
            protocol,
            objects: IndexMap::new(),
            next_obj_id: 1,
            ledger: ChangeLedger::new(),
            roots: IndexSet::new(),
            synced: IndexSet::new(),
            next_save_session_id: 1,
            saved_session_id: 0,
            call_count: 0,
            change_summary: BTreeMap::new(),
            calls: CallQueue::new(),
            send_message,
            send_message_enabled: true,
            change_tracking: true,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    // Objects

    /// Creates an object with the next id of this session, never reused
    pub fn create_object(&mut self, template_name: &str) -> Result<ObjectId, ReplicaError> {
        let template = self.protocol.try_template(template_name)?;
        let object_id = ObjectId::new(self.role, template_name, self.next_obj_id);
        self.next_obj_id += 1;
        self.objects.insert(
            object_id.clone(),
            TrackedObject::new(object_id.clone(), template),
        );
        debug!("Session {} created {}", self.id, object_id);
        Ok(object_id)
    }

    /// Makes sure `object_id` exists, creating a stub from the template
    /// named in the id. Returns whether a stub was created.
    pub(crate) fn ensure_object(&mut self, object_id: &ObjectId) -> Result<bool, ReplicaError> {
        if self.objects.contains_key(object_id) {
            return Ok(false);
        }
        let template = self.protocol.try_template(object_id.template_name())?;
        self.objects.insert(
            object_id.clone(),
            TrackedObject::new(object_id.clone(), template),
        );
        if object_id.role_prefix() == self.role.as_str() {
            self.next_obj_id = self.next_obj_id.max(object_id.ordinal() + 1);
        }
        Ok(true)
    }

    pub(crate) fn remove_object(&mut self, object_id: &ObjectId) -> Option<TrackedObject> {
        self.synced.shift_remove(object_id);
        self.objects.shift_remove(object_id)
    }

    pub(crate) fn object_mut(&mut self, object_id: &str) -> Option<&mut TrackedObject> {
        self.objects.get_mut(object_id)
    }

    pub fn object(&self, object_id: &str) -> Option<&TrackedObject> {
        self.objects.get(object_id)
    }

    pub fn try_object(&self, object_id: &str) -> Result<&TrackedObject, ReplicaError> {
        self.objects
            .get(object_id)
            .ok_or_else(|| ReplicaError::ObjectNotFound {
                object_id: object_id.to_string(),
            })
    }

    pub fn objects(&self) -> &IndexMap<ObjectId, TrackedObject> {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, object_id: &str, property: &str) -> Result<&Value, ReplicaError> {
        let object = self.try_object(object_id)?;
        object
            .get(property)
            .ok_or_else(|| ReplicaError::UnknownProperty {
                template_name: object.template_name().to_string(),
                property: property.to_string(),
            })
    }

    /// Sets a property, recording `[old, new]` for every subscription when
    /// the property is tracked for this session's role
    pub fn set(
        &mut self,
        object_id: &ObjectId,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), ReplicaError> {
        let value = value.into();
        let protocol = Arc::clone(&self.protocol);
        let (template, descriptor) = self.descriptor(&protocol, object_id, property)?;
        check_kind(&descriptor.kind, &value)?;

        let tracked = self.is_tracked(&protocol, template, property);
        let Some(object) = self.objects.get_mut(object_id) else {
            return Err(not_found(object_id));
        };

        if descriptor.kind.is_array() {
            if tracked {
                let old = object.get(property).cloned().unwrap_or_default();
                self.ledger
                    .record_array(object_id, property, array_contents(&old));
            }
            object.set_raw(property, value);
            return Ok(());
        }

        let prior = object.set_raw(property, value.clone());
        if tracked {
            let (old, new) = (codec::to_transport(&prior), codec::to_transport(&value));
            if !codec::values_match(&old, &new) {
                self.ledger.record(object_id, property, old, new);
            }
        }
        Ok(())
    }

    /// Mutates an array in place after snapshotting its prior contents
    pub fn mutate_array<F>(
        &mut self,
        object_id: &ObjectId,
        property: &str,
        mutate: F,
    ) -> Result<(), ReplicaError>
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let protocol = Arc::clone(&self.protocol);
        let (template, descriptor) = self.descriptor(&protocol, object_id, property)?;
        require_array(descriptor, property)?;

        let tracked = self.is_tracked(&protocol, template, property);
        let Some(slot) = self
            .objects
            .get_mut(object_id)
            .and_then(|object| object.get_mut(property))
        else {
            return Err(not_found(object_id));
        };
        if tracked {
            self.ledger
                .record_array(object_id, property, array_contents(slot));
        }
        if !matches!(slot, Value::Array(_)) {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(values) = slot {
            mutate(values);
        }
        Ok(())
    }

    /// Replaces `delete_count` elements at `start` with `items`, returning
    /// the removed elements. The array is logged for wholesale replacement.
    pub fn splice_array(
        &mut self,
        object_id: &ObjectId,
        property: &str,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, ReplicaError> {
        let protocol = Arc::clone(&self.protocol);
        let (template, descriptor) = self.descriptor(&protocol, object_id, property)?;
        require_array(descriptor, property)?;
        for item in &items {
            check_element(&descriptor.kind, item)?;
        }

        let tracked = self.is_tracked(&protocol, template, property);
        let Some(slot) = self
            .objects
            .get_mut(object_id)
            .and_then(|object| object.get_mut(property))
        else {
            return Err(not_found(object_id));
        };
        if !matches!(slot, Value::Array(_)) {
            *slot = Value::Array(Vec::new());
        }
        let mut removed = Vec::new();
        if let Value::Array(values) = slot {
            let start = start.min(values.len());
            let end = start.saturating_add(delete_count).min(values.len());
            removed = values.splice(start..end, items).collect();
            if tracked {
                self.ledger.record_array_dirty(object_id, property, values);
            }
        }
        Ok(removed)
    }

    /// Logs an array for wholesale replacement with its current contents
    pub fn mark_array_dirty(
        &mut self,
        object_id: &ObjectId,
        property: &str,
    ) -> Result<(), ReplicaError> {
        let protocol = Arc::clone(&self.protocol);
        let (template, descriptor) = self.descriptor(&protocol, object_id, property)?;
        require_array(descriptor, property)?;
        if !self.is_tracked(&protocol, template, property) {
            return Ok(());
        }
        let current = self.get(object_id.as_str(), property)?.clone();
        self.ledger
            .record_array_dirty(object_id, property, array_contents(&current));
        Ok(())
    }

    /// Runs `f` with change recording switched off
    pub fn without_change_tracking<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.change_tracking, false);
        let result = f(self);
        self.change_tracking = previous;
        result
    }

    pub fn is_change_tracking(&self) -> bool {
        self.change_tracking
    }

    fn descriptor<'p>(
        &self,
        protocol: &'p Protocol,
        object_id: &ObjectId,
        property: &str,
    ) -> Result<(&'p Template, &'p PropertyDescriptor), ReplicaError> {
        let object = self.try_object(object_id.as_str())?;
        protocol.try_property(object.template_name(), property)
    }

    fn is_tracked(&self, protocol: &Protocol, template: &Template, property: &str) -> bool {
        self.change_tracking && protocol.is_tracked(template, property, self.role)
    }

    // Roots

    /// Keeps an object, and everything it references, alive through
    /// garbage collection
    pub fn add_root(&mut self, object_id: &ObjectId) {
        self.roots.insert(object_id.clone());
    }

    pub fn remove_root(&mut self, object_id: &ObjectId) -> bool {
        self.roots.shift_remove(object_id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ObjectId> {
        self.roots.iter()
    }

    /// Objects a peer holds a copy of. Kept alive by garbage collection
    /// while the session has a subscription.
    pub fn synced(&self) -> impl Iterator<Item = &ObjectId> {
        self.synced.iter()
    }

    pub(crate) fn mark_synced<'a>(&mut self, object_ids: impl IntoIterator<Item = &'a ObjectId>) {
        for object_id in object_ids {
            if self.objects.contains_key(object_id) {
                self.synced.insert(object_id.clone());
            }
        }
    }

    // Subscriptions

    pub fn subscribe(&mut self, role: Role) -> SubscriptionId {
        self.ledger.subscribe(role)
    }

    pub fn unsubscribe(&mut self, subscription_id: SubscriptionId) -> bool {
        self.ledger.unsubscribe(subscription_id).is_some()
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Turns precise array snapshots and dirty arrays into `[old, new]`
    /// changes in every subscription, then clears both array logs
    pub fn convert_array_references_to_changes(&mut self) {
        let objects = &self.objects;
        let current = |key: &str| -> Option<(ObjectId, String, serde_json::Value)> {
            let (object_id, property) = ArrayGroup::split_key(key).ok()?;
            let value = objects.get(&object_id)?.get(property)?;
            Some((object_id, property.to_string(), codec::to_transport(value)))
        };

        for (_, subscription) in self.ledger.subscriptions_mut() {
            let log = &mut subscription.log;
            let array = std::mem::take(&mut log.array);
            let array_dirty = std::mem::take(&mut log.array_dirty);

            for (key, snapshot) in array.iter() {
                let Some((object_id, property, new)) = current(key.as_str()) else {
                    continue;
                };
                let old = codec::to_transport(&Value::Array(snapshot.clone()));
                if !codec::values_match(&old, &new) {
                    log.change.record(&object_id, &property, old, new);
                }
            }
            for key in array_dirty.keys() {
                if array.keys().any(|snapshot_key| snapshot_key == key) {
                    continue;
                }
                let Some((object_id, property, new)) = current(key.as_str()) else {
                    continue;
                };
                log.change
                    .record(&object_id, &property, serde_json::Value::Null, new);
            }
        }
    }

    /// Atomically returns and clears every log of the subscription
    pub fn drain_changes(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<ChangeGroup, ReplicaError> {
        self.ledger.try_subscription(subscription_id)?;
        self.convert_array_references_to_changes();
        let changes = self.ledger.drain(subscription_id)?.change;
        self.mark_synced(changes.object_ids());
        Ok(changes)
    }

    pub fn get_change_group(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<&ChangeGroup, ReplicaError> {
        self.ledger.get_change_group(subscription_id)
    }

    pub fn get_array_group(
        &self,
        kind: ChangeKind,
        subscription_id: SubscriptionId,
    ) -> Result<Option<&ArrayGroup>, ReplicaError> {
        self.ledger.get_array_group(kind, subscription_id)
    }

    pub fn delete_change_group(
        &mut self,
        kind: ChangeKind,
        subscription_id: SubscriptionId,
    ) -> Result<(), ReplicaError> {
        self.ledger.delete_change_group(kind, subscription_id)
    }

    pub fn delete_changes(&mut self) {
        self.ledger.delete_changes();
    }

    pub fn change_status(&self) -> String {
        self.ledger.change_status()
    }

    /// Every tracked property of every object against its template default,
    /// for bringing a new peer up to date
    pub fn full_change_group(&self) -> ChangeGroup {
        codec::diff_graphs(&self.protocol, self.role, &IndexMap::new(), &self.objects)
    }

    // Apply

    /// Applies an incoming ChangeGroup all-or-nothing, returning the number
    /// of objects changed. Properties already holding the new value are
    /// skipped even when their old value is stale.
    pub fn apply_changes(
        &mut self,
        changes: &ChangeGroup,
        force: bool,
    ) -> Result<usize, ReplicaError> {
        apply::apply_changes(self, changes, force)
    }

    /// `Template.property` → number of incoming changes applied
    pub fn change_summary(&self) -> &BTreeMap<String, usize> {
        &self.change_summary
    }

    pub fn change_string(&self) -> String {
        self.change_summary
            .iter()
            .map(|(key, count)| format!("{}:{}", key, count))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn clear_change_summary(&mut self) {
        self.change_summary.clear();
    }

    pub(crate) fn merge_change_summary(&mut self, summary: BTreeMap<String, usize>) {
        for (key, count) in summary {
            *self.change_summary.entry(key).or_default() += count;
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn increment_call_count(&mut self) {
        self.call_count += 1;
    }

    // Outbound calls

    /// Queues a call on `target` and sends it at once when the transport is
    /// enabled. The receiver yields the call's result.
    pub fn queue_call(
        &mut self,
        target: &ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<(RemoteCallId, oneshot::Receiver<RemoteCallResult>), ReplicaError> {
        self.try_object(target.as_str())?;
        let args = codec::encode_arguments(args)?;
        let queued = self.calls.push(target.clone(), name, args);
        debug!(
            "Session {} queued call {} as remote call {}",
            self.id, name, queued.0
        );
        self.process_queue();
        Ok(queued)
    }

    /// Sends queued calls in order, each carrying the primary subscription's
    /// pending changes
    pub fn process_queue(&mut self) {
        if !self.send_message_enabled || self.send_message.is_none() {
            return;
        }
        while let Some(mut queued) = self.calls.pop_front() {
            queued.call.changes = self.drain_primary_changes();
            let message = Message::call(queued.remote_call_id, &queued.call);
            self.send(message);
        }
    }

    fn drain_primary_changes(&mut self) -> String {
        let Some(subscription_id) = self.ledger.primary_subscription_id() else {
            return "{}".to_string();
        };
        match self
            .drain_changes(subscription_id)
            .and_then(|changes| changes.to_json_string())
        {
            Ok(changes) => changes,
            Err(err) => {
                warn!("Session {} could not package changes: {}", self.id, err);
                "{}".to_string()
            }
        }
    }

    pub fn take_pending_call(&mut self, remote_call_id: RemoteCallId) -> Option<PendingCall> {
        self.calls.take_pending(remote_call_id)
    }

    /// Rejects every unanswered call and discards the queue
    pub fn clear_pending_calls(&mut self) -> usize {
        let cleared = self.calls.clear();
        if cleared > 0 {
            debug!("Session {} cleared {} pending calls", self.id, cleared);
        }
        cleared
    }

    pub fn pending_call_count(&self) -> usize {
        self.calls.pending_len()
    }

    pub fn queued_call_count(&self) -> usize {
        self.calls.queued_len()
    }

    // Transport

    pub fn set_send_message(&mut self, send_message: Option<Arc<dyn MessageSender>>) {
        self.send_message = send_message;
    }

    /// Enabling flushes queued calls in order
    pub fn enable_send_message(&mut self, enabled: bool) {
        self.send_message_enabled = enabled;
        if enabled {
            self.process_queue();
        }
    }

    pub fn is_send_message_enabled(&self) -> bool {
        self.send_message_enabled
    }

    /// Hands a message to the transport, returning false if none is bound
    pub fn send(&self, message: Message) -> bool {
        match &self.send_message {
            Some(send_message) => {
                send_message.send(message);
                true
            }
            None => {
                warn!(
                    "Session {} has no transport, dropping {:?} message",
                    self.id, message.kind
                );
                false
            }
        }
    }

    // Ids

    /// Raises the next object ordinal to at least `next_obj_id`
    pub fn set_minimum_sequence(&mut self, next_obj_id: u64) {
        self.next_obj_id = self.next_obj_id.max(next_obj_id);
    }

    pub fn next_obj_id(&self) -> u64 {
        self.next_obj_id
    }

    pub fn saved_session_id(&self) -> u64 {
        self.saved_session_id
    }
}

impl ObjectResolver for Session {
    fn resolve(&mut self, object_id: &ObjectId) -> Result<(), ReplicaError> {
        self.ensure_object(object_id).map(|_| ())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("objects", &self.objects.len())
            .field("next_obj_id", &self.next_obj_id)
            .field("send_message_enabled", &self.send_message_enabled)
            .finish()
    }
}

fn not_found(object_id: &ObjectId) -> ReplicaError {
    ReplicaError::ObjectNotFound {
        object_id: object_id.to_string(),
    }
}

fn array_contents(value: &Value) -> &[Value] {
    match value {
        Value::Array(values) => values,
        _ => &[],
    }
}

fn require_array(descriptor: &PropertyDescriptor, property: &str) -> Result<(), ReplicaError> {
    if descriptor.kind.is_array() {
        Ok(())
    } else {
        Err(ReplicaError::Serialization {
            reason: format!("property {} is not an array", property),
        })
    }
}

fn check_kind(kind: &PropertyKind, value: &Value) -> Result<(), ReplicaError> {
    match (kind, value) {
        (_, Value::Null) => Ok(()),
        (PropertyKind::ScalarArray | PropertyKind::ReferenceArray(_), Value::Array(values)) => {
            values.iter().try_for_each(|value| check_element(kind, value))
        }
        (PropertyKind::Scalar, Value::Bool(_) | Value::Number(_) | Value::String(_)) => Ok(()),
        (PropertyKind::Reference(_), Value::Ref(_)) => Ok(()),
        (kind, value) => Err(ReplicaError::Serialization {
            reason: format!("{:?} cannot hold {:?}", kind, value),
        }),
    }
}

fn check_element(kind: &PropertyKind, value: &Value) -> Result<(), ReplicaError> {
    match (kind, value) {
        (_, Value::Null) => Ok(()),
        (PropertyKind::ScalarArray, Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
            Ok(())
        }
        (PropertyKind::ReferenceArray(_), Value::Ref(_)) => Ok(()),
        (kind, value) => Err(ReplicaError::Serialization {
            reason: format!("{:?} cannot hold element {:?}", kind, value),
        }),
    }
}
