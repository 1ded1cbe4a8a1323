use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{ObjectId, ReplicaError, Role, SubscriptionId, Value};

pub mod change_group;
pub mod subscription;

pub use change_group::{ArrayGroup, ChangeGroup, ChangePair};
pub use subscription::{ChangeKind, ChangeLog, Subscription};

/// Per-subscription logs of property and array mutations. Every recorded
/// mutation is fanned out to all subscriptions, each drained independently.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLedger {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_subscription_id: SubscriptionId,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, role: Role) -> SubscriptionId {
        let subscription_id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscriptions
            .insert(subscription_id, Subscription::new(role));
        debug!("New subscription {} for role {}", subscription_id, role);
        subscription_id
    }

    pub fn unsubscribe(&mut self, subscription_id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.remove(&subscription_id)
    }

    /// The first subscription still open, used for outgoing calls
    pub fn primary_subscription_id(&self) -> Option<SubscriptionId> {
        self.subscriptions.keys().next().copied()
    }

    pub fn subscription(&self, subscription_id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub fn try_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<&Subscription, ReplicaError> {
        self.subscriptions
            .get(&subscription_id)
            .ok_or(ReplicaError::SubscriptionNotFound { subscription_id })
    }

    pub(crate) fn try_subscription_mut(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<&mut Subscription, ReplicaError> {
        self.subscriptions
            .get_mut(&subscription_id)
            .ok_or(ReplicaError::SubscriptionNotFound { subscription_id })
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = (&SubscriptionId, &Subscription)> {
        self.subscriptions.iter()
    }

    pub(crate) fn subscriptions_mut(
        &mut self,
    ) -> impl Iterator<Item = (&SubscriptionId, &mut Subscription)> {
        self.subscriptions.iter_mut()
    }

    /// Records a scalar or reference mutation in every subscription
    pub fn record(&mut self, object_id: &ObjectId, property: &str, old: JsonValue, new: JsonValue) {
        for subscription in self.subscriptions.values_mut() {
            subscription
                .log
                .change
                .record(object_id, property, old.clone(), new.clone());
        }
    }

    /// Records the contents of an array before its first mutation since the
    /// last drain
    pub fn record_array(&mut self, object_id: &ObjectId, property: &str, contents: &[Value]) {
        for subscription in self.subscriptions.values_mut() {
            subscription.log.array.snapshot(object_id, property, contents);
        }
    }

    /// Records that an array must be replaced wholesale with `contents`
    pub fn record_array_dirty(&mut self, object_id: &ObjectId, property: &str, contents: &[Value]) {
        for subscription in self.subscriptions.values_mut() {
            subscription
                .log
                .array_dirty
                .replace(object_id, property, contents.to_vec());
        }
    }

    /// Returns the subscription's logs and leaves them empty
    pub fn drain(&mut self, subscription_id: SubscriptionId) -> Result<ChangeLog, ReplicaError> {
        let subscription = self.try_subscription_mut(subscription_id)?;
        Ok(std::mem::take(&mut subscription.log))
    }

    pub fn get_change_group(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<&ChangeGroup, ReplicaError> {
        Ok(&self.try_subscription(subscription_id)?.log.change)
    }

    /// `kind` must be one of the array logs; `Change` yields `None`
    pub fn get_array_group(
        &self,
        kind: ChangeKind,
        subscription_id: SubscriptionId,
    ) -> Result<Option<&ArrayGroup>, ReplicaError> {
        let log = &self.try_subscription(subscription_id)?.log;
        Ok(match kind {
            ChangeKind::Change => None,
            ChangeKind::Array => Some(&log.array),
            ChangeKind::ArrayDirty => Some(&log.array_dirty),
        })
    }

    pub fn delete_change_group(
        &mut self,
        kind: ChangeKind,
        subscription_id: SubscriptionId,
    ) -> Result<(), ReplicaError> {
        self.try_subscription_mut(subscription_id)?.log.clear(kind);
        Ok(())
    }

    /// Clears every log of every subscription
    pub fn delete_changes(&mut self) {
        for subscription in self.subscriptions.values_mut() {
            subscription.log = ChangeLog::default();
        }
    }

    pub fn has_changes(&self) -> bool {
        self.subscriptions
            .values()
            .any(|subscription| !subscription.log.is_empty())
    }

    /// Every object id named in any log
    pub fn referenced_ids(&self) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        for subscription in self.subscriptions.values() {
            let log = &subscription.log;
            ids.extend(log.change.object_ids().cloned());
            for key in log.array.keys().chain(log.array_dirty.keys()) {
                if let Ok((object_id, _)) = ArrayGroup::split_key(key) {
                    ids.push(object_id);
                }
            }
        }
        ids
    }

    /// Human-readable count of pending entries per subscription
    pub fn change_status(&self) -> String {
        self.subscriptions
            .iter()
            .map(|(subscription_id, subscription)| {
                format!(
                    "subscription {} ({}): {} changes, {} arrays, {} dirty arrays",
                    subscription_id,
                    subscription.role,
                    subscription.log.count(ChangeKind::Change),
                    subscription.log.count(ChangeKind::Array),
                    subscription.log.count(ChangeKind::ArrayDirty),
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
