use std::collections::HashSet;

use log::debug;

use super::Session;
use crate::ObjectId;

impl Session {
    /// Discards every object not reachable from the roots, from objects
    /// with pending subscription changes, or from queued calls. While a
    /// subscription is live, objects already exchanged with the peer count
    /// as roots too. Returns the number of objects removed. Removed ids are
    /// never handed out again.
    pub fn collect_garbage(&mut self) -> usize {
        let mut pending: Vec<ObjectId> = self.roots.iter().cloned().collect();
        if self.ledger.subscriptions().next().is_some() {
            pending.extend(self.synced.iter().cloned());
        }
        pending.extend(self.ledger.referenced_ids());
        pending.extend(self.calls.referenced_ids());

        let mut reachable = HashSet::new();
        while let Some(object_id) = pending.pop() {
            if !reachable.insert(object_id.clone()) {
                continue;
            }
            if let Some(object) = self.objects.get(&object_id) {
                object.references(&mut pending);
            }
        }

        let before = self.objects.len();
        self.objects
            .retain(|object_id, _| reachable.contains(object_id));
        self.synced
            .retain(|object_id| reachable.contains(object_id));
        let removed = before - self.objects.len();
        if removed > 0 {
            debug!(
                "Session {} garbage collected {} of {} objects",
                self.id, removed, before
            );
        }
        removed
    }
}
