use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{ObjectId, ReplicaError, Value};

/// `[old, new]` transport values of one property
pub type ChangePair = (JsonValue, JsonValue);

/// Object id → property → `[old, new]`, the delta document exchanged between
/// peers. Insertion order is kept so drains replay mutations in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeGroup {
    objects: IndexMap<ObjectId, IndexMap<String, ChangePair>>,
}

impl ChangeGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the old value of the first record since the last drain and
    /// always takes the latest new value
    pub fn record(&mut self, object_id: &ObjectId, property: &str, old: JsonValue, new: JsonValue) {
        let properties = self.objects.entry(object_id.clone()).or_default();
        match properties.get_mut(property) {
            Some(pair) => pair.1 = new,
            None => {
                properties.insert(property.to_string(), (old, new));
            }
        }
    }

    /// Overwrites both halves of the pair
    pub fn insert(&mut self, object_id: &ObjectId, property: &str, old: JsonValue, new: JsonValue) {
        self.objects
            .entry(object_id.clone())
            .or_default()
            .insert(property.to_string(), (old, new));
    }

    pub fn get(&self, object_id: &str, property: &str) -> Option<&ChangePair> {
        self.objects.get(object_id)?.get(property)
    }

    pub fn contains_object(&self, object_id: &str) -> bool {
        self.objects.contains_key(object_id)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of objects with at least one change
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Number of `[old, new]` pairs across every object
    pub fn change_count(&self) -> usize {
        self.objects.values().map(IndexMap::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &IndexMap<String, ChangePair>)> {
        self.objects.iter()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    /// Distinct template names of the changed objects
    pub fn template_names(&self) -> BTreeSet<String> {
        self.objects
            .keys()
            .map(|id| id.template_name().to_string())
            .collect()
    }

    pub fn to_json_string(&self) -> Result<String, ReplicaError> {
        serde_json::to_string(self).map_err(ReplicaError::serialization)
    }

    /// Parses a serialized group; an empty string is an empty group
    pub fn from_json_str(changes: &str) -> Result<Self, ReplicaError> {
        if changes.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(changes).map_err(|err| ReplicaError::Sync {
            reason: format!("malformed change group: {}", err),
        })
    }
}

/// `objectId/propertyName` → array contents, in live form
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayGroup {
    arrays: IndexMap<String, Vec<Value>>,
}

impl ArrayGroup {
    pub fn key(object_id: &ObjectId, property: &str) -> String {
        format!("{}/{}", object_id, property)
    }

    /// Splits a key back into its object id and property name
    pub fn split_key(key: &str) -> Result<(ObjectId, &str), ReplicaError> {
        let (object_id, property) = key.split_once('/').ok_or_else(|| ReplicaError::Sync {
            reason: format!("malformed array key '{}'", key),
        })?;
        Ok((ObjectId::parse(object_id)?, property))
    }

    /// Stores `contents` unless the key already holds an earlier snapshot
    pub fn snapshot(&mut self, object_id: &ObjectId, property: &str, contents: &[Value]) {
        self.arrays
            .entry(Self::key(object_id, property))
            .or_insert_with(|| contents.to_vec());
    }

    pub fn replace(&mut self, object_id: &ObjectId, property: &str, contents: Vec<Value>) {
        self.arrays.insert(Self::key(object_id, property), contents);
    }

    pub fn get(&self, object_id: &ObjectId, property: &str) -> Option<&Vec<Value>> {
        self.arrays.get(&Self::key(object_id, property))
    }

    pub fn contains(&self, object_id: &ObjectId, property: &str) -> bool {
        self.arrays.contains_key(&Self::key(object_id, property))
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.arrays.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.arrays.keys()
    }
}
