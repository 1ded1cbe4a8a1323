use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{object_id::ObjectId, value::Value};
use crate::Template;

/// A live instance of a template inside a session's object table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    id: ObjectId,
    template: String,
    properties: IndexMap<String, Value>,
}

impl TrackedObject {
    /// Creates an instance holding every declared property at its default
    pub fn new(id: ObjectId, template: &Template) -> Self {
        let properties = template
            .properties()
            .map(|(name, descriptor)| (name.to_string(), descriptor.default.clone()))
            .collect();
        Self {
            id,
            template: template.name().to_string(),
            properties,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn template_name(&self) -> &str {
        &self.template
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Writes without any change tracking, returning the prior value
    pub(crate) fn set_raw(&mut self, property: &str, value: Value) -> Value {
        self.properties
            .insert(property.to_string(), value)
            .unwrap_or_default()
    }

    pub(crate) fn get_mut(&mut self, property: &str) -> Option<&mut Value> {
        self.properties.get_mut(property)
    }

    pub(crate) fn references(&self, out: &mut Vec<ObjectId>) {
        for value in self.properties.values() {
            value.collect_references(out);
        }
    }
}
