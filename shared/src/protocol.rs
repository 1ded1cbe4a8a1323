use std::collections::HashMap;

use crate::{error::ReplicaError, PropertyDescriptor, Role};

pub mod error;
pub mod rules;
pub mod template;

pub use error::ProtocolError;
pub use rules::RuleSets;
pub use template::Template;

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

// Protocol
/// The registry of every template both sides agree on, plus the rule names
/// that activate rule-list directions. Shared by a server and its clients.
#[derive(Default)]
pub struct Protocol {
    templates: HashMap<String, Template>,
    pub rule_sets: RuleSets,
    locked: bool,
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    pub fn add_template(&mut self, template: Template) -> &mut Self {
        self.check_lock();
        if let Err(err) = self.insert_template(template) {
            panic!("{}", err);
        }
        self
    }

    pub fn to_client_rule(&mut self, rule: &str) -> &mut Self {
        self.check_lock();
        self.rule_sets.to_client.push(rule.to_string());
        self
    }

    pub fn to_server_rule(&mut self, rule: &str) -> &mut Self {
        self.check_lock();
        self.rule_sets.to_server.push(rule.to_string());
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_add_template(&mut self, template: Template) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.insert_template(template)?;
        Ok(self)
    }

    pub fn try_to_client_rule(&mut self, rule: &str) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.rule_sets.to_client.push(rule.to_string());
        Ok(self)
    }

    pub fn try_to_server_rule(&mut self, rule: &str) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.rule_sets.to_server.push(rule.to_string());
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    /// Checks if protocol is locked without panicking
    /// Returns Err if protocol is locked
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }

    fn insert_template(&mut self, template: Template) -> Result<(), ProtocolError> {
        let name = template.name();
        if name.is_empty() || name.contains('-') {
            return Err(ProtocolError::InvalidTemplateName {
                name: name.to_string(),
            });
        }
        if self.templates.contains_key(name) {
            return Err(ProtocolError::DuplicateTemplate {
                name: name.to_string(),
            });
        }
        self.templates.insert(name.to_string(), template);
        Ok(())
    }

    // Lookups

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn try_template(&self, name: &str) -> Result<&Template, ReplicaError> {
        self.templates
            .get(name)
            .ok_or_else(|| ReplicaError::UnknownTemplate {
                template_name: name.to_string(),
            })
    }

    pub fn try_property(
        &self,
        template_name: &str,
        property: &str,
    ) -> Result<(&Template, &PropertyDescriptor), ReplicaError> {
        let template = self.try_template(template_name)?;
        let descriptor =
            template
                .property_descriptor(property)
                .ok_or_else(|| ReplicaError::UnknownProperty {
                    template_name: template_name.to_string(),
                    property: property.to_string(),
                })?;
        Ok((template, descriptor))
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Whether a process of `role` records outgoing changes for the property
    pub fn is_tracked(&self, template: &Template, property: &str, role: Role) -> bool {
        template
            .property_descriptor(property)
            .is_some_and(|descriptor| rules::tracked(descriptor, template, role, &self.rule_sets))
    }

    /// Whether a process of `role` takes incoming changes for the property
    pub fn is_accepted(&self, template: &Template, property: &str, role: Role) -> bool {
        template
            .property_descriptor(property)
            .is_some_and(|descriptor| rules::accept(descriptor, template, role, &self.rule_sets))
    }
}
