//! Eligibility of a property for change tracking, based only on its
//! descriptor, its template and the role of the current process.

use super::template::{PropertyDescriptor, Template};
use crate::Role;

/// Rule names that activate rule-list directions, per direction
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSets {
    pub to_client: Vec<String>,
    pub to_server: Vec<String>,
}

/// Whether old values need tracking at all. Local properties, and properties
/// that go in neither direction, never cross the wire.
pub fn manage(descriptor: &PropertyDescriptor) -> bool {
    let local_alt = descriptor.to_server.is_never() && descriptor.to_client.is_never();
    !(descriptor.is_local || local_alt)
}

/// Whether a process of `role` produces outgoing changes for the property
pub fn create(
    descriptor: &PropertyDescriptor,
    template: &Template,
    role: Role,
    rule_sets: &RuleSets,
) -> bool {
    if descriptor.is_local {
        return false;
    }
    match role {
        Role::Client => template.to_server && descriptor.to_server.allows(&rule_sets.to_server),
        Role::Server => template.to_client && descriptor.to_client.allows(&rule_sets.to_client),
    }
}

/// Whether a process of `role` accepts incoming changes for the property
pub fn accept(
    descriptor: &PropertyDescriptor,
    template: &Template,
    role: Role,
    rule_sets: &RuleSets,
) -> bool {
    if descriptor.is_local {
        return false;
    }
    match role {
        Role::Server => template.to_server && descriptor.to_server.allows(&rule_sets.to_server),
        Role::Client => template.to_client && descriptor.to_client.allows(&rule_sets.to_client),
    }
}

/// Tracked when managed and changes may be created for the current role
pub fn tracked(
    descriptor: &PropertyDescriptor,
    template: &Template,
    role: Role,
    rule_sets: &RuleSets,
) -> bool {
    manage(descriptor) && create(descriptor, template, role, rule_sets)
}
