use std::{collections::BTreeMap, sync::Arc};

use log::{debug, info};

use crate::{
    codec::{self, ObjectResolver},
    ledger::ChangeGroup,
    ObjectId, ReplicaError, Role, Session, Value,
};

pub mod rollback;

pub use rollback::{RollbackLog, UndoRecord};

/// Resolves ids against the session, logging every stub it creates so a
/// failed apply can remove them again
struct StubResolver<'a> {
    session: &'a mut Session,
    undo: &'a mut RollbackLog,
}

impl ObjectResolver for StubResolver<'_> {
    fn resolve(&mut self, object_id: &ObjectId) -> Result<(), ReplicaError> {
        if self.session.ensure_object(object_id)? {
            debug!("Created stub object {}", object_id);
            self.undo.push(UndoRecord::Created {
                object_id: object_id.clone(),
            });
        }
        Ok(())
    }
}

/// Decodes a call's argument list, creating stubs for unknown object ids.
/// Every stub is logged in `undo` so a refused call can discard them.
pub fn resolve_arguments(
    session: &mut Session,
    args: &str,
    undo: &mut RollbackLog,
) -> Result<Vec<Value>, ReplicaError> {
    codec::extract_arguments(args, &mut StubResolver { session, undo })
}

/// Applies `changes` to the session all-or-nothing. Unless `force` is set,
/// every incoming old value must match the local current value. Returns the
/// number of objects changed.
///
/// A property whose current value already equals the incoming new value is
/// skipped without comparing the old value, so it never raises an update
/// conflict even when the old value is stale.
pub fn apply_changes(
    session: &mut Session,
    changes: &ChangeGroup,
    force: bool,
) -> Result<usize, ReplicaError> {
    let mut undo = RollbackLog::new();
    let mut summary = BTreeMap::new();

    match apply_all(session, &mut undo, &mut summary, changes, force) {
        Ok(changed) => {
            session.merge_change_summary(summary);
            session.mark_synced(changes.object_ids());
            if changed > 0 {
                debug!(
                    "Session {} applied changes to {} objects",
                    session.id(),
                    changed
                );
            }
            Ok(changed)
        }
        Err(err) => {
            info!(
                "Session {} rolling back {} changes: {}",
                session.id(),
                undo.len(),
                err
            );
            undo.replay(session);
            session.clear_change_summary();
            Err(err)
        }
    }
}

fn apply_all(
    session: &mut Session,
    undo: &mut RollbackLog,
    summary: &mut BTreeMap<String, usize>,
    changes: &ChangeGroup,
    force: bool,
) -> Result<usize, ReplicaError> {
    let protocol = Arc::clone(session.protocol());
    let role = session.role();
    let mut changed = 0;

    for (object_id, properties) in changes.iter() {
        StubResolver {
            session: &mut *session,
            undo: &mut *undo,
        }
        .resolve(object_id)?;
        let template = protocol.try_template(object_id.template_name())?;
        let mut object_changed = false;

        for (property, (old, new)) in properties {
            let (_, descriptor) = protocol.try_property(template.name(), property)?;
            if !protocol.is_accepted(template, property, role) {
                debug!("Ignoring {}.{} for {}", template.name(), property, role);
                continue;
            }

            let current = codec::to_transport(session.get(object_id.as_str(), property)?);
            if codec::values_match(&current, new) {
                continue;
            }
            let replace_array = descriptor.kind.is_array() && old.is_null();
            if !force && !replace_array && !codec::values_match(&current, old) {
                debug!(
                    "Update conflict on {}.{}: expected {} but found {}",
                    object_id, property, old, current
                );
                return Err(ReplicaError::UpdateConflict {
                    object_id: object_id.to_string(),
                    property: property.clone(),
                });
            }

            let value = codec::from_transport(
                new,
                &descriptor.kind,
                &mut StubResolver {
                    session: &mut *session,
                    undo: &mut *undo,
                },
            )?;

            if role == Role::Server {
                if let Some(validator) = template.property_validator() {
                    if !validator(session, object_id, property, &value) {
                        return Err(ReplicaError::Authorization {
                            reason: format!(
                                "{}.{} rejected by validator",
                                template.name(),
                                property
                            ),
                        });
                    }
                }
            }

            let Some(object) = session.object_mut(object_id.as_str()) else {
                return Err(ReplicaError::ObjectNotFound {
                    object_id: object_id.to_string(),
                });
            };
            let prior = object.set_raw(property, value);
            undo.push(UndoRecord::Property {
                object_id: object_id.clone(),
                property: property.clone(),
                prior,
            });
            *summary
                .entry(format!("{}.{}", template.name(), property))
                .or_default() += 1;
            object_changed = true;
        }

        if object_changed {
            changed += 1;
        }
    }

    Ok(changed)
}
