use crate::{CallContext, CallError, ObjectId, Session, Value};

/// What a method body sees: the target object, the call context, and the
/// session the call runs in. Writes made through the scope are tracked and
/// travel back to the caller with the response.
pub struct CallScope<'a> {
    session: &'a mut Session,
    target: ObjectId,
    context: &'a CallContext,
}

impl<'a> CallScope<'a> {
    pub fn new(session: &'a mut Session, target: ObjectId, context: &'a CallContext) -> Self {
        Self {
            session,
            target,
            context,
        }
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn context(&self) -> &CallContext {
        self.context
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut *self.session
    }

    /// Reads a property of the target object
    pub fn get(&self, property: &str) -> Result<&Value, CallError> {
        Ok(self.session.get(self.target.as_str(), property)?)
    }

    /// Writes a property of the target object
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> Result<(), CallError> {
        Ok(self.session.set(&self.target, property, value)?)
    }

    pub fn get_on(&self, object_id: &ObjectId, property: &str) -> Result<&Value, CallError> {
        Ok(self.session.get(object_id.as_str(), property)?)
    }

    pub fn set_on(
        &mut self,
        object_id: &ObjectId,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), CallError> {
        Ok(self.session.set(object_id, property, value)?)
    }

    pub fn create_object(&mut self, template_name: &str) -> Result<ObjectId, CallError> {
        Ok(self.session.create_object(template_name)?)
    }
}
