use std::{collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{CallContext, CallError, CallScope, ObjectId, Role, Session, Value};

/// Whether a property (or a whole template) crosses the wire in one direction.
/// A rule list allows it only when the list shares a rule with the
/// Protocol's configured rule set for that direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Always(bool),
    Rules(Vec<String>),
}

impl Direction {
    pub fn allows(&self, rule_set: &[String]) -> bool {
        match self {
            Direction::Always(allowed) => *allowed,
            Direction::Rules(rules) => rules.iter().any(|rule| rule_set.contains(rule)),
        }
    }

    /// Explicitly `false`, as opposed to a rule list that may not match
    pub fn is_never(&self) -> bool {
        matches!(self, Direction::Always(false))
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Always(true)
    }
}

impl From<bool> for Direction {
    fn from(allowed: bool) -> Self {
        Direction::Always(allowed)
    }
}

impl From<Vec<&str>> for Direction {
    fn from(rules: Vec<&str>) -> Self {
        Direction::Rules(rules.into_iter().map(str::to_string).collect())
    }
}

/// Shape of a property's value, used to decode its transport form
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    /// Reference to an object of the named template
    Reference(String),
    ScalarArray,
    ReferenceArray(String),
}

impl PropertyKind {
    pub fn is_array(&self) -> bool {
        matches!(self, PropertyKind::ScalarArray | PropertyKind::ReferenceArray(_))
    }

    pub fn referenced_template(&self) -> Option<&str> {
        match self {
            PropertyKind::Reference(template) | PropertyKind::ReferenceArray(template) => {
                Some(template)
            }
            _ => None,
        }
    }
}

/// Static replication metadata for one property
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    /// Never leaves the process it was set in
    pub is_local: bool,
    pub to_server: Direction,
    pub to_client: Direction,
    pub default: Value,
}

impl PropertyDescriptor {
    pub fn scalar(default: impl Into<Value>) -> Self {
        Self::with_kind(PropertyKind::Scalar, default.into())
    }

    pub fn reference(template: &str) -> Self {
        Self::with_kind(PropertyKind::Reference(template.to_string()), Value::Null)
    }

    pub fn scalar_array() -> Self {
        Self::with_kind(PropertyKind::ScalarArray, Value::Array(Vec::new()))
    }

    pub fn reference_array(template: &str) -> Self {
        Self::with_kind(
            PropertyKind::ReferenceArray(template.to_string()),
            Value::Array(Vec::new()),
        )
    }

    fn with_kind(kind: PropertyKind, default: Value) -> Self {
        Self {
            kind,
            is_local: false,
            to_server: Direction::default(),
            to_client: Direction::default(),
            default,
        }
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    pub fn to_server(mut self, direction: impl Into<Direction>) -> Self {
        self.to_server = direction.into();
        self
    }

    pub fn to_client(mut self, direction: impl Into<Direction>) -> Self {
        self.to_client = direction.into();
        self
    }
}

pub type MethodBody =
    Arc<dyn Fn(&mut CallScope<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync>;

/// Per-method check run on the server with the decoded call arguments
pub type ServerValidator = Arc<dyn Fn(&Session, &ObjectId, &[Value]) -> bool + Send + Sync>;

/// Per-object authorization of an incoming call (`validateServerCall`)
pub type CallValidator =
    Arc<dyn Fn(&Session, &ObjectId, &str, &CallContext) -> bool + Send + Sync>;

/// Per-object authorization of an incoming property value
pub type PropertyValidator =
    Arc<dyn Fn(&Session, &ObjectId, &str, &Value) -> bool + Send + Sync>;

/// A method that may be invoked from the other side of the connection
#[derive(Clone)]
pub struct RemoteMethod {
    /// Side the method executes on
    pub on: Role,
    pub server_validation: Option<ServerValidator>,
    body: MethodBody,
}

impl RemoteMethod {
    pub fn on_server<F>(body: F) -> Self
    where
        F: Fn(&mut CallScope<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            on: Role::Server,
            server_validation: None,
            body: Arc::new(body),
        }
    }

    pub fn on_client<F>(body: F) -> Self
    where
        F: Fn(&mut CallScope<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            on: Role::Client,
            server_validation: None,
            body: Arc::new(body),
        }
    }

    pub fn with_server_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Session, &ObjectId, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.server_validation = Some(Arc::new(validator));
        self
    }

    pub fn invoke(&self, scope: &mut CallScope<'_>, args: &[Value]) -> Result<Value, CallError> {
        (self.body)(scope, args)
    }
}

impl fmt::Debug for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMethod")
            .field("on", &self.on)
            .field("server_validation", &self.server_validation.is_some())
            .finish()
    }
}

/// The descriptor table of one domain type: its replicable properties, its
/// remote-callable methods and its optional server-side validators
#[derive(Clone)]
pub struct Template {
    name: String,
    pub(crate) to_server: bool,
    pub(crate) to_client: bool,
    properties: IndexMap<String, PropertyDescriptor>,
    methods: HashMap<String, RemoteMethod>,
    call_validator: Option<CallValidator>,
    property_validator: Option<PropertyValidator>,
}

impl Template {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            to_server: true,
            to_client: true,
            properties: IndexMap::new(),
            methods: HashMap::new(),
            call_validator: None,
            property_validator: None,
        }
    }

    pub fn property(mut self, name: &str, descriptor: PropertyDescriptor) -> Self {
        self.properties.insert(name.to_string(), descriptor);
        self
    }

    pub fn method(mut self, name: &str, method: RemoteMethod) -> Self {
        self.methods.insert(name.to_string(), method);
        self
    }

    /// Template-wide switch, `false` stops every property moving client to server
    pub fn to_server(mut self, allowed: bool) -> Self {
        self.to_server = allowed;
        self
    }

    /// Template-wide switch, `false` stops every property moving server to client
    pub fn to_client(mut self, allowed: bool) -> Self {
        self.to_client = allowed;
        self
    }

    pub fn validate_call<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Session, &ObjectId, &str, &CallContext) -> bool + Send + Sync + 'static,
    {
        self.call_validator = Some(Arc::new(validator));
        self
    }

    pub fn validate_incoming_property<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Session, &ObjectId, &str, &Value) -> bool + Send + Sync + 'static,
    {
        self.property_validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.properties
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn property_descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn remote_method(&self, name: &str) -> Option<&RemoteMethod> {
        self.methods.get(name)
    }

    pub fn call_validator(&self) -> Option<&CallValidator> {
        self.call_validator.as_ref()
    }

    pub fn property_validator(&self) -> Option<&PropertyValidator> {
        self.property_validator.as_ref()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("to_server", &self.to_server)
            .field("to_client", &self.to_client)
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .finish()
    }
}
