use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::{ReplicaError, Role};

/// Identity of a tracked object, of the form `<role>-<Template>-<ordinal>`,
/// e.g. `server-Customer-3`. The format is visible on the wire and must stay
/// bit-exact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(role: Role, template_name: &str, ordinal: u64) -> Self {
        Self(format!("{}-{}-{}", role, template_name, ordinal))
    }

    /// Validates the three dash-separated segments
    pub fn parse(id: &str) -> Result<Self, ReplicaError> {
        let invalid = || ReplicaError::InvalidObjectId { id: id.to_string() };

        let (prefix, rest) = id.split_once('-').ok_or_else(invalid)?;
        let (template_name, ordinal) = rest.rsplit_once('-').ok_or_else(invalid)?;
        if prefix.is_empty() || template_name.is_empty() || template_name.contains('-') {
            return Err(invalid());
        }
        ordinal.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The role segment of whoever allocated the id
    pub fn role_prefix(&self) -> &str {
        self.split().0
    }

    pub fn template_name(&self) -> &str {
        self.split().1
    }

    pub fn ordinal(&self) -> u64 {
        self.split().2.parse().unwrap_or(0)
    }

    fn split(&self) -> (&str, &str, &str) {
        // validated on construction
        let (prefix, rest) = self.0.split_once('-').unwrap_or(("", &self.0));
        let (template_name, ordinal) = rest.rsplit_once('-').unwrap_or((rest, ""));
        (prefix, template_name, ordinal)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = ReplicaError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::parse(&id)
    }
}

impl TryFrom<&str> for ObjectId {
    type Error = ReplicaError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::parse(id)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}
