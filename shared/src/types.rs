use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ReplicaError;

pub type SessionId = u64;
pub type SubscriptionId = u64;
pub type RemoteCallId = u64;

/// Which side of a connection a process, session or subscription speaks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn invert(self) -> Self {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ReplicaError;

    fn from_str(role: &str) -> Result<Self, Self::Err> {
        match role {
            "server" => Ok(Role::Server),
            "client" => Ok(Role::Client),
            _ => Err(ReplicaError::InvalidRole {
                role: role.to_string(),
            }),
        }
    }
}
