//! # Ripple Client
//! Issues remote calls against a ripple server, keeps them queued while the
//! transport is disabled, and applies the authoritative changes the server
//! sends back.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use ripple_shared::{
        CallScope, ChangeGroup, ErrorPayload, Message, MessageSender, MessageType, ObjectId,
        PropertyDescriptor, Protocol, ProtocolPlugin, RemoteCallError, RemoteCallResult,
        RemoteMethod, ReplicaError, Role, SavedSession, Session, Template, Value,
    };
}

mod client;
mod client_config;
mod remote_call_handle;

pub use client::Client;
pub use client_config::ClientConfig;
pub use remote_call_handle::RemoteCallHandle;
