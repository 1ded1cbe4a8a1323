//! # Ripple Server
//! Processes remote calls from connected clients: applies the changes each
//! call carries, validates and runs the call, retries it on update conflicts
//! and answers with the changes it produced.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use ripple_shared::{
        CallContext, CallError, CallScope, ChangeGroup, Message, MessageSender, MessageType,
        ObjectId, PropertyDescriptor, Protocol, ProtocolPlugin, RemoteCall, RemoteMethod,
        ReplicaError, Role, SavedSession, Session, Template, TrackedObject, Value,
    };
}

mod controller;
mod process_call;
mod server;

pub use controller::Controller;
pub use server::{RestoreSessionCallback, Server, ServerConfig};
