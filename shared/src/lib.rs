//! # Ripple Shared
//! Change tracking, the delta codec, the apply/rollback engine and sessions,
//! shared between ripple-server & ripple-client crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod apply;
pub mod codec;
mod error;
pub mod ledger;
pub mod messages;
mod object;
pub mod protocol;
mod session;
mod types;

pub use error::{CallError, CallErrorKind, ErrorPayload, RemoteCallError, ReplicaError};
pub use ledger::{ArrayGroup, ChangeGroup, ChangeKind, ChangeLedger, Subscription};
pub use messages::{
    CallContext, CallQueue, Message, MessageSender, MessageType, PendingCall, RemoteCall,
    RemoteCallResult,
};
pub use object::{object_id::ObjectId, tracked_object::TrackedObject, value::Value};
pub use protocol::{
    template::{
        CallValidator, Direction, MethodBody, PropertyDescriptor, PropertyKind,
        PropertyValidator, RemoteMethod, ServerValidator, Template,
    },
    Protocol, ProtocolError, ProtocolPlugin, RuleSets,
};
pub use session::{CallScope, Replicator, SavedSession, Session};
pub use types::{RemoteCallId, Role, SessionId, SubscriptionId};
