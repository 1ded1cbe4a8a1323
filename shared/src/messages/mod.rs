pub mod call_context;
pub mod call_queue;
pub mod message;
pub mod message_sender;
pub mod remote_call;

pub use call_context::CallContext;
pub use call_queue::{CallQueue, PendingCall, QueuedCall, RemoteCallResult};
pub use message::{Message, MessageType};
pub use message_sender::MessageSender;
pub use remote_call::RemoteCall;
