use crate::Message;

/// Fire-and-forget transport to the peer of a session
pub trait MessageSender: Send + Sync {
    fn send(&self, message: Message);
}

impl<F> MessageSender for F
where
    F: Fn(Message) + Send + Sync,
{
    fn send(&self, message: Message) {
        self(message)
    }
}
