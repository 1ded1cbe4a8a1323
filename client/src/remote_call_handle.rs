use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot::{self, error::TryRecvError};

use ripple_shared::{RemoteCallError, RemoteCallId, RemoteCallResult};

/// The deferred result of a remote call. Resolves once the server answers,
/// or with `RemoteCallError::Cleared` if the call is discarded first.
#[derive(Debug)]
pub struct RemoteCallHandle {
    remote_call_id: RemoteCallId,
    receiver: oneshot::Receiver<RemoteCallResult>,
}

impl RemoteCallHandle {
    pub(crate) fn new(
        remote_call_id: RemoteCallId,
        receiver: oneshot::Receiver<RemoteCallResult>,
    ) -> Self {
        Self {
            remote_call_id,
            receiver,
        }
    }

    pub fn remote_call_id(&self) -> RemoteCallId {
        self.remote_call_id
    }

    /// Returns the result if the call has been answered, without waiting
    pub fn try_result(&mut self) -> Option<RemoteCallResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(self.cleared())),
        }
    }

    fn cleared(&self) -> RemoteCallError {
        RemoteCallError::Cleared {
            remote_call_id: self.remote_call_id,
        }
    }
}

impl Future for RemoteCallHandle {
    type Output = RemoteCallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let remote_call_id = self.remote_call_id;
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(RemoteCallError::Cleared { remote_call_id }))
        })
    }
}
