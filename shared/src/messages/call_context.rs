use tokio::time::{Duration, Instant};

use crate::RemoteCallId;

/// Per-call state kept across retries of one incoming call
#[derive(Clone, Debug)]
pub struct CallContext {
    pub retries: u32,
    pub start_time: Instant,
    pub remote_call_id: RemoteCallId,
    pub sequence: u64,
}

impl CallContext {
    pub fn new(remote_call_id: RemoteCallId, sequence: u64) -> Self {
        Self {
            retries: 0,
            start_time: Instant::now(),
            remote_call_id,
            sequence,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
