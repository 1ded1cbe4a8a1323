use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// How many times a call that hit an update conflict is run again before
    /// the caller is told to retry
    pub max_conflict_retries: u32,
    /// Base delay before a retry, multiplied by the retry number
    pub retry_backoff: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}
