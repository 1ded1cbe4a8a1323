use std::default::Default;

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Whether calls are sent as soon as they are made. When false, calls
    /// queue up until `Client::enable_send_message(true, ..)`.
    pub start_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            start_enabled: true,
        }
    }
}
