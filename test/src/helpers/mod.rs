pub mod message_exchange;
pub mod test_client;
pub mod test_server;

pub use message_exchange::{deliver_to_client, deliver_to_server, exchange_messages};
pub use test_client::TestClient;
pub use test_server::TestServer;
