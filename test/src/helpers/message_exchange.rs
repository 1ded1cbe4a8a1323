use log::debug;

use crate::{LocalTransportPair, TestClient, TestServer};

/// Hands every message the client sent to the server, without retries
pub async fn deliver_to_server(server: &mut TestServer, transport: &LocalTransportPair) -> usize {
    let messages = transport.receive_on_server();
    let count = messages.len();
    for message in messages {
        server.process(message, None).await.unwrap();
    }
    count
}

/// Hands every message the server sent to the client
pub fn deliver_to_client(client: &mut TestClient, transport: &LocalTransportPair) -> usize {
    let messages = transport.receive_on_client();
    let count = messages.len();
    for message in messages {
        client.client.handle_message(message).unwrap();
    }
    count
}

/// Delivers messages both ways until nothing is in flight, returning the
/// number of messages delivered
pub async fn exchange_messages(
    server: &mut TestServer,
    client: &mut TestClient,
    transport: &LocalTransportPair,
) -> usize {
    let mut delivered = 0;
    while transport.in_flight() > 0 {
        delivered += deliver_to_server(server, transport).await;
        delivered += deliver_to_client(client, transport);
    }
    debug!("exchanged {} messages", delivered);
    delivered
}
