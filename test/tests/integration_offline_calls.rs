/// Calls made while the client cannot send

use ripple_shared::{RemoteCallError, Value};
use ripple_test::{exchange_messages, LocalTransportPair, TestClient, TestServer};

#[tokio::test]
async fn queued_calls_flush_in_order_once_enabled() {
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::offline(&transport);
    let customer = client.create_root("Customer");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer);
    client.set(&account, "balance", 100);

    let first = client.call(&account, "deposit", &[Value::from(50)]);
    let second = client.call(&account, "deposit", &[Value::from(25)]);
    assert_eq!(transport.in_flight(), 0);
    assert_eq!(client.session().queued_call_count(), 2);

    client.client.enable_send_message(true, None).unwrap();
    assert_eq!(transport.in_flight(), 2);
    exchange_messages(&mut server, &mut client, &transport).await;

    assert_eq!(first.await, Ok(Value::from(150.0)));
    assert_eq!(second.await, Ok(Value::from(175.0)));
    assert_eq!(client.client.pending_call_count(), 0);
    assert_eq!(server.session().call_count(), 2);
}

#[tokio::test]
async fn disabling_again_holds_later_calls() {
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let customer = client.create_root("Customer");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer);

    client.client.enable_send_message(false, None).unwrap();
    let held = client.call(&account, "audit", &[]);
    assert_eq!(transport.in_flight(), 0);

    client
        .client
        .enable_send_message(true, Some(transport.client_sender.clone()))
        .unwrap();
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(held.await, Ok(Value::from(0)));
}

#[tokio::test]
async fn cleared_calls_are_rejected_and_never_sent() {
    let transport = LocalTransportPair::new();
    let mut client = TestClient::offline(&transport);
    let account = client.create_root("Account");

    let first = client.call(&account, "audit", &[]);
    let second = client.call(&account, "audit", &[]);
    let (first_id, second_id) = (first.remote_call_id(), second.remote_call_id());

    assert_eq!(client.client.clear_pending_calls().unwrap(), 2);
    client.client.enable_send_message(true, None).unwrap();

    assert_eq!(transport.in_flight(), 0);
    assert_eq!(
        first.await,
        Err(RemoteCallError::Cleared {
            remote_call_id: first_id
        })
    );
    assert_eq!(
        second.await,
        Err(RemoteCallError::Cleared {
            remote_call_id: second_id
        })
    );
}
