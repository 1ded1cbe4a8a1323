/// Saving and restoring sessions on both sides of a connection

use ripple_shared::{Replicator, Role, Value};
use ripple_test::{exchange_messages, protocol, LocalTransportPair, TestClient, TestServer};

#[tokio::test]
async fn restored_server_session_keeps_serving() {
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let customer = client.create_root("Customer");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer);
    client.set(&account, "balance", 10);

    let handle = client.call(&account, "deposit", &[Value::from(5)]);
    exchange_messages(&mut server, &mut client, &transport).await;
    assert!(handle.await.is_ok());

    let saved = server.server.save_session(server.session_id).unwrap();
    assert_eq!(saved.revision, 1);
    assert_eq!(saved.call_count, 1);

    server.server.delete_session(server.session_id).unwrap();
    assert!(server
        .server
        .restore_session(server.session_id, &saved, transport.server_sender.clone())
        .unwrap());

    let handle = client.call(&account, "deposit", &[Value::from(5)]);
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(handle.await, Ok(Value::from(20.0)));
    assert_eq!(server.session().call_count(), 2);
}

#[tokio::test]
async fn saving_between_calls_keeps_the_shared_graph() {
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let customer = client.create_root("Customer");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer.clone());
    client.set(&account, "balance", 10);

    let handle = client.call(&account, "deposit", &[Value::from(5)]);
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(handle.await, Ok(Value::from(15.0)));
    assert_eq!(server.session().object_count(), 2);

    server.server.save_session(server.session_id).unwrap();
    assert_eq!(server.session().object_count(), 2);
    assert!(server.session().object(customer.as_str()).is_some());

    let handle = client.call(&account, "deposit", &[Value::from(5)]);
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(handle.await, Ok(Value::from(20.0)));
    assert_eq!(
        server.session().get(account.as_str(), "balance").unwrap(),
        &Value::from(20.0)
    );
}

#[test]
fn older_snapshots_do_not_replace_newer_sessions() {
    let mut replicator = Replicator::new(protocol());
    let session_id = replicator.create_session(Role::Server, None, None);
    let account = replicator.current_mut().unwrap().create_object("Account").unwrap();
    replicator.current_mut().unwrap().add_root(&account);

    let first = replicator.save_session(session_id).unwrap();
    replicator
        .current_mut()
        .unwrap()
        .set(&account, "balance", 7)
        .unwrap();
    let second = replicator.save_session(session_id).unwrap();
    assert_eq!(second.revision, first.revision + 1);

    assert!(!replicator.restore_session(session_id, &first, None).unwrap());
    assert_eq!(
        replicator.current().unwrap().get(account.as_str(), "balance").unwrap(),
        &Value::from(7)
    );

    assert!(replicator.restore_session(session_id, &second, None).unwrap());
    assert_eq!(replicator.current().unwrap().saved_session_id(), second.revision);
}

#[test]
fn unreachable_objects_are_collected_on_save() {
    let mut replicator = Replicator::new(protocol());
    let session_id = replicator.create_session(Role::Server, None, None);
    let subscription_id = replicator.subscribe(Role::Client).unwrap();
    let session = replicator.current_mut().unwrap();
    let customer = session.create_object("Customer").unwrap();
    let address = session.create_object("Address").unwrap();
    let stray = session.create_object("Account").unwrap();
    session.set(&customer, "address", address.clone()).unwrap();
    session.add_root(&customer);
    session.drain_changes(subscription_id).unwrap();

    let saved = replicator.save_session(session_id).unwrap();

    let session = replicator.current().unwrap();
    assert!(session.object(address.as_str()).is_some());
    assert!(session.object(stray.as_str()).is_none());
    assert!(saved.data.contains(address.as_str()));
    assert!(!saved.data.contains(stray.as_str()));

    let next = replicator.current_mut().unwrap().create_object("Account").unwrap();
    assert_eq!(next.ordinal(), stray.ordinal() + 1);
}
