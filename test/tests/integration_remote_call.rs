/// End-to-end remote calls between a client and a server over the local
/// transport

use ripple_shared::{ErrorPayload, ObjectId, RemoteCallError, Value};
use ripple_test::{exchange_messages, LocalTransportPair, TestClient, TestServer};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open_account(client: &mut TestClient, balance: i64) -> (ObjectId, ObjectId) {
    let customer = client.create_root("Customer");
    client.set(&customer, "name", "Ana");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer.clone());
    client.set(&account, "balance", balance);
    (customer, account)
}

#[tokio::test]
async fn deposit_round_trip() {
    init_logging();
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let (customer, account) = open_account(&mut client, 100);

    let handle = client.call(&account, "deposit", &[Value::from(50)]);
    let delivered = exchange_messages(&mut server, &mut client, &transport).await;

    assert_eq!(delivered, 2);
    assert_eq!(handle.await, Ok(Value::from(150.0)));
    assert_eq!(client.get(&account, "balance"), Value::from(150.0));

    let session = server.session();
    assert_eq!(session.object_count(), 2);
    assert_eq!(
        session.get(customer.as_str(), "name").unwrap(),
        &Value::from("Ana")
    );
    assert_eq!(
        session.get(account.as_str(), "balance").unwrap(),
        &Value::from(150.0)
    );
    assert_eq!(session.call_count(), 1);
}

#[tokio::test]
async fn server_created_objects_reach_the_client() {
    init_logging();
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let (customer, _) = open_account(&mut client, 0);

    let handle = client.call(&customer, "openAccount", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;

    let opened = handle.await.unwrap();
    let opened = opened.as_ref_id().unwrap().clone();
    assert_eq!(opened.as_str(), "server-Account-1");
    assert_eq!(client.get(&opened, "owner"), Value::from(customer.clone()));
    assert_eq!(
        client.get(&customer, "accounts"),
        Value::Array(vec![Value::from(opened.clone())])
    );
    assert_eq!(client.get(&opened, "balance"), Value::from(0));
}

#[tokio::test]
async fn server_only_properties_flow_one_way() {
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let (customer, account) = open_account(&mut client, 10);
    client.set(&customer, "notes", "call back");

    let handle = client.call(&account, "audit", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;

    assert_eq!(handle.await, Ok(Value::from(10)));
    assert_eq!(client.get(&account, "audited"), Value::Bool(true));
    assert_eq!(
        server.session().get(customer.as_str(), "notes").unwrap(),
        &Value::from("")
    );

    client.set(&account, "audited", false);
    let handle = client.call(&account, "audit", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;

    assert!(handle.await.is_ok());
    assert_eq!(client.get(&account, "audited"), Value::Bool(false));
    assert_eq!(
        server.session().get(account.as_str(), "audited").unwrap(),
        &Value::Bool(true)
    );
}

#[tokio::test]
async fn failures_are_reported_to_the_caller() {
    init_logging();
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let (_, account) = open_account(&mut client, 20);
    let orphan = client.create_root("Account");
    client.set(&orphan, "balance", 1);

    let refused = client.call(&account, "deposit", &[Value::from(-5)]);
    let overdrawn = client.call(&account, "withdraw", &[Value::from(100)]);
    let exploded = client.call(&account, "explode", &[]);
    let client_side = client.call(&account, "refresh", &[]);
    let unowned = client.call(&orphan, "audit", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;

    let message = |result: Result<Value, RemoteCallError>| match result {
        Err(RemoteCallError::Remote { payload, .. }) => payload,
        other => panic!("expected a remote error, got {:?}", other),
    };
    assert_eq!(message(refused.await).message, "deposit refused");
    assert_eq!(
        message(overdrawn.await),
        ErrorPayload {
            code: Some("insufficient_funds".to_string()),
            message: "Cannot withdraw 100 from 20".to_string(),
        }
    );
    assert_eq!(message(exploded.await).message, "Vault jammed");
    assert_eq!(
        message(client_side.await).message,
        "Invalid Function Call; not an API function"
    );
    assert_eq!(message(unowned.await).message, "audit refused");
    assert_eq!(client.get(&account, "balance"), Value::from(20));
}

#[tokio::test]
async fn server_pushes_its_objects_before_the_first_call() {
    init_logging();
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);

    let session = server.session_mut();
    let controller = session.create_object("Controller").unwrap();
    session.add_root(&controller);
    session.set(&controller, "greeting", "welcome").unwrap();
    assert!(server
        .server
        .sync_session(server.session_id, server.subscription_id)
        .unwrap());
    assert!(!server
        .server
        .sync_session(server.session_id, server.subscription_id)
        .unwrap());
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(client.get(&controller, "greeting"), Value::from("welcome"));

    let handle = client.call(&controller, "newCustomer", &[Value::from("Ana")]);
    exchange_messages(&mut server, &mut client, &transport).await;

    let customer = handle.await.unwrap().as_ref_id().unwrap().clone();
    assert_eq!(customer.as_str(), "server-Customer-2");
    assert_eq!(client.get(&customer, "name"), Value::from("Ana"));
    assert_eq!(client.get(&controller, "customer"), Value::from(customer));
}
