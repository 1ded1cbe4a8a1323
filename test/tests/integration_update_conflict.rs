/// Stale calls, update conflict retries and session restores

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;

use ripple_server::{Controller, RestoreSessionCallback};
use ripple_shared::{CallContext, CallError, ObjectId, RemoteCallError, Value};
use ripple_test::{
    deliver_to_client, exchange_messages, LocalTransportPair, TestClient, TestServer,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn shared_account(
    server: &mut TestServer,
    client: &mut TestClient,
    transport: &LocalTransportPair,
) -> ObjectId {
    let customer = client.create_root("Customer");
    let account = client.create_root("Account");
    client.set(&account, "owner", customer);
    client.set(&account, "balance", 100);

    let handle = client.call(&account, "audit", &[]);
    exchange_messages(server, client, transport).await;
    assert_eq!(handle.await, Ok(Value::from(100)));
    account
}

#[tokio::test]
async fn stale_call_is_rejected_and_balance_kept() {
    init_logging();
    let transport = LocalTransportPair::new();
    let mut server = TestServer::new(&transport);
    let mut client = TestClient::new(&transport);
    let account = shared_account(&mut server, &mut client, &transport).await;
    let before_a = client.client.save().unwrap();

    client.set(&account, "balance", 150);
    let call_a = client.call(&account, "audit", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;
    assert_eq!(call_a.await, Ok(Value::from(150)));

    // Issue B against the value A replaced
    assert!(client
        .client
        .restore(&before_a, Some(transport.client_sender.clone()))
        .unwrap());
    assert_eq!(client.get(&account, "balance"), Value::from(100));
    client.set(&account, "balance", 200);
    let call_b = client.call(&account, "audit", &[]);
    exchange_messages(&mut server, &mut client, &transport).await;

    assert_eq!(call_b.await, Err(RemoteCallError::Sync));
    assert_eq!(
        server.session().get(account.as_str(), "balance").unwrap(),
        &Value::from(150)
    );
}

/// Fails the commit after a call with an update conflict a fixed number of
/// times
struct FlakyCommit {
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Controller for FlakyCommit {
    async fn post_server_call(
        &self,
        _has_changes: bool,
        _context: &CallContext,
        _change_summary: &BTreeMap<String, usize>,
    ) -> Result<(), CallError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CallError::UpdateConflict);
        }
        Ok(())
    }
}

struct Retries {
    attempts: Arc<AtomicUsize>,
    restores: Arc<AtomicUsize>,
}

async fn flaky_setup(
    failures: usize,
) -> (TestServer, TestClient, LocalTransportPair, ObjectId, Retries) {
    let transport = LocalTransportPair::new();
    let remaining = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut server = TestServer::new(&transport).with_controller(FlakyCommit {
        failures: Arc::clone(&remaining),
        attempts: Arc::clone(&attempts),
    });
    let mut client = TestClient::new(&transport);
    let account = shared_account(&mut server, &mut client, &transport).await;

    remaining.store(failures, Ordering::SeqCst);
    attempts.store(0, Ordering::SeqCst);

    let retries = Retries {
        attempts,
        restores: Arc::new(AtomicUsize::new(0)),
    };
    (server, client, transport, account, retries)
}

fn restore_callback(
    server: &mut TestServer,
    transport: &LocalTransportPair,
    restores: &Arc<AtomicUsize>,
) -> RestoreSessionCallback {
    let saved = server.server.save_session(server.session_id).unwrap();
    let sender = transport.server_sender.clone();
    let restores = Arc::clone(restores);
    Box::new(move |replicator, session_id| {
        assert!(replicator
            .restore_session(session_id, &saved, Some(sender.clone()))
            .unwrap());
        restores.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn conflicting_commit_is_retried_from_a_restored_session() {
    init_logging();
    let (mut server, mut client, transport, account, retries) = flaky_setup(2).await;
    let restore = restore_callback(&mut server, &transport, &retries.restores);

    let handle = client.call(&account, "deposit", &[Value::from(50)]);
    let start = tokio::time::Instant::now();
    let mut calls = transport.receive_on_server();
    assert_eq!(calls.len(), 1);
    server.process(calls.remove(0), Some(restore)).await.unwrap();
    let waited = start.elapsed();
    deliver_to_client(&mut client, &transport);

    assert!(waited >= Duration::from_millis(3000));
    assert!(waited < Duration::from_millis(6000));
    assert_eq!(retries.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(retries.restores.load(Ordering::SeqCst), 2);
    assert_eq!(handle.await, Ok(Value::from(150.0)));
    assert_eq!(client.get(&account, "balance"), Value::from(150.0));
    assert_eq!(
        server.session().get(account.as_str(), "balance").unwrap(),
        &Value::from(150.0)
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_answer_with_retry() {
    init_logging();
    let (mut server, mut client, transport, account, retries) = flaky_setup(10).await;
    let restore = restore_callback(&mut server, &transport, &retries.restores);

    let handle = client.call(&account, "deposit", &[Value::from(50)]);
    let start = tokio::time::Instant::now();
    let mut calls = transport.receive_on_server();
    server.process(calls.remove(0), Some(restore)).await.unwrap();
    let waited = start.elapsed();
    deliver_to_client(&mut client, &transport);

    assert!(waited >= Duration::from_millis(6000));
    assert_eq!(retries.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(retries.restores.load(Ordering::SeqCst), 3);
    assert_eq!(handle.await, Err(RemoteCallError::UpdateConflict));
    assert_eq!(
        &client.get(&account, "balance"),
        server.session().get(account.as_str(), "balance").unwrap()
    );
}
