/// Property tests for change recording and object ids

use std::sync::Arc;

use proptest::prelude::*;

use ripple_shared::{codec, ChangeGroup, Role, Session};
use ripple_test::protocol;

fn server_session() -> Session {
    Session::new(1, Role::Server, Arc::new(protocol()), None)
}

proptest! {
    #[test]
    fn drained_pair_spans_first_old_to_last_new(balances in prop::collection::vec(-1000i64..1000, 1..20)) {
        let mut session = server_session();
        let subscription_id = session.subscribe(Role::Client);
        let account = session.create_object("Account").unwrap();

        for balance in &balances {
            session.set(&account, "balance", *balance).unwrap();
        }
        let changes = session.drain_changes(subscription_id).unwrap();

        let last = *balances.last().unwrap();
        match changes.get(account.as_str(), "balance") {
            Some((old, new)) => {
                prop_assert_eq!(old, &serde_json::json!(0));
                prop_assert_eq!(new, &serde_json::json!(last));
            }
            None => prop_assert!(balances.iter().all(|balance| *balance == 0)),
        }
        prop_assert!(session.drain_changes(subscription_id).unwrap().is_empty());
    }

    #[test]
    fn every_subscription_sees_every_change(names in prop::collection::vec("[a-z]{1,8}", 1..10)) {
        let mut session = server_session();
        let first = session.subscribe(Role::Client);
        let second = session.subscribe(Role::Client);
        let customer = session.create_object("Customer").unwrap();

        for name in &names {
            session.set(&customer, "name", name.as_str()).unwrap();
        }

        let first_changes = session.drain_changes(first).unwrap();
        prop_assert_eq!(session.get_change_group(second).unwrap(), &first_changes);
        prop_assert!(session.get_change_group(first).unwrap().is_empty());
    }

    #[test]
    fn applying_drained_changes_reproduces_the_graph(balances in prop::collection::vec(1i64..500, 1..5)) {
        let mut source = server_session();
        let subscription_id = source.subscribe(Role::Client);
        let mut replica = Session::new(2, Role::Client, Arc::new(protocol()), None);
        let mut accounts = Vec::new();

        for balance in &balances {
            let account = source.create_object("Account").unwrap();
            source.set(&account, "balance", *balance).unwrap();
            accounts.push(account);
        }
        let changes = source.drain_changes(subscription_id).unwrap();
        let encoded = changes.to_json_string().unwrap();
        replica.apply_changes(&ChangeGroup::from_json_str(&encoded).unwrap(), false).unwrap();

        for account in &accounts {
            let expected = codec::to_transport(source.get(account.as_str(), "balance").unwrap());
            let actual = codec::to_transport(replica.get(account.as_str(), "balance").unwrap());
            prop_assert!(codec::values_match(&expected, &actual));
        }
    }

    #[test]
    fn object_ids_are_never_reused(creates in 1usize..10, collections in 1usize..4) {
        let mut session = server_session();
        let mut seen = Vec::new();

        for _ in 0..collections {
            for _ in 0..creates {
                let object_id = session.create_object("Address").unwrap();
                prop_assert!(!seen.contains(&object_id));
                if let Some(previous) = seen.last() {
                    prop_assert!(object_id.ordinal() > previous.ordinal());
                }
                seen.push(object_id);
            }
            session.collect_garbage();
            prop_assert_eq!(session.object_count(), 0);
        }
        prop_assert_eq!(session.next_obj_id(), (creates * collections) as u64 + 1);
    }
}
