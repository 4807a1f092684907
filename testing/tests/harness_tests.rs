//! The harness driving real entity reducers.

#![allow(clippy::unwrap_used)]

use entity_sync_core::action::EntityAction;
use entity_sync_core::correlation::CallId;
use entity_sync_core::list::ListPayload;
use entity_sync_core::model::{Model, NoOperation};
use entity_sync_core::reducers::EntityReducer;
use entity_sync_core::state::EntityState;
use entity_sync_testing::{MockTransport, ReducerTest, assertions, test_environment};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Zone {
    id: u32,
    name: String,
}

impl Model for Zone {
    type Id = u32;
    type Operation = NoOperation;
    const MODEL: &'static str = "zone";
    const PRIMARY_KEY: &'static str = "id";

    fn primary_key(&self) -> u32 {
        self.id
    }
}

fn zone(id: u32, name: &str) -> Zone {
    Zone {
        id,
        name: name.to_string(),
    }
}

#[test]
fn scoped_fetch_describes_a_list_request_under_its_call_id() {
    ReducerTest::new(EntityReducer::<Zone>::new())
        .with_env(test_environment(Arc::new(MockTransport::new())))
        .given_state(EntityState::new())
        .when_action(EntityAction::Fetch {
            call_id: Some(CallId::from("sidebar")),
            params: json!({"page": 1}),
        })
        .then_state(|state| {
            assert!(state.lists[&CallId::from("sidebar")].loading);
            assert!(!state.loading);
        })
        .then_effects(|effects| {
            let request = assertions::assert_request(effects, "zone", "list");
            assert_eq!(request.id, CallId::from("sidebar"));
            assert_eq!(request.params, json!({"page": 1}));
        })
        .run();
}

#[test]
fn unscoped_fetch_uses_a_minted_call_id() {
    ReducerTest::new(EntityReducer::<Zone>::new())
        .with_env(test_environment(Arc::new(MockTransport::new())))
        .given_state(EntityState::new())
        .when_action(EntityAction::Fetch {
            call_id: None,
            params: json!({}),
        })
        .then_state(|state| assert!(state.loading))
        .then_effects(|effects| {
            let request = assertions::assert_request(effects, "zone", "list");
            assert_eq!(request.id, CallId::from("call-1"));
        })
        .run();
}

#[test]
fn fetch_success_stays_in_its_bucket() {
    ReducerTest::new(EntityReducer::<Zone>::new())
        .with_env(test_environment(Arc::new(MockTransport::new())))
        .given_state(EntityState::new())
        .when_action(EntityAction::FetchSuccess {
            call_id: Some(CallId::from("call-1")),
            payload: ListPayload::from_items(vec![zone(1, "a"), zone(2, "b")]),
        })
        .then_state(|state| {
            assert!(state.items.is_empty());
            assert!(!state.loaded);
            let bucket = &state.lists[&CallId::from("call-1")];
            assert_eq!(bucket.items, vec![zone(1, "a"), zone(2, "b")]);
            assert!(bucket.loaded);
            assert!(!bucket.loading);
        })
        .then_effects(|effects| assertions::assert_no_requests(effects))
        .run();
}

proptest! {
    #[test]
    fn bucket_removal_leaves_other_buckets(name in entity_sync_testing::properties::arb_name()) {
        ReducerTest::new(EntityReducer::<Zone>::new())
            .with_env(test_environment(Arc::new(MockTransport::new())))
            .given_state(EntityState::new())
            .when_action(EntityAction::FetchSuccess {
                call_id: Some(CallId::from("x")),
                payload: ListPayload::from_items(vec![zone(1, &name)]),
            })
            .when_action(EntityAction::FetchSuccess {
                call_id: Some(CallId::from("y")),
                payload: ListPayload::from_items(vec![zone(2, &name)]),
            })
            .when_action(EntityAction::RemoveRequest { call_id: CallId::from("x") })
            .then_state(|state| {
                assert!(!state.lists.contains_key(&CallId::from("x")));
                assert_eq!(state.lists[&CallId::from("y")].items.len(), 1);
            })
            .run();
    }
}
