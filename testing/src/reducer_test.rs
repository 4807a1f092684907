//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use entity_sync_core::{effect::Effect, reducer::Reducer};
use smallvec::SmallVec;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several actions may be given with [`when_action`](Self::when_action);
/// they are reduced in order and the effect assertions see the effects of
/// the last one.
///
/// # Example
///
/// ```ignore
/// use entity_sync_testing::ReducerTest;
///
/// ReducerTest::new(EntityReducer::<Tag>::new())
///     .with_env(test_environment(Arc::new(MockTransport::new())))
///     .given_state(EntityState::new())
///     .when_action(EntityAction::FetchSuccess {
///         call_id: Some(CallId::from("call-1")),
///         payload: ListPayload::from_items(vec![tag_a, tag_b]),
///     })
///     .then_state(|state| {
///         assert!(state.items.is_empty());
///         assert!(state.lists[&CallId::from("call-1")].loaded);
///     })
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to reduce (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(!self.actions.is_empty(), "Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = SmallVec::<[Effect<A>; 4]>::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env);
        }

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }

        // Run effect assertions
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use entity_sync_core::effect::Effect;
    use entity_sync_core::transport::Request;

    /// Every request carried by `effects`, including inside `Parallel`.
    #[must_use]
    pub fn requests<A>(effects: &[Effect<A>]) -> Vec<&Request> {
        let mut found = Vec::new();
        for effect in effects {
            match effect {
                Effect::Transport(op) => found.push(&op.request),
                Effect::Parallel(inner) => found.extend(requests(inner)),
                Effect::None | Effect::Future(_) => {},
            }
        }
        found
    }

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(|e| matches!(e, Effect::None)),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that exactly one request for `model.method` is described and
    /// return it.
    ///
    /// # Panics
    ///
    /// Panics if there is no such request, or more than one.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_request<'a, A>(effects: &'a [Effect<A>], model: &str, method: &str) -> &'a Request {
        let matching: Vec<&Request> = requests(effects)
            .into_iter()
            .filter(|request| request.model == model && request.method == method)
            .collect();
        match matching.as_slice() {
            [request] => *request,
            other => panic!(
                "Expected one {model}.{method} request, found {}: {other:?}",
                other.len()
            ),
        }
    }

    /// Assert that no request is described.
    ///
    /// # Panics
    ///
    /// Panics if any effect carries a request.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_requests<A>(effects: &[Effect<A>]) {
        let found = requests(effects);
        assert!(found.is_empty(), "Expected no requests, found {found:?}");
    }

    /// Run the single Future effect in `effects` to completion and return
    /// the action it feeds back.
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one Future effect.
    #[allow(clippy::panic)] // Test assertion
    pub fn run_future_effect<A>(effects: impl IntoIterator<Item = Effect<A>>) -> Option<A> {
        let mut futures = effects.into_iter().filter_map(|effect| match effect {
            Effect::Future(fut) => Some(fut),
            _ => None,
        });
        let Some(fut) = futures.next() else {
            panic!("Expected a Future effect, but none found");
        };
        assert!(futures.next().is_none(), "Expected one Future effect, found several");
        tokio_test::block_on(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_sync_core::effect::Effect;
    use entity_sync_core::reducer::Reducer;
    use std::collections::BTreeSet;

    /// Ids a user has ticked in a table view.
    #[derive(Clone, Debug, Default)]
    struct Selection {
        ids: BTreeSet<u32>,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SelectionAction {
        Select(u32),
        Deselect(u32),
        SelectLater(u32),
    }

    struct SelectionReducer;

    impl Reducer for SelectionReducer {
        type State = Selection;
        type Action = SelectionAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> smallvec::SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                SelectionAction::Select(id) => {
                    state.ids.insert(id);
                    smallvec::smallvec![Effect::None]
                },
                SelectionAction::Deselect(id) => {
                    state.ids.remove(&id);
                    smallvec::smallvec![Effect::None]
                },
                SelectionAction::SelectLater(id) => {
                    smallvec::smallvec![Effect::Future(Box::pin(async move { Some(SelectionAction::Select(id)) }))]
                },
            }
        }
    }

    #[test]
    fn single_action_updates_state_without_effects() {
        ReducerTest::new(SelectionReducer)
            .with_env(())
            .given_state(Selection::default())
            .when_action(SelectionAction::Select(3))
            .then_state(|state| {
                assert!(state.ids.contains(&3));
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn actions_reduce_in_order() {
        ReducerTest::new(SelectionReducer)
            .with_env(())
            .given_state(Selection {
                ids: BTreeSet::from([1, 2]),
            })
            .when_action(SelectionAction::Deselect(1))
            .when_action(SelectionAction::Select(4))
            .when_action(SelectionAction::Deselect(4))
            .then_state(|state| {
                assert_eq!(state.ids, BTreeSet::from([2]));
            })
            .run();
    }

    #[test]
    fn none_effects_are_not_requests() {
        assertions::assert_no_effects::<SelectionAction>(&[Effect::None]);
        assertions::assert_no_effects::<SelectionAction>(&[]);
        assertions::assert_no_requests::<SelectionAction>(&[Effect::None]);
        assertions::assert_effects_count(&[Effect::<SelectionAction>::None], 1);
    }

    #[test]
    fn future_effects_run_to_their_action() {
        let effects = SelectionReducer.reduce(&mut Selection::default(), SelectionAction::SelectLater(9), &());
        assertions::assert_has_future_effect(&effects);
        assert_eq!(assertions::run_future_effect(effects), Some(SelectionAction::Select(9)));
    }
}
