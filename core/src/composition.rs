//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`Lens`** / **`reduce_in`**: Run a domain reducer on one field of a
//!   larger state, lifting its effects into the larger action type
//! - **`pullback`**: The same, packaged as a reducer over the larger types
//!
//! # Examples
//!
//! ```ignore
//! use entity_sync_core::composition::{Lens, reduce_in};
//!
//! const TAGS: Lens<AppState, EntityState<Tag>, AppAction, EntityAction<Tag>> = Lens {
//!     get: |app| &app.tags,
//!     get_mut: |app| &mut app.tags,
//!     embed: AppAction::Tags,
//! };
//!
//! match action {
//!     AppAction::Tags(action) => reduce_in(&self.tags, &TAGS, state, action, env),
//!     // ...
//! }
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// A boxed reducer that can live inside a store shared across tasks
pub type BoxedReducer<S, A, E> = Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
/// This is useful when you want to split reducer logic across multiple implementations.
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<BoxedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<BoxedReducer<S, A, E>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects);
        }

        all_effects
    }
}

/// Focus from a parent state/action pair onto one child.
///
/// - `get` / `get_mut`: borrow the child state
/// - `embed`: wrap a child action into the parent action (usually the enum
///   variant constructor)
pub struct Lens<S, SubS, A, SubA> {
    /// Borrow the child state
    pub get: fn(&S) -> &SubS,
    /// Mutably borrow the child state
    pub get_mut: fn(&mut S) -> &mut SubS,
    /// Wrap a child action
    pub embed: fn(SubA) -> A,
}

impl<S, SubS, A, SubA> Clone for Lens<S, SubS, A, SubA> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, SubS, A, SubA> Copy for Lens<S, SubS, A, SubA> {}

impl<S, SubS, A, SubA> std::fmt::Debug for Lens<S, SubS, A, SubA> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lens").finish_non_exhaustive()
    }
}

/// Run `reducer` on the child state selected by `lens`.
///
/// The child is borrowed in place, never cloned. Every follow-up action the
/// child's effects produce is wrapped with `lens.embed`.
pub fn reduce_in<R, S, A>(
    reducer: &R,
    lens: &Lens<S, R::State, A, R::Action>,
    state: &mut S,
    action: R::Action,
    env: &R::Environment,
) -> SmallVec<[Effect<A>; 4]>
where
    R: Reducer,
    R::Action: 'static,
    A: 'static,
{
    reducer
        .reduce((lens.get_mut)(state), action, env)
        .into_iter()
        .map(|effect| effect.map(lens.embed))
        .collect()
}

/// Lift a child reducer into a reducer over the parent types.
///
/// `extract` picks the child action out of a parent action; parent actions
/// it rejects produce no effects.
pub fn pullback<R, S, A>(
    reducer: R,
    lens: Lens<S, R::State, A, R::Action>,
    extract: fn(A) -> Option<R::Action>,
) -> Pullback<R, S, A>
where
    R: Reducer,
{
    Pullback {
        reducer,
        lens,
        extract,
    }
}

/// A reducer running a child reducer through a [`Lens`].
///
/// Created by [`pullback`].
pub struct Pullback<R: Reducer, S, A> {
    reducer: R,
    lens: Lens<S, R::State, A, R::Action>,
    extract: fn(A) -> Option<R::Action>,
}

impl<R, S, A> Reducer for Pullback<R, S, A>
where
    R: Reducer,
    R::Action: 'static,
    A: 'static,
{
    type State = S;
    type Action = A;
    type Environment = R::Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match (self.extract)(action) {
            Some(action) => reduce_in(&self.reducer, &self.lens, state, action, env),
            None => SmallVec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smallvec;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Unread {
        count: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum UnreadAction {
        Arrived,
        Forward,
    }

    #[derive(Clone, Debug, Default)]
    struct AppState {
        inbox: Unread,
        archive: Unread,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum AppAction {
        Inbox(UnreadAction),
        Archive(UnreadAction),
    }

    struct UnreadReducer;

    impl Reducer for UnreadReducer {
        type State = Unread;
        type Action = UnreadAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                UnreadAction::Arrived => {
                    state.count += 1;
                    smallvec![Effect::None]
                },
                UnreadAction::Forward => smallvec![Effect::Future(Box::pin(async {
                    Some(UnreadAction::Arrived)
                }))],
            }
        }
    }

    const INBOX: Lens<AppState, Unread, AppAction, UnreadAction> = Lens {
        get: |app| &app.inbox,
        get_mut: |app| &mut app.inbox,
        embed: AppAction::Inbox,
    };

    #[test]
    fn combined_reducers_each_see_the_action() {
        let combined = combine_reducers::<Unread, UnreadAction, ()>(vec![
            Box::new(UnreadReducer),
            Box::new(UnreadReducer),
        ]);

        let mut state = Unread::default();
        let effects = combined.reduce(&mut state, UnreadAction::Arrived, &());

        assert_eq!(state.count, 2);
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn reduce_in_touches_only_the_focused_field() {
        let mut state = AppState::default();
        reduce_in(&UnreadReducer, &INBOX, &mut state, UnreadAction::Arrived, &());

        assert_eq!((INBOX.get)(&state).count, 1);
        assert_eq!(state.archive.count, 0);
    }

    #[tokio::test]
    async fn reduce_in_embeds_follow_up_actions() {
        let mut state = AppState::default();
        let effects = reduce_in(&UnreadReducer, &INBOX, &mut state, UnreadAction::Forward, &());

        let Some(Effect::Future(fut)) = effects.into_iter().next() else {
            unreachable!("forward produces a future effect");
        };
        assert_eq!(fut.await, Some(AppAction::Inbox(UnreadAction::Arrived)));
    }

    #[test]
    fn pullback_ignores_other_actions() {
        let reducer = pullback(UnreadReducer, INBOX, |action| match action {
            AppAction::Inbox(action) => Some(action),
            AppAction::Archive(_) => None,
        });

        let mut state = AppState::default();
        reducer.reduce(&mut state, AppAction::Archive(UnreadAction::Arrived), &());
        reducer.reduce(&mut state, AppAction::Inbox(UnreadAction::Arrived), &());

        assert_eq!(state.inbox.count, 1);
        assert_eq!(state.archive.count, 0);
    }
}
