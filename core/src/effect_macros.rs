//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when building `Effect` variants in
//! reducers, particularly correlated transport calls.

/// Create an `Effect::Transport` for a correlated request
///
/// The correlator and request timeout are taken from the environment.
///
/// # Example
///
/// ```rust,ignore
/// use entity_sync_core::request;
///
/// request! {
///     env: env,
///     call_id: call_id.clone(),
///     model: Tag::MODEL,
///     method: "list",
///     params: params,
///     on_success: |body| Some(TagAction::Loaded { body }),
///     on_error: |error| Some(TagAction::Failed { error })
/// }
/// ```
#[macro_export]
macro_rules! request {
    (
        env: $env:expr,
        call_id: $call_id:expr,
        model: $model:expr,
        method: $method:expr,
        params: $params:expr,
        on_success: |$success_param:ident| $success_body:expr,
        on_error: |$error_param:ident| $error_body:expr
    ) => {
        $crate::effect::Effect::Transport($crate::effect::TransportOperation {
            correlator: ::std::sync::Arc::clone($env.correlator()),
            request: $crate::transport::Request::new($call_id, $model, $method, $params),
            timeout: $env.request_timeout(),
            on_success: ::std::boxed::Box::new(move |$success_param| $success_body),
            on_error: ::std::boxed::Box::new(move |$error_param| $error_body),
        })
    };
}

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use entity_sync_core::async_effect;
///
/// async_effect! {
///     tokio::time::sleep(Duration::from_secs(30)).await;
///     Some(AppAction::Tags(EntityAction::InvalidateLists))
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::correlation::CallId;
    use crate::effect::Effect;
    use crate::environment::SyncEnvironment;
    use crate::error::TransportError;
    use crate::transport::{Correlator, Request, Transport};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Loaded(serde_json::Value),
        Failed(String),
        Expired,
    }

    struct NullTransport;

    impl Transport for NullTransport {
        fn send(&self, _request: Request) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_request_macro() {
        let env = SyncEnvironment::new(Arc::new(Correlator::new(Arc::new(NullTransport))))
            .with_request_timeout(Duration::from_secs(3));

        let effect: Effect<TestAction> = request! {
            env: env,
            call_id: CallId::from("call-1"),
            model: "tag",
            method: "list",
            params: json!({"page": 1}),
            on_success: |body| Some(TestAction::Loaded(body)),
            on_error: |error| Some(TestAction::Failed(error.message()))
        };

        let Effect::Transport(op) = effect else {
            unreachable!("request! builds a transport effect");
        };
        assert_eq!(op.request.qualified_method(), "tag.list");
        assert_eq!(op.timeout, Duration::from_secs(3));
        assert_eq!((op.on_success)(json!(1)), Some(TestAction::Loaded(json!(1))));
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Expired)
        };

        assert!(matches!(effect, Effect::Future(_)));
    }
}
