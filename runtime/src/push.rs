//! Push pump.
//!
//! Pushes arrive on the correlator's broadcast channel with no call id. A
//! [`PushRouter`] turns each one into the owning domain's `*Notify` action;
//! [`Store::attach_pushes`] runs the loop that feeds them into the store.

use crate::metrics::PushMetrics;
use crate::store::Store;
use entity_sync_core::action::EntityAction;
use entity_sync_core::error::DecodeError;
use entity_sync_core::model::Model;
use entity_sync_core::reducer::Reducer;
use entity_sync_core::transport::Push;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Maps pushes onto application actions.
pub trait PushRouter<A>: Send + Sync + 'static {
    /// Decode a push.
    ///
    /// Returns `Ok(None)` for models this router does not handle.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the model is handled but the payload does
    /// not decode.
    fn route(&self, push: Push) -> Result<Option<A>, DecodeError>;
}

/// Decode `push` as a notify action for `M` and wrap it, if the push is for
/// `M` at all. Building block for [`PushRouter`] implementations.
///
/// # Errors
///
/// Returns [`DecodeError`] if the push names `M` but its payload does not
/// decode.
pub fn route_model<M, A>(push: &Push, embed: fn(EntityAction<M>) -> A) -> Result<Option<A>, DecodeError>
where
    M: Model,
{
    if push.model != M::MODEL {
        return Ok(None);
    }
    EntityAction::from_push(push.verb, push.payload.clone()).map(|action| Some(embed(action)))
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Feed pushes from `pushes` into this store until the channel closes
    /// or the store shuts down.
    ///
    /// Undecodable pushes are logged and skipped; they never stop the pump.
    pub fn attach_pushes<P>(&self, router: P, mut pushes: broadcast::Receiver<Push>) -> JoinHandle<()>
    where
        P: PushRouter<A>,
    {
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                let push = match pushes.recv().await {
                    Ok(push) => push,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Push pump lagged, pushes lost");
                        PushMetrics::record_lagged(skipped);
                        continue;
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Push channel closed, stopping pump");
                        break;
                    },
                };

                let model = push.model.clone();
                let verb = push.verb;
                match router.route(push) {
                    Ok(Some(action)) => {
                        tracing::debug!(%model, ?verb, "Routing push");
                        PushMetrics::record_routed();
                        if store.feed_back(action).await.is_err() {
                            tracing::debug!("Store shutting down, stopping pump");
                            break;
                        }
                    },
                    Ok(None) => {
                        tracing::trace!(%model, ?verb, "No handler for push");
                        PushMetrics::record_ignored();
                    },
                    Err(error) => {
                        tracing::warn!(%model, ?verb, %error, "Dropping undecodable push");
                        PushMetrics::record_undecodable();
                    },
                }
            }
        })
    }
}
