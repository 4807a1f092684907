//! Push routing for every domain.

use crate::app::AppAction;
use crate::models::{Controller, Fabric, Machine, Pod, Space, Subnet, Tag};
use entity_sync_core::error::DecodeError;
use entity_sync_core::transport::Push;
use entity_sync_runtime::push::{PushRouter, route_model};

type Route = fn(&Push) -> Result<Option<AppAction>, DecodeError>;

const ROUTES: [Route; 7] = [
    |push| route_model::<Tag, _>(push, AppAction::Tag),
    |push| route_model::<Fabric, _>(push, AppAction::Fabric),
    |push| route_model::<Space, _>(push, AppAction::Space),
    |push| route_model::<Subnet, _>(push, AppAction::Subnet),
    |push| route_model::<Machine, _>(push, AppAction::Machine),
    |push| route_model::<Controller, _>(push, AppAction::Controller),
    |push| route_model::<Pod, _>(push, AppAction::Pod),
];

/// Sends each push to the domain named by its model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppRouter;

impl PushRouter<AppAction> for AppRouter {
    fn route(&self, push: Push) -> Result<Option<AppAction>, DecodeError> {
        for route in ROUTES {
            if let Some(action) = route(&push)? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use entity_sync_core::action::EntityAction;
    use entity_sync_core::transport::PushVerb;
    use serde_json::json;

    #[test]
    fn pushes_route_by_model() {
        let action = AppRouter
            .route(Push::new("machine", PushVerb::Delete, json!({"system_id": "abc"})))
            .unwrap();
        assert_eq!(
            action,
            Some(AppAction::Machine(EntityAction::DeleteNotify {
                id: "abc".to_string()
            }))
        );

        let action = AppRouter
            .route(Push::new("pod", PushVerb::Update, json!({"id": 3, "name": "lxd-1"})))
            .unwrap();
        assert!(matches!(
            action,
            Some(AppAction::Pod(EntityAction::UpdateNotify { item })) if item.name == "lxd-1"
        ));
    }

    #[test]
    fn unknown_models_are_ignored() {
        let action = AppRouter
            .route(Push::new("zone", PushVerb::Create, json!({"id": 1})))
            .unwrap();
        assert_eq!(action, None);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        let result = AppRouter.route(Push::new("subnet", PushVerb::Create, json!({"id": 1})));
        assert!(result.is_err());
    }
}
