//! Binding specs per domain.
//!
//! Each domain gets a list binding (scoped fetch into its own bucket) and a
//! detail binding (one entity by id, unsubscribed when the last consumer
//! lets go). A view holds a [`Binding`] built from one of these and a
//! registry shared by every view of the same kind.

use crate::app::{
    AppAction, AppReducer, AppState, AppStore, CONTROLLERS, FABRICS, MACHINES, PODS, SPACES,
    SUBNETS, TAGS,
};
use crate::models::{Controller, Fabric, Machine, Pod, Space, Subnet, Tag};
use entity_sync_runtime::binding::{
    Binding, BindingSpec, DetailBinding, ListBinding, SubscriptionRegistry,
};
use std::fmt;
use std::sync::Arc;

/// List binding over one domain of the application store
pub type AppList<M> = ListBinding<M, AppState, AppAction>;

/// Detail binding over one domain of the application store
pub type AppDetail<M> = DetailBinding<M, AppState, AppAction>;

/// A live binding against the application store
pub type AppBinding<B> = Binding<AppReducer, B>;

/// One spec and one subscription registry, shared by every binding it
/// hands out.
pub struct BindingKind<B: BindingSpec> {
    spec: Arc<B>,
    registry: Arc<SubscriptionRegistry<B::Target>>,
}

impl<B> BindingKind<B>
where
    B: BindingSpec<State = AppState, Action = AppAction>,
{
    fn new(spec: B) -> Self {
        Self {
            spec: Arc::new(spec),
            registry: Arc::new(SubscriptionRegistry::new()),
        }
    }

    /// An idle binding against `store`.
    #[must_use]
    pub fn bind(&self, store: &AppStore) -> AppBinding<B> {
        Binding::new(store.clone(), Arc::clone(&self.spec), Arc::clone(&self.registry))
    }

    /// Live consumers of `target`.
    #[must_use]
    pub fn consumers(&self, target: &B::Target) -> usize {
        self.registry.consumers(target)
    }
}

impl<B: BindingSpec> fmt::Debug for BindingKind<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingKind")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Every binding kind the application offers.
#[derive(Debug)]
pub struct Bindings {
    /// Tag lists
    pub tag_list: BindingKind<AppList<Tag>>,
    /// Fabric lists
    pub fabric_list: BindingKind<AppList<Fabric>>,
    /// Space lists
    pub space_list: BindingKind<AppList<Space>>,
    /// Subnet lists
    pub subnet_list: BindingKind<AppList<Subnet>>,
    /// Machine lists
    pub machine_list: BindingKind<AppList<Machine>>,
    /// Single machines
    pub machine: BindingKind<AppDetail<Machine>>,
    /// Single controllers
    pub controller: BindingKind<AppDetail<Controller>>,
    /// VM host lists
    pub pod_list: BindingKind<AppList<Pod>>,
    /// Single VM hosts
    pub pod: BindingKind<AppDetail<Pod>>,
}

impl Bindings {
    /// Fresh registries for every kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tag_list: BindingKind::new(ListBinding::new(TAGS)),
            fabric_list: BindingKind::new(ListBinding::new(FABRICS)),
            space_list: BindingKind::new(ListBinding::new(SPACES)),
            subnet_list: BindingKind::new(ListBinding::new(SUBNETS)),
            machine_list: BindingKind::new(ListBinding::new(MACHINES)),
            machine: BindingKind::new(DetailBinding::new(MACHINES)),
            controller: BindingKind::new(DetailBinding::new(CONTROLLERS)),
            pod_list: BindingKind::new(ListBinding::new(PODS)),
            pod: BindingKind::new(DetailBinding::new(PODS)),
        }
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self::new()
    }
}
