//! The application store: one entity store per domain behind a single
//! state, action and reducer.

use crate::models::{Controller, Fabric, Machine, Pod, Space, Subnet, Tag};
use entity_sync_core::action::EntityAction;
use entity_sync_core::composition::{Lens, reduce_in};
use entity_sync_core::effect::Effect;
use entity_sync_core::environment::SyncEnvironment;
use entity_sync_core::reducer::Reducer;
use entity_sync_core::reducers::EntityReducer;
use entity_sync_core::state::EntityState;
use entity_sync_core::SmallVec;
use entity_sync_runtime::Store;

/// Every domain's entity store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Tags
    pub tags: EntityState<Tag>,
    /// Fabrics
    pub fabrics: EntityState<Fabric>,
    /// Spaces
    pub spaces: EntityState<Space>,
    /// Subnets
    pub subnets: EntityState<Subnet>,
    /// Machines
    pub machines: EntityState<Machine>,
    /// Controllers
    pub controllers: EntityState<Controller>,
    /// VM hosts
    pub pods: EntityState<Pod>,
}

/// An action for one domain's store.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Tag store
    Tag(EntityAction<Tag>),
    /// Fabric store
    Fabric(EntityAction<Fabric>),
    /// Space store
    Space(EntityAction<Space>),
    /// Subnet store
    Subnet(EntityAction<Subnet>),
    /// Machine store
    Machine(EntityAction<Machine>),
    /// Controller store
    Controller(EntityAction<Controller>),
    /// VM host store
    Pod(EntityAction<Pod>),
}

impl AppAction {
    /// Short name for logs, e.g. `"machine/operation_start"`.
    #[must_use]
    pub fn name(&self) -> String {
        let (model, action) = match self {
            Self::Tag(a) => ("tag", a.name()),
            Self::Fabric(a) => ("fabric", a.name()),
            Self::Space(a) => ("space", a.name()),
            Self::Subnet(a) => ("subnet", a.name()),
            Self::Machine(a) => ("machine", a.name()),
            Self::Controller(a) => ("controller", a.name()),
            Self::Pod(a) => ("pod", a.name()),
        };
        format!("{model}/{action}")
    }
}

/// Lens onto one domain of [`AppState`] / [`AppAction`].
pub type DomainLens<M> = Lens<AppState, EntityState<M>, AppAction, EntityAction<M>>;

/// Tag store
pub const TAGS: DomainLens<Tag> = Lens {
    get: |s| &s.tags,
    get_mut: |s| &mut s.tags,
    embed: AppAction::Tag,
};

/// Fabric store
pub const FABRICS: DomainLens<Fabric> = Lens {
    get: |s| &s.fabrics,
    get_mut: |s| &mut s.fabrics,
    embed: AppAction::Fabric,
};

/// Space store
pub const SPACES: DomainLens<Space> = Lens {
    get: |s| &s.spaces,
    get_mut: |s| &mut s.spaces,
    embed: AppAction::Space,
};

/// Subnet store
pub const SUBNETS: DomainLens<Subnet> = Lens {
    get: |s| &s.subnets,
    get_mut: |s| &mut s.subnets,
    embed: AppAction::Subnet,
};

/// Machine store
pub const MACHINES: DomainLens<Machine> = Lens {
    get: |s| &s.machines,
    get_mut: |s| &mut s.machines,
    embed: AppAction::Machine,
};

/// Controller store
pub const CONTROLLERS: DomainLens<Controller> = Lens {
    get: |s| &s.controllers,
    get_mut: |s| &mut s.controllers,
    embed: AppAction::Controller,
};

/// VM host store
pub const PODS: DomainLens<Pod> = Lens {
    get: |s| &s.pods,
    get_mut: |s| &mut s.pods,
    embed: AppAction::Pod,
};

/// Routes each action to its domain's generated reducer.
#[derive(Debug, Default)]
pub struct AppReducer {
    tags: EntityReducer<Tag>,
    fabrics: EntityReducer<Fabric>,
    spaces: EntityReducer<Space>,
    subnets: EntityReducer<Subnet>,
    machines: EntityReducer<Machine>,
    controllers: EntityReducer<Controller>,
    pods: EntityReducer<Pod>,
}

impl AppReducer {
    /// Create the reducer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reducer for AppReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = SyncEnvironment;

    fn reduce(
        &self,
        state: &mut AppState,
        action: AppAction,
        env: &SyncEnvironment,
    ) -> SmallVec<[Effect<AppAction>; 4]> {
        match action {
            AppAction::Tag(a) => reduce_in(&self.tags, &TAGS, state, a, env),
            AppAction::Fabric(a) => reduce_in(&self.fabrics, &FABRICS, state, a, env),
            AppAction::Space(a) => reduce_in(&self.spaces, &SPACES, state, a, env),
            AppAction::Subnet(a) => reduce_in(&self.subnets, &SUBNETS, state, a, env),
            AppAction::Machine(a) => reduce_in(&self.machines, &MACHINES, state, a, env),
            AppAction::Controller(a) => reduce_in(&self.controllers, &CONTROLLERS, state, a, env),
            AppAction::Pod(a) => reduce_in(&self.pods, &PODS, state, a, env),
        }
    }
}

/// The application's store.
pub type AppStore = Store<AppState, AppAction, SyncEnvironment, AppReducer>;
