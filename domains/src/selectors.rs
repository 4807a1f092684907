//! Selectors that read across domains.

use crate::app::AppState;
use crate::models::{Controller, Machine, Pod, Subnet, Tag};
use entity_sync_core::selectors::{
    self, Either, FilterItems, Group, Memoized, group_by, resolve, resolve_either,
};
use std::sync::Arc;

/// Subnets grouped by the name of their fabric, in natural order. Subnets
/// whose fabric is unknown land in the trailing "None" group.
#[must_use]
pub fn subnets_by_fabric(state: &AppState) -> Vec<Group<'_, Subnet>> {
    group_by(state.subnets.items.iter(), |subnet| {
        resolve(&state.fabrics, subnet.fabric.as_ref()).map(|fabric| fabric.name.clone())
    })
}

/// Subnets of a space.
#[must_use]
pub fn space_subnets(state: &AppState, space: u32) -> Vec<&Subnet> {
    selectors::filter(&state.subnets, |subnet| subnet.space == Some(space))
}

/// The machine or controller running a VM host.
#[must_use]
pub fn pod_host<'a>(state: &'a AppState, pod: &Pod) -> Option<Either<'a, Machine, Controller>> {
    resolve_either(&state.machines, &state.controllers, pod.host.as_ref())
}

/// Machines composed on a VM host.
#[must_use]
pub fn pod_machines(state: &AppState, pod: u32) -> Vec<&Machine> {
    selectors::filter(&state.machines, |machine| machine.pod == Some(pod))
}

/// Tags applied to a machine. Tags not loaded yet are skipped.
#[must_use]
pub fn machine_tags<'a>(state: &'a AppState, machine: &Machine) -> Vec<&'a Tag> {
    selectors::get_by_ids(&state.tags, Some(machine.tags.as_slice()))
}

fn derived_attribute(state: &AppState, machine: &Machine, key: &str) -> Option<Vec<String>> {
    match key {
        "tags" => Some(
            machine_tags(state, machine)
                .into_iter()
                .map(|tag| tag.name.clone())
                .collect(),
        ),
        "pod" => Some(
            resolve(&state.pods, machine.pod.as_ref())
                .map(|pod| pod.name.clone())
                .into_iter()
                .collect(),
        ),
        _ => None,
    }
}

/// Machines matching a filter string. `tags:` and `pod:` match by name.
#[must_use]
pub fn search_machines<'a>(state: &'a AppState, filter: &FilterItems) -> Vec<&'a Machine> {
    selectors::filter(&state.machines, |machine| {
        filter.matches_with(machine, |machine, key| derived_attribute(state, machine, key))
    })
}

/// Memoized [`search_machines`], returning system ids.
///
/// Recomputes only when the machine, tag or pod store changed or the filter
/// did.
#[derive(Debug, Default)]
pub struct MachineSearch {
    cache: Memoized<(u64, u64, u64, String), Vec<String>>,
}

impl MachineSearch {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// System ids of the machines matching `filter`.
    pub fn system_ids(&self, state: &AppState, filter: &FilterItems) -> Arc<Vec<String>> {
        let key = (
            state.machines.revision,
            state.tags.revision,
            state.pods.revision,
            filter.to_string(),
        );
        self.cache.get(key, || {
            search_machines(state, filter)
                .into_iter()
                .map(|machine| machine.system_id.clone())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fabric, Space};
    use entity_sync_core::state::EntityState;

    fn state() -> AppState {
        let mut tagged = Machine::new("abc", "koala");
        tagged.tags = vec![1];
        tagged.pod = Some(5);
        let mut plain = Machine::new("def", "wombat");
        plain.status = "Deployed".to_string();

        let mut pod = Pod::new(5, "lxd-host");
        pod.host = Some("ctl".to_string());

        AppState {
            tags: EntityState::with_items(vec![Tag::new(1, "virtual"), Tag::new(2, "gpu")]),
            machines: EntityState::with_items(vec![tagged, plain]),
            controllers: EntityState::with_items(vec![Controller::new("ctl", "region")]),
            pods: EntityState::with_items(vec![pod]),
            spaces: EntityState::with_items(vec![Space::new(1, "dmz")]),
            ..AppState::default()
        }
    }

    #[test]
    fn subnets_group_by_fabric_name_in_natural_order() {
        let mut state = state();
        state.fabrics = EntityState::with_items(vec![
            Fabric::new(1, "fabric-1"),
            Fabric::new(2, "1 fabric"),
            Fabric::new(10, "fabric-10"),
        ]);
        state.subnets = EntityState::with_items(vec![
            Subnet::new(1, "10.0.0.0/24").on_fabric(10),
            Subnet::new(2, "10.0.1.0/24").on_fabric(1),
            Subnet::new(3, "10.0.2.0/24").on_fabric(2),
            Subnet::new(4, "10.0.3.0/24").on_fabric(99),
        ]);

        let groups = subnets_by_fabric(&state);

        assert_eq!(
            groups.iter().map(|g| g.label.as_str()).collect::<Vec<_>>(),
            vec!["1 fabric", "fabric-1", "fabric-10", "None"]
        );
        assert_eq!(groups[3].items[0].id, 4);
    }

    #[test]
    fn space_membership() {
        let mut state = state();
        state.subnets = EntityState::with_items(vec![
            Subnet::new(1, "10.0.0.0/24").in_space(1),
            Subnet::new(2, "10.0.1.0/24"),
        ]);
        let ids: Vec<u32> = space_subnets(&state, 1).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn pod_hosts_resolve_across_stores() {
        let state = state();
        let pod = state.pods.items.get(&5).cloned();
        let pod = pod.as_ref().map(|pod| pod_host(&state, pod));
        assert!(matches!(pod, Some(Some(Either::Right(controller))) if controller.hostname == "region"));

        let orphan = Pod::new(6, "gone");
        assert_eq!(pod_host(&state, &orphan), None);
        assert_eq!(pod_machines(&state, 5).len(), 1);
    }

    #[test]
    fn search_uses_tag_and_pod_names() {
        let state = state();

        let by_tag = search_machines(&state, &FilterItems::parse("tags:(=virtual)"));
        assert_eq!(by_tag.iter().map(|m| m.hostname.as_str()).collect::<Vec<_>>(), vec!["koala"]);

        let by_pod = search_machines(&state, &FilterItems::parse("pod:lxd"));
        assert_eq!(by_pod.len(), 1);

        let not_deployed = search_machines(&state, &FilterItems::parse("status:(!deployed)"));
        assert_eq!(not_deployed.iter().map(|m| m.system_id.as_str()).collect::<Vec<_>>(), vec!["abc"]);
    }

    #[test]
    fn memoized_search_reuses_results_until_a_store_changes() {
        let mut state = state();
        let search = MachineSearch::new();
        let filter = FilterItems::parse("koala");

        let first = search.system_ids(&state, &filter);
        let second = search.system_ids(&state, &filter);
        assert!(Arc::ptr_eq(&first, &second));

        state.machines.upsert(Machine::new("ghi", "koala-2"));
        let third = search.system_ids(&state, &filter);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 2);
    }
}
