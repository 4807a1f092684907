//! Grouping entities by a derived label.

use super::natural::natural_cmp;
use std::collections::HashMap;

/// Label of the group holding entities without a key.
pub const NONE_LABEL: &str = "None";

/// One group of entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a, M> {
    /// Display label; [`NONE_LABEL`] for entities without a key
    pub label: String,
    /// Whether this is the keyless group
    pub is_none: bool,
    /// Members in input order
    pub items: Vec<&'a M>,
}

impl<M> Group<'_, M> {
    /// Number of members.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Group entities by `key`.
///
/// Groups are ordered by natural order of their labels; the keyless group,
/// if any, comes last.
pub fn group_by<'a, M, I, F>(items: I, key: F) -> Vec<Group<'a, M>>
where
    I: IntoIterator<Item = &'a M>,
    F: Fn(&M) -> Option<String>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group<'a, M>> = Vec::new();
    let mut none: Vec<&'a M> = Vec::new();

    for item in items {
        match key(item) {
            Some(label) => {
                if let Some(&pos) = positions.get(&label) {
                    groups[pos].items.push(item);
                } else {
                    positions.insert(label.clone(), groups.len());
                    groups.push(Group {
                        label,
                        is_none: false,
                        items: vec![item],
                    });
                }
            },
            None => none.push(item),
        }
    }

    groups.sort_by(|a, b| natural_cmp(&a.label, &b.label));
    if !none.is_empty() {
        groups.push(Group {
            label: NONE_LABEL.to_string(),
            is_none: true,
            items: none,
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        name: &'static str,
        fabric: Option<&'static str>,
    }

    #[test]
    fn groups_sort_naturally_with_none_last() {
        let rows = [
            Row { name: "a", fabric: Some("fabric-10") },
            Row { name: "b", fabric: None },
            Row { name: "c", fabric: Some("fabric-1") },
            Row { name: "d", fabric: Some("1 fabric") },
            Row { name: "e", fabric: Some("fabric-1") },
        ];

        let groups = group_by(&rows, |row| row.fabric.map(str::to_string));

        assert_eq!(
            groups.iter().map(|g| g.label.as_str()).collect::<Vec<_>>(),
            vec!["1 fabric", "fabric-1", "fabric-10", "None"]
        );
        assert_eq!(
            groups[1].items.iter().map(|r| r.name).collect::<Vec<_>>(),
            vec!["c", "e"]
        );
        assert!(groups[3].is_none);
    }

    #[test]
    fn empty_input_gives_no_groups() {
        let rows: Vec<Row> = Vec::new();
        assert!(group_by(&rows, |row| row.fabric.map(str::to_string)).is_empty());
    }
}
