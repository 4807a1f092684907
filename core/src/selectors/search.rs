//! Search filter strings.
//!
//! ```text
//! pod-1 status:(=deployed,=ready) owner:admin tags:(!virtual)
//! └─┬─┘ └──────────┬────────────┘ └────┬────┘ └─────┬──────┘
//! free text   exact values         substring     negated substring
//! ```
//!
//! - `key:(=a,=b)` matches when the attribute equals `a` or `b`
//! - `key:a` matches when the attribute contains `a`
//! - a `!` before a value excludes entities matching it
//! - bare words must all appear in one of the entity's searchable fields
//!
//! Matching is case-insensitive. Values cannot contain `,` or `)`.

use std::fmt;

/// Attribute lookup for filtering.
///
/// Attributes may be derived (e.g. a machine's pod name or tag names) rather
/// than stored fields.
pub trait Searchable {
    /// Values of attribute `key`, or `None` if the entity has no such
    /// attribute. Multi-valued attributes return several values.
    fn attribute(&self, key: &str) -> Option<Vec<String>>;

    /// Fields searched by free text.
    fn free_text(&self) -> Vec<String>;
}

/// One value of a filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue {
    /// The text to match
    pub text: String,
    /// Whole-value match instead of substring
    pub exact: bool,
    /// Exclude instead of include
    pub negated: bool,
}

impl FilterValue {
    /// Exact match, `=text`.
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: true,
            negated: false,
        }
    }

    /// Substring match, `text`.
    #[must_use]
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: false,
            negated: false,
        }
    }

    /// The same value, negated.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn parse(raw: &str) -> Option<Self> {
        let mut rest = raw.trim();
        let negated = rest.starts_with('!');
        if negated {
            rest = &rest[1..];
        }
        let exact = rest.starts_with('=');
        if exact {
            rest = &rest[1..];
        }
        (!rest.is_empty()).then(|| Self {
            text: rest.to_string(),
            exact,
            negated,
        })
    }

    fn hits(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        let text = self.text.to_lowercase();
        if self.exact {
            candidate == text
        } else {
            candidate.contains(&text)
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        if self.exact {
            f.write_str("=")?;
        }
        f.write_str(&self.text)
    }
}

/// A parsed search filter.
///
/// Keys keep the order in which they first appeared, so toggling a value
/// leaves the rest of the string where the user put it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterItems {
    terms: Vec<(String, Vec<FilterValue>)>,
    free: Vec<String>,
}

/// Split on whitespace outside parentheses.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            },
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            },
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            },
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl FilterItems {
    /// Parse a filter string. Never fails; unparseable pieces become free
    /// text.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut filter = Self::default();

        for token in tokenize(input) {
            let split = token
                .split_once(':')
                .filter(|(key, _)| !key.is_empty() && !key.contains('('));

            match split {
                Some((key, raw)) => {
                    let raw = raw.strip_prefix('(').map_or(raw, |inner| {
                        inner.strip_suffix(')').unwrap_or(inner)
                    });
                    for value in raw.split(',').filter_map(FilterValue::parse) {
                        filter.add(key, value);
                    }
                },
                None => filter.free.push(token),
            }
        }
        filter
    }

    /// Whether the filter has no terms and no free text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.free.is_empty()
    }

    /// Values of one key.
    #[must_use]
    pub fn values(&self, key: &str) -> &[FilterValue] {
        self.terms
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// Free-text words.
    #[must_use]
    pub fn free_text(&self) -> &[String] {
        &self.free
    }

    /// Add a value under `key`, unless already present.
    pub fn add(&mut self, key: &str, value: FilterValue) {
        match self.terms.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            },
            None => self.terms.push((key.to_string(), vec![value])),
        }
    }

    /// Remove one value; drops the key once it has no values left.
    pub fn remove(&mut self, key: &str, value: &FilterValue) {
        if let Some((_, values)) = self.terms.iter_mut().find(|(k, _)| k == key) {
            values.retain(|v| v != value);
        }
        self.terms.retain(|(_, values)| !values.is_empty());
    }

    /// Remove every value of `key`.
    pub fn clear_key(&mut self, key: &str) {
        self.terms.retain(|(k, _)| k != key);
    }

    /// Whether `value` is currently set under `key`.
    #[must_use]
    pub fn is_active(&self, key: &str, value: &FilterValue) -> bool {
        self.values(key).contains(value)
    }

    /// Add `value` under `key` if absent, remove it if present. Other keys
    /// are untouched.
    pub fn toggle(&mut self, key: &str, value: FilterValue) {
        if self.is_active(key, &value) {
            self.remove(key, &value);
        } else {
            self.add(key, value);
        }
    }

    /// Whether `item` passes the filter.
    pub fn matches<M: Searchable>(&self, item: &M) -> bool {
        self.matches_with(item, |_, _| None)
    }

    /// Like [`matches`](Self::matches), consulting `derived` before the
    /// entity's own attributes. Used for attributes that need another store,
    /// such as resolving tag ids to names.
    pub fn matches_with<M, F>(&self, item: &M, derived: F) -> bool
    where
        M: Searchable,
        F: Fn(&M, &str) -> Option<Vec<String>>,
    {
        let terms_match = self.terms.iter().all(|(key, values)| {
            let attribute = derived(item, key.as_str()).or_else(|| item.attribute(key));
            let candidates = attribute.unwrap_or_default();
            let hit = |value: &FilterValue| candidates.iter().any(|c| value.hits(c));

            let (excluded, included): (Vec<_>, Vec<_>) = values.iter().partition(|v| v.negated);
            let included_ok = included.is_empty() || included.iter().any(|v| hit(*v));
            let excluded_ok = !excluded.iter().any(|v| hit(*v));
            included_ok && excluded_ok
        });
        if !terms_match {
            return false;
        }

        if self.free.is_empty() {
            return true;
        }
        let fields: Vec<String> = item.free_text().iter().map(|f| f.to_lowercase()).collect();
        self.free.iter().all(|word| {
            let word = word.to_lowercase();
            fields.iter().any(|field| field.contains(&word))
        })
    }
}

impl fmt::Display for FilterItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.free.clone();
        for (key, values) in &self.terms {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            parts.push(format!("{key}:({})", values.join(",")));
        }
        f.write_str(&parts.join(" "))
    }
}

impl std::str::FromStr for FilterItems {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host {
        hostname: &'static str,
        status: &'static str,
        tags: Vec<&'static str>,
    }

    impl Searchable for Host {
        fn attribute(&self, key: &str) -> Option<Vec<String>> {
            match key {
                "hostname" => Some(vec![self.hostname.to_string()]),
                "status" => Some(vec![self.status.to_string()]),
                "tags" => Some(self.tags.iter().map(ToString::to_string).collect()),
                _ => None,
            }
        }

        fn free_text(&self) -> Vec<String> {
            vec![self.hostname.to_string(), self.status.to_string()]
        }
    }

    fn host(hostname: &'static str, status: &'static str, tags: Vec<&'static str>) -> Host {
        Host {
            hostname,
            status,
            tags,
        }
    }

    #[test]
    fn parses_exact_partial_negated_and_free_text() {
        let filter = FilterItems::parse("web status:(=deployed,=ready) tags:(!virtual) owner:adm");

        assert_eq!(filter.free_text(), &["web".to_string()]);
        assert_eq!(
            filter.values("status"),
            &[FilterValue::exact("deployed"), FilterValue::exact("ready")]
        );
        assert_eq!(filter.values("tags"), &[FilterValue::partial("virtual").negate()]);
        assert_eq!(filter.values("owner"), &[FilterValue::partial("adm")]);
    }

    #[test]
    fn display_round_trips_canonically() {
        let filter = FilterItems::parse("status:(=deployed, =ready)   web");
        assert_eq!(filter.to_string(), "web status:(=deployed,=ready)");
        assert_eq!(FilterItems::parse(&filter.to_string()), filter);
    }

    #[test]
    fn toggle_keeps_unrelated_keys() {
        let mut filter = FilterItems::parse("owner:admin status:(=deployed)");

        filter.toggle("status", FilterValue::exact("ready"));
        assert_eq!(filter.to_string(), "owner:(admin) status:(=deployed,=ready)");
        assert!(filter.is_active("status", &FilterValue::exact("ready")));

        filter.toggle("status", FilterValue::exact("deployed"));
        filter.toggle("status", FilterValue::exact("ready"));
        assert_eq!(filter.to_string(), "owner:(admin)");
    }

    #[test]
    fn exact_values_are_or_ed() {
        let filter = FilterItems::parse("status:(=deployed,=ready)");
        assert!(filter.matches(&host("a", "Deployed", vec![])));
        assert!(filter.matches(&host("b", "ready", vec![])));
        assert!(!filter.matches(&host("c", "deploying", vec![])));
    }

    #[test]
    fn negation_excludes() {
        let filter = FilterItems::parse("tags:(!virt)");
        assert!(filter.matches(&host("a", "ready", vec!["metal"])));
        assert!(!filter.matches(&host("b", "ready", vec!["metal", "virtual"])));
    }

    #[test]
    fn free_text_searches_every_field() {
        let filter = FilterItems::parse("WEB ready");
        assert!(filter.matches(&host("web-01", "ready", vec![])));
        assert!(!filter.matches(&host("db-01", "ready", vec![])));
    }

    #[test]
    fn unknown_attributes_only_pass_negations() {
        assert!(!FilterItems::parse("zone:default").matches(&host("a", "ready", vec![])));
        assert!(FilterItems::parse("zone:(!default)").matches(&host("a", "ready", vec![])));
    }

    #[test]
    fn derived_attributes_take_precedence() {
        let filter = FilterItems::parse("pod:(=pod-1)");
        let matched = filter.matches_with(&host("a", "ready", vec![]), |host, key| {
            (key == "pod" && host.hostname == "a").then(|| vec!["pod-1".to_string()])
        });
        assert!(matched);
    }
}
