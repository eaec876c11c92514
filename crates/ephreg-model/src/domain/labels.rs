use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::constants::{LABEL_MANAGED_BY, MANAGED_BY};

/// Kubernetes labels attached to provisioned objects.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Labels every object created by a run carries.
    pub fn managed() -> Self {
        let mut labels = Self::new();
        labels.insert(LABEL_MANAGED_BY, MANAGED_BY);
        labels
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or overwrite a label; returns `self` for chaining.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when every label in `selector` is present with the same value.
    pub fn matches(&self, selector: &Labels) -> bool {
        selector.iter().all(|(k, v)| self.get(k) == Some(v))
    }

    /// Equality-based selector string in key order.
    ///
    /// # Examples
    /// ```
    /// use ephreg_model::Labels;
    ///
    /// let mut labels = Labels::new();
    /// labels.insert("tier", "cache").insert("app", "registry");
    /// assert_eq!(labels.to_selector(), "app=registry,tier=cache");
    /// ```
    pub fn to_selector(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_carries_owner_label() {
        let labels = Labels::managed();
        assert_eq!(labels.get(LABEL_MANAGED_BY), Some(MANAGED_BY));
    }

    #[test]
    fn selector_is_sorted_and_comma_joined() {
        let mut labels = Labels::new();
        labels.insert("b", "2").insert("a", "1");
        assert_eq!(labels.to_selector(), "a=1,b=2");
    }

    #[test]
    fn matches_requires_every_selector_entry() {
        let mut obj = Labels::managed();
        obj.insert("ephreg.dev/pull-secret", "true");

        let mut sel = Labels::new();
        sel.insert("ephreg.dev/pull-secret", "true");
        assert!(obj.matches(&sel));

        sel.insert("other", "x");
        assert!(!obj.matches(&sel));
        assert!(obj.matches(&Labels::new()));
    }
}
