//! Label-based container selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Decides which containers are traced, by pod labels.
///
/// A container matches when it carries every selector label with an equal
/// value. An empty selector matches every container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSelector {
    labels: BTreeMap<String, String>,
}

impl ContainerSelector {
    /// Selector matching every container.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            labels: BTreeMap::new(),
        }
    }

    /// Selector requiring all of `labels`.
    #[must_use]
    pub const fn with_labels(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    /// Required labels.
    #[must_use]
    pub const fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Returns `true` if a container with `labels` is selected.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_anything() {
        assert!(ContainerSelector::all().matches(&BTreeMap::new()));
        assert!(ContainerSelector::all().matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn label_selector_requires_equal_value() {
        let selector = ContainerSelector::with_labels(labels(&[("ig-trace", "file-access")]));
        assert!(selector.matches(&labels(&[("ig-trace", "file-access"), ("app", "web")])));
        assert!(!selector.matches(&labels(&[("ig-trace", "network")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
    }
}
