//! Finalizer bookkeeping
//!
//! Finalizers are an ordered list of tags on the object metadata where
//! each tag appears at most once.

use crate::resource::HelmRelease;

/// Finalizer held by the controller while a backend release may exist
pub const RELEASE_FINALIZER: &str = "helmreleases.deckhand.io/finalizer";

/// Ordered set of finalizer tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizerSet(Vec<String>);

impl FinalizerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Append a tag; returns false if it was already present
    pub fn insert(&mut self, tag: &str) -> bool {
        if self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    /// Remove a tag, keeping the order of the rest; returns false if absent
    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for FinalizerSet {
    fn from(tags: Vec<String>) -> Self {
        let mut set = Self::new();
        for tag in &tags {
            set.insert(tag);
        }
        set
    }
}

impl HelmRelease {
    /// Finalizers currently on the object
    pub fn finalizer_set(&self) -> FinalizerSet {
        self.metadata
            .finalizers
            .clone()
            .map(FinalizerSet::from)
            .unwrap_or_default()
    }

    /// The controller's finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.finalizer_set().contains(RELEASE_FINALIZER)
    }

    /// Attach the controller's finalizer; returns false if already attached
    pub fn add_finalizer(&mut self) -> bool {
        self.update_finalizers(|set| set.insert(RELEASE_FINALIZER))
    }

    /// Clear the controller's finalizer; returns false if it was not attached
    pub fn remove_finalizer(&mut self) -> bool {
        self.update_finalizers(|set| set.remove(RELEASE_FINALIZER))
    }

    fn update_finalizers(&mut self, f: impl FnOnce(&mut FinalizerSet) -> bool) -> bool {
        let mut set = self.finalizer_set();
        let changed = f(&mut set);
        if changed {
            self.metadata.finalizers = if set.is_empty() {
                None
            } else {
                Some(set.into_vec())
            };
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ChartSpec, HelmReleaseSpec};

    fn release() -> HelmRelease {
        HelmRelease::new(
            "web",
            HelmReleaseSpec {
                release_name: "web".to_string(),
                chart: ChartSpec {
                    repository: "s3://charts".to_string(),
                    name: "web".to_string(),
                    version: "1.0.0".to_string(),
                },
                values: serde_json::Value::Null,
            },
        )
    }

    #[test]
    fn test_set_keeps_insertion_order() {
        let mut set = FinalizerSet::new();
        assert!(set.insert("a"));
        assert!(set.insert("b"));
        assert!(!set.insert("a"));
        assert!(set.insert("c"));

        assert!(set.remove("b"));
        assert!(!set.remove("b"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_vec_drops_duplicates() {
        let set = FinalizerSet::from(vec!["x".to_string(), "y".to_string(), "x".to_string()]);
        assert_eq!(set.into_vec(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_release_finalizer_lifecycle() {
        let mut rls = release();
        rls.metadata.finalizers = Some(vec!["other.io/keep".to_string()]);
        assert!(!rls.has_finalizer());

        assert!(rls.add_finalizer());
        assert!(!rls.add_finalizer());
        assert!(rls.has_finalizer());
        assert_eq!(
            rls.metadata.finalizers.as_deref(),
            Some(&["other.io/keep".to_string(), RELEASE_FINALIZER.to_string()][..])
        );

        assert!(rls.remove_finalizer());
        assert_eq!(
            rls.metadata.finalizers,
            Some(vec!["other.io/keep".to_string()])
        );
    }

    #[test]
    fn test_removing_last_finalizer_clears_field() {
        let mut rls = release();
        rls.add_finalizer();
        rls.remove_finalizer();
        assert!(rls.metadata.finalizers.is_none());
        assert!(!rls.remove_finalizer());
    }
}
