/// The gesture names used when no configuration overrides them.
pub const DEFAULT_LABELS: [&str; 5] = ["HELLO", "YES", "NO", "THANK YOU", "HELP"];

/// The fixed, ordered set of gesture labels a session works with.
///
/// A label's position in the set is its *label index*, the target value the
/// classifier is trained against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Creates a new `LabelSet`.
    ///
    /// # Arguments
    /// * `names` - The label names in enumeration order.
    ///
    /// # Returns
    /// A new `LabelSet` instance.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the label index of `name`, if it belongs to the set.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns the name stored at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_keeps_enumeration_order() {
        let labels = LabelSet::default();

        assert_eq!(labels.len(), 5);
        assert_eq!(labels.index_of("HELLO"), Some(0));
        assert_eq!(labels.index_of("THANK YOU"), Some(3));
        assert_eq!(labels.name(4), Some("HELP"));
    }

    #[test]
    fn lookups_are_exact() {
        let labels = LabelSet::new(["A", "B"]);

        assert_eq!(labels.index_of("a"), None);
        assert_eq!(labels.index_of("C"), None);
        assert_eq!(labels.name(2), None);
    }
}
