use std::collections::HashSet;

/// Identities with unconditional access and command rights
#[derive(Debug, Clone, Default)]
pub struct AdminSet {
    ids: HashSet<String>,
}

impl AdminSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.ids.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AdminSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
