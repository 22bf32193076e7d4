//! Index and foreign key metadata.
//!
//! Table-level value objects attached to a [`Schema`](super::Schema). Both
//! refer to attributes by name so they survive projections that keep those
//! attributes.

use crate::name::RelationName;
use std::sync::Arc;

/// Index definition metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index {
    /// Index name, if declared
    pub name: Option<Arc<str>>,
    /// Attribute names, in index order
    pub attributes: Vec<Arc<str>>,
    /// Whether this is a unique index
    pub unique: bool,
}

impl Index {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: None,
            attributes: attributes.into_iter().map(|a| Arc::from(a.as_ref())).collect(),
            unique: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(Arc::from(name));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// `true` when every indexed attribute is in `names`
    pub fn covered_by<'a>(&self, names: impl Iterator<Item = &'a str> + Clone) -> bool {
        self.attributes
            .iter()
            .all(|a| names.clone().any(|n| n == &**a))
    }
}

/// Foreign key definition: source attributes referencing a parent relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignKey {
    /// Referencing attribute names in the owning schema
    pub attributes: Vec<Arc<str>>,
    /// Referenced relation
    pub parent: RelationName,
    /// Referenced attribute names in the parent relation
    pub parent_keys: Vec<Arc<str>>,
}

impl ForeignKey {
    /// Single-column foreign key referencing `parent.id`
    pub fn new(attribute: &str, parent: &RelationName) -> Self {
        Self {
            attributes: vec![Arc::from(attribute)],
            parent: parent.clone(),
            parent_keys: vec![Arc::from("id")],
        }
    }

    pub fn references(mut self, parent_key: &str) -> Self {
        self.parent_keys = vec![Arc::from(parent_key)];
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_builder() {
        let index = Index::new(["task_id", "tag_id"]).named("task_tags_pair").unique();
        assert_eq!(index.name.as_deref(), Some("task_tags_pair"));
        assert_eq!(index.attributes.len(), 2);
        assert!(index.unique);
    }

    #[test]
    fn test_index_covered_by() {
        let index = Index::new(["task_id", "tag_id"]);
        assert!(index.covered_by(["tag_id", "task_id", "id"].into_iter()));
        assert!(!index.covered_by(["task_id"].into_iter()));
    }

    #[test]
    fn test_foreign_key_default_parent_key() {
        let fk = ForeignKey::new("user_id", &RelationName::named("users"));
        assert_eq!(&*fk.parent_keys[0], "id");
        let fk = fk.references("uuid");
        assert_eq!(&*fk.parent_keys[0], "uuid");
    }
}
