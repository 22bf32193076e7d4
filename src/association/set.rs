//! Per-relation association registry.

use super::Association;
use crate::error::{Result, SchemaError};
use crate::name::RelationName;
use std::collections::HashMap;

/// Associations declared on one relation, looked up by name
///
/// Each association is registered under its public name. An association
/// renamed with `as` is additionally reachable under its target's relation
/// name, unless another association already claims that key.
#[derive(Debug, Clone)]
pub struct AssociationSet {
    source: RelationName,
    associations: Vec<Association>,
    index: HashMap<String, usize>,
}

impl AssociationSet {
    /// A later declaration of a name replaces the earlier one in place
    pub fn new(source: RelationName, declared: Vec<Association>) -> Self {
        let mut index = HashMap::new();
        let mut associations: Vec<Association> = Vec::with_capacity(declared.len());
        for association in declared {
            let existing = index.get(association.name()).copied();
            match existing {
                Some(pos) => {
                    log::warn!(
                        "association {} declared twice on {}, keeping the last one",
                        association.name(),
                        source
                    );
                    associations[pos] = association;
                }
                None => {
                    index.insert(association.name().to_string(), associations.len());
                    associations.push(association);
                }
            }
        }
        for (pos, association) in associations.iter().enumerate() {
            let target = association.definition().target_relation();
            if target != association.name() {
                index.entry(target.to_string()).or_insert(pos);
            }
        }
        Self {
            source,
            associations,
            index,
        }
    }

    pub fn source(&self) -> &RelationName {
        &self.source
    }

    /// Association registered under `name`, or `NoAssociation`
    pub fn get(&self, name: &str) -> Result<&Association> {
        self.try_get(name).ok_or_else(|| SchemaError::NoAssociation {
            name: name.to_string(),
            relation: self.source.relation().to_string(),
        })
    }

    pub fn try_get(&self, name: &str) -> Option<&Association> {
        self.index.get(name).map(|pos| &self.associations[*pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Public names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.associations.iter().map(Association::name).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Association> {
        self.associations.iter()
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }
}

impl<'a> IntoIterator for &'a AssociationSet {
    type Item = &'a Association;
    type IntoIter = std::slice::Iter<'a, Association>;

    fn into_iter(self) -> Self::IntoIter {
        self.associations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flights() -> AssociationSet {
        AssociationSet::new(
            RelationName::named("flights"),
            vec![
                Association::many_to_one("flights", "destinations")
                    .as_name("from")
                    .foreign_key("from_id")
                    .build(),
                Association::many_to_one("flights", "destinations")
                    .as_name("to")
                    .foreign_key("to_id")
                    .build(),
            ],
        )
    }

    #[test]
    fn test_lookup_by_public_name() {
        let set = flights();
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["from", "to"]);
        assert_eq!(set.get("to").unwrap().name(), "to");
    }

    #[test]
    fn test_aliased_entries_reachable_by_target() {
        let set = flights();
        assert_eq!(set.get("destinations").unwrap().name(), "from");
    }

    #[test]
    fn test_redeclared_name_replaces_earlier_entry() {
        let set = AssociationSet::new(
            RelationName::named("users"),
            vec![
                Association::one_to_many("users", "tasks").build(),
                Association::one_to_one("users", "accounts").as_name("account").build(),
                Association::one_to_many("users", "tasks")
                    .foreign_key("owner_id")
                    .build(),
            ],
        );

        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["tasks", "account"]);
        let tasks = set.get("tasks").unwrap();
        assert_eq!(tasks.definition().foreign_key.as_deref(), Some("owner_id"));
        assert_eq!(set.iter().filter(|a| a.name() == "tasks").count(), 1);
        assert_eq!(set.get("accounts").unwrap().name(), "account");
    }

    #[test]
    fn test_unknown_name_reports_relation() {
        let err = flights().get("bogus").unwrap_err();
        assert_eq!(
            err,
            SchemaError::NoAssociation {
                name: "bogus".to_string(),
                relation: "flights".to_string()
            }
        );
        assert!(flights().try_get("bogus").is_none());
    }
}
