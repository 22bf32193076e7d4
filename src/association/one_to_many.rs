//! One-to-many associations.
//!
//! The target holds a foreign key to the source's primary key:
//!
//! ```text
//! join_keys    = { source[pk].qualified(source_alias) => target[fk].qualified }
//! combine_keys = { pk => fk }
//! ```
//!
//! For a self-referential association (`categories` has many `categories`)
//! the source side is rendered under a synthetic alias so the two sides of
//! the join never share a table identity.

use super::{
    apply_view, foreign_key_name, key_attribute, stamp, table, AssociationKind, CombineKeys,
    Definition, JoinKeys, Resolve, SourceAlias,
};
use crate::error::Result;
use crate::executor::{Executor, Join, JoinKind, Select, Tuple};
use crate::registry::{Relation, RelationRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OneToMany {
    definition: Definition,
    source_alias: SourceAlias,
}

/// Relations and key names resolved against the registry
pub(crate) struct Resolved {
    pub source: Arc<Relation>,
    pub target: Arc<Relation>,
    pub source_key: String,
    pub target_key: String,
}

impl OneToMany {
    pub fn new(definition: Definition) -> Self {
        Self {
            definition,
            source_alias: SourceAlias::default(),
        }
    }

    pub(crate) fn resolve(&self, registry: &dyn RelationRegistry) -> Result<Resolved> {
        let source = registry.relation(self.definition.source.relation())?;
        let target = registry.relation(self.definition.target_relation())?;
        let source_key = source.primary_key_name()?.to_string();
        let target_key =
            foreign_key_name(&self.definition, &target, source.name(), registry.config())?;
        Ok(Resolved {
            source,
            target,
            source_key,
            target_key,
        })
    }

    /// Alias of the source side; `Some` only for self-references
    pub fn source_alias(&self, registry: &dyn RelationRegistry) -> Result<Option<&str>> {
        let source = registry.relation(self.definition.source.relation())?;
        Ok(self
            .source_alias
            .resolve(&self.definition, &source, registry.config()))
    }

    fn keys_for(&self, resolved: &Resolved, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let alias = self
            .source_alias
            .resolve(&self.definition, &resolved.source, registry.config());
        Ok(JoinKeys {
            source: key_attribute(&self.definition, &resolved.source, &resolved.source_key)?
                .qualified(alias)?,
            target: key_attribute(&self.definition, &resolved.target, &resolved.target_key)?
                .qualified(None)?,
        })
    }

    fn target_select(&self, resolved: &Resolved) -> Result<Select> {
        let select = Select::new(
            resolved.target.name().qualified_name(),
            resolved.target.schema().qualified(None)?,
        );
        apply_view(&self.definition, &resolved.target, select)
    }
}

impl Resolve for OneToMany {
    fn definition(&self) -> &Definition {
        &self.definition
    }

    fn kind(&self) -> AssociationKind {
        AssociationKind::OneToMany
    }

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let resolved = self.resolve(registry)?;
        self.keys_for(&resolved, registry)
    }

    fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        let resolved = self.resolve(registry)?;
        Ok(CombineKeys {
            source: resolved.source_key,
            target: resolved.target_key,
        })
    }

    fn call(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved, registry)?;
        let alias = self
            .source_alias
            .resolve(&self.definition, &resolved.source, registry.config());
        Ok(self.target_select(&resolved)?.join(Join::new(
            registry.config().default_join,
            table(&resolved.source, alias),
            keys.source,
            keys.target,
        )))
    }

    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        self.target_select(&resolved)
    }

    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved, registry)?;
        let alias = self
            .source_alias
            .resolve(&self.definition, &resolved.source, registry.config());
        let schema = resolved.source.schema().qualified(alias)?.merge(
            &resolved
                .target
                .schema()
                .qualified(None)?
                .wrap(self.definition.name()),
        );
        Ok(Select::new(table(&resolved.source, alias), schema).join(Join::new(
            JoinKind::Left,
            resolved.target.name().qualified_name(),
            keys.source,
            keys.target,
        )))
    }

    /// Children are target tuples; each gets `child[fk] = parent[pk]`
    fn associate(
        &self,
        registry: &dyn RelationRegistry,
        _executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<Vec<Tuple>> {
        let resolved = self.resolve(registry)?;
        stamp(
            &self.definition,
            resolved.source.name().relation(),
            children,
            parents,
            &resolved.target_key,
            &resolved.source_key,
        )
    }
}
