//! Many-to-one associations.
//!
//! The mirror of [`OneToMany`](super::OneToMany): the source holds the
//! foreign key, the target side is the target's primary key.
//!
//! ```text
//! join_keys    = { source[fk].qualified(source_alias) => target[pk].qualified }
//! combine_keys = { fk => pk }
//! ```

use super::{
    apply_view, foreign_key_name, key_attribute, stamp, table, AssociationKind, CombineKeys,
    Definition, JoinKeys, Resolve, SourceAlias,
};
use crate::error::Result;
use crate::executor::{Executor, Join, JoinKind, Select, Tuple};
use crate::registry::{Relation, RelationRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ManyToOne {
    definition: Definition,
    source_alias: SourceAlias,
}

struct Resolved {
    source: Arc<Relation>,
    target: Arc<Relation>,
    /// Foreign key in the source
    foreign_key: String,
    /// Primary key of the target
    primary_key: String,
}

impl ManyToOne {
    pub fn new(definition: Definition) -> Self {
        Self {
            definition,
            source_alias: SourceAlias::default(),
        }
    }

    fn resolve(&self, registry: &dyn RelationRegistry) -> Result<Resolved> {
        let source = registry.relation(self.definition.source.relation())?;
        let target = registry.relation(self.definition.target_relation())?;
        let primary_key = target.primary_key_name()?.to_string();
        let foreign_key =
            foreign_key_name(&self.definition, &source, target.name(), registry.config())?;
        Ok(Resolved {
            source,
            target,
            foreign_key,
            primary_key,
        })
    }

    fn alias<'a>(&'a self, resolved: &Resolved, registry: &dyn RelationRegistry) -> Option<&'a str> {
        self.source_alias
            .resolve(&self.definition, &resolved.source, registry.config())
    }

    fn keys_for(&self, resolved: &Resolved, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let alias = self.alias(resolved, registry);
        Ok(JoinKeys {
            source: key_attribute(&self.definition, &resolved.source, &resolved.foreign_key)?
                .qualified(alias)?,
            target: key_attribute(&self.definition, &resolved.target, &resolved.primary_key)?
                .qualified(None)?,
        })
    }
}

impl Resolve for ManyToOne {
    fn definition(&self) -> &Definition {
        &self.definition
    }

    fn kind(&self) -> AssociationKind {
        AssociationKind::ManyToOne
    }

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let resolved = self.resolve(registry)?;
        self.keys_for(&resolved, registry)
    }

    fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        let resolved = self.resolve(registry)?;
        Ok(CombineKeys {
            source: resolved.foreign_key,
            target: resolved.primary_key,
        })
    }

    /// Target schema joined to the source
    ///
    /// Unless the target already has the column it would use to reference the
    /// source, the source's primary key is surfaced under that column's name
    /// as a foreign key, so every target row names the source row it was
    /// reached from.
    fn call(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved, registry)?;
        let alias = self.alias(&resolved, registry);
        let target_schema = resolved.target.schema();
        let right_fk = resolved
            .target
            .foreign_key(resolved.source.name(), registry.config());
        let schema = match right_fk {
            Some(right_fk) if !target_schema.contains(&right_fk) => {
                let source_pk = resolved
                    .source
                    .schema()
                    .qualified(alias)?
                    .project_pk()
                    .project_fk(&[(resolved.primary_key.as_str(), right_fk.as_str())]);
                target_schema.qualified(None)?.merge(&source_pk)
            }
            _ => target_schema.qualified(None)?,
        };
        let select = Select::new(resolved.target.name().qualified_name(), schema);
        Ok(apply_view(&self.definition, &resolved.target, select)?.join(Join::new(
            registry.config().default_join,
            table(&resolved.source, alias),
            keys.source,
            keys.target,
        )))
    }

    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let select = Select::new(
            resolved.target.name().qualified_name(),
            resolved.target.schema().qualified(None)?,
        );
        apply_view(&self.definition, &resolved.target, select)
    }

    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved, registry)?;
        let alias = self.alias(&resolved, registry);
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

    /// Children are source tuples; each gets `child[fk] = parent[pk]`
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
            resolved.target.name().relation(),
            children,
            parents,
            &resolved.foreign_key,
            &resolved.primary_key,
        )
    }
}
