//! Many-to-many associations through a join relation.
//!
//! Resolution takes two hops. The join relation must itself declare an
//! association to the target (usually many-to-one); `call` runs that
//! association first and then joins the source back on
//!
//! ```text
//! join_keys = { source[pk].qualified => through[fk].qualified }
//! ```
//!
//! where `fk` is the join relation's foreign key to the source. The output
//! schema is the target's columns plus that foreign key, so preloaded rows
//! can be matched to their parents with `combine_keys = { pk => fk }`.
//!
//! The shape of the intermediate schema depends on the join relation's
//! primary key. With a composite key (`task_id`, `tag_id`) the inner
//! association already surfaces the foreign key and it is projected out of
//! the joined schema; with a surrogate key it is not, and the foreign key is
//! merged from the join relation explicitly. Both paths yield the same
//! columns.

use super::{
    apply_view, foreign_key_name, key_attribute, key_value, stamp, table, AssociationKind,
    CombineKeys, Definition, JoinKeys, Resolve,
};
use crate::error::Result;
use crate::executor::{Executor, Join, JoinKind, Select, Tuple};
use crate::registry::{Relation, RelationRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ManyToMany {
    definition: Definition,
}

struct Resolved {
    source: Arc<Relation>,
    target: Arc<Relation>,
    through: Arc<Relation>,
    /// Primary key of the source
    source_key: String,
    /// Foreign key in the join relation pointing at the source
    target_key: String,
}

impl ManyToMany {
    pub fn new(definition: Definition) -> Self {
        Self { definition }
    }

    fn resolve(&self, registry: &dyn RelationRegistry) -> Result<Resolved> {
        let through = registry.relation(self.definition.through_relation()?.relation())?;
        let source = registry.relation(self.definition.source.relation())?;
        let target = registry.relation(self.definition.target_relation())?;
        let source_key = source.primary_key_name()?.to_string();
        let target_key =
            foreign_key_name(&self.definition, &through, source.name(), registry.config())?;
        Ok(Resolved {
            source,
            target,
            through,
            source_key,
            target_key,
        })
    }

    fn keys_for(&self, resolved: &Resolved) -> Result<JoinKeys> {
        Ok(JoinKeys {
            source: key_attribute(&self.definition, &resolved.source, &resolved.source_key)?
                .qualified(None)?,
            target: key_attribute(&self.definition, &resolved.through, &resolved.target_key)?
                .qualified(None)?,
        })
    }

    /// Target read through the join relation, without the source
    fn through_select(&self, resolved: &Resolved, registry: &dyn RelationRegistry) -> Result<Select> {
        let inner = resolved
            .through
            .associations()
            .get(resolved.target.name().relation())?
            .call(registry)?;
        let fk = resolved.target_key.as_str();
        let schema = if inner.schema.contains(fk) {
            let mut names = resolved.target.schema().keys();
            names.push(fk);
            inner.schema.uniq().project(&names)?
        } else {
            log::debug!(
                "association {}: merging {}.{} into the target schema",
                self.definition.name(),
                resolved.through.name(),
                fk
            );
            resolved
                .target
                .schema()
                .merge(&resolved.through.schema().project(&[fk])?)
        };
        let select = inner.with_schema(schema.qualified(None)?);
        apply_view(&self.definition, &resolved.target, select)
    }

    /// Insert one join row per (child, parent) pair
    ///
    /// Children are source tuples, parents are target tuples. Returns the
    /// number of join rows written.
    pub fn persist(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<u64> {
        let resolved = self.resolve(registry)?;
        let target_pk = resolved.target.primary_key_name()?;
        let through_fk = resolved
            .through
            .foreign_key(resolved.target.name(), registry.config())
            .ok_or_else(|| {
                self.definition.missing_keys(
                    resolved.through.name().relation(),
                    format!("no foreign key to {}", resolved.target.name()),
                )
            })?;

        let mut rows = Vec::with_capacity(children.len() * parents.len());
        for child in children {
            let source_value = key_value(
                &self.definition,
                resolved.source.name().relation(),
                child,
                &resolved.source_key,
            )?;
            for parent in parents {
                let target_value = key_value(
                    &self.definition,
                    resolved.target.name().relation(),
                    parent,
                    target_pk,
                )?;
                let mut row = Tuple::new();
                row.insert(resolved.target_key.clone(), source_value.clone());
                row.insert(through_fk.clone(), target_value);
                rows.push(row);
            }
        }
        if rows.is_empty() {
            return Ok(0);
        }
        log::debug!(
            "association {} persisting {} join row(s) into {}",
            self.definition.name(),
            rows.len(),
            resolved.through.name()
        );
        executor.insert(&resolved.through.name().qualified_name(), &rows)
    }

    /// Combine keys of the inverse association (`target` to `source`)
    pub fn parent_combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        let target = registry.relation(self.definition.target_relation())?;
        target
            .associations()
            .get(self.definition.source.relation())?
            .combine_keys(registry)
    }
}

impl Resolve for ManyToMany {
    fn definition(&self) -> &Definition {
        &self.definition
    }

    fn kind(&self) -> AssociationKind {
        AssociationKind::ManyToMany
    }

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let resolved = self.resolve(registry)?;
        self.keys_for(&resolved)
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
        let keys = self.keys_for(&resolved)?;
        Ok(self.through_select(&resolved, registry)?.join(Join::new(
            registry.config().default_join,
            table(&resolved.source, None),
            keys.source,
            keys.target,
        )))
    }

    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        self.through_select(&resolved, registry)
    }

    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved)?;
        let target_pk = resolved.target.primary_key_name()?;
        let through_fk = resolved
            .through
            .foreign_key(resolved.target.name(), registry.config())
            .ok_or_else(|| {
                self.definition.missing_keys(
                    resolved.through.name().relation(),
                    format!("no foreign key to {}", resolved.target.name()),
                )
            })?;
        let schema = resolved.source.schema().qualified(None)?.merge(
            &resolved
                .target
                .schema()
                .qualified(None)?
                .wrap(self.definition.name()),
        );
        let target_join = Join::new(
            JoinKind::Left,
            resolved.target.name().qualified_name(),
            key_attribute(&self.definition, &resolved.through, &through_fk)?.qualified(None)?,
            key_attribute(&self.definition, &resolved.target, target_pk)?.qualified(None)?,
        );
        Ok(Select::new(table(&resolved.source, None), schema)
            .join(Join::new(
                JoinKind::Left,
                resolved.through.name().qualified_name(),
                keys.source,
                keys.target,
            ))
            .join(target_join))
    }

    /// Persist join rows, then stamp each child with the inverse combine key
    fn associate(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<Vec<Tuple>> {
        self.persist(registry, executor, children, parents)?;
        let keys = self.parent_combine_keys(registry)?;
        stamp(
            &self.definition,
            self.definition.target_relation(),
            children,
            parents,
            &keys.target,
            &keys.source,
        )
    }
}
