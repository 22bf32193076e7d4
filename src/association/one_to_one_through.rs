//! One-to-one associations through an intermediate relation.
//!
//! Chain `source -> through -> target`, where the through relation holds a
//! foreign key to the source (`right_fk`) and the target holds a foreign key
//! to the through relation (`target_fk`). Nothing is persisted in the through
//! relation, so the write path is unsupported.

use super::{
    apply_view, foreign_key_name, key_attribute, table, AssociationKind, CombineKeys, Definition,
    JoinKeys, Resolve,
};
use crate::error::Result;
use crate::executor::{Executor, Join, JoinKind, Select, Tuple};
use crate::registry::{Relation, RelationRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OneToOneThrough {
    definition: Definition,
}

struct Resolved {
    source: Arc<Relation>,
    target: Arc<Relation>,
    through: Arc<Relation>,
    source_pk: String,
    through_pk: String,
    /// Foreign key in the through relation pointing at the source
    right_fk: String,
    /// Foreign key in the target pointing at the through relation
    target_fk: String,
}

impl OneToOneThrough {
    pub fn new(definition: Definition) -> Self {
        Self { definition }
    }

    /// Always `UnsupportedOperation`: there is no join table to write
    pub fn persist(
        &self,
        _registry: &dyn RelationRegistry,
        _executor: &dyn Executor,
        _children: &[Tuple],
        _parents: &[Tuple],
    ) -> Result<u64> {
        Err(self.definition.unsupported("persist"))
    }

    fn resolve(&self, registry: &dyn RelationRegistry) -> Result<Resolved> {
        let through = registry.relation(self.definition.through_relation()?.relation())?;
        let source = registry.relation(self.definition.source.relation())?;
        let target = registry.relation(self.definition.target_relation())?;
        let source_pk = source.primary_key_name()?.to_string();
        let through_pk = through.primary_key_name()?.to_string();
        let right_fk =
            foreign_key_name(&self.definition, &through, source.name(), registry.config())?;
        let target_fk = target
            .foreign_key(through.name(), registry.config())
            .ok_or_else(|| {
                self.definition.missing_keys(
                    target.name().relation(),
                    format!("no foreign key to {}", through.name()),
                )
            })?;
        Ok(Resolved {
            source,
            target,
            through,
            source_pk,
            through_pk,
            right_fk,
            target_fk,
        })
    }

    fn keys_for(&self, resolved: &Resolved) -> Result<JoinKeys> {
        Ok(JoinKeys {
            source: key_attribute(&self.definition, &resolved.source, &resolved.source_pk)?
                .qualified(None)?,
            target: key_attribute(&self.definition, &resolved.through, &resolved.right_fk)?
                .qualified(None)?,
        })
    }

    /// `through.pk = target.target_fk`
    fn through_join(&self, resolved: &Resolved, kind: JoinKind) -> Result<Join> {
        Ok(Join::new(
            kind,
            resolved.through.name().qualified_name(),
            key_attribute(&self.definition, &resolved.through, &resolved.through_pk)?
                .qualified(None)?,
            key_attribute(&self.definition, &resolved.target, &resolved.target_fk)?
                .qualified(None)?,
        ))
    }

    fn target_select(&self, resolved: &Resolved, registry: &dyn RelationRegistry) -> Result<Select> {
        let schema = resolved.target.schema().qualified(None)?.merge(
            &resolved
                .through
                .schema()
                .project(&[resolved.right_fk.as_str()])?
                .qualified(None)?,
        );
        let select = Select::new(resolved.target.name().qualified_name(), schema)
            .join(self.through_join(resolved, registry.config().default_join)?);
        apply_view(&self.definition, &resolved.target, select)
    }
}

impl Resolve for OneToOneThrough {
    fn definition(&self) -> &Definition {
        &self.definition
    }

    fn kind(&self) -> AssociationKind {
        AssociationKind::OneToOneThrough
    }

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        let resolved = self.resolve(registry)?;
        self.keys_for(&resolved)
    }

    fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        let resolved = self.resolve(registry)?;
        Ok(CombineKeys {
            source: resolved.source_pk,
            target: resolved.right_fk,
        })
    }

    fn call(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved)?;
        Ok(self.target_select(&resolved, registry)?.join(Join::new(
            registry.config().default_join,
            table(&resolved.source, None),
            keys.source,
            keys.target,
        )))
    }

    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        self.target_select(&resolved, registry)
    }

    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        let resolved = self.resolve(registry)?;
        let keys = self.keys_for(&resolved)?;
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
            key_attribute(&self.definition, &resolved.target, &resolved.target_fk)?
                .qualified(None)?,
            key_attribute(&self.definition, &resolved.through, &resolved.through_pk)?
                .qualified(None)?,
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

    fn associate(
        &self,
        _registry: &dyn RelationRegistry,
        _executor: &dyn Executor,
        _children: &[Tuple],
        _parents: &[Tuple],
    ) -> Result<Vec<Tuple>> {
        Err(self.definition.unsupported("associate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::Association;
    use crate::error::SchemaError;
    use crate::memory::MemoryExecutor;
    use crate::registry::Registry;
    use crate::schema::Schema;
    use crate::types::Type;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            Schema::define("users")
                .primary_key("id", Type::integer())
                .finalize()
                .unwrap(),
        );
        registry.register(
            Schema::define("accounts")
                .primary_key("id", Type::integer())
                .foreign_key("user_id", Type::integer(), "users")
                .finalize()
                .unwrap(),
        );
        registry.register(
            Schema::define("plans")
                .primary_key("id", Type::integer())
                .foreign_key("account_id", Type::integer(), "accounts")
                .attribute("tier", Type::string())
                .finalize()
                .unwrap(),
        );
        registry
    }

    fn plan() -> OneToOneThrough {
        OneToOneThrough::new(
            Association::one_to_one_through("users", "plans", "accounts")
                .as_name("plan")
                .definition()
                .clone(),
        )
    }

    #[test]
    fn test_keys() {
        let registry = registry();
        let keys = plan().join_keys(&registry).unwrap();
        assert_eq!(keys.source.identifier(), "users.id");
        assert_eq!(keys.target.identifier(), "accounts.user_id");
        let combine = plan().combine_keys(&registry).unwrap();
        assert_eq!((combine.source.as_str(), combine.target.as_str()), ("id", "user_id"));
    }

    #[test]
    fn test_call_chains_three_relations() {
        let registry = registry();
        let select = plan().call(&registry).unwrap();
        assert_eq!(select.from.identifier(), "plans");
        assert_eq!(
            select.schema.identifiers(),
            vec!["plans.id", "plans.account_id", "plans.tier", "accounts.user_id"]
        );
        let sql = select.to_sql();
        assert!(sql.contains(r#""accounts"."id" = "plans"."account_id""#), "{sql}");
        assert!(sql.contains(r#""users"."id" = "accounts"."user_id""#), "{sql}");
    }

    #[test]
    fn test_write_path_is_unsupported() {
        let registry = registry();
        let executor = MemoryExecutor::new();
        assert!(matches!(
            plan().associate(&registry, &executor, &[], &[]),
            Err(SchemaError::UnsupportedOperation { ref operation, .. }) if operation == "associate"
        ));
        assert!(plan().persist(&registry, &executor, &[], &[]).is_err());
    }
}
