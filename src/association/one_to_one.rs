//! One-to-one associations: one-to-many resolution with a single result.

use super::one_to_many::OneToMany;
use super::{key_attribute, key_value, AssociationKind, CombineKeys, Definition, JoinKeys, Resolve};
use crate::error::Result;
use crate::executor::{Executor, Select, Tuple};
use crate::registry::RelationRegistry;

#[derive(Debug, Clone)]
pub struct OneToOne {
    inner: OneToMany,
}

impl OneToOne {
    pub fn new(definition: Definition) -> Self {
        Self {
            inner: OneToMany::new(definition),
        }
    }

    /// Delete the target rows whose foreign key equals `parent`'s key
    ///
    /// Returns the number of rows removed by the executor.
    pub fn remove_associated(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        parent: &Tuple,
    ) -> Result<u64> {
        let definition = self.definition();
        let resolved = self.inner.resolve(registry)?;
        let value = key_value(
            definition,
            resolved.source.name().relation(),
            parent,
            &resolved.source_key,
        )?;
        let restriction = key_attribute(definition, &resolved.target, &resolved.target_key)?
            .qualified(None)?
            .to_expr()
            .eq(value);
        log::debug!(
            "association {} removing {} rows matching {:?}",
            definition.name(),
            resolved.target.name(),
            restriction
        );
        executor.delete(&resolved.target.name().qualified_name(), &restriction)
    }
}

impl Resolve for OneToOne {
    fn definition(&self) -> &Definition {
        self.inner.definition()
    }

    fn kind(&self) -> AssociationKind {
        AssociationKind::OneToOne
    }

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        self.inner.join_keys(registry)
    }

    fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        self.inner.combine_keys(registry)
    }

    fn call(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        self.inner.call(registry)
    }

    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        self.inner.preload_select(registry)
    }

    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        self.inner.wrap(registry)
    }

    fn associate(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<Vec<Tuple>> {
        self.inner.associate(registry, executor, children, parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::Association;
    use crate::executor::tuple;
    use crate::memory::MemoryExecutor;
    use crate::registry::Registry;
    use crate::schema::Schema;
    use crate::types::Type;
    use sea_query::Value;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            Schema::define("users")
                .primary_key("id", Type::integer())
                .finalize()
                .unwrap(),
        );
        registry.register(
            Schema::define("profiles")
                .primary_key("id", Type::integer())
                .foreign_key("user_id", Type::integer(), "users")
                .finalize()
                .unwrap(),
        );
        registry
    }

    fn profile() -> OneToOne {
        match Association::one_to_one("users", "profiles").build() {
            crate::association::Association::OneToOne(assoc) => assoc,
            other => panic!("unexpected association {other:?}"),
        }
    }

    #[test]
    fn test_resolves_like_one_to_many() {
        let registry = registry();
        let keys = profile().join_keys(&registry).unwrap();
        assert_eq!(keys.source.identifier(), "users.id");
        assert_eq!(keys.target.identifier(), "profiles.user_id");
        assert_eq!(profile().kind(), AssociationKind::OneToOne);
    }

    #[test]
    fn test_remove_associated_deletes_matching_rows() {
        let registry = registry();
        let executor = MemoryExecutor::new().with_table(
            "profiles",
            vec![
                tuple([("id", Value::from(1i32)), ("user_id", Value::from(7i32))]),
                tuple([("id", Value::from(2i32)), ("user_id", Value::from(8i32))]),
            ],
        );
        let parent = tuple([("id", Value::from(7i32))]);
        let removed = profile()
            .remove_associated(&registry, &executor, &parent)
            .unwrap();
        assert_eq!(removed, 1);
        let remaining = executor.rows("profiles");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["user_id"], Value::from(8i32));
    }
}
