//! # Lifeguard Schema
//!
//! Relational schema algebra and association resolution for the Lifeguard ORM.
//!
//! Relations are declared as [`Schema`]s and registered by name in a
//! [`Registry`]. [`Association`]s between them resolve lazily against that
//! registry into join keys, combine keys and [`Select`] descriptors, which a
//! query [`Executor`] lowers to SQL through sea-query. Eager loading of an
//! association for many parents is batched into a single query by
//! [`preload`](association::preload).
//!
//! See [README on GitHub](https://github.com/microscaler/lifeguard) for the wider ORM.

pub mod association;
pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod inflector;
pub mod memory;
pub mod name;
pub mod registry;
pub mod schema;
pub mod types;

#[cfg(feature = "tracing")]
mod tracing_helpers;

pub use association::{
    combine, eager_load, preload, Association, AssociationDef, AssociationKind, AssociationSet,
    Cardinality, CombineKeys, JoinKeys, Loaded,
};
pub use config::ResolverConfig;
pub use error::{Result, SchemaError};
pub use executor::{Executor, Join, JoinKind, Select, Tuple};
pub use expr::Expr;
pub use memory::MemoryExecutor;
pub use name::{QualifiedName, RelationName};
pub use registry::{Registry, Relation, RelationRegistry, View};
pub use schema::{Attribute, Schema, SchemaBuilder};
pub use types::Type;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_types_are_send_sync() {
        assert_send_sync::<Registry>();
        assert_send_sync::<Relation>();
        assert_send_sync::<View>();
        assert_send_sync::<Schema>();
        assert_send_sync::<Attribute>();
        assert_send_sync::<Association>();
        assert_send_sync::<AssociationSet>();
        assert_send_sync::<Expr>();
        assert_send_sync::<Select>();
        assert_send_sync::<Tuple>();
        assert_send_sync::<MemoryExecutor>();
        assert_send_sync::<SchemaError>();
    }

    #[test]
    fn test_registry_with_restricted_view_resolves_across_threads() {
        let registry = Arc::new(Registry::new());
        registry.register(
            Schema::define("users")
                .primary_key("id", Type::integer())
                .association(Association::one_to_many("users", "tasks").view("open"))
                .finalize()
                .unwrap(),
        );
        registry.register_relation(
            Relation::new(
                Schema::define("tasks")
                    .primary_key("id", Type::integer())
                    .foreign_key("user_id", Type::integer(), "users")
                    .attribute("done", Type::new(types::Primitive::Boolean))
                    .finalize()
                    .unwrap(),
            )
            .with_view(
                "open",
                View::new(&["id", "user_id"]).restrict(Expr::qualified("tasks", "done").eq(false)),
            ),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let users = registry.relation("users").unwrap();
                    let tasks = users.associations().get("tasks").unwrap();
                    tasks.call(registry.as_ref()).unwrap().to_sql()
                })
            })
            .collect();
        let sql: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sql.iter().all(|s| s == &sql[0]));
        assert!(sql[0].contains(r#""tasks"."done" = FALSE"#), "{}", sql[0]);
    }
}
