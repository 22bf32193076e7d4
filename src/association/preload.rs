//! Batched eager loading.
//!
//! Loading an association for N already-materialized parent tuples takes a
//! single query, never one per parent:
//!
//! 1. pluck the distinct values of the parent-side combine key, in the order
//!    they are first seen (NULLs are skipped)
//! 2. restrict the association's preload read to rows whose child-side
//!    combine key is a member of that set
//! 3. run it with one [`Executor::fetch`]
//!
//! [`combine`] then groups the fetched rows under their parents in memory, and
//! [`eager_load`] does both.
//!
//! # Example
//!
//! ```
//! use lifeguard_schema::association::{preload, Association};
//! use lifeguard_schema::executor::tuple;
//! use lifeguard_schema::memory::MemoryExecutor;
//! use lifeguard_schema::registry::{Registry, RelationRegistry};
//! use lifeguard_schema::schema::Schema;
//! use lifeguard_schema::types::Type;
//! use sea_query::Value;
//!
//! let registry = Registry::new();
//! registry.register(
//!     Schema::define("users")
//!         .primary_key("id", Type::integer())
//!         .association(Association::one_to_many("users", "tasks"))
//!         .finalize()
//!         .unwrap(),
//! );
//! registry.register(
//!     Schema::define("tasks")
//!         .primary_key("id", Type::integer())
//!         .foreign_key("user_id", Type::integer(), "users")
//!         .finalize()
//!         .unwrap(),
//! );
//! let executor = MemoryExecutor::new().with_table(
//!     "tasks",
//!     vec![tuple([("id", Value::from(10i32)), ("user_id", Value::from(1i32))])],
//! );
//!
//! let users = registry.relation("users").unwrap();
//! let tasks = users.associations().get("tasks").unwrap();
//! let parents = vec![tuple([("id", Value::from(1i32))]), tuple([("id", Value::from(2i32))])];
//! let rows = preload(tasks, &registry, &executor, &parents).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(executor.fetch_count(), 1);
//! ```

use super::{Association, Cardinality};
use crate::error::Result;
use crate::executor::{Executor, Tuple};
use crate::registry::RelationRegistry;
use crate::types::is_null;
use sea_query::Value;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// A parent tuple with the children matched to it
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub parent: Tuple,
    pub children: Vec<Tuple>,
}

/// Grouping key of a value; integers of any width compare equal
fn group_key(value: &Value) -> String {
    match value {
        Value::TinyInt(Some(i)) => format!("int:{i}"),
        Value::SmallInt(Some(i)) => format!("int:{i}"),
        Value::Int(Some(i)) => format!("int:{i}"),
        Value::BigInt(Some(i)) => format!("int:{i}"),
        Value::TinyUnsigned(Some(i)) => format!("int:{i}"),
        Value::SmallUnsigned(Some(i)) => format!("int:{i}"),
        Value::Unsigned(Some(i)) => format!("int:{i}"),
        Value::BigUnsigned(Some(i)) => format!("int:{i}"),
        other => format!("{other:?}"),
    }
}

/// Distinct non-NULL values of `key` across `parents`, in first-seen order
fn distinct_keys(
    association: &Association,
    parents: &[Tuple],
    key: &str,
) -> Result<Vec<Value>> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for parent in parents {
        let value = parent.get(key).ok_or_else(|| {
            association
                .definition()
                .missing_keys(association.definition().source.relation(), format!("tuple lacks {key}"))
        })?;
        if is_null(value) {
            continue;
        }
        if seen.insert(group_key(value)) {
            values.push(value.clone());
        }
    }
    Ok(values)
}

/// Fetch the children of `parents` with a single query
///
/// Returns the target rows, each carrying the child-side combine key. An
/// empty (or all-NULL) parent key set returns no rows and issues no query.
pub fn preload(
    association: &Association,
    registry: &dyn RelationRegistry,
    executor: &dyn Executor,
    parents: &[Tuple],
) -> Result<Vec<Tuple>> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::preload_span(association.name(), parents.len()).entered();

    let keys = association.combine_keys(registry)?;
    let values = distinct_keys(association, parents, &keys.source)?;
    if values.is_empty() {
        log::debug!(
            "preload of {} skipped: no parent keys",
            association.name()
        );
        return Ok(Vec::new());
    }

    log::debug!(
        "preloading {} for {} distinct key(s) of {} parent(s)",
        association.name(),
        values.len(),
        parents.len()
    );
    let select = association.preload_select(registry)?;
    let child_key = select
        .schema
        .get(&keys.target)
        .ok_or_else(|| {
            association.definition().missing_keys(
                association.definition().target_relation(),
                format!("preload read lacks {}", keys.target),
            )
        })?
        .qualified(None)?;
    let select = select.restrict(child_key.to_expr().is_in(values));
    executor.fetch(&select)
}

/// Group `children` under `parents` by the association's combine keys
///
/// Parents keep their order; children keep the order they were fetched in.
/// Associations with a single result keep at most one child per parent.
pub fn combine(
    association: &Association,
    registry: &dyn RelationRegistry,
    parents: &[Tuple],
    children: Vec<Tuple>,
) -> Result<Vec<Loaded>> {
    let keys = association.combine_keys(registry)?;
    let mut groups: HashMap<String, Vec<Tuple>> = HashMap::new();
    for child in children {
        let value = child.get(&keys.target).ok_or_else(|| {
            association.definition().missing_keys(
                association.definition().target_relation(),
                format!("tuple lacks {}", keys.target),
            )
        })?;
        if is_null(value) {
            continue;
        }
        groups.entry(group_key(value)).or_default().push(child);
    }

    parents
        .iter()
        .map(|parent| {
            let value = parent.get(&keys.source).ok_or_else(|| {
                association.definition().missing_keys(
                    association.definition().source.relation(),
                    format!("tuple lacks {}", keys.source),
                )
            })?;
            let mut children = if is_null(value) {
                Vec::new()
            } else {
                groups.get(&group_key(value)).cloned().unwrap_or_default()
            };
            if association.result() == Cardinality::One {
                children.truncate(1);
            }
            Ok(Loaded {
                parent: parent.clone(),
                children,
            })
        })
        .collect()
}

/// [`preload`] followed by [`combine`]
pub fn eager_load(
    association: &Association,
    registry: &dyn RelationRegistry,
    executor: &dyn Executor,
    parents: &[Tuple],
) -> Result<Vec<Loaded>> {
    let children = preload(association, registry, executor, parents)?;
    combine(association, registry, parents, children)
}
