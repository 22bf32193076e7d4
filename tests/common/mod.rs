//! Shared fixtures for integration tests
//!
//! Relations:
//! - users has_many tasks; tasks belongs_to user
//! - tasks has_many tags through task_tags (and the inverse)
//! - categories has_many children / belongs_to parent (self-referential)
//! - flights belong_to two destinations (`from`, `to`)
//! - users has_one plan through accounts

#![allow(dead_code)]

use lifeguard_schema::association::Association;
use lifeguard_schema::executor::{tuple, Tuple};
use lifeguard_schema::memory::MemoryExecutor;
use lifeguard_schema::registry::Registry;
use lifeguard_schema::schema::{Attribute, Schema};
use lifeguard_schema::types::Type;
use lifeguard_schema::RelationName;
use sea_query::Value;

pub fn int(value: i32) -> Value {
    Value::from(value)
}

pub fn text(value: &str) -> Value {
    Value::from(value)
}

pub fn null() -> Value {
    Value::Int(None)
}

// ============================================================================
// Schemas
// ============================================================================

pub fn users() -> Schema {
    Schema::define("users")
        .primary_key("id", Type::integer())
        .attribute("name", Type::string())
        .association(Association::one_to_many("users", "tasks"))
        .association(Association::one_to_one_through("users", "plans", "accounts").as_name("plan"))
        .finalize()
        .unwrap()
}

pub fn tasks() -> Schema {
    Schema::define("tasks")
        .primary_key("id", Type::integer())
        .foreign_key("user_id", Type::integer(), "users")
        .attribute("title", Type::string())
        .association(Association::many_to_one("tasks", "users").as_name("user"))
        .association(Association::many_to_many("tasks", "tags", "task_tags"))
        .finalize()
        .unwrap()
}

pub fn tags() -> Schema {
    Schema::define("tags")
        .primary_key("id", Type::integer())
        .attribute("name", Type::string())
        .association(Association::many_to_many("tags", "tasks", "task_tags"))
        .finalize()
        .unwrap()
}

/// Join table keyed by (`task_id`, `tag_id`)
pub fn task_tags_composite() -> Schema {
    let name = RelationName::named("task_tags");
    Schema::define("task_tags")
        .attr(
            Attribute::new("task_id", Type::integer(), &name)
                .as_primary_key()
                .references(&RelationName::named("tasks")),
        )
        .attr(
            Attribute::new("tag_id", Type::integer(), &name)
                .as_primary_key()
                .references(&RelationName::named("tags")),
        )
        .association(Association::many_to_one("task_tags", "tasks"))
        .association(Association::many_to_one("task_tags", "tags"))
        .finalize()
        .unwrap()
}

/// Join table with its own `id`
pub fn task_tags_surrogate() -> Schema {
    Schema::define("task_tags")
        .primary_key("id", Type::integer())
        .foreign_key("task_id", Type::integer(), "tasks")
        .foreign_key("tag_id", Type::integer(), "tags")
        .association(Association::many_to_one("task_tags", "tasks"))
        .association(Association::many_to_one("task_tags", "tags"))
        .finalize()
        .unwrap()
}

pub fn categories() -> Schema {
    Schema::define("categories")
        .primary_key("id", Type::integer())
        .foreign_key("parent_id", Type::integer().optional(), "categories")
        .attribute("name", Type::string())
        .association(
            Association::one_to_many("categories", "categories")
                .as_name("children")
                .foreign_key("parent_id"),
        )
        .association(
            Association::many_to_one("categories", "categories")
                .as_name("parent")
                .foreign_key("parent_id"),
        )
        .finalize()
        .unwrap()
}

pub fn destinations() -> Schema {
    Schema::define("destinations")
        .primary_key("id", Type::integer())
        .attribute("name", Type::string())
        .finalize()
        .unwrap()
}

pub fn flights() -> Schema {
    Schema::define("flights")
        .primary_key("id", Type::integer())
        .foreign_key("from_id", Type::integer(), "destinations")
        .foreign_key("to_id", Type::integer(), "destinations")
        .association(
            Association::many_to_one("flights", "destinations")
                .as_name("from")
                .foreign_key("from_id"),
        )
        .association(
            Association::many_to_one("flights", "destinations")
                .as_name("to")
                .foreign_key("to_id"),
        )
        .finalize()
        .unwrap()
}

pub fn accounts() -> Schema {
    Schema::define("accounts")
        .primary_key("id", Type::integer())
        .foreign_key("user_id", Type::integer(), "users")
        .finalize()
        .unwrap()
}

pub fn plans() -> Schema {
    Schema::define("plans")
        .primary_key("id", Type::integer())
        .foreign_key("account_id", Type::integer(), "accounts")
        .attribute("tier", Type::string())
        .finalize()
        .unwrap()
}

// ============================================================================
// Registry and data
// ============================================================================

/// Every fixture relation; `task_tags` keyed by (`task_id`, `tag_id`)
pub fn registry() -> Registry {
    let registry = Registry::new();
    for schema in [
        users(),
        tasks(),
        tags(),
        task_tags_composite(),
        categories(),
        destinations(),
        flights(),
        accounts(),
        plans(),
    ] {
        registry.register(schema);
    }
    registry
}

/// Same as [`registry`] with a surrogate-keyed `task_tags`
pub fn registry_with_surrogate_join() -> Registry {
    let registry = registry();
    registry.register(task_tags_surrogate());
    registry
}

pub fn user_rows() -> Vec<Tuple> {
    vec![
        tuple([("id", int(1)), ("name", text("Jane"))]),
        tuple([("id", int(2)), ("name", text("Joe"))]),
        tuple([("id", int(3)), ("name", text("Jim"))]),
    ]
}

pub fn task_rows() -> Vec<Tuple> {
    vec![
        tuple([("id", int(1)), ("user_id", int(1)), ("title", text("Task 1"))]),
        tuple([("id", int(2)), ("user_id", int(2)), ("title", text("Task 2"))]),
        tuple([("id", int(3)), ("user_id", int(1)), ("title", text("Task 3"))]),
    ]
}

pub fn category_rows() -> Vec<Tuple> {
    vec![
        tuple([("id", int(1)), ("parent_id", null()), ("name", text("root"))]),
        tuple([("id", int(2)), ("parent_id", int(1)), ("name", text("books"))]),
        tuple([("id", int(3)), ("parent_id", int(1)), ("name", text("music"))]),
        tuple([("id", int(4)), ("parent_id", int(2)), ("name", text("fiction"))]),
    ]
}

/// Executor seeded with rows for every fixture relation
///
/// `task_tags` rows carry an `id` column so they serve both join-table
/// layouts.
pub fn executor() -> MemoryExecutor {
    MemoryExecutor::new()
        .with_table("users", user_rows())
        .with_table("tasks", task_rows())
        .with_table(
            "tags",
            vec![
                tuple([("id", int(1)), ("name", text("red"))]),
                tuple([("id", int(2)), ("name", text("blue"))]),
            ],
        )
        .with_table(
            "task_tags",
            vec![
                tuple([("id", int(1)), ("task_id", int(1)), ("tag_id", int(1))]),
                tuple([("id", int(2)), ("task_id", int(1)), ("tag_id", int(2))]),
                tuple([("id", int(3)), ("task_id", int(2)), ("tag_id", int(1))]),
            ],
        )
        .with_table("categories", category_rows())
        .with_table(
            "destinations",
            vec![
                tuple([("id", int(1)), ("name", text("PDX"))]),
                tuple([("id", int(2)), ("name", text("SFO"))]),
            ],
        )
        .with_table(
            "flights",
            vec![
                tuple([("id", int(1)), ("from_id", int(1)), ("to_id", int(2))]),
                tuple([("id", int(2)), ("from_id", int(2)), ("to_id", int(1))]),
            ],
        )
        .with_table(
            "accounts",
            vec![
                tuple([("id", int(1)), ("user_id", int(1))]),
                tuple([("id", int(2)), ("user_id", int(2))]),
            ],
        )
        .with_table(
            "plans",
            vec![tuple([("id", int(1)), ("account_id", int(1)), ("tier", text("gold"))])],
        )
}
