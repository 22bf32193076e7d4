//! Batched eager loading
//!
//! Every preload must issue exactly one fetch regardless of the number of
//! parents (or none at all when there is nothing to load), and `combine`
//! must hand each parent exactly its own children.

mod common;

use common::{executor, int, null, registry, registry_with_surrogate_join, text, user_rows};
use lifeguard_schema::association::{combine, eager_load, preload, Association, Loaded};
use lifeguard_schema::executor::{tuple, Tuple};
use lifeguard_schema::memory::MemoryExecutor;
use lifeguard_schema::registry::{Registry, RelationRegistry};
use lifeguard_schema::schema::Schema;
use lifeguard_schema::types::Type;
use lifeguard_schema::SchemaError;
use sea_query::Value;

fn association(registry: &Registry, relation: &str, name: &str) -> Association {
    registry
        .relation(relation)
        .unwrap()
        .associations()
        .get(name)
        .unwrap()
        .clone()
}

fn ids(tuples: &[Tuple]) -> Vec<Value> {
    tuples.iter().map(|t| t["id"].clone()).collect()
}

fn child_ids(loaded: &[Loaded]) -> Vec<Vec<Value>> {
    loaded.iter().map(|l| ids(&l.children)).collect()
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_preload_issues_one_fetch_for_distinct_keys() {
    let registry = registry();
    let executor = executor();
    let tasks = association(&registry, "users", "tasks");
    let users = user_rows();
    let parents = vec![users[0].clone(), users[1].clone(), users[0].clone()];

    let rows = preload(&tasks, &registry, &executor, &parents).unwrap();

    assert_eq!(executor.fetch_count(), 1);
    assert_eq!(ids(&rows), vec![int(1), int(2), int(3)]);
    let sql = executor.captured_sql();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].contains(r#""tasks"."user_id" IN (1, 2)"#), "{}", sql[0]);
}

#[test]
fn test_preload_without_parents_skips_query() {
    let registry = registry();
    let executor = executor();
    let tasks = association(&registry, "users", "tasks");

    assert!(preload(&tasks, &registry, &executor, &[]).unwrap().is_empty());
    assert_eq!(executor.fetch_count(), 0);
    assert!(executor.captured_sql().is_empty());
}

#[test]
fn test_preload_skips_null_parent_keys() {
    let registry = registry();
    let executor = executor();
    let parent = association(&registry, "categories", "parent");
    let root = tuple([("id", int(1)), ("parent_id", null()), ("name", text("root"))]);

    let loaded = eager_load(&parent, &registry, &executor, &[root]).unwrap();

    assert_eq!(executor.fetch_count(), 0);
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].children.is_empty());
}

#[test]
fn test_parent_without_key_is_rejected() {
    let registry = registry();
    let executor = executor();
    let tasks = association(&registry, "users", "tasks");
    let nameless = tuple([("name", text("Jane"))]);

    assert!(matches!(
        preload(&tasks, &registry, &executor, &[nameless]),
        Err(SchemaError::MissingJoinKeys { ref association, .. }) if association == "tasks"
    ));
    assert_eq!(executor.fetch_count(), 0);
}

// ============================================================================
// Combining
// ============================================================================

#[test]
fn test_one_to_many_groups_children_under_parents() {
    let registry = registry();
    let executor = executor();
    let tasks = association(&registry, "users", "tasks");

    let loaded = eager_load(&tasks, &registry, &executor, &user_rows()).unwrap();

    assert_eq!(executor.fetch_count(), 1);
    let parents: Vec<_> = loaded.iter().map(|l| l.parent["id"].clone()).collect();
    assert_eq!(parents, vec![int(1), int(2), int(3)]);
    assert_eq!(
        child_ids(&loaded),
        vec![vec![int(1), int(3)], vec![int(2)], vec![]]
    );
}

#[test]
fn test_many_to_one_attaches_single_parent() {
    let registry = registry();
    let executor = executor();
    let user = association(&registry, "tasks", "user");

    let loaded = eager_load(&user, &registry, &executor, &common::task_rows()).unwrap();

    assert_eq!(executor.fetch_count(), 1);
    assert!(executor.captured_sql()[0].contains(r#""users"."id" IN (1, 2)"#));
    assert_eq!(child_ids(&loaded), vec![vec![int(1)], vec![int(2)], vec![int(1)]]);
    assert_eq!(loaded[1].children[0]["name"], text("Joe"));
}

#[test]
fn test_combine_accepts_rows_from_elsewhere() {
    let registry = registry();
    let tasks = association(&registry, "users", "tasks");
    let children = vec![
        tuple([("id", int(7)), ("user_id", int(3)), ("title", text("Task 7"))]),
        tuple([("id", int(8)), ("user_id", null()), ("title", text("Orphan"))]),
    ];

    let loaded = combine(&tasks, &registry, &user_rows(), children).unwrap();
    assert_eq!(child_ids(&loaded), vec![vec![], vec![], vec![int(7)]]);
}

#[test]
fn test_self_referential_children() {
    let registry = registry();
    let executor = executor();
    let children = association(&registry, "categories", "children");
    let categories = common::category_rows();

    let loaded = eager_load(&children, &registry, &executor, &categories[..2]).unwrap();

    assert_eq!(executor.fetch_count(), 1);
    assert_eq!(child_ids(&loaded), vec![vec![int(2), int(3)], vec![int(4)]]);
}

#[test]
fn test_many_to_many_through_join_table() {
    for registry in [registry(), registry_with_surrogate_join()] {
        let executor = executor();
        let tags = association(&registry, "tasks", "tags");

        let loaded = eager_load(&tags, &registry, &executor, &common::task_rows()).unwrap();

        assert_eq!(executor.fetch_count(), 1);
        let names: Vec<Vec<Value>> = loaded
            .iter()
            .map(|l| l.children.iter().map(|c| c["name"].clone()).collect())
            .collect();
        assert_eq!(
            names,
            vec![vec![text("red"), text("blue")], vec![text("red")], vec![]]
        );
        assert_eq!(loaded[0].children[0]["task_id"], int(1));
    }
}

#[test]
fn test_one_to_one_through_keeps_single_child() {
    let registry = registry();
    let executor = executor();
    let plan = association(&registry, "users", "plan");

    let loaded = eager_load(&plan, &registry, &executor, &user_rows()).unwrap();

    assert_eq!(executor.fetch_count(), 1);
    assert_eq!(child_ids(&loaded), vec![vec![int(1)], vec![], vec![]]);
}

#[test]
fn test_explicit_combine_keys_override_resolution() {
    let registry = Registry::new();
    registry.register(
        Schema::define("users")
            .primary_key("id", Type::integer())
            .attribute("name", Type::string())
            .finalize()
            .unwrap(),
    );
    registry.register(
        Schema::define("tasks")
            .primary_key("id", Type::integer())
            .foreign_key("user_id", Type::integer(), "users")
            .attribute("owner_name", Type::string())
            .finalize()
            .unwrap(),
    );
    let executor = MemoryExecutor::new().with_table(
        "tasks",
        vec![
            tuple([("id", int(10)), ("user_id", int(1)), ("owner_name", text("Jane"))]),
            tuple([("id", int(11)), ("user_id", int(2)), ("owner_name", text("Joe"))]),
        ],
    );
    let tasks = Association::one_to_many("users", "tasks")
        .combine_keys("name", "owner_name")
        .build();

    let keys = tasks.combine_keys(&registry).unwrap();
    assert_eq!((keys.source.as_str(), keys.target.as_str()), ("name", "owner_name"));

    // Parent id 2 would match task 11 on user_id; the override matches by name
    let jane = tuple([("id", int(2)), ("name", text("Jane"))]);
    let loaded = eager_load(&tasks, &registry, &executor, &[jane]).unwrap();

    assert_eq!(child_ids(&loaded), vec![vec![int(10)]]);
    let sql = executor.captured_sql();
    assert!(sql[0].contains(r#""tasks"."owner_name" IN ('Jane')"#), "{}", sql[0]);
}

#[test]
fn test_self_referential_preload_restricts_child_key() {
    let registry = registry();
    let executor = executor();
    let children = association(&registry, "categories", "children");
    let categories = common::category_rows();

    preload(&children, &registry, &executor, &categories[1..2]).unwrap();

    let sql = executor.captured_sql();
    assert!(sql[0].contains(r#""categories"."parent_id" IN (2)"#), "{}", sql[0]);
}

// ============================================================================
// Write path
// ============================================================================

#[test]
fn test_one_to_many_associate_stamps_foreign_key() {
    let registry = registry();
    let executor = executor();
    let tasks = association(&registry, "users", "tasks");
    let draft = tuple([("id", int(9)), ("title", text("Draft"))]);

    let stamped = tasks
        .associate(&registry, &executor, &[draft], &user_rows()[1..2])
        .unwrap();

    assert_eq!(stamped.len(), 1);
    assert_eq!(stamped[0]["user_id"], int(2));
    // Only many-to-many writes through the executor
    assert!(executor.captured_sql().is_empty());
}

#[test]
fn test_one_to_one_remove_associated() {
    let registry = registry();
    let executor = executor();
    let account = Association::one_to_one("users", "accounts").as_name("account").build();
    let Association::OneToOne(account) = account else {
        panic!("expected a one-to-one association");
    };

    let removed = account
        .remove_associated(&registry, &executor, &user_rows()[0])
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(ids(&executor.rows("accounts")), vec![int(2)]);
    assert!(executor.captured_sql()[0].starts_with(r#"DELETE FROM "accounts""#));
}
