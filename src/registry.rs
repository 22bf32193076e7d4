//! Relation registry.
//!
//! Associations name their source, target and through relations instead of
//! holding them, and look them up here every time they resolve keys. Relations
//! can therefore be registered in any order, reference each other circularly,
//! and be replaced without invalidating the associations pointing at them.

use crate::association::AssociationSet;
use crate::config::ResolverConfig;
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::inflector;
use crate::name::RelationName;
use crate::schema::{Attribute, Schema};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Lookup of relations by logical name
pub trait RelationRegistry: Send + Sync {
    /// Relation registered under `name`, or `RelationNotFound`
    fn relation(&self, name: &str) -> Result<Arc<Relation>>;

    /// Naming conventions used during resolution
    fn config(&self) -> &ResolverConfig;
}

/// Named sub-view of a relation: a projection plus an optional restriction
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub attributes: Vec<Arc<str>>,
    pub restriction: Option<Expr>,
}

impl View {
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            attributes: attributes.iter().map(|a| Arc::from(*a)).collect(),
            restriction: None,
        }
    }

    pub fn restrict(mut self, restriction: Expr) -> Self {
        self.restriction = Some(restriction);
        self
    }
}

/// A registered relation: its schema and named views
#[derive(Debug, Clone)]
pub struct Relation {
    schema: Schema,
    views: HashMap<Arc<str>, View>,
}

impl Relation {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            views: HashMap::new(),
        }
    }

    pub fn with_view(mut self, name: &str, view: View) -> Self {
        self.views.insert(Arc::from(name), view);
        self
    }

    pub fn name(&self) -> &RelationName {
        self.schema.name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn associations(&self) -> &AssociationSet {
        self.schema.associations()
    }

    pub fn primary_key(&self) -> &[Attribute] {
        self.schema.primary_key()
    }

    /// Name of the primary key, or `MissingPrimaryKey`
    pub fn primary_key_name(&self) -> Result<&str> {
        self.schema
            .primary_key_name()
            .ok_or_else(|| SchemaError::MissingPrimaryKey {
                relation: self.name().relation().to_string(),
            })
    }

    /// Name of the attribute referencing `other`
    ///
    /// Attributes flagged as foreign keys to `other` win; otherwise, when
    /// `config.infer_foreign_keys` is set, the conventional name
    /// `<singular other dataset><suffix>` is returned whether or not the
    /// schema has such an attribute.
    pub fn foreign_key(&self, other: &RelationName, config: &ResolverConfig) -> Option<String> {
        if let Some(attr) = self.schema.foreign_key(other) {
            return Some(attr.name().to_string());
        }
        if !config.infer_foreign_keys {
            return None;
        }
        let inferred = inflector::foreign_key(other.dataset(), &config.foreign_key_suffix);
        log::warn!(
            "no foreign key to {} declared in {}, assuming {}",
            other,
            self.name(),
            inferred
        );
        Some(inferred)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }
}

/// In-memory registry guarded by an `RwLock`
#[derive(Debug, Default)]
pub struct Registry {
    relations: RwLock<HashMap<String, Arc<Relation>>>,
    config: ResolverConfig,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register `schema` under its relation name, replacing any previous entry
    pub fn register(&self, schema: Schema) -> Arc<Relation> {
        self.register_relation(Relation::new(schema))
    }

    pub fn register_relation(&self, relation: Relation) -> Arc<Relation> {
        let relation = Arc::new(relation);
        let key = relation.name().relation().to_string();
        log::debug!("registering relation {key}");
        self.relations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, relation.clone());
        relation
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered relation names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .relations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl RelationRegistry for Registry {
    fn relation(&self, name: &str) -> Result<Arc<Relation>> {
        self.relations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::RelationNotFound(name.to_string()))
    }

    fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn tasks() -> Schema {
        Schema::define("tasks")
            .primary_key("id", Type::integer())
            .foreign_key("owner_id", Type::integer(), "users")
            .finalize()
            .unwrap()
    }

    #[test]
    fn test_lookup_and_replace() {
        let registry = Registry::new();
        assert!(registry.relation("tasks").is_err());
        registry.register(tasks());
        assert!(registry.contains("tasks"));
        let replacement = Schema::define("tasks")
            .primary_key("id", Type::integer())
            .finalize()
            .unwrap();
        registry.register(replacement);
        assert_eq!(registry.relation("tasks").unwrap().schema().len(), 1);
        assert_eq!(registry.names(), vec!["tasks".to_string()]);
    }

    #[test]
    fn test_foreign_key_prefers_declared_attribute() {
        let relation = Relation::new(tasks());
        let config = ResolverConfig::default();
        assert_eq!(
            relation.foreign_key(&RelationName::named("users"), &config),
            Some("owner_id".to_string())
        );
        assert_eq!(
            relation.foreign_key(&RelationName::named("projects"), &config),
            Some("project_id".to_string())
        );
    }

    #[test]
    fn test_foreign_key_inference_can_be_disabled() {
        let relation = Relation::new(tasks());
        let config = ResolverConfig {
            infer_foreign_keys: false,
            ..ResolverConfig::default()
        };
        assert_eq!(relation.foreign_key(&RelationName::named("projects"), &config), None);
    }

    #[test]
    fn test_primary_key_name_missing() {
        let schema = Schema::define("logs")
            .attribute("message", Type::string())
            .finalize()
            .unwrap();
        let relation = Relation::new(schema);
        assert!(matches!(
            relation.primary_key_name(),
            Err(SchemaError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_views() {
        let relation = Relation::new(tasks())
            .with_view("ids", View::new(&["id"]).restrict(Expr::col("id").gt(0)));
        assert_eq!(relation.view("ids").unwrap().attributes.len(), 1);
        assert!(relation.view("missing").is_none());
    }
}
