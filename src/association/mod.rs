//! Associations between relations.
//!
//! An [`Association`] connects a source relation to a target relation, either
//! directly through a foreign key or through an intermediate join relation.
//! It holds only its declaration (a [`Definition`]); every method takes the
//! [`RelationRegistry`] and resolves schemas, keys and nested associations
//! against it at call time, so associations may name relations that are
//! registered later or that reference each other.
//!
//! Resolution yields three things:
//!
//! - [`JoinKeys`]: the qualified attribute pair used in a SQL join condition
//! - [`CombineKeys`]: the unqualified key names used to match loaded tuples
//!   in memory (see [`preload`](preload::preload))
//! - a [`Select`] composing the target schema with the joins back to the
//!   source (`call`), or without them (`preload_select`)
//!
//! # Example
//!
//! ```
//! use lifeguard_schema::association::Association;
//! use lifeguard_schema::registry::{Registry, RelationRegistry};
//! use lifeguard_schema::schema::Schema;
//! use lifeguard_schema::types::Type;
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
//!
//! let users = registry.relation("users").unwrap();
//! let tasks = users.associations().get("tasks").unwrap();
//! let keys = tasks.join_keys(&registry).unwrap();
//! assert_eq!(keys.source.identifier(), "users.id");
//! assert_eq!(keys.target.identifier(), "tasks.user_id");
//! ```

pub mod many_to_many;
pub mod many_to_one;
pub mod one_to_many;
pub mod one_to_one;
pub mod one_to_one_through;
pub mod preload;
pub mod set;

pub use many_to_many::ManyToMany;
pub use many_to_one::ManyToOne;
pub use one_to_many::OneToMany;
pub use one_to_one::OneToOne;
pub use one_to_one_through::OneToOneThrough;
pub use preload::{combine, eager_load, preload, Loaded};
pub use set::AssociationSet;

use crate::config::ResolverConfig;
use crate::error::{Result, SchemaError};
use crate::executor::{Executor, Select, Tuple};
use crate::inflector;
use crate::name::{QualifiedName, RelationName};
use crate::registry::{Relation, RelationRegistry};
use crate::schema::Attribute;
use once_cell::sync::OnceCell;
use sea_query::Value;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Kind of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    OneToMany,
    OneToOne,
    ManyToOne,
    ManyToMany,
    OneToOneThrough,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::OneToMany => "one_to_many",
            AssociationKind::OneToOne => "one_to_one",
            AssociationKind::ManyToOne => "many_to_one",
            AssociationKind::ManyToMany => "many_to_many",
            AssociationKind::OneToOneThrough => "one_to_one_through",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of target tuples per source tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

/// Declaration-time options of an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub source: RelationName,
    pub target: RelationName,
    /// Public name; defaults to the target's relation name
    pub as_name: Arc<str>,
    pub result: Cardinality,
    /// Registry key of the target when it differs from `target`
    pub relation: Option<Arc<str>>,
    pub foreign_key: Option<Arc<str>>,
    pub through: Option<RelationName>,
    /// Named view of the target applied to composed reads
    pub view: Option<Arc<str>>,
    /// Explicit `(parent key, child key)` pair used when combining
    pub combine_keys: Option<(Arc<str>, Arc<str>)>,
}

impl Definition {
    fn new(source: RelationName, target: RelationName, result: Cardinality) -> Self {
        Self {
            as_name: Arc::from(target.relation()),
            source,
            target,
            result,
            relation: None,
            foreign_key: None,
            through: None,
            view: None,
            combine_keys: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.as_name
    }

    /// Registry key the target is looked up under
    pub fn target_relation(&self) -> &str {
        self.relation
            .as_deref()
            .unwrap_or_else(|| self.target.relation())
    }

    pub fn is_self_ref(&self) -> bool {
        self.source.relation() == self.target_relation()
    }

    pub(crate) fn missing_keys(&self, relation: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::MissingJoinKeys {
            association: self.name().to_string(),
            relation: relation.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(&self, operation: &str) -> SchemaError {
        SchemaError::UnsupportedOperation {
            association: self.name().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Through relation, required for through associations
    pub(crate) fn through_relation(&self) -> Result<&RelationName> {
        self.through
            .as_ref()
            .ok_or_else(|| self.missing_keys(self.source.relation(), "no through relation declared"))
    }
}

/// Qualified attribute pair of a join condition (`source = target`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeys {
    pub source: Attribute,
    pub target: Attribute,
}

/// Unqualified key names matching parent tuples (`source`) to child tuples (`target`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombineKeys {
    pub source: String,
    pub target: String,
}

/// Resolution behavior shared by every association kind
pub trait Resolve: fmt::Debug + Send + Sync {
    fn definition(&self) -> &Definition;

    fn kind(&self) -> AssociationKind;

    fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys>;

    /// Combine keys derived from the relations, before any explicit override
    fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys>;

    /// Target read joined back to the source
    fn call(&self, registry: &dyn RelationRegistry) -> Result<Select>;

    /// Target read restricted later by the preloader; no join back to the source
    fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select>;

    /// Source read with the target nested under the association name
    fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select>;

    /// Stamp `children` with the keys of `parents`
    fn associate(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<Vec<Tuple>>;
}

/// Builder returned by the [`Association`] constructors
///
/// Passed to [`SchemaBuilder::association`](crate::schema::SchemaBuilder::association)
/// or turned into an [`Association`] directly with [`AssociationDef::build`].
#[derive(Debug, Clone)]
pub struct AssociationDef {
    kind: AssociationKind,
    definition: Definition,
}

impl AssociationDef {
    fn new(
        kind: AssociationKind,
        source: RelationName,
        target: RelationName,
        result: Cardinality,
    ) -> Self {
        Self {
            kind,
            definition: Definition::new(source, target, result),
        }
    }

    fn through(mut self, through: RelationName) -> Self {
        self.definition.through = Some(through);
        self
    }

    /// Public name of the association
    pub fn as_name(mut self, name: &str) -> Self {
        self.definition.as_name = Arc::from(name);
        self
    }

    pub fn foreign_key(mut self, foreign_key: &str) -> Self {
        self.definition.foreign_key = Some(Arc::from(foreign_key));
        self
    }

    /// Look the target up under `relation` instead of its own name
    pub fn relation(mut self, relation: &str) -> Self {
        self.definition.relation = Some(Arc::from(relation));
        self
    }

    pub fn view(mut self, view: &str) -> Self {
        self.definition.view = Some(Arc::from(view));
        self
    }

    pub fn combine_keys(mut self, parent_key: &str, child_key: &str) -> Self {
        self.definition.combine_keys = Some((Arc::from(parent_key), Arc::from(child_key)));
        self
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn build(self) -> Association {
        let definition = self.definition;
        match self.kind {
            AssociationKind::OneToMany => Association::OneToMany(OneToMany::new(definition)),
            AssociationKind::OneToOne => Association::OneToOne(OneToOne::new(definition)),
            AssociationKind::ManyToOne => Association::ManyToOne(ManyToOne::new(definition)),
            AssociationKind::ManyToMany => Association::ManyToMany(ManyToMany::new(definition)),
            AssociationKind::OneToOneThrough => {
                Association::OneToOneThrough(OneToOneThrough::new(definition))
            }
        }
    }
}

/// A declared association of one of the five kinds
#[derive(Debug, Clone)]
pub enum Association {
    OneToMany(OneToMany),
    OneToOne(OneToOne),
    ManyToOne(ManyToOne),
    ManyToMany(ManyToMany),
    OneToOneThrough(OneToOneThrough),
}

impl Association {
    /// `source` has many `target` rows holding a foreign key to it
    pub fn one_to_many(source: impl Into<RelationName>, target: impl Into<RelationName>) -> AssociationDef {
        AssociationDef::new(
            AssociationKind::OneToMany,
            source.into(),
            target.into(),
            Cardinality::Many,
        )
    }

    /// Like [`Association::one_to_many`] with a single target row
    pub fn one_to_one(source: impl Into<RelationName>, target: impl Into<RelationName>) -> AssociationDef {
        AssociationDef::new(
            AssociationKind::OneToOne,
            source.into(),
            target.into(),
            Cardinality::One,
        )
    }

    /// `source` holds a foreign key to `target`
    pub fn many_to_one(source: impl Into<RelationName>, target: impl Into<RelationName>) -> AssociationDef {
        AssociationDef::new(
            AssociationKind::ManyToOne,
            source.into(),
            target.into(),
            Cardinality::One,
        )
    }

    /// `source` and `target` paired by rows of the join relation `through`
    pub fn many_to_many(
        source: impl Into<RelationName>,
        target: impl Into<RelationName>,
        through: impl Into<RelationName>,
    ) -> AssociationDef {
        AssociationDef::new(
            AssociationKind::ManyToMany,
            source.into(),
            target.into(),
            Cardinality::Many,
        )
        .through(through.into())
    }

    /// Single `target` reached from `source` through `through`
    pub fn one_to_one_through(
        source: impl Into<RelationName>,
        target: impl Into<RelationName>,
        through: impl Into<RelationName>,
    ) -> AssociationDef {
        AssociationDef::new(
            AssociationKind::OneToOneThrough,
            source.into(),
            target.into(),
            Cardinality::One,
        )
        .through(through.into())
    }

    fn resolver(&self) -> &dyn Resolve {
        match self {
            Association::OneToMany(a) => a,
            Association::OneToOne(a) => a,
            Association::ManyToOne(a) => a,
            Association::ManyToMany(a) => a,
            Association::OneToOneThrough(a) => a,
        }
    }

    pub fn definition(&self) -> &Definition {
        self.resolver().definition()
    }

    /// Public name (`as`)
    pub fn name(&self) -> &str {
        self.definition().name()
    }

    pub fn kind(&self) -> AssociationKind {
        self.resolver().kind()
    }

    pub fn result(&self) -> Cardinality {
        self.definition().result
    }

    pub fn join_keys(&self, registry: &dyn RelationRegistry) -> Result<JoinKeys> {
        self.resolver().join_keys(registry)
    }

    /// Combine keys, honoring an explicit `combine_keys` declaration
    pub fn combine_keys(&self, registry: &dyn RelationRegistry) -> Result<CombineKeys> {
        match &self.definition().combine_keys {
            Some((source, target)) => Ok(CombineKeys {
                source: source.to_string(),
                target: target.to_string(),
            }),
            None => self.resolver().combine_keys(registry),
        }
    }

    /// Compose the target read joined back to the source
    pub fn call(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::call_span(self.name(), self.kind().as_str()).entered();

        let select = self.resolver().call(registry)?;
        log::debug!(
            "association {} ({}) composed {} join(s) over {}",
            self.name(),
            self.kind(),
            select.joins.len(),
            select.from
        );
        Ok(select)
    }

    pub fn preload_select(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        self.resolver().preload_select(registry)
    }

    pub fn wrap(&self, registry: &dyn RelationRegistry) -> Result<Select> {
        self.resolver().wrap(registry)
    }

    /// Write-path counterpart of preloading
    ///
    /// Yields one stamped copy of each child per parent: the child carries the
    /// parent's key under the foreign key name. Many-to-many associations
    /// insert the join rows through `executor` first.
    pub fn associate(
        &self,
        registry: &dyn RelationRegistry,
        executor: &dyn Executor,
        children: &[Tuple],
        parents: &[Tuple],
    ) -> Result<Vec<Tuple>> {
        self.resolver()
            .associate(registry, executor, children, parents)
    }
}

/// Memoized alias rendering the source side of a self-referential association
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceAlias(OnceCell<String>);

impl SourceAlias {
    pub(crate) fn resolve(
        &self,
        definition: &Definition,
        source: &Relation,
        config: &ResolverConfig,
    ) -> Option<&str> {
        if !definition.is_self_ref() {
            return None;
        }
        let alias = self.0.get_or_init(|| {
            let alias = inflector::self_ref_alias(source.name().dataset(), &config.self_ref_suffix);
            log::debug!(
                "association {} is self-referential, aliasing source as {}",
                definition.name(),
                alias
            );
            alias
        });
        Some(alias)
    }
}

/// `FROM`/`JOIN` reference of `relation`, aliased when given
pub(crate) fn table(relation: &Relation, alias: Option<&str>) -> QualifiedName {
    let name = relation.name().qualified_name();
    match alias {
        Some(alias) => name.aliased(alias),
        None => name,
    }
}

/// Attribute `key` of `relation`, or `MissingJoinKeys`
pub(crate) fn key_attribute(
    definition: &Definition,
    relation: &Relation,
    key: &str,
) -> Result<Attribute> {
    relation.schema().get(key).cloned().ok_or_else(|| {
        definition.missing_keys(
            relation.name().relation(),
            format!("attribute {key} not found"),
        )
    })
}

/// Explicit foreign key, else the one `holder` declares (or infers) for `referenced`
pub(crate) fn foreign_key_name(
    definition: &Definition,
    holder: &Relation,
    referenced: &RelationName,
    config: &ResolverConfig,
) -> Result<String> {
    if let Some(foreign_key) = &definition.foreign_key {
        return Ok(foreign_key.to_string());
    }
    holder.foreign_key(referenced, config).ok_or_else(|| {
        definition.missing_keys(
            holder.name().relation(),
            format!("no foreign key to {referenced}"),
        )
    })
}

/// Apply the declared view of `target`, if any
///
/// The view's projection only filters attributes of the target itself;
/// columns surfaced from other relations (foreign keys needed for combining)
/// are kept.
pub(crate) fn apply_view(definition: &Definition, target: &Relation, select: Select) -> Result<Select> {
    let Some(name) = &definition.view else {
        return Ok(select);
    };
    let view = target.view(name).ok_or_else(|| SchemaError::UnknownView {
        relation: target.name().relation().to_string(),
        name: name.to_string(),
    })?;
    let keep: Vec<&str> = select
        .schema
        .iter()
        .filter(|attr| {
            attr.source().relation() != target.name().relation()
                || view.attributes.iter().any(|a| &**a == attr.key() || &**a == attr.name())
        })
        .map(|attr| attr.key())
        .collect();
    let schema = select.schema.project(&keep)?;
    let select = select.with_schema(schema);
    Ok(match &view.restriction {
        Some(restriction) => select.restrict(restriction.clone()),
        None => select,
    })
}

/// Value of `key` in `tuple`, or `MissingJoinKeys`
pub(crate) fn key_value(
    definition: &Definition,
    relation: &str,
    tuple: &Tuple,
    key: &str,
) -> Result<Value> {
    tuple
        .get(key)
        .cloned()
        .ok_or_else(|| definition.missing_keys(relation, format!("tuple lacks {key}")))
}

/// One copy of every child per parent with `child[child_key] = parent[parent_key]`
pub(crate) fn stamp(
    definition: &Definition,
    parent_relation: &str,
    children: &[Tuple],
    parents: &[Tuple],
    child_key: &str,
    parent_key: &str,
) -> Result<Vec<Tuple>> {
    let values = parents
        .iter()
        .map(|parent| key_value(definition, parent_relation, parent, parent_key))
        .collect::<Result<Vec<_>>>()?;
    let mut stamped = Vec::with_capacity(children.len() * values.len());
    for child in children {
        for value in &values {
            let mut child = child.clone();
            child.insert(child_key.to_string(), value.clone());
            stamped.push(child);
        }
    }
    Ok(stamped)
}
