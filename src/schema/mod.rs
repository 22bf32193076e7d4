//! Relation schemas.
//!
//! A [`Schema`] is the ordered, name-unique attribute list of one relation
//! plus its primary key, associations, indexes and foreign keys. Schemas are
//! built once through [`SchemaBuilder::finalize`] and are immutable
//! afterwards: every algebra operation (`project`, `rename`, `qualified`,
//! `merge`, `join`, ...) returns a new schema.
//!
//! # Example
//!
//! ```
//! use lifeguard_schema::schema::Schema;
//! use lifeguard_schema::types::Type;
//!
//! let tasks = Schema::define("tasks")
//!     .primary_key("id", Type::integer())
//!     .foreign_key("user_id", Type::integer(), "users")
//!     .attribute("title", Type::string())
//!     .finalize()
//!     .unwrap();
//!
//! let projected = tasks.project(&["id", "title"]).unwrap().qualified(None).unwrap();
//! assert_eq!(projected.identifiers(), vec!["tasks.id", "tasks.title"]);
//! ```

pub mod attribute;
pub mod index;

#[doc(inline)]
pub use attribute::{Attribute, Qualified, ValueExpr};
#[doc(inline)]
pub use index::{ForeignKey, Index};

use crate::association::{AssociationDef, AssociationSet};
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::name::RelationName;
use crate::registry::RelationRegistry;
use crate::types::Type;
use sea_query::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// Ordered, name-unique collection of attributes belonging to one relation
#[derive(Clone)]
pub struct Schema {
    name: RelationName,
    attributes: Vec<Attribute>,
    primary_key: Vec<Attribute>,
    associations: AssociationSet,
    indexes: BTreeSet<Index>,
    foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Start declaring the schema of `relation` (dataset of the same name)
    pub fn define(relation: &str) -> SchemaBuilder {
        SchemaBuilder::new(RelationName::named(relation))
    }

    /// Start declaring a schema for an explicit relation name
    pub fn define_named(name: RelationName) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Empty schema with no associations
    pub fn empty(name: RelationName) -> Self {
        Self {
            associations: AssociationSet::new(name.clone(), Vec::new()),
            name,
            attributes: Vec::new(),
            primary_key: Vec::new(),
            indexes: BTreeSet::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Same relation metadata over a new attribute list
    fn derive(&self, attributes: Vec<Attribute>) -> Self {
        let primary_key = attributes.iter().filter(|a| a.is_primary_key()).cloned().collect();
        let indexes = self
            .indexes
            .iter()
            .filter(|index| index.covered_by(attributes.iter().map(Attribute::name)))
            .cloned()
            .collect();
        Self {
            name: self.name.clone(),
            attributes,
            primary_key,
            associations: self.associations.clone(),
            indexes,
            foreign_keys: self.foreign_keys.clone(),
        }
    }

    fn map<F>(&self, f: F) -> Self
    where
        F: FnMut(&Attribute) -> Attribute,
    {
        self.derive(self.attributes.iter().map(f).collect())
    }

    fn try_map<F>(&self, f: F) -> Result<Self>
    where
        F: FnMut(&Attribute) -> Result<Attribute>,
    {
        Ok(self.derive(self.attributes.iter().map(f).collect::<Result<_>>()?))
    }

    fn unknown(&self, name: &str) -> SchemaError {
        SchemaError::UnknownAttribute {
            relation: self.name.relation().to_string(),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &RelationName {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute by external key, falling back to the attribute name
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.key() == name)
            .or_else(|| self.attributes.iter().find(|a| a.name() == name))
    }

    /// Like [`Schema::get`], failing with `UnknownAttribute`
    pub fn fetch(&self, name: &str) -> Result<&Attribute> {
        self.get(name).ok_or_else(|| self.unknown(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// External keys in order
    pub fn keys(&self) -> Vec<&str> {
        self.attributes.iter().map(Attribute::key).collect()
    }

    /// Printable identifiers in order
    pub fn identifiers(&self) -> Vec<&str> {
        self.attributes.iter().map(Attribute::identifier).collect()
    }

    pub fn primary_key(&self) -> &[Attribute] {
        &self.primary_key
    }

    /// Name of the first primary key attribute
    pub fn primary_key_name(&self) -> Option<&str> {
        self.primary_key.first().map(Attribute::name)
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key.iter().map(Attribute::name).collect()
    }

    /// Attribute flagged as a foreign key to `target`
    pub fn foreign_key(&self, target: &RelationName) -> Option<&Attribute> {
        self.attributes.iter().find(|a| {
            a.is_foreign_key()
                && a.target()
                    .is_some_and(|t| t.relation() == target.relation())
        })
    }

    pub fn associations(&self) -> &AssociationSet {
        &self.associations
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Keep only `names`, preserving schema order
    ///
    /// Each name picks a single attribute the way [`Schema::get`] does, so an
    /// aliased copy of a column is not kept alongside the column itself.
    pub fn project(&self, names: &[&str]) -> Result<Self> {
        let mut keep = HashSet::new();
        for name in names {
            let pos = self
                .position(|a| a.key() == *name)
                .or_else(|| self.position(|a| a.name() == *name))
                .ok_or_else(|| self.unknown(name))?;
            keep.insert(pos);
        }
        Ok(self.derive(
            self.attributes
                .iter()
                .enumerate()
                .filter(|(pos, _)| keep.contains(pos))
                .map(|(_, attr)| attr.clone())
                .collect(),
        ))
    }

    fn position(&self, predicate: impl Fn(&Attribute) -> bool) -> Option<usize> {
        self.attributes.iter().position(predicate)
    }

    /// Drop `names`
    pub fn exclude(&self, names: &[&str]) -> Self {
        self.derive(
            self.attributes
                .iter()
                .filter(|a| !names.iter().any(|n| a.key() == *n))
                .cloned()
                .collect(),
        )
    }

    /// Keep only the primary key attributes
    pub fn project_pk(&self) -> Self {
        self.derive(self.primary_key.clone())
    }

    /// Alias attributes named in `mapping`; renamed attributes lose their
    /// primary key flag
    pub fn rename(&self, mapping: &[(&str, &str)]) -> Self {
        self.map(|attr| {
            match mapping.iter().find(|(from, _)| attr.name() == *from) {
                Some((_, to)) => attr.aliased(to).without_primary_key(),
                None => attr.clone(),
            }
        })
    }

    /// Rename per `mapping`, then flag every attribute as a foreign key
    pub fn project_fk(&self, mapping: &[(&str, &str)]) -> Self {
        self.rename(mapping).map(Attribute::as_foreign_key)
    }

    /// Qualify every attribute, see [`Attribute::qualified`]
    pub fn qualified(&self, table: Option<&str>) -> Result<Self> {
        self.try_map(|attr| attr.qualified(table))
    }

    pub fn unqualified(&self) -> Self {
        self.map(Attribute::unqualified)
    }

    /// Mark every attribute as joined
    pub fn joined(&self) -> Self {
        self.map(Attribute::joined)
    }

    /// Alias every attribute as `<prefix>_<name>`
    pub fn prefix(&self, prefix: &str) -> Self {
        self.map(|attr| attr.prefixed(prefix))
    }

    /// Wrap every attribute under `prefix` for nested-tuple loading
    pub fn wrap(&self, prefix: &str) -> Self {
        self.map(|attr| attr.wrapped(prefix))
    }

    /// Drop attributes whose external key repeats an earlier one
    pub fn uniq(&self) -> Self {
        let mut seen = HashSet::new();
        self.derive(
            self.attributes
                .iter()
                .filter(|a| seen.insert(a.key().to_string()))
                .cloned()
                .collect(),
        )
    }

    /// Concatenate with `other`; on an external-key collision the attribute
    /// from `other` replaces the one in `self`, at `self`'s position
    pub fn merge(&self, other: &Schema) -> Self {
        let mut attributes = self.attributes.clone();
        for attr in &other.attributes {
            match attributes.iter().position(|a| a.key() == attr.key()) {
                Some(pos) => attributes[pos] = attr.clone(),
                None => attributes.push(attr.clone()),
            }
        }
        self.derive(attributes)
    }

    /// Merge the joined schema of `relation` from the registry
    pub fn join(&self, registry: &dyn RelationRegistry, relation: &str) -> Result<Self> {
        let other = registry.relation(relation)?;
        Ok(self.merge(&other.schema().joined()))
    }

    /// Restriction matching the tuple whose primary key is `values`
    ///
    /// Values are matched positionally against the primary key attributes
    /// and cast through each attribute's type.
    pub fn by_pk(&self, values: &[Value]) -> Result<Expr> {
        if self.primary_key.is_empty() {
            return Err(SchemaError::MissingPrimaryKey {
                relation: self.name.relation().to_string(),
            });
        }
        if values.len() != self.primary_key.len() {
            return Err(SchemaError::PrimaryKeyArity {
                relation: self.name.relation().to_string(),
                expected: self.primary_key.len(),
                actual: values.len(),
            });
        }
        let mut conditions = self
            .primary_key
            .iter()
            .zip(values)
            .map(|(attr, value)| {
                let value = attr.ty().cast(value.clone())?;
                Ok(attr.qualified(None)?.to_expr().eq(value))
            })
            .collect::<Result<Vec<Expr>>>()?;
        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Expr::And(conditions)
        })
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.indexes == other.indexes
            && self.foreign_keys == other.foreign_keys
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("attributes", &self.identifiers())
            .field("primary_key", &self.primary_key_names())
            .field("associations", &self.associations)
            .finish()
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

/// Declarative schema construction
///
/// Collects attributes, associations, indexes and foreign keys;
/// [`SchemaBuilder::finalize`] validates them and computes derived fields.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: RelationName,
    attributes: Vec<Attribute>,
    associations: Vec<AssociationDef>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKey>,
}

impl SchemaBuilder {
    pub fn new(name: RelationName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            associations: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: &str, ty: Type) -> Self {
        self.attributes.push(Attribute::new(name, ty, &self.name));
        self
    }

    pub fn primary_key(mut self, name: &str, ty: Type) -> Self {
        self.attributes
            .push(Attribute::new(name, ty, &self.name).as_primary_key());
        self
    }

    /// Attribute referencing `target`
    pub fn foreign_key(mut self, name: &str, ty: Type, target: &str) -> Self {
        self.attributes
            .push(Attribute::new(name, ty, &self.name).references(&RelationName::named(target)));
        self
    }

    /// Pre-built attribute
    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn explicit_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Validate and compute derived fields
    ///
    /// Fails with `DuplicateAttribute` when two attributes share a name.
    /// Indexes are gathered from attribute index tags (in attribute order)
    /// and foreign keys from attributes flagged with a target.
    pub fn finalize(self) -> Result<Schema> {
        let mut names = HashSet::new();
        for attr in &self.attributes {
            if !names.insert(attr.name()) {
                return Err(SchemaError::DuplicateAttribute {
                    relation: self.name.relation().to_string(),
                    name: attr.name().to_string(),
                });
            }
        }

        let mut indexes: BTreeSet<Index> = self.indexes.into_iter().collect();
        let mut tagged: Vec<(Arc<str>, Vec<&str>)> = Vec::new();
        for attr in &self.attributes {
            for index in attr.indexes() {
                match tagged.iter_mut().find(|(name, _)| &**name == index) {
                    Some((_, members)) => members.push(attr.name()),
                    None => tagged.push((Arc::from(index), vec![attr.name()])),
                }
            }
        }
        for (name, members) in tagged {
            indexes.insert(Index::new(members).named(&name));
        }

        let mut foreign_keys = self.foreign_keys;
        for attr in &self.attributes {
            if let Some(target) = attr.target() {
                if !foreign_keys
                    .iter()
                    .any(|fk| fk.attributes.iter().any(|a| &**a == attr.name()))
                {
                    foreign_keys.push(ForeignKey::new(attr.name(), target));
                }
            }
        }

        let primary_key = self
            .attributes
            .iter()
            .filter(|a| a.is_primary_key())
            .cloned()
            .collect();
        let associations = AssociationSet::new(
            self.name.clone(),
            self.associations.into_iter().map(AssociationDef::build).collect(),
        );

        log::debug!(
            "finalized schema {} with {} attribute(s)",
            self.name,
            self.attributes.len()
        );

        Ok(Schema {
            name: self.name,
            attributes: self.attributes,
            primary_key,
            associations,
            indexes,
            foreign_keys,
        })
    }
}
