//! Schema attributes.
//!
//! An [`Attribute`] is one column-typed value of a relation together with the
//! metadata joins depend on: primary/foreign key flags, qualification, alias,
//! wrap prefix and join marker. Attributes are persistent values; every
//! transformation returns a new attribute.
//!
//! # Identifier synthesis
//!
//! The printable identifier is a pure function of the name, qualification,
//! alias and wrap state:
//!
//! | qualified | aliased | identifier                  |
//! |-----------|---------|-----------------------------|
//! | yes       | yes     | `<table>.<name> AS <alias>` |
//! | yes       | no      | `<table>.<name>`            |
//! | no        | yes     | `<name> AS <alias>`         |
//! | no        | no      | `<name>`                    |
//!
//! # Interning
//!
//! Attributes are interned in a process-wide table guarded by an `RwLock`:
//! building a structurally equal attribute twice yields the same shared
//! instance, so `attr.qualified(None)` called repeatedly does not allocate
//! new attributes. The identifier string of an instance is computed once.

use crate::error::{Result, SchemaError};
use crate::expr::{Expr, Ident};
use crate::name::RelationName;
use crate::types::Type;
use once_cell::sync::{Lazy, OnceCell};
use sea_query::{Expr as SqlExpr, Func};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Qualification state of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualified {
    No,
    /// Qualified with the identifier of the attribute's source relation
    Source,
    /// Qualified with an explicit table name or alias
    Table(Arc<str>),
}

/// Expression backing an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueExpr {
    /// Plain column reference
    Column,
    /// Computed value, e.g. `count(id)`
    Function { name: Arc<str>, args: Vec<Arc<str>> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AttributeData {
    name: Arc<str>,
    ty: Type,
    source: RelationName,
    expr: ValueExpr,
    primary_key: bool,
    foreign_key: bool,
    target: Option<RelationName>,
    qualified: Qualified,
    alias: Option<Arc<str>>,
    wrapped: Option<Arc<str>>,
    joined: bool,
    indexes: BTreeSet<Arc<str>>,
}

struct Inner {
    data: AttributeData,
    identifier: OnceCell<String>,
}

static ATTRIBUTES: Lazy<RwLock<HashMap<AttributeData, Attribute>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn intern(data: AttributeData) -> Attribute {
    if let Some(attr) = ATTRIBUTES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&data)
    {
        log::trace!("attribute cache hit: {}", attr.name());
        return attr.clone();
    }
    ATTRIBUTES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(data.clone())
        .or_insert_with(|| {
            Attribute(Arc::new(Inner {
                data,
                identifier: OnceCell::new(),
            }))
        })
        .clone()
}

/// A named, typed column value of a relation
#[derive(Clone)]
pub struct Attribute(Arc<Inner>);

impl Attribute {
    /// Column attribute of `source`
    pub fn new(name: &str, ty: Type, source: &RelationName) -> Self {
        intern(AttributeData {
            name: Arc::from(name),
            ty,
            source: source.clone(),
            expr: ValueExpr::Column,
            primary_key: false,
            foreign_key: false,
            target: None,
            qualified: Qualified::No,
            alias: None,
            wrapped: None,
            joined: false,
            indexes: BTreeSet::new(),
        })
    }

    /// Computed attribute, e.g. `Attribute::function("task_count", "count", &["id"], ...)`
    ///
    /// The result is aliased to `name`. Function attributes cannot be qualified.
    pub fn function(name: &str, func: &str, args: &[&str], ty: Type, source: &RelationName) -> Self {
        let column = Self::new(name, ty, source);
        column.with(|d| {
            d.alias = Some(d.name.clone());
            d.expr = ValueExpr::Function {
                name: Arc::from(func),
                args: args.iter().map(|a| Arc::from(*a)).collect(),
            }
        })
    }

    fn with(&self, f: impl FnOnce(&mut AttributeData)) -> Self {
        let mut data = self.0.data.clone();
        f(&mut data);
        if data == self.0.data {
            return self.clone();
        }
        intern(data)
    }

    pub fn name(&self) -> &str {
        &self.0.data.name
    }

    /// External name: the alias if set, else the name
    pub fn key(&self) -> &str {
        self.alias().unwrap_or_else(|| self.name())
    }

    pub fn ty(&self) -> &Type {
        &self.0.data.ty
    }

    pub fn source(&self) -> &RelationName {
        &self.0.data.source
    }

    pub fn expr(&self) -> &ValueExpr {
        &self.0.data.expr
    }

    pub fn alias(&self) -> Option<&str> {
        self.0.data.alias.as_deref()
    }

    pub fn wrapped_by(&self) -> Option<&str> {
        self.0.data.wrapped.as_deref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.0.data.wrapped.is_some()
    }

    pub fn is_primary_key(&self) -> bool {
        self.0.data.primary_key
    }

    pub fn is_foreign_key(&self) -> bool {
        self.0.data.foreign_key
    }

    /// Relation a foreign key attribute points at
    pub fn target(&self) -> Option<&RelationName> {
        self.0.data.target.as_ref()
    }

    pub fn is_qualified(&self) -> bool {
        self.0.data.qualified != Qualified::No
    }

    pub fn is_joined(&self) -> bool {
        self.0.data.joined
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.data.expr, ValueExpr::Function { .. })
    }

    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.0.data.indexes.iter().map(|i| &**i)
    }

    /// Table the attribute is qualified with, if any
    pub fn qualified_table(&self) -> Option<&str> {
        match &self.0.data.qualified {
            Qualified::No => None,
            Qualified::Source => Some(self.source().identifier()),
            Qualified::Table(table) => Some(table),
        }
    }

    /// Qualify with `table`, or with the source relation when `None`
    ///
    /// Without a table this is a no-op on an already qualified attribute.
    /// Attributes backed by a function expression cannot be qualified.
    pub fn qualified(&self, table: Option<&str>) -> Result<Self> {
        if table.is_none() && self.is_qualified() {
            return Ok(self.clone());
        }
        if let ValueExpr::Function { .. } = self.expr() {
            return Err(SchemaError::Qualify {
                attribute: self.name().to_string(),
                expression: self.value_sql(),
            });
        }
        let qualified = match table {
            Some(table) => Qualified::Table(Arc::from(table)),
            None => Qualified::Source,
        };
        Ok(self.with(|d| d.qualified = qualified))
    }

    pub fn unqualified(&self) -> Self {
        self.with(|d| d.qualified = Qualified::No)
    }

    pub fn aliased(&self, alias: &str) -> Self {
        self.with(|d| d.alias = Some(Arc::from(alias)))
    }

    /// Alias as `<prefix>_<name>`
    pub fn prefixed(&self, prefix: &str) -> Self {
        self.aliased(&format!("{}_{}", prefix, self.name()))
    }

    /// Namespace the attribute under `prefix` for nested-tuple loading
    pub fn wrapped(&self, prefix: &str) -> Self {
        let alias = format!("{}_{}", prefix, self.name());
        self.with(|d| {
            d.wrapped = Some(Arc::from(prefix));
            d.alias = Some(Arc::from(alias.as_str()));
        })
    }

    /// Mark as coming from a joined relation
    pub fn joined(&self) -> Self {
        self.with(|d| d.joined = true)
    }

    pub fn as_primary_key(&self) -> Self {
        self.with(|d| d.primary_key = true)
    }

    pub fn without_primary_key(&self) -> Self {
        self.with(|d| d.primary_key = false)
    }

    /// Flag as a foreign key without a known target
    pub fn as_foreign_key(&self) -> Self {
        self.with(|d| d.foreign_key = true)
    }

    /// Flag as a foreign key pointing at `target`
    pub fn references(&self, target: &RelationName) -> Self {
        let target = target.clone();
        self.with(|d| {
            d.foreign_key = true;
            d.target = Some(target);
        })
    }

    /// Add the attribute to the index named `index`
    pub fn indexed(&self, index: &str) -> Self {
        self.with(|d| {
            d.indexes.insert(Arc::from(index));
        })
    }

    pub fn with_type(&self, ty: Type) -> Self {
        self.with(|d| d.ty = ty)
    }

    /// `<name>` or `<func>(<args>)`
    fn value_sql(&self) -> String {
        match self.expr() {
            ValueExpr::Column => self.name().to_string(),
            ValueExpr::Function { name, args } => {
                let args: Vec<&str> = args.iter().map(|a| &**a).collect();
                format!("{}({})", name, args.join(", "))
            }
        }
    }

    /// Printable identifier, see the module documentation
    pub fn identifier(&self) -> &str {
        self.0.identifier.get_or_init(|| {
            let value = match self.qualified_table() {
                Some(table) => format!("{}.{}", table, self.value_sql()),
                None => self.value_sql(),
            };
            match self.alias() {
                Some(alias) => format!("{value} AS {alias}"),
                None => value,
            }
        })
    }

    /// Column reference for restrictions, qualified when the attribute is
    pub fn to_expr(&self) -> Expr {
        match self.qualified_table() {
            Some(table) => Expr::qualified(table, self.name()),
            None => Expr::col(self.name()),
        }
    }

    /// Value expression for a projection, without the alias
    pub fn to_sea_query(&self) -> SqlExpr {
        match self.expr() {
            ValueExpr::Column => self.to_expr().to_sea_query(),
            ValueExpr::Function { name, args } => SqlExpr::FunctionCall(
                Func::cust(Ident(name.clone()))
                    .args(args.iter().map(|a| SqlExpr::col(Ident(a.clone())))),
            ),
        }
    }

    /// `true` when both attributes share the same interned instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.data == other.0.data
    }
}

impl Eq for Attribute {}

impl std::hash::Hash for Attribute {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.data.hash(state);
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("identifier", &self.identifier())
            .field("source", self.source())
            .field("primary_key", &self.is_primary_key())
            .field("foreign_key", &self.is_foreign_key())
            .field("joined", &self.is_joined())
            .finish()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
