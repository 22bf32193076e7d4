//! Query descriptors and the executor seam.
//!
//! Association resolution ends in a [`Select`]: the composed output schema, the
//! dataset to read from, an ordered list of [`Join`]s and an optional
//! restriction. Executors own all I/O; they receive these descriptors through
//! the [`Executor`] trait, typically lowering them with
//! [`Select::to_statement`] into a sea-query `SelectStatement`.
//!
//! # Example
//!
//! ```
//! use lifeguard_schema::executor::Select;
//! use lifeguard_schema::schema::Schema;
//! use lifeguard_schema::types::Type;
//!
//! let users = Schema::define("users")
//!     .primary_key("id", Type::integer())
//!     .finalize()
//!     .unwrap();
//! let select = Select::new(users.name().qualified_name(), users.qualified(None).unwrap());
//! assert_eq!(select.to_sql(), r#"SELECT "users"."id" FROM "users""#);
//! ```

use crate::error::{Result, SchemaError};
use crate::expr::{Expr, Ident};
use crate::name::QualifiedName;
use crate::schema::{Attribute, Schema};
use sea_query::{
    DeleteStatement, InsertStatement, JoinType, PostgresQueryBuilder, Query, SelectStatement,
    Value,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A materialized row keyed by attribute external keys
pub type Tuple = BTreeMap<String, Value>;

/// Build a [`Tuple`] from `(key, value)` pairs
pub fn tuple<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Tuple {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Join type of a [`Join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
        }
    }
}

/// One join step: join type, joined dataset and the key pairs compared for equality
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: QualifiedName,
    pub keys: Vec<(Attribute, Attribute)>,
}

impl Join {
    pub fn new(kind: JoinKind, table: QualifiedName, left: Attribute, right: Attribute) -> Self {
        Self {
            kind,
            table,
            keys: vec![(left, right)],
        }
    }

    /// `left = right` for every key pair
    pub fn condition(&self) -> Expr {
        let mut conditions: Vec<Expr> = self
            .keys
            .iter()
            .map(|(left, right)| left.to_expr().equals(right.to_expr()))
            .collect();
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Expr::And(conditions)
        }
    }
}

/// Composed read: output schema, source dataset, joins and restriction
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub from: QualifiedName,
    pub schema: Schema,
    pub joins: Vec<Join>,
    pub restriction: Option<Expr>,
}

impl Select {
    pub fn new(from: QualifiedName, schema: Schema) -> Self {
        Self {
            from,
            schema,
            joins: Vec::new(),
            restriction: None,
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a restriction, AND-ed with any existing one
    pub fn restrict(mut self, expr: Expr) -> Self {
        self.restriction = Some(match self.restriction.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Lower into a sea-query `SelectStatement`
    pub fn to_statement(&self) -> SelectStatement {
        let mut query = Query::select();
        for attr in &self.schema {
            if let Some(alias) = attr.alias() {
                query.expr_as(attr.to_sea_query(), ident(alias));
            } else {
                query.expr(attr.to_sea_query());
            }
        }
        if let Some(alias) = &self.from.alias {
            query.from_as(Ident(self.from.dataset.clone()), Ident(alias.clone()));
        } else {
            query.from(Ident(self.from.dataset.clone()));
        }
        for join in &self.joins {
            let condition = join.condition().to_sea_query();
            if let Some(alias) = &join.table.alias {
                query.join_as(
                    join.kind.into(),
                    Ident(join.table.dataset.clone()),
                    Ident(alias.clone()),
                    condition,
                );
            } else {
                query.join(join.kind.into(), Ident(join.table.dataset.clone()), condition);
            }
        }
        if let Some(restriction) = &self.restriction {
            query.and_where(restriction.to_sea_query());
        }
        query
    }

    /// PostgreSQL text with inlined values, for logging and tests
    pub fn to_sql(&self) -> String {
        self.to_statement().to_string(PostgresQueryBuilder)
    }
}

fn ident(name: &str) -> Ident {
    Ident(Arc::from(name))
}

/// `INSERT INTO <dataset> (<columns>) VALUES ...` for `tuples`
///
/// Columns are taken from the first tuple; every tuple must carry the same keys.
pub fn insert_statement(dataset: &QualifiedName, tuples: &[Tuple]) -> Result<InsertStatement> {
    let mut query = Query::insert();
    query.into_table(Ident(dataset.dataset.clone()));
    let columns: Vec<String> = tuples
        .first()
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default();
    query.columns(columns.iter().map(|c| ident(c)));
    for tuple in tuples {
        let values = columns
            .iter()
            .map(|c| {
                tuple.get(c).cloned().ok_or_else(|| {
                    SchemaError::Execution(format!("tuple for {} is missing {c}", dataset.dataset))
                })
            })
            .collect::<Result<Vec<Value>>>()?;
        query
            .values(values.into_iter().map(sea_query::Expr::val))
            .map_err(|e| SchemaError::Execution(e.to_string()))?;
    }
    Ok(query)
}

/// `DELETE FROM <dataset> WHERE <restriction>`
pub fn delete_statement(dataset: &QualifiedName, restriction: &Expr) -> DeleteStatement {
    let mut query = Query::delete();
    query
        .from_table(Ident(dataset.dataset.clone()))
        .and_where(restriction.to_sea_query());
    query
}

/// Runs composed queries; owns all I/O
///
/// Implementations translate descriptors into SQL (see [`Select::to_statement`],
/// [`insert_statement`], [`delete_statement`]) and map rows back into
/// [`Tuple`]s keyed by each output attribute's external key.
pub trait Executor {
    /// Execute a read and return its rows
    fn fetch(&self, select: &Select) -> Result<Vec<Tuple>>;

    /// Insert `tuples` into `dataset` and return the number of rows written
    fn insert(&self, dataset: &QualifiedName, tuples: &[Tuple]) -> Result<u64>;

    /// Delete rows of `dataset` matching `restriction` and return the number removed
    fn delete(&self, dataset: &QualifiedName, restriction: &Expr) -> Result<u64>;
}
