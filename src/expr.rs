//! Restriction expressions.
//!
//! A small tagged AST for the predicates this crate builds itself (key
//! membership for preloading, primary key lookups, cascade deletes) and for
//! callers that want to add their own restrictions to a [`Select`].
//! Expressions are built through a fixed set of constructor and combinator
//! methods and lowered into sea-query expressions by [`Expr::to_sea_query`].
//!
//! ```
//! use lifeguard_schema::expr::Expr;
//!
//! let cond = Expr::qualified("users", "id")
//!     .is_in([1i32, 2, 3])
//!     .and(Expr::col("active").eq(true));
//! ```
//!
//! [`Select`]: crate::executor::Select

use sea_query::{Expr as SqlExpr, ExprTrait, Func, Iden, Value};
use std::sync::Arc;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Restriction expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally table-qualified
    Column {
        table: Option<Arc<str>>,
        name: Arc<str>,
    },
    /// Literal value
    Value(Value),
    /// Binary comparison
    Compare {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Membership in a literal value list
    In { expr: Box<Expr>, values: Vec<Value> },
    IsNull(Box<Expr>),
    /// Function call
    Func { name: Arc<str>, args: Vec<Expr> },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Unqualified column reference
    pub fn col(name: &str) -> Self {
        Expr::Column {
            table: None,
            name: Arc::from(name),
        }
    }

    /// Table-qualified column reference
    pub fn qualified(table: &str, name: &str) -> Self {
        Expr::Column {
            table: Some(Arc::from(table)),
            name: Arc::from(name),
        }
    }

    pub fn val(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    pub fn func(name: &str, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: Arc::from(name),
            args,
        }
    }

    fn compare(self, op: BinOp, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Eq, Expr::val(value))
    }

    pub fn ne(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Ne, Expr::val(value))
    }

    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Gt, Expr::val(value))
    }

    pub fn gte(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Gte, Expr::val(value))
    }

    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Lt, Expr::val(value))
    }

    pub fn lte(self, value: impl Into<Value>) -> Self {
        self.compare(BinOp::Lte, Expr::val(value))
    }

    /// Column-to-column (or expression) equality, as used in join conditions
    pub fn equals(self, other: Expr) -> Self {
        self.compare(BinOp::Eq, other)
    }

    pub fn is_in<V, I>(self, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// Conjunction; nested `And`s are flattened
    pub fn and(self, other: Expr) -> Self {
        match (self, other) {
            (Expr::And(mut left), Expr::And(right)) => {
                left.extend(right);
                Expr::And(left)
            }
            (Expr::And(mut left), right) => {
                left.push(right);
                Expr::And(left)
            }
            (left, right) => Expr::And(vec![left, right]),
        }
    }

    /// Disjunction; nested `Or`s are flattened
    pub fn or(self, other: Expr) -> Self {
        match (self, other) {
            (Expr::Or(mut left), Expr::Or(right)) => {
                left.extend(right);
                Expr::Or(left)
            }
            (Expr::Or(mut left), right) => {
                left.push(right);
                Expr::Or(left)
            }
            (left, right) => Expr::Or(vec![left, right]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Lower into a sea-query expression
    pub fn to_sea_query(&self) -> SqlExpr {
        match self {
            Expr::Column {
                table: Some(table),
                name,
            } => SqlExpr::col((Ident(table.clone()), Ident(name.clone()))),
            Expr::Column { table: None, name } => SqlExpr::col(Ident(name.clone())),
            Expr::Value(value) => SqlExpr::val(value.clone()),
            Expr::Compare { op, left, right } => {
                let (l, r) = (left.to_sea_query(), right.to_sea_query());
                match op {
                    BinOp::Eq => l.eq(r),
                    BinOp::Ne => l.ne(r),
                    BinOp::Gt => l.gt(r),
                    BinOp::Gte => l.gte(r),
                    BinOp::Lt => l.lt(r),
                    BinOp::Lte => l.lte(r),
                }
            }
            Expr::In { expr, values } => expr.to_sea_query().is_in(values.iter().cloned()),
            Expr::IsNull(expr) => expr.to_sea_query().is_null(),
            Expr::Func { name, args } => SqlExpr::FunctionCall(
                Func::cust(Ident(name.clone())).args(args.iter().map(Expr::to_sea_query)),
            ),
            Expr::And(items) => fold(items, true, |acc, e| acc.and(e)),
            Expr::Or(items) => fold(items, false, |acc, e| acc.or(e)),
            Expr::Not(expr) => expr.to_sea_query().not(),
        }
    }
}

fn fold(items: &[Expr], empty: bool, join: impl Fn(SqlExpr, SqlExpr) -> SqlExpr) -> SqlExpr {
    let mut iter = items.iter().map(Expr::to_sea_query);
    match iter.next() {
        Some(first) => iter.fold(first, join),
        None => SqlExpr::val(empty),
    }
}

/// Runtime identifier handed to sea-query
#[derive(Clone)]
pub(crate) struct Ident(pub(crate) Arc<str>);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}
