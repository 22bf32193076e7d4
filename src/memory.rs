//! In-memory executor.
//!
//! [`MemoryExecutor`] evaluates [`Select`] descriptors against tables held in
//! memory: nested-loop joins, restriction evaluation with SQL NULL semantics,
//! and projection onto the output schema's external keys. Every executed
//! statement is recorded as PostgreSQL text, which makes it the executor of
//! choice for tests that count round trips.

use crate::error::{Result, SchemaError};
use crate::executor::{Executor, JoinKind, Select, Tuple};
use crate::expr::{BinOp, Expr};
use crate::name::QualifiedName;
use crate::schema::{Attribute, ValueExpr};
use crate::types::is_null;
use sea_query::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Executor over in-memory tables keyed by dataset name
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: RwLock<HashMap<String, Vec<Tuple>>>,
    fetches: AtomicUsize,
    captured_sql: Arc<Mutex<Vec<String>>>,
}

/// One candidate output row: (table identifier, row) bindings, `None` for an
/// unmatched left join
type Binding<'a> = Vec<(&'a str, Option<&'a Tuple>)>;

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of `dataset`
    pub fn with_table(self, dataset: &str, rows: Vec<Tuple>) -> Self {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset.to_string(), rows);
        self
    }

    /// Current rows of `dataset`
    pub fn rows(&self, dataset: &str) -> Vec<Tuple> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dataset)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `fetch` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    /// SQL of every executed statement, in order
    pub fn captured_sql(&self) -> Vec<String> {
        self.captured_sql
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.fetches.store(0, AtomicOrdering::SeqCst);
        self.captured_sql
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn capture(&self, sql: String) {
        log::debug!("memory executor: {sql}");
        self.captured_sql
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql);
    }
}

impl Executor for MemoryExecutor {
    fn fetch(&self, select: &Select) -> Result<Vec<Tuple>> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        self.capture(select.to_sql());

        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let empty = Vec::new();
        let table = |name: &QualifiedName| tables.get(&*name.dataset).unwrap_or(&empty);

        let mut bindings: Vec<Binding<'_>> = table(&select.from)
            .iter()
            .map(|row| vec![(select.from.identifier(), Some(row))])
            .collect();

        for join in &select.joins {
            let condition = join.condition();
            let identifier = join.table.identifier();
            let mut next = Vec::new();
            for binding in bindings {
                let mut matched = false;
                for row in table(&join.table) {
                    let mut candidate = binding.clone();
                    candidate.push((identifier, Some(row)));
                    if truthy(&eval(&condition, &candidate)?) {
                        matched = true;
                        next.push(candidate);
                    }
                }
                if !matched && join.kind == JoinKind::Left {
                    let mut candidate = binding;
                    candidate.push((identifier, None));
                    next.push(candidate);
                }
            }
            bindings = next;
        }

        let mut rows = Vec::new();
        for binding in &bindings {
            if let Some(restriction) = &select.restriction {
                if !truthy(&eval(restriction, binding)?) {
                    continue;
                }
            }
            let mut out = Tuple::new();
            for attr in &select.schema {
                out.insert(attr.key().to_string(), project(attr, binding)?);
            }
            rows.push(out);
        }
        Ok(rows)
    }

    fn insert(&self, dataset: &QualifiedName, tuples: &[Tuple]) -> Result<u64> {
        self.capture(
            crate::executor::insert_statement(dataset, tuples)?
                .to_string(sea_query::PostgresQueryBuilder),
        );
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(dataset.dataset.to_string())
            .or_default()
            .extend(tuples.iter().cloned());
        Ok(tuples.len() as u64)
    }

    fn delete(&self, dataset: &QualifiedName, restriction: &Expr) -> Result<u64> {
        self.capture(
            crate::executor::delete_statement(dataset, restriction)
                .to_string(sea_query::PostgresQueryBuilder),
        );
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(&*dataset.dataset) else {
            return Ok(0);
        };
        let identifier = dataset.identifier();
        let matches = rows
            .iter()
            .map(|row| Ok(truthy(&eval(restriction, &vec![(identifier, Some(row))])?)))
            .collect::<Result<Vec<bool>>>()?;
        let removed = matches.iter().filter(|m| **m).count() as u64;
        let mut matches = matches.into_iter();
        rows.retain(|_| !matches.next().unwrap_or(false));
        Ok(removed)
    }
}

fn project(attr: &Attribute, binding: &Binding<'_>) -> Result<Value> {
    match attr.expr() {
        ValueExpr::Column => eval(&attr.to_expr(), binding),
        ValueExpr::Function { name, args } => {
            let args = args
                .iter()
                .map(|a| eval(&Expr::col(a), binding))
                .collect::<Result<Vec<_>>>()?;
            call(name, args)
        }
    }
}

fn call(name: &str, args: Vec<Value>) -> Result<Value> {
    match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("lower", [Value::String(Some(s))]) => Ok(Value::from(s.to_lowercase())),
        ("upper", [Value::String(Some(s))]) => Ok(Value::from(s.to_uppercase())),
        ("coalesce", values) => Ok(values
            .iter()
            .find(|v| !is_null(v))
            .cloned()
            .unwrap_or(Value::Bool(None))),
        _ => Err(SchemaError::Execution(format!(
            "function {name} is not supported in memory"
        ))),
    }
}

fn column(table: Option<&str>, name: &str, binding: &Binding<'_>) -> Result<Value> {
    let missing = || {
        SchemaError::Execution(match table {
            Some(table) => format!("unknown column {table}.{name}"),
            None => format!("unknown column {name}"),
        })
    };
    match table {
        Some(table) => match binding.iter().find(|(id, _)| *id == table) {
            Some((_, Some(row))) => row.get(name).cloned().ok_or_else(missing),
            Some((_, None)) => Ok(Value::Bool(None)),
            None => Err(missing()),
        },
        None => {
            for (_, row) in binding {
                if let Some(value) = row.and_then(|r| r.get(name)) {
                    return Ok(value.clone());
                }
            }
            if binding.iter().any(|(_, row)| row.is_none()) {
                Ok(Value::Bool(None))
            } else {
                Err(missing())
            }
        }
    }
}

fn eval(expr: &Expr, binding: &Binding<'_>) -> Result<Value> {
    Ok(match expr {
        Expr::Column { table, name } => column(table.as_deref(), name, binding)?,
        Expr::Value(value) => value.clone(),
        Expr::Compare { op, left, right } => {
            let ordering = compare(&eval(left, binding)?, &eval(right, binding)?);
            Value::Bool(ordering.map(|o| match op {
                BinOp::Eq => o == Ordering::Equal,
                BinOp::Ne => o != Ordering::Equal,
                BinOp::Gt => o == Ordering::Greater,
                BinOp::Gte => o != Ordering::Less,
                BinOp::Lt => o == Ordering::Less,
                BinOp::Lte => o != Ordering::Greater,
            }))
        }
        Expr::In { expr, values } => {
            let value = eval(expr, binding)?;
            if is_null(&value) {
                Value::Bool(None)
            } else {
                Value::Bool(Some(
                    values
                        .iter()
                        .any(|v| compare(&value, v) == Some(Ordering::Equal)),
                ))
            }
        }
        Expr::IsNull(inner) => Value::Bool(Some(is_null(&eval(inner, binding)?))),
        Expr::Func { name, args } => call(
            name,
            args.iter()
                .map(|a| eval(a, binding))
                .collect::<Result<Vec<_>>>()?,
        )?,
        Expr::And(items) => {
            let mut result = Some(true);
            for item in items {
                match as_bool(&eval(item, binding)?) {
                    Some(false) => return Ok(Value::Bool(Some(false))),
                    None => result = None,
                    Some(true) => {}
                }
            }
            Value::Bool(result)
        }
        Expr::Or(items) => {
            let mut result = Some(false);
            for item in items {
                match as_bool(&eval(item, binding)?) {
                    Some(true) => return Ok(Value::Bool(Some(true))),
                    None => result = None,
                    Some(false) => {}
                }
            }
            Value::Bool(result)
        }
        Expr::Not(inner) => Value::Bool(as_bool(&eval(inner, binding)?).map(|b| !b)),
    })
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => *b,
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    as_bool(value) == Some(true)
}

#[derive(Debug, PartialEq, PartialOrd)]
enum Scalar {
    Int(i128),
    Float(f64),
    Text(String),
    Bool(bool),
    Other(String),
}

fn scalar(value: &Value) -> Option<Scalar> {
    if is_null(value) {
        return None;
    }
    Some(match value {
        Value::Bool(Some(b)) => Scalar::Bool(*b),
        Value::TinyInt(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::SmallInt(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::Int(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::BigInt(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::TinyUnsigned(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::SmallUnsigned(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::Unsigned(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::BigUnsigned(Some(i)) => Scalar::Int(i128::from(*i)),
        Value::Float(Some(f)) => Scalar::Float(f64::from(*f)),
        Value::Double(Some(f)) => Scalar::Float(*f),
        Value::String(Some(s)) => Scalar::Text(s.to_string()),
        Value::Char(Some(c)) => Scalar::Text(c.to_string()),
        other => Scalar::Other(format!("{other:?}")),
    })
}

/// SQL comparison: `None` when either side is NULL or the kinds differ
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (scalar(left)?, scalar(right)?) {
        (Scalar::Int(a), Scalar::Float(b)) => (a as f64).partial_cmp(&b),
        (Scalar::Float(a), Scalar::Int(b)) => a.partial_cmp(&(b as f64)),
        (a, b) if std::mem::discriminant(&a) == std::mem::discriminant(&b) => a.partial_cmp(&b),
        _ => None,
    }
}
