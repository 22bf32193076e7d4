//! Relation identity.
//!
//! A [`RelationName`] pairs the logical relation name (the registry key) with
//! the physical dataset and an optional alias. The same dataset can therefore
//! appear twice in one query under different aliases, which is how
//! self-referential associations avoid ambiguous SQL.
//!
//! Names are interned: constructing a structurally equal name returns the
//! shared instance. The interning table is guarded by an `RwLock`, so names
//! can be created from any thread.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct NameData {
    relation: Arc<str>,
    dataset: Arc<str>,
    alias: Option<Arc<str>>,
}

static NAMES: Lazy<RwLock<HashMap<Arc<NameData>, RelationName>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn intern(data: NameData) -> RelationName {
    if let Some(name) = NAMES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&data)
    {
        return name.clone();
    }
    let data = Arc::new(data);
    NAMES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(data.clone())
        .or_insert_with(|| RelationName(data))
        .clone()
}

/// Identity of a relation: logical name, dataset and optional alias
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationName(Arc<NameData>);

impl RelationName {
    /// Relation whose dataset differs from its logical name
    pub fn new(relation: &str, dataset: &str) -> Self {
        intern(NameData {
            relation: Arc::from(relation),
            dataset: Arc::from(dataset),
            alias: None,
        })
    }

    /// Relation stored in a dataset of the same name
    pub fn named(relation: &str) -> Self {
        Self::new(relation, relation)
    }

    /// Logical name, used as the registry key
    pub fn relation(&self) -> &str {
        &self.0.relation
    }

    /// Physical table name
    pub fn dataset(&self) -> &str {
        &self.0.dataset
    }

    pub fn alias(&self) -> Option<&str> {
        self.0.alias.as_deref()
    }

    pub fn is_aliased(&self) -> bool {
        self.0.alias.is_some()
    }

    /// Same relation and dataset under `alias`
    pub fn aliased(&self, alias: &str) -> Self {
        intern(NameData {
            relation: self.0.relation.clone(),
            dataset: self.0.dataset.clone(),
            alias: Some(Arc::from(alias)),
        })
    }

    /// Same relation and dataset without an alias
    pub fn unaliased(&self) -> Self {
        if self.0.alias.is_none() {
            return self.clone();
        }
        intern(NameData {
            relation: self.0.relation.clone(),
            dataset: self.0.dataset.clone(),
            alias: None,
        })
    }

    /// The (dataset, alias) pair used in SQL
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName {
            dataset: self.0.dataset.clone(),
            alias: self.0.alias.clone(),
        }
    }

    /// Name columns of this relation are qualified with: alias or dataset
    pub fn identifier(&self) -> &str {
        self.alias().unwrap_or_else(|| self.dataset())
    }

    /// `true` when both names share the same shared instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RelationName");
        s.field("relation", &self.0.relation)
            .field("dataset", &self.0.dataset);
        if let Some(alias) = &self.0.alias {
            s.field("alias", alias);
        }
        s.finish()
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relation())
    }
}

impl From<&str> for RelationName {
    fn from(name: &str) -> Self {
        RelationName::named(name)
    }
}

/// Dataset reference as it appears in a `FROM` or `JOIN` clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub dataset: Arc<str>,
    pub alias: Option<Arc<str>>,
}

impl QualifiedName {
    pub fn new(dataset: &str) -> Self {
        Self {
            dataset: Arc::from(dataset),
            alias: None,
        }
    }

    pub fn aliased(&self, alias: &str) -> Self {
        Self {
            dataset: self.dataset.clone(),
            alias: Some(Arc::from(alias)),
        }
    }

    /// Alias if present, else the dataset
    pub fn identifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.dataset)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.dataset, alias),
            None => f.write_str(&self.dataset),
        }
    }
}
