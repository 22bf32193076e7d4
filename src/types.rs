//! Semantic attribute types.
//!
//! The core treats a [`Type`] as opaque: it only attaches and reads meta tags
//! and casts key values before they are compared or bound. Primitive names
//! follow the column type strings used by lifeguard's column definitions
//! (`"Integer"`, `"String"`, `"Uuid"`, ...).

use crate::error::{Result, SchemaError};
use sea_query::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Primitive storage type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Integer,
    BigInteger,
    String,
    Boolean,
    Float,
    Double,
    Json,
    Uuid,
    Timestamp,
    Date,
    /// Untyped; values pass through unchanged
    Any,
}

impl Primitive {
    /// Parse a column type string (case-insensitive)
    ///
    /// Unknown names map to [`Primitive::Any`].
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "integer" | "i32" | "int" | "smallint" | "i16" => Primitive::Integer,
            "bigint" | "i64" | "big_integer" => Primitive::BigInteger,
            "string" | "text" | "varchar" | "char" => Primitive::String,
            "boolean" | "bool" => Primitive::Boolean,
            "float" | "f32" | "real" => Primitive::Float,
            "double" | "f64" | "double_precision" => Primitive::Double,
            "json" | "jsonb" => Primitive::Json,
            "uuid" => Primitive::Uuid,
            "timestamp" | "datetime" | "timestamptz" => Primitive::Timestamp,
            "date" => Primitive::Date,
            _ => Primitive::Any,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Primitive::Integer => "Integer",
            Primitive::BigInteger => "BigInteger",
            Primitive::String => "String",
            Primitive::Boolean => "Boolean",
            Primitive::Float => "Float",
            Primitive::Double => "Double",
            Primitive::Json => "Json",
            Primitive::Uuid => "Uuid",
            Primitive::Timestamp => "Timestamp",
            Primitive::Date => "Date",
            Primitive::Any => "Any",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value stored under a type meta key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaValue {
    Flag(bool),
    Int(i64),
    Text(Arc<str>),
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Flag(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(Arc::from(v))
    }
}

/// Semantic type of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    primitive: Primitive,
    optional: bool,
    meta: BTreeMap<Arc<str>, MetaValue>,
}

impl Type {
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            optional: false,
            meta: BTreeMap::new(),
        }
    }

    pub fn integer() -> Self {
        Self::new(Primitive::Integer)
    }

    pub fn string() -> Self {
        Self::new(Primitive::String)
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Same type, accepting NULL
    pub fn optional(&self) -> Self {
        Self {
            optional: true,
            ..self.clone()
        }
    }

    /// Same type with `key` set to `value`
    pub fn meta(&self, key: &str, value: impl Into<MetaValue>) -> Self {
        let mut meta = self.meta.clone();
        meta.insert(Arc::from(key), value.into());
        Self {
            meta,
            ..self.clone()
        }
    }

    pub fn meta_value(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    /// Coerce `value` into this type's representation
    ///
    /// Integer widths are converted when the value fits, numeric strings are
    /// parsed for integer types, and NULL is accepted only for optional types.
    pub fn cast(&self, value: Value) -> Result<Value> {
        let fail = |value: &Value| SchemaError::Cast {
            expected: self.primitive.to_string(),
            value: format!("{value:?}"),
        };

        match (self.primitive, &value) {
            (Primitive::Any, _) => Ok(value),
            (_, v) if is_null(v) => {
                if self.optional {
                    Ok(value)
                } else {
                    Err(fail(v))
                }
            }
            (Primitive::Integer, Value::Int(Some(_))) => Ok(value),
            (Primitive::Integer, Value::BigInt(Some(i))) => i32::try_from(*i)
                .map(Value::from)
                .map_err(|_| fail(&value)),
            (Primitive::Integer, Value::SmallInt(Some(i))) => Ok(Value::from(i32::from(*i))),
            (Primitive::Integer, Value::String(Some(s))) => {
                s.trim().parse::<i32>().map(Value::from).map_err(|_| fail(&value))
            }
            (Primitive::BigInteger, Value::BigInt(Some(_))) => Ok(value),
            (Primitive::BigInteger, Value::Int(Some(i))) => Ok(Value::from(i64::from(*i))),
            (Primitive::BigInteger, Value::SmallInt(Some(i))) => Ok(Value::from(i64::from(*i))),
            (Primitive::BigInteger, Value::String(Some(s))) => {
                s.trim().parse::<i64>().map(Value::from).map_err(|_| fail(&value))
            }
            (Primitive::String, Value::String(Some(_))) => Ok(value),
            (Primitive::Boolean, Value::Bool(Some(_))) => Ok(value),
            (Primitive::Float, Value::Float(Some(_))) => Ok(value),
            (Primitive::Double, Value::Double(Some(_))) => Ok(value),
            (Primitive::Double, Value::Float(Some(f))) => Ok(Value::from(f64::from(*f))),
            (Primitive::Uuid, Value::String(Some(s))) => uuid::Uuid::parse_str(s.trim())
                .map(Value::from)
                .map_err(|_| fail(&value)),
            (Primitive::Json, Value::String(Some(s))) => serde_json::from_str::<serde_json::Value>(s)
                .map(Value::from)
                .map_err(|_| fail(&value)),
            (Primitive::Timestamp, Value::String(Some(s))) => s
                .trim()
                .parse::<chrono::NaiveDateTime>()
                .map(Value::from)
                .map_err(|_| fail(&value)),
            (Primitive::Date, Value::String(Some(s))) => s
                .trim()
                .parse::<chrono::NaiveDate>()
                .map(Value::from)
                .map_err(|_| fail(&value)),
            (Primitive::Json, Value::Json(Some(_))) => Ok(value),
            (Primitive::Uuid, Value::Uuid(Some(_))) => Ok(value),
            (
                Primitive::Timestamp,
                Value::ChronoDateTime(Some(_))
                | Value::ChronoDateTimeUtc(Some(_))
                | Value::ChronoDateTimeLocal(Some(_))
                | Value::ChronoDateTimeWithTimeZone(Some(_)),
            ) => Ok(value),
            (Primitive::Date, Value::ChronoDate(Some(_))) => Ok(value),
            _ => Err(fail(&value)),
        }
    }
}

pub(crate) fn is_null(value: &Value) -> bool {
    !value.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_parse() {
        assert_eq!(Primitive::parse("Integer"), Primitive::Integer);
        assert_eq!(Primitive::parse("i64"), Primitive::BigInteger);
        assert_eq!(Primitive::parse("TEXT"), Primitive::String);
        assert_eq!(Primitive::parse("geometry"), Primitive::Any);
    }

    #[test]
    fn test_optional_and_meta_are_persistent() {
        let base = Type::integer();
        let opt = base.optional().meta("read", "Integer");
        assert!(!base.is_optional());
        assert!(base.meta_value("read").is_none());
        assert!(opt.is_optional());
        assert_eq!(opt.meta_value("read"), Some(&MetaValue::from("Integer")));
    }

    #[test]
    fn test_cast_integer() {
        let ty = Type::integer();
        assert_eq!(ty.cast(Value::from(7i32)).unwrap(), Value::from(7i32));
        assert_eq!(ty.cast(Value::from(7i64)).unwrap(), Value::from(7i32));
        assert_eq!(ty.cast(Value::from("42".to_string())).unwrap(), Value::from(42i32));
        assert!(ty.cast(Value::from("abc".to_string())).is_err());
        assert!(ty.cast(Value::from(i64::MAX)).is_err());
    }

    #[test]
    fn test_cast_parses_text_representations() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            Type::new(Primitive::Uuid).cast(Value::from(id.to_string())).unwrap(),
            Value::from(id)
        );
        assert!(Type::new(Primitive::Uuid).cast(Value::from("nope".to_string())).is_err());

        assert_eq!(
            Type::new(Primitive::Json)
                .cast(Value::from(r#"{"a":1}"#.to_string()))
                .unwrap(),
            Value::from(serde_json::json!({"a": 1}))
        );

        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            Type::new(Primitive::Date).cast(Value::from("2024-02-29".to_string())).unwrap(),
            Value::from(date)
        );
        assert_eq!(
            Type::new(Primitive::Timestamp)
                .cast(Value::from("2024-02-29T12:30:00".to_string()))
                .unwrap(),
            Value::from(date.and_hms_opt(12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_cast_null_requires_optional() {
        assert!(Type::integer().cast(Value::Int(None)).is_err());
        assert_eq!(
            Type::integer().optional().cast(Value::Int(None)).unwrap(),
            Value::Int(None)
        );
    }

    #[test]
    fn test_cast_mismatch() {
        let err = Type::string().cast(Value::from(true)).unwrap_err();
        assert!(matches!(err, SchemaError::Cast { .. }));
    }

    #[test]
    fn test_cast_typed_values_must_match_primitive() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(Type::new(Primitive::Uuid).cast(Value::from(id)).unwrap(), Value::from(id));
        assert!(Type::new(Primitive::Uuid).cast(Value::from(5i32)).is_err());
        assert!(Type::new(Primitive::Json).cast(Value::from(true)).is_err());

        let now = chrono::Utc::now();
        assert_eq!(
            Type::new(Primitive::Timestamp).cast(Value::from(now)).unwrap(),
            Value::from(now)
        );
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert!(Type::new(Primitive::Timestamp).cast(Value::from(date)).is_err());
        assert!(Type::new(Primitive::Date).cast(Value::from(id)).is_err());
    }

    #[test]
    fn test_null_of_every_variant() {
        for value in [
            Value::Int(None),
            Value::String(None),
            Value::Decimal(None),
            Value::ChronoTime(None),
            Value::ChronoDateTimeUtc(None),
            Value::ChronoDateTimeLocal(None),
            Value::ChronoDateTimeWithTimeZone(None),
        ] {
            assert!(is_null(&value), "{value:?}");
            assert!(Type::integer().cast(value.clone()).is_err());
        }
        assert!(!is_null(&Value::from(0i32)));
    }
}
