//! value representation
//!
//! Expansion works on the following data types
//! - boolean (true/false)
//! - integer (signed, currently: i64 - may change)
//! - decimal (currently: f64 - may change)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally, because expansion happens at *check* time rather than run
//! time, two more states exist that ordinary evaluation does not have:
//! - `null`: the expression resolved to an explicit null
//! - `unknown`: the expression cannot be resolved yet (it depends on
//!   information that is not available to a static check); an unknown value
//!   may still carry a [TypeHint] describing the type it will eventually have
//!
//! Every value also carries a set of [Marks]: opaque tags that travel with a
//! value through every operation that derives new values from it. Any
//! operation that decomposes a marked value re-attaches the marks to every
//! value derived from it unless it documents otherwise.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// Opaque tags attached to a value, propagated through derived values.
pub type Marks = indexmap::IndexSet<String>;

/// A value paired with its marks.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub kind: ValueKind,
    pub marks: Marks,
}

/// All possible value states
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Null,
    Unknown(TypeHint),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
}

/// The type a value is expected (or known) to have.
///
/// Used as the target of conversions and as the residual type information of
/// unknown values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Any,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl TypeHint {
    /// Friendly type name as it appears in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            TypeHint::Any => "dynamic",
            TypeHint::Bool => "bool",
            TypeHint::Number => "number",
            TypeHint::String => "string",
            TypeHint::Array => "tuple",
            TypeHint::Object => "object",
        }
    }
}

impl Value {
    pub fn null() -> Self {
        ValueKind::Null.into()
    }

    pub fn unknown(hint: TypeHint) -> Self {
        ValueKind::Unknown(hint).into()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self.kind, ValueKind::Unknown(_))
    }

    pub fn can_iterate_elements(&self) -> bool {
        matches!(self.kind, ValueKind::Array(_) | ValueKind::Object(_))
    }

    /// Friendly type name as it appears in diagnostics
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Null => "null",
            ValueKind::Unknown(hint) => hint.name(),
            ValueKind::Boolean(_) => "bool",
            ValueKind::Integer(_) | ValueKind::Decimal(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "tuple",
            ValueKind::Object(_) => "object",
        }
    }

    pub fn type_hint(&self) -> TypeHint {
        match &self.kind {
            ValueKind::Null => TypeHint::Any,
            ValueKind::Unknown(hint) => *hint,
            ValueKind::Boolean(_) => TypeHint::Bool,
            ValueKind::Integer(_) | ValueKind::Decimal(_) => TypeHint::Number,
            ValueKind::String(_) => TypeHint::String,
            ValueKind::Array(_) => TypeHint::Array,
            ValueKind::Object(_) => TypeHint::Object,
        }
    }

    /// Enumerate `(key, value)` pairs in the collection's natural order.
    ///
    /// Arrays yield zero-based integer keys, objects yield their keys in
    /// insertion order. The collection's marks are re-attached to every
    /// derived key and value. Returns `None` for non-collections.
    pub fn iterate_elements(&self) -> Option<Vec<(Value, Value)>> {
        match &self.kind {
            ValueKind::Array(items) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        (
                            Value::from(index as i64).with_marks(&self.marks),
                            element.clone().with_marks(&self.marks),
                        )
                    })
                    .collect(),
            ),
            ValueKind::Object(fields) => Some(
                fields
                    .iter()
                    .map(|(key, element)| {
                        (
                            Value::from(key.as_str()).with_marks(&self.marks),
                            element.clone().with_marks(&self.marks),
                        )
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_marked(&self) -> bool {
        !self.marks.is_empty()
    }

    /// Split this value into its unmarked form and the marks it carried.
    ///
    /// Shallow: marks on nested elements stay where they are.
    pub fn unmark(&self) -> (Value, Marks) {
        let mut unmarked = self.clone();
        let marks = std::mem::take(&mut unmarked.marks);
        (unmarked, marks)
    }

    pub fn with_marks(mut self, marks: &Marks) -> Value {
        for mark in marks {
            self.marks.insert(mark.clone());
        }
        self
    }

    pub fn with_mark(mut self, mark: impl Into<String>) -> Value {
        self.marks.insert(mark.into());
        self
    }

    /// Union of this value's marks and those of all nested values.
    pub fn collect_marks(&self, into: &mut Marks) {
        for mark in &self.marks {
            into.insert(mark.clone());
        }
        match &self.kind {
            ValueKind::Array(items) => {
                for item in items {
                    item.collect_marks(into);
                }
            }
            ValueKind::Object(fields) => {
                for field in fields.values() {
                    field.collect_marks(into);
                }
            }
            _ => {}
        }
    }

    /// Convert to the target type.
    ///
    /// Pure: `self` is untouched, marks carry over to the result. Nulls
    /// convert to null of any type, unknowns narrow their hint to the target.
    pub fn convert(&self, target: TypeHint) -> Result<Value, ConversionError> {
        let converted = match (&self.kind, target) {
            (_, TypeHint::Any) => self.kind.clone(),
            (ValueKind::Null, _) => ValueKind::Null,
            (ValueKind::Unknown(_), _) => ValueKind::Unknown(target),

            (ValueKind::String(s), TypeHint::String) => ValueKind::String(s.clone()),
            (ValueKind::Integer(i), TypeHint::String) => ValueKind::String(i.to_string()),
            (ValueKind::Decimal(d), TypeHint::String) => ValueKind::String(d.to_string()),
            (ValueKind::Boolean(b), TypeHint::String) => ValueKind::String(b.to_string()),

            (ValueKind::Integer(i), TypeHint::Number) => ValueKind::Integer(*i),
            (ValueKind::Decimal(d), TypeHint::Number) => ValueKind::Decimal(*d),
            (ValueKind::String(s), TypeHint::Number) => {
                if let Ok(i) = s.parse::<i64>() {
                    ValueKind::Integer(i)
                } else if let Ok(d) = s.parse::<f64>() {
                    ValueKind::Decimal(d)
                } else {
                    return Err(ConversionError::MalformedNumber(s.clone()));
                }
            }

            (ValueKind::Boolean(b), TypeHint::Bool) => ValueKind::Boolean(*b),
            (ValueKind::String(s), TypeHint::Bool) => match s.as_str() {
                "true" => ValueKind::Boolean(true),
                "false" => ValueKind::Boolean(false),
                _ => return Err(ConversionError::MalformedBool(s.clone())),
            },

            (ValueKind::Array(items), TypeHint::Array) => ValueKind::Array(items.clone()),
            (ValueKind::Object(fields), TypeHint::Object) => ValueKind::Object(fields.clone()),

            _ => {
                return Err(ConversionError::Incompatible {
                    from: self.type_name(),
                    to: target.name(),
                })
            }
        };

        Ok(Value {
            kind: converted,
            marks: self.marks.clone(),
        })
    }

    /// Materialize as an [hcl::Value], if no part of this value is unknown.
    ///
    /// Marks are stripped; callers that care about them collect them first.
    pub fn as_hcl(&self) -> Option<hcl::Value> {
        match &self.kind {
            ValueKind::Null => Some(hcl::Value::Null),
            ValueKind::Unknown(_) => None,
            ValueKind::Boolean(b) => Some(hcl::Value::Bool(*b)),
            ValueKind::Integer(i) => Some(hcl::Value::Number(hcl::Number::from(*i))),
            ValueKind::Decimal(d) => hcl::Number::from_f64(*d).map(hcl::Value::Number),
            ValueKind::String(s) => Some(hcl::Value::String(s.clone())),
            ValueKind::Array(items) => items
                .iter()
                .map(Value::as_hcl)
                .collect::<Option<Vec<_>>>()
                .map(hcl::Value::Array),
            ValueKind::Object(fields) => fields
                .iter()
                .map(|(key, field)| field.as_hcl().map(|value| (key.clone(), value)))
                .collect::<Option<hcl::value::Map<String, hcl::Value>>>()
                .map(hcl::Value::Object),
        }
    }
}

/// Conversion failures, rendered into diagnostic details
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("cannot convert {from} to {to}")]
    Incompatible {
        from: &'static str,
        to: &'static str,
    },
    #[error("a number is required, but the string {0:?} cannot be parsed as one")]
    MalformedNumber(String),
    #[error("a bool is required, but the string {0:?} is neither \"true\" nor \"false\"")]
    MalformedBool(String),
    #[error("a whole number is required")]
    FractionalNumber,
}

impl From<ValueKind> for Value {
    fn from(kind: ValueKind) -> Self {
        Value {
            kind,
            marks: Marks::default(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        ValueKind::Boolean(value).into()
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        ValueKind::Integer(value).into()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        ValueKind::Decimal(value).into()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        ValueKind::String(value).into()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        ValueKind::String(value.to_string()).into()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        ValueKind::Array(value.into_iter().map(Into::into).collect()).into()
    }
}

impl<K: ToString, V: Into<Value>> From<indexmap::IndexMap<K, V>> for Value {
    fn from(value: indexmap::IndexMap<K, V>) -> Self {
        ValueKind::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
        .into()
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return ValueKind::Integer(int).into();
        }

        match value.as_f64() {
            Some(float) => ValueKind::Decimal(float).into(),
            // a numeric value that fits neither i64 nor f64 cannot be represented
            None => ValueKind::Unknown(TypeHint::Number).into(),
        }
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::null(),
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => ValueKind::Object(
                o.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )
            .into(),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.kind {
            ValueKind::Null => serializer.serialize_unit(),
            ValueKind::Unknown(TypeHint::Any) => serializer.serialize_str("(unknown)"),
            ValueKind::Unknown(hint) => {
                serializer.serialize_str(&format!("(unknown {})", hint.name()))
            }
            ValueKind::Boolean(value) => serializer.serialize_bool(*value),
            ValueKind::Integer(value) => serializer.serialize_i64(*value),
            ValueKind::Decimal(value) => serializer.serialize_f64(*value),
            ValueKind::String(value) => serializer.serialize_str(value),
            ValueKind::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            ValueKind::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn iterate_array_reattaches_marks() {
        let list = Value::from(vec!["a", "b"]).with_mark("boop");
        let pairs = list.iterate_elements().unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, Value::from(0i64).with_mark("boop"));
        assert_eq!(pairs[0].1, Value::from("a").with_mark("boop"));
        assert_eq!(pairs[1].0, Value::from(1i64).with_mark("boop"));
    }

    #[test]
    fn iterate_object_preserves_insertion_order() {
        let mut fields = indexmap::IndexMap::new();
        fields.insert("zulu", Value::from(1i64));
        fields.insert("alpha", Value::from(2i64));
        let object = Value::from(fields);

        let keys: Vec<_> = object
            .iterate_elements()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![Value::from("zulu"), Value::from("alpha")]);
    }

    #[test]
    fn scalars_do_not_iterate() {
        assert!(Value::from("x").iterate_elements().is_none());
        assert!(!Value::from(1i64).can_iterate_elements());
    }

    #[test]
    fn convert_integer_to_string() {
        let converted = Value::from(7i64).convert(TypeHint::String).unwrap();
        assert_eq!(converted, Value::from("7"));
    }

    #[test]
    fn convert_preserves_marks() {
        let converted = Value::from(7i64)
            .with_mark("boop")
            .convert(TypeHint::String)
            .unwrap();
        assert!(converted.is_marked());
    }

    #[test]
    fn convert_null_is_total() {
        assert_eq!(
            Value::null().convert(TypeHint::String).unwrap(),
            Value::null()
        );
    }

    #[test]
    fn convert_unknown_narrows_hint() {
        let converted = Value::unknown(TypeHint::Any)
            .convert(TypeHint::String)
            .unwrap();
        assert_eq!(converted, Value::unknown(TypeHint::String));
    }

    #[test]
    fn convert_object_to_string_fails() {
        let object = Value::from(indexmap::IndexMap::<&str, Value>::new());
        assert_eq!(
            object.convert(TypeHint::String),
            Err(ConversionError::Incompatible {
                from: "object",
                to: "string"
            })
        );
    }

    #[test]
    fn unmark_splits_value_and_marks() {
        let (value, marks) = Value::from("s").with_mark("boop").unmark();
        assert_eq!(value, Value::from("s"));
        assert_eq!(marks.len(), 1);
        assert!(marks.contains("boop"));
    }

    #[test]
    fn unknown_is_not_null() {
        let unknown = Value::unknown(TypeHint::Any);
        assert!(!unknown.is_null());
        assert!(!unknown.is_known());
        assert!(Value::null().is_known());
    }

    #[test]
    fn materialize_rejects_unknowns() {
        let list = Value::from(vec![Value::from("a"), Value::unknown(TypeHint::String)]);
        assert!(list.as_hcl().is_none());
        assert_eq!(
            Value::from(vec!["a"]).as_hcl(),
            Some(hcl::Value::Array(vec![hcl::Value::String("a".into())]))
        );
    }
}
