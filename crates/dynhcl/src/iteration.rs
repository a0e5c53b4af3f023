//! iterator variable bindings for generated blocks
//!
//! Every generated block owns an [Iteration]: the binding of its directive's
//! iterator name to the `(key, value)` pair it was generated for, chained to
//! the iteration of the enclosing directive (if any). The chain is
//! persistent: extending it builds a new link and never touches the parent,
//! so a published iteration can be read from any number of threads and a
//! nested level can only ever reference already-built outer levels.
use crate::eval::Scope;
use crate::value::{Marks, TypeHint, Value};
use std::sync::Arc;

/// Binding name of the `count` meta-argument (`count.index`)
const COUNT_NAME: &str = "count";
/// Binding name of the `for_each` meta-argument (`each.key` / `each.value`)
const EACH_NAME: &str = "each";

/// One level of dynamic-block iterator bindings
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    iterator_name: String,
    key: Value,
    value: Value,
    parent: Option<Arc<Iteration>>,
}

impl Iteration {
    pub fn new(
        iterator_name: impl Into<String>,
        key: Value,
        value: Value,
        parent: Option<Arc<Iteration>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            iterator_name: iterator_name.into(),
            key,
            value,
            parent,
        })
    }

    /// An iteration whose element is not yet resolvable: key and value are
    /// unknown, carrying the marks of the deferred collection.
    pub fn unknown(
        iterator_name: impl Into<String>,
        marks: &Marks,
        parent: Option<Arc<Iteration>>,
    ) -> Arc<Self> {
        Self::new(
            iterator_name,
            Value::unknown(TypeHint::Any).with_marks(marks),
            Value::unknown(TypeHint::Any).with_marks(marks),
            parent,
        )
    }

    pub fn iterator_name(&self) -> &str {
        &self.iterator_name
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Build the evaluation scope for content governed by this iteration:
    /// the ambient scope with every chain level's `{name => {key, value}}`
    /// binding layered on top, outermost level first, so an inner level
    /// reusing a name shadows the outer one.
    pub fn scope(&self, ambient: &Scope) -> Scope {
        let mut scope = match &self.parent {
            Some(parent) => parent.scope(ambient),
            None => ambient.clone(),
        };

        let mut binding = indexmap::IndexMap::new();
        binding.insert("key".to_string(), self.key.clone());
        binding.insert("value".to_string(), self.value.clone());
        scope.declare_var(self.iterator_name.clone(), Value::from(binding));

        scope
    }
}

/// count/for_each meta-argument binding for one generated copy of a block
///
/// Unlike dynamic blocks these bind fixed names: `count` exposes the copy's
/// `index`, `each` exposes the element's `key` and `value`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaArgIteration {
    Count { index: Value },
    ForEach { key: Value, value: Value },
}

impl MetaArgIteration {
    pub fn count(index: i64) -> Self {
        MetaArgIteration::Count {
            index: Value::from(index),
        }
    }

    pub fn unknown_count(marks: &Marks) -> Self {
        MetaArgIteration::Count {
            index: Value::unknown(TypeHint::Number).with_marks(marks),
        }
    }

    pub fn for_each(key: Value, value: Value) -> Self {
        MetaArgIteration::ForEach { key, value }
    }

    pub fn unknown_for_each(marks: &Marks) -> Self {
        MetaArgIteration::ForEach {
            key: Value::unknown(TypeHint::Any).with_marks(marks),
            value: Value::unknown(TypeHint::Any).with_marks(marks),
        }
    }

    pub fn scope(&self, ambient: &Scope) -> Scope {
        let mut binding = indexmap::IndexMap::new();
        let name = match self {
            MetaArgIteration::Count { index } => {
                binding.insert("index".to_string(), index.clone());
                COUNT_NAME
            }
            MetaArgIteration::ForEach { key, value } => {
                binding.insert("key".to_string(), key.clone());
                binding.insert("value".to_string(), value.clone());
                EACH_NAME
            }
        };

        ambient.clone().with_var(name, Value::from(binding))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(scope: &Scope, source: &str) -> Value {
        let expression: hcl_edit::expr::Expression =
            source.parse().expect("expression must parse");
        let (value, diagnostics) = scope.evaluate_edit(&expression);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        value
    }

    #[test]
    fn binds_key_and_value() {
        let iteration = Iteration::new("it", Value::from(0i64), Value::from("elem"), None);
        let scope = iteration.scope(&Scope::new());

        assert_eq!(eval(&scope, "it.key"), Value::from(0i64));
        assert_eq!(eval(&scope, "it.value"), Value::from("elem"));
    }

    #[test]
    fn chain_keeps_outer_bindings_visible() {
        let outer = Iteration::new("outer", Value::from("k"), Value::from("v"), None);
        let inner = Iteration::new(
            "inner",
            Value::from(1i64),
            Value::from("w"),
            Some(outer),
        );
        let scope = inner.scope(&Scope::new().with_var("ambient", "a"));

        assert_eq!(eval(&scope, "outer.value"), Value::from("v"));
        assert_eq!(eval(&scope, "inner.value"), Value::from("w"));
        assert_eq!(eval(&scope, "ambient"), Value::from("a"));
    }

    #[test]
    fn inner_level_shadows_same_name() {
        let outer = Iteration::new("it", Value::from("k"), Value::from("outer"), None);
        let inner = Iteration::new("it", Value::from("k"), Value::from("inner"), Some(outer));
        let scope = inner.scope(&Scope::new());

        assert_eq!(eval(&scope, "it.value"), Value::from("inner"));
    }

    #[test]
    fn meta_arg_bindings() {
        let scope = MetaArgIteration::count(2).scope(&Scope::new());
        assert_eq!(eval(&scope, "count.index"), Value::from(2i64));

        let scope = MetaArgIteration::for_each(Value::from("k"), Value::from("v"))
            .scope(&Scope::new());
        assert_eq!(eval(&scope, "each.key"), Value::from("k"));
        assert_eq!(eval(&scope, "each.value"), Value::from("v"));
    }
}
