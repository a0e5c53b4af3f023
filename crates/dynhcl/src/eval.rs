//! expression evaluation against a scope
//!
//! A [Scope] is the set of variables visible to an expression. Evaluation
//! has to keep working when some of those variables are null, unknown or
//! marked, which [hcl::eval] alone cannot express, so it is split in two:
//!
//! - variables, attribute/index traversals, literals and the container
//!   expressions around them are evaluated directly, propagating
//!   null/unknown/marks per element;
//! - everything else (function calls, operations, conditionals, templates,
//!   `for` expressions, splats) is handed to [hcl::eval::Context] with the
//!   referenced variables materialized. If any referenced variable contains
//!   an unknown, the whole result is unknown; either way the result carries
//!   the union of the referenced variables' marks.
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::value::{Marks, TypeHint, Value, ValueKind};
use crate::visit::VisitVariables;
use hcl::eval::Evaluate;
use hcl::{Expression, TraversalOperator, Variable};
use hcl_edit::Span;

/// Variable bindings visible to expression evaluation
///
/// Immutable once published: layering bindings on top always builds a new
/// scope, so a scope handed to a generated block can never change under it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    variables: indexmap::IndexMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declare_var(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Evaluate an expression still carrying its source span.
    ///
    /// Diagnostics that could not be pinned to a more precise location get
    /// the expression's own span attached.
    pub fn evaluate_edit(&self, expression: &hcl_edit::expr::Expression) -> (Value, Diagnostics) {
        let converted: Expression = expression.clone().into();
        let (value, diagnostics) = self.evaluate(&converted);
        (value, diagnostics.with_span(expression.span()))
    }

    pub fn evaluate(&self, expression: &Expression) -> (Value, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let value = self.eval_expr(expression, &mut diagnostics);
        (value, diagnostics)
    }

    fn eval_expr(&self, expression: &Expression, diagnostics: &mut Diagnostics) -> Value {
        match expression {
            Expression::Null => Value::null(),
            Expression::Bool(b) => (*b).into(),
            Expression::Number(n) => n.clone().into(),
            Expression::String(s) => s.clone().into(),
            Expression::Array(items) => Value::from(
                items
                    .iter()
                    .map(|item| self.eval_expr(item, diagnostics))
                    .collect::<Vec<_>>(),
            ),
            Expression::Object(object) => {
                let mut fields = indexmap::IndexMap::new();
                for (key, value) in object {
                    let Some(key) = self.eval_object_key(key, diagnostics) else {
                        continue;
                    };
                    fields.insert(key, self.eval_expr(value, diagnostics));
                }
                Value::from(fields)
            }
            Expression::Parenthesis(inner) => self.eval_expr(inner, diagnostics),
            Expression::Variable(variable) => match self.variables.get(variable.as_str()) {
                Some(value) => value.clone(),
                None => {
                    diagnostics.push(Diagnostic::error(
                        "Undefined variable",
                        format!(
                            "There is no variable named {:?} in the current scope.",
                            variable.as_str()
                        ),
                    ));
                    Value::unknown(TypeHint::Any)
                }
            },
            Expression::Traversal(traversal) => self.eval_traversal(traversal, diagnostics),
            other => self.eval_with_context(other, diagnostics),
        }
    }

    fn eval_object_key(
        &self,
        key: &hcl::ObjectKey,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        match key {
            hcl::ObjectKey::Identifier(ident) => Some(ident.to_string()),
            hcl::ObjectKey::Expression(expr) => {
                let value = self.eval_expr(expr, diagnostics);
                match value.convert(TypeHint::String) {
                    Ok(value) if value.is_known() && !value.is_null() => match value.kind {
                        ValueKind::String(s) => Some(s),
                        _ => None,
                    },
                    _ => {
                        diagnostics.push(Diagnostic::error(
                            "Invalid object key",
                            "Object keys must resolve to known, non-null strings.",
                        ));
                        None
                    }
                }
            }
            _ => {
                diagnostics.push(Diagnostic::error(
                    "Invalid object key",
                    "Object keys must resolve to known, non-null strings.",
                ));
                None
            }
        }
    }

    fn eval_traversal(&self, traversal: &hcl::Traversal, diagnostics: &mut Diagnostics) -> Value {
        // splat semantics are hcl's business
        let has_splat = traversal
            .operators
            .iter()
            .any(|op| matches!(op, TraversalOperator::AttrSplat | TraversalOperator::FullSplat));
        if has_splat {
            return self.eval_with_context(
                &Expression::Traversal(Box::new(traversal.clone())),
                diagnostics,
            );
        }

        let mut current = self.eval_expr(&traversal.expr, diagnostics);
        for operator in &traversal.operators {
            current = match operator {
                TraversalOperator::GetAttr(name) => {
                    self.step_attr(current, name.as_str(), diagnostics)
                }
                TraversalOperator::Index(index_expr) => {
                    let index = self.eval_expr(index_expr, diagnostics);
                    self.step_index(current, index, diagnostics)
                }
                TraversalOperator::LegacyIndex(index) => {
                    self.step_index(current, Value::from(*index as i64), diagnostics)
                }
                // splats were routed through eval_with_context above
                TraversalOperator::AttrSplat | TraversalOperator::FullSplat => current,
            };
        }
        current
    }

    fn step_attr(&self, base: Value, name: &str, diagnostics: &mut Diagnostics) -> Value {
        let (base, marks) = base.unmark();
        match &base.kind {
            ValueKind::Object(fields) => match fields.get(name) {
                Some(field) => field.clone().with_marks(&marks),
                None => {
                    diagnostics.push(Diagnostic::error(
                        "Unsupported attribute",
                        format!("This object does not have an attribute named {name:?}."),
                    ));
                    Value::unknown(TypeHint::Any).with_marks(&marks)
                }
            },
            ValueKind::Unknown(_) => Value::unknown(TypeHint::Any).with_marks(&marks),
            ValueKind::Null => {
                diagnostics.push(Diagnostic::error(
                    "Attempt to get attribute from null value",
                    format!("Cannot read attribute {name:?}: the base value is null."),
                ));
                Value::unknown(TypeHint::Any).with_marks(&marks)
            }
            _ => {
                diagnostics.push(Diagnostic::error(
                    "Unsupported attribute access",
                    format!(
                        "Cannot access attributes on a value of type {}.",
                        base.type_name()
                    ),
                ));
                Value::unknown(TypeHint::Any).with_marks(&marks)
            }
        }
    }

    fn step_index(&self, base: Value, index: Value, diagnostics: &mut Diagnostics) -> Value {
        let (base, mut marks) = base.unmark();
        let (index, index_marks) = index.unmark();
        for mark in index_marks {
            marks.insert(mark);
        }

        if !base.is_known() || !index.is_known() {
            return Value::unknown(TypeHint::Any).with_marks(&marks);
        }

        match (&base.kind, &index.kind) {
            (ValueKind::Array(items), _) => match index.convert(TypeHint::Number) {
                Ok(Value {
                    kind: ValueKind::Integer(i),
                    ..
                }) if (0..items.len() as i64).contains(&i) => {
                    items[i as usize].clone().with_marks(&marks)
                }
                _ => {
                    diagnostics.push(Diagnostic::error(
                        "Invalid index",
                        format!(
                            "The given index ({}) does not identify an element of this tuple.",
                            index.type_name()
                        ),
                    ));
                    Value::unknown(TypeHint::Any).with_marks(&marks)
                }
            },
            (ValueKind::Object(fields), ValueKind::String(key)) => match fields.get(key) {
                Some(field) => field.clone().with_marks(&marks),
                None => {
                    diagnostics.push(Diagnostic::error(
                        "Invalid index",
                        format!("This object does not have an attribute named {key:?}."),
                    ));
                    Value::unknown(TypeHint::Any).with_marks(&marks)
                }
            },
            (ValueKind::Null, _) => {
                diagnostics.push(Diagnostic::error(
                    "Attempt to index null value",
                    "Cannot index a null value.",
                ));
                Value::unknown(TypeHint::Any).with_marks(&marks)
            }
            _ => {
                diagnostics.push(Diagnostic::error(
                    "Invalid index",
                    format!("Cannot index a value of type {}.", base.type_name()),
                ));
                Value::unknown(TypeHint::Any).with_marks(&marks)
            }
        }
    }

    /// Fallback path: materialize the referenced variables into an
    /// [hcl::eval::Context] and let hcl evaluate the whole expression.
    fn eval_with_context(&self, expression: &Expression, diagnostics: &mut Diagnostics) -> Value {
        let mut names: Vec<String> = Vec::new();
        expression.visit_variables(&mut |variable: &Variable| {
            names.push(variable.as_str().to_string());
        });

        let mut marks = Marks::default();
        let mut ctx = hcl::eval::Context::new();
        for name in names {
            let Some(value) = self.variables.get(&name) else {
                // leave it undefined, hcl reports it below
                continue;
            };
            value.collect_marks(&mut marks);
            match value.as_hcl() {
                Some(materialized) => {
                    ctx.declare_var(hcl::Identifier::unchecked(name), materialized)
                }
                // an unknown input makes the whole derived result unknown
                None => return Value::unknown(TypeHint::Any).with_marks(&marks),
            }
        }

        match expression.evaluate(&ctx) {
            Ok(value) => Value::from(value).with_marks(&marks),
            Err(error) => {
                diagnostics.push(Diagnostic::error(
                    "Expression evaluation failed",
                    error.to_string(),
                ));
                Value::unknown(TypeHint::Any).with_marks(&marks)
            }
        }
    }
}
