use super::Visit;
use hcl::{
    template::{Directive, Element},
    Expression, Operation, Template, Traversal, TraversalOperator, Variable,
};

/// Recursively visit every [hcl::Variable] referenced by an expression
///
/// This deliberately over-approximates: names bound locally by a `for`
/// expression are reported too. Callers that only look names up in a scope
/// simply find nothing for those.
pub(crate) trait VisitVariables {
    fn visit_variables(&self, visitor: &mut dyn Visit<Variable>);
}

impl VisitVariables for Expression {
    fn visit_variables(&self, visitor: &mut dyn Visit<Variable>) {
        match self {
            Expression::Variable(variable) => visitor.visit(variable),
            Expression::Traversal(traversal) => traversal.visit_variables(visitor),
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_variables(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let hcl::ObjectKey::Expression(expr) = key {
                        expr.visit_variables(visitor);
                    }
                    value.visit_variables(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_variables(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_variables(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_variables(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_variables(visitor);
                cond.true_expr.visit_variables(visitor);
                cond.false_expr.visit_variables(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_variables(visitor);
                    binop.rhs_expr.visit_variables(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_variables(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_variables(visitor));
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_variables(visitor));
                forexpr.value_expr.visit_variables(visitor);
                forexpr.collection_expr.visit_variables(visitor);
            }
            _ => {}
        }
    }
}

impl VisitVariables for Traversal {
    fn visit_variables(&self, visitor: &mut dyn Visit<Variable>) {
        self.expr.visit_variables(visitor);
        for operator in &self.operators {
            if let TraversalOperator::Index(expr) = operator {
                expr.visit_variables(visitor);
            }
        }
    }
}

impl VisitVariables for Template {
    fn visit_variables(&self, visitor: &mut dyn Visit<Variable>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_variables(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_variables(visitor);
                        ifdir.true_template.visit_variables(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_variables(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_variables(visitor);
                        fordir.template.visit_variables(visitor);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variables_of(source: &str) -> Vec<String> {
        let expr: hcl_edit::expr::Expression = source.parse().expect("expression must parse");
        let expr: Expression = expr.into();

        let mut names = Vec::new();
        expr.visit_variables(&mut |variable: &Variable| {
            names.push(variable.as_str().to_string());
        });
        names
    }

    #[test]
    fn collects_traversal_roots_and_indices() {
        assert_eq!(variables_of("a.b[c.d]"), vec!["a", "c"]);
    }

    #[test]
    fn collects_from_operations_and_conditionals() {
        assert_eq!(variables_of("x > 1 ? y : z"), vec!["x", "y", "z"]);
    }

    #[test]
    fn collects_from_templates() {
        assert_eq!(variables_of(r#""${greeting} world""#), vec!["greeting"]);
    }

    #[test]
    fn literals_reference_nothing() {
        assert_eq!(variables_of(r#"[1, "two", true]"#), Vec::<String>::new());
    }
}
