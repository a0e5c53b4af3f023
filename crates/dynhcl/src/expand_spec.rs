//! decoding of expansion directives
//!
//! A `dynamic "type" { ... }` block and a block carrying `count`/`for_each`
//! attributes are both *directives*: instructions to generate repeated
//! blocks instead of writing them out literally. Decoding validates the
//! directive's shape and evaluates its cardinality expression against the
//! ambient scope; it does not yet generate anything.
//!
//! Decode errors are fatal to the one directive only. Unknown `for_each` /
//! `count` values are not errors: the directive decodes and its expansion is
//! deferred.
use crate::diagnostics::{Diagnostic, Diagnostics, SourceSpan};
use crate::eval::Scope;
use crate::schema::BlockHeaderSchema;
use crate::value::{ConversionError, TypeHint, Value, ValueKind};
use hcl_edit::structure::{Block, Body};
use hcl_edit::Span;

/// A decoded `dynamic` block directive
#[derive(Debug)]
pub(crate) struct DynamicSpec<'src> {
    pub block_type: String,
    pub def_span: Option<SourceSpan>,
    pub for_each: Value,
    pub iterator_name: String,
    label_exprs: Vec<&'src hcl_edit::expr::Expression>,
    pub content: &'src Body,
}

impl<'src> DynamicSpec<'src> {
    /// Decode a raw `dynamic` block generating blocks of `schema`'s type.
    ///
    /// `scope` is the scope in effect at the directive's nesting depth.
    pub fn decode(
        block: &'src Block,
        schema: &BlockHeaderSchema,
        scope: &Scope,
    ) -> Result<Self, Diagnostics> {
        let block_type = schema.block_type.clone();
        tracing::trace!(%block_type, "decoding dynamic block directive");

        let mut for_each_attr = None;
        let mut iterator_attr = None;
        let mut labels_attr = None;
        for attribute in block.body.attributes() {
            match attribute.key.value().as_str() {
                "for_each" => for_each_attr = Some(attribute),
                "iterator" => iterator_attr = Some(attribute),
                "labels" => labels_attr = Some(attribute),
                other => {
                    return Err(Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named {other:?} is not expected in a dynamic block."),
                    )
                    .with_span(attribute.key.span())
                    .into())
                }
            }
        }

        //// for_each attribute

        let Some(for_each_attr) = for_each_attr else {
            return Err(Diagnostic::error(
                "Missing required argument",
                "The argument \"for_each\" is required in a dynamic block.",
            )
            .with_span(block.ident.span())
            .into());
        };

        let (for_each, eval_diags) = scope.evaluate_edit(&for_each_attr.value);
        if eval_diags.has_errors() {
            return Err(eval_diags);
        }

        // marked collections are fine here, iterability is a property of the
        // value underneath
        let (unmarked, _) = for_each.unmark();
        if unmarked.is_null() {
            return Err(Diagnostic::error(
                "Invalid dynamic for_each value",
                "Cannot use a null value in for_each.",
            )
            .with_span(for_each_attr.value.span())
            .into());
        }
        if unmarked.is_known() && !unmarked.can_iterate_elements() {
            return Err(Diagnostic::error(
                "Invalid dynamic for_each value",
                format!(
                    "Cannot use a {} value in for_each. An iterable collection is required.",
                    for_each.type_name()
                ),
            )
            .with_span(for_each_attr.value.span())
            .into());
        }

        //// iterator attribute

        let mut iterator_name = block_type.clone();
        if let Some(attribute) = iterator_attr {
            match &attribute.value {
                hcl_edit::expr::Expression::Variable(ident) => {
                    iterator_name = ident.value().as_str().to_string();
                }
                _ => {
                    return Err(Diagnostic::error(
                        "Invalid dynamic iterator name",
                        "Dynamic iterator must be a single variable name.",
                    )
                    .with_span(attribute.value.span())
                    .into())
                }
            }
        }

        //// labels attribute

        let required_labels = schema.label_names.len();
        let mut label_exprs: Vec<&hcl_edit::expr::Expression> = Vec::new();
        match labels_attr {
            None if required_labels > 0 => {
                return Err(Diagnostic::error(
                    "Insufficient dynamic block labels",
                    format!(
                        "Blocks of type {block_type:?} require {required_labels} label(s), so the \"labels\" argument is required.",
                    ),
                )
                .with_span(block.ident.span())
                .into())
            }
            None => {}
            Some(attribute) => {
                let hcl_edit::expr::Expression::Array(array) = &attribute.value else {
                    return Err(Diagnostic::error(
                        "Invalid dynamic block labels",
                        "The \"labels\" argument must be a list of label expressions.",
                    )
                    .with_span(attribute.value.span())
                    .into());
                };
                label_exprs = array.iter().collect();

                if label_exprs.len() > required_labels {
                    return Err(Diagnostic::error(
                        "Extraneous dynamic block label",
                        format!(
                            "Blocks of type {block_type:?} require {required_labels} label(s)."
                        ),
                    )
                    .with_span(label_exprs[required_labels].span())
                    .into());
                }
                if label_exprs.len() < required_labels {
                    return Err(Diagnostic::error(
                        "Insufficient dynamic block labels",
                        format!(
                            "Blocks of type {block_type:?} require {required_labels} label(s)."
                        ),
                    )
                    .with_span(attribute.value.span())
                    .into());
                }
            }
        }

        //// content block

        let mut content = None;
        for inner in block.body.blocks() {
            match inner.ident.value().as_str() {
                "content" => {
                    if !inner.labels.is_empty() {
                        return Err(Diagnostic::error(
                            "Invalid content block",
                            "A content block must not have labels.",
                        )
                        .with_span(inner.ident.span())
                        .into());
                    }
                    if content.is_some() {
                        return Err(Diagnostic::error(
                            "Extraneous dynamic content block",
                            "Only one nested content block is allowed for each dynamic block.",
                        )
                        .with_span(inner.ident.span())
                        .into());
                    }
                    content = Some(&inner.body);
                }
                other => {
                    return Err(Diagnostic::error(
                        "Unsupported block type",
                        format!("Blocks of type {other:?} are not expected in a dynamic block."),
                    )
                    .with_span(inner.ident.span())
                    .into())
                }
            }
        }
        let Some(content) = content else {
            return Err(Diagnostic::error(
                "Missing dynamic content block",
                "A dynamic block must have a nested block of type \"content\" \
                 to describe the body of each generated block.",
            )
            .with_span(block.ident.span())
            .into());
        };

        Ok(DynamicSpec {
            block_type,
            def_span: block.ident.span(),
            for_each,
            iterator_name,
            label_exprs,
            content,
        })
    }

    /// Evaluate the label expressions for one generated element.
    ///
    /// `Ok(None)` means this element is silently skipped: a label is not yet
    /// known, so the identity of the block it would name cannot be
    /// established in this pass. This is deliberately different from an
    /// unknown `for_each`, which defers the whole query.
    pub fn labels(&self, scope: &Scope) -> Result<Option<Vec<String>>, Diagnostics> {
        let mut labels = Vec::with_capacity(self.label_exprs.len());
        for &label_expr in &self.label_exprs {
            let (value, eval_diags) = scope.evaluate_edit(label_expr);
            if eval_diags.has_errors() {
                return Err(eval_diags);
            }

            let value = match value.convert(TypeHint::String) {
                Ok(value) => value,
                Err(conversion) => {
                    return Err(Diagnostic::error(
                        "Invalid dynamic block label",
                        format!("Cannot use this value as a dynamic block label: {conversion}."),
                    )
                    .with_span(label_expr.span())
                    .into())
                }
            };
            if value.is_null() {
                return Err(Diagnostic::error(
                    "Invalid dynamic block label",
                    "Cannot use a null value as a dynamic block label.",
                )
                .with_span(label_expr.span())
                .into());
            }
            if !value.is_known() {
                tracing::debug!(
                    block_type = %self.block_type,
                    "label is not yet known, skipping this generated block"
                );
                return Ok(None);
            }
            if value.is_marked() {
                // labels have to be static comparable strings; marks are
                // never stripped to force one through
                return Err(Diagnostic::error(
                    "Invalid dynamic block label",
                    "This value has dynamic marks that make it unsuitable for use as a block label.",
                )
                .with_span(label_expr.span())
                .into());
            }

            match value.kind {
                ValueKind::String(label) => labels.push(label),
                _ => {
                    return Err(Diagnostic::bug(
                        "Non-string label after conversion",
                        "A label converted to string did not produce a string value.",
                    )
                    .into())
                }
            }
        }
        Ok(Some(labels))
    }
}

/// A decoded count argument
#[derive(Debug)]
pub(crate) struct CountArg {
    /// The evaluated value, marks intact
    pub value: Value,
    /// Validated element count; `None` while the value is unknown
    pub num: Option<i64>,
    pub span: Option<SourceSpan>,
}

/// A decoded for_each meta-argument
#[derive(Debug)]
pub(crate) struct ForEachArg {
    pub value: Value,
    pub span: Option<SourceSpan>,
}

/// The count/for_each meta-arguments found on an ordinary block.
///
/// Both may be present at once: the decoder surfaces the conflict and leaves
/// the precedence (or rejection) decision to the expansion policy.
#[derive(Debug, Default)]
pub(crate) struct MetaArgSpec {
    pub count: Option<CountArg>,
    pub for_each: Option<ForEachArg>,
}

impl MetaArgSpec {
    pub fn decode(block: &Block, scope: &Scope) -> Result<Self, Diagnostics> {
        let mut spec = MetaArgSpec::default();

        //// count attribute

        if let Some(attribute) = block
            .body
            .attributes()
            .find(|attribute| attribute.key.value().as_str() == "count")
        {
            let span = attribute.value.span();
            let (value, eval_diags) = scope.evaluate_edit(&attribute.value);
            if eval_diags.has_errors() {
                return Err(eval_diags);
            }

            let (unmarked, _) = value.unmark();
            let mut num = None;
            // validation is skipped while the value is unknown
            if unmarked.is_known() {
                if unmarked.is_null() {
                    return Err(Diagnostic::error(
                        "Invalid count argument",
                        "The given \"count\" argument value is null. An integer is required.",
                    )
                    .with_span(span)
                    .into());
                }

                let converted = match unmarked.convert(TypeHint::Number) {
                    Ok(converted) => converted,
                    Err(conversion) => {
                        return Err(Diagnostic::error(
                            "Incorrect value type",
                            format!("Invalid expression value: {conversion}."),
                        )
                        .with_span(span)
                        .into())
                    }
                };
                let n = match converted.kind {
                    ValueKind::Integer(n) => n,
                    ValueKind::Decimal(d) if d.fract() == 0.0 => d as i64,
                    ValueKind::Decimal(_) => {
                        return Err(Diagnostic::error(
                            "Invalid count argument",
                            format!(
                                "The given \"count\" argument value is unsuitable: {}.",
                                ConversionError::FractionalNumber
                            ),
                        )
                        .with_span(span)
                        .into())
                    }
                    _ => {
                        return Err(Diagnostic::bug(
                            "Non-numeric count after conversion",
                            "A count converted to number did not produce a numeric value.",
                        )
                        .into())
                    }
                };
                if n < 0 {
                    return Err(Diagnostic::error(
                        "Invalid count argument",
                        "The given \"count\" argument value is unsuitable: \
                         negative numbers are not supported.",
                    )
                    .with_span(span)
                    .into());
                }
                num = Some(n);
            }

            spec.count = Some(CountArg { value, num, span });
        }

        //// for_each attribute

        if let Some(attribute) = block
            .body
            .attributes()
            .find(|attribute| attribute.key.value().as_str() == "for_each")
        {
            let span = attribute.value.span();
            let (value, eval_diags) = scope.evaluate_edit(&attribute.value);
            if eval_diags.has_errors() {
                return Err(eval_diags);
            }

            let (unmarked, _) = value.unmark();
            if unmarked.is_null() {
                return Err(Diagnostic::error(
                    "Invalid for_each argument",
                    "The given \"for_each\" argument value is unsuitable: the given \
                     \"for_each\" argument value is null. A map, or set of strings is allowed.",
                )
                .with_span(span)
                .into());
            }
            if unmarked.is_known() && !unmarked.can_iterate_elements() {
                return Err(Diagnostic::error(
                    "The `for_each` value is not iterable",
                    format!("A {} value is not iterable.", value.type_name()),
                )
                .with_span(span)
                .into());
            }

            spec.for_each = Some(ForEachArg { value, span });
        }

        Ok(spec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Body {
        hcl_edit::parser::parse_body(source).expect("body must parse")
    }

    fn decode_dynamic(
        source: &str,
        schema: &BlockHeaderSchema,
        scope: &Scope,
    ) -> Result<String, String> {
        let body = parse(source);
        let block = body.blocks().next().expect("a block");
        match DynamicSpec::decode(block, schema, scope) {
            Ok(spec) => Ok(spec.iterator_name),
            Err(diags) => Err(diags.to_string()),
        }
    }

    fn schema_a() -> BlockHeaderSchema {
        BlockHeaderSchema::new("a")
    }

    #[test]
    fn iterator_defaults_to_block_type() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert_eq!(decoded.unwrap(), "a");
    }

    #[test]
    fn iterator_must_be_a_bare_name() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              iterator = a.b
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded
            .unwrap_err()
            .contains("Dynamic iterator must be a single variable name"));
    }

    #[test]
    fn for_each_is_required() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded.unwrap_err().contains("for_each"));
    }

    #[test]
    fn null_for_each_is_rejected() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = null
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded
            .unwrap_err()
            .contains("Cannot use a null value in for_each"));
    }

    #[test]
    fn scalar_for_each_names_the_type() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = "nope"
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded
            .unwrap_err()
            .contains("Cannot use a string value in for_each"));
    }

    #[test]
    fn unknown_for_each_decodes() {
        let scope = Scope::new().with_var("later", Value::unknown(TypeHint::Any));
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = later
              content {}
            }
            "#,
            &schema_a(),
            &scope,
        );
        assert!(decoded.is_ok());
    }

    #[test]
    fn content_block_is_required() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded
            .unwrap_err()
            .contains("Missing dynamic content block"));
    }

    #[test]
    fn second_content_block_is_rejected() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              content {}
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded
            .unwrap_err()
            .contains("Extraneous dynamic content block"));
    }

    #[test]
    fn label_arity_must_match_schema() {
        let schema = BlockHeaderSchema::new("a").with_labels(["name"]);

        let too_many = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              labels   = ["x", "y"]
              content {}
            }
            "#,
            &schema,
            &Scope::new(),
        );
        assert!(too_many
            .unwrap_err()
            .contains("Extraneous dynamic block label"));

        let too_few = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              labels   = []
              content {}
            }
            "#,
            &schema,
            &Scope::new(),
        );
        assert!(too_few
            .unwrap_err()
            .contains("Insufficient dynamic block labels"));

        let missing = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              content {}
            }
            "#,
            &schema,
            &Scope::new(),
        );
        assert!(missing
            .unwrap_err()
            .contains("Insufficient dynamic block labels"));
    }

    #[test]
    fn unexpected_argument_is_rejected() {
        let decoded = decode_dynamic(
            r#"
            dynamic "a" {
              for_each = [1]
              extra    = true
              content {}
            }
            "#,
            &schema_a(),
            &Scope::new(),
        );
        assert!(decoded.unwrap_err().contains("Unsupported argument"));
    }

    fn decode_meta(source: &str, scope: &Scope) -> Result<MetaArgSpec, String> {
        let body = parse(source);
        let block = body.blocks().next().expect("a block");
        MetaArgSpec::decode(block, scope).map_err(|diags| diags.to_string())
    }

    #[test]
    fn count_decodes_and_converts() {
        let spec = decode_meta("resource \"x\" \"y\" {\n  count = \"3\"\n}", &Scope::new());
        assert_eq!(spec.unwrap().count.unwrap().num, Some(3));
    }

    #[test]
    fn negative_count_is_rejected() {
        let spec = decode_meta("resource \"x\" \"y\" {\n  count = -1\n}", &Scope::new());
        assert!(spec
            .unwrap_err()
            .contains("negative numbers are not supported"));
    }

    #[test]
    fn null_count_is_rejected() {
        let spec = decode_meta("resource \"x\" \"y\" {\n  count = null\n}", &Scope::new());
        assert!(spec
            .unwrap_err()
            .contains("The given \"count\" argument value is null"));
    }

    #[test]
    fn unconvertible_count_is_rejected() {
        let spec = decode_meta(
            "resource \"x\" \"y\" {\n  count = \"lots\"\n}",
            &Scope::new(),
        );
        assert!(spec.unwrap_err().contains("Incorrect value type"));
    }

    #[test]
    fn unknown_count_defers_validation() {
        let scope = Scope::new().with_var("later", Value::unknown(TypeHint::Number));
        let spec = decode_meta("resource \"x\" \"y\" {\n  count = later\n}", &scope).unwrap();
        let count = spec.count.unwrap();
        assert_eq!(count.num, None);
        assert!(!count.value.is_known());
    }

    #[test]
    fn both_meta_arguments_decode_together() {
        let spec = decode_meta(
            "resource \"x\" \"y\" {\n  count = 1\n  for_each = [1]\n}",
            &Scope::new(),
        )
        .unwrap();
        assert!(spec.count.is_some());
        assert!(spec.for_each.is_some());
    }

    #[test]
    fn label_skip_on_unknown() {
        let scope = Scope::new().with_var(
            "names",
            Value::from(vec![
                Value::from("one"),
                Value::unknown(TypeHint::String),
            ]),
        );
        let body = parse(
            r#"
            dynamic "a" {
              for_each = names
              labels   = [a.value]
              content {}
            }
            "#,
        );
        let block = body.blocks().next().expect("a block");
        let schema = BlockHeaderSchema::new("a").with_labels(["name"]);
        let spec = DynamicSpec::decode(block, &schema, &scope).unwrap();

        let pairs = spec.for_each.iterate_elements().unwrap();
        let mut produced = Vec::new();
        for (key, value) in pairs {
            let iteration = crate::iteration::Iteration::new("a", key, value, None);
            produced.push(spec.labels(&iteration.scope(&scope)).unwrap());
        }
        assert_eq!(produced, vec![Some(vec!["one".to_string()]), None]);
    }

    #[test]
    fn marked_label_is_rejected() {
        let scope = Scope::new().with_var("secret", Value::from("s3").with_mark("boop"));
        let body = parse(
            r#"
            dynamic "a" {
              for_each = [1]
              labels   = [secret]
              content {}
            }
            "#,
        );
        let block = body.blocks().next().expect("a block");
        let schema = BlockHeaderSchema::new("a").with_labels(["name"]);
        let spec = DynamicSpec::decode(block, &schema, &scope).unwrap();

        let error = spec.labels(&scope).unwrap_err().to_string();
        assert!(error.contains("dynamic marks"));
    }

    #[test]
    fn null_label_is_rejected() {
        let body = parse(
            r#"
            dynamic "a" {
              for_each = [1]
              labels   = [null]
              content {}
            }
            "#,
        );
        let block = body.blocks().next().expect("a block");
        let schema = BlockHeaderSchema::new("a").with_labels(["name"]);
        let spec = DynamicSpec::decode(block, &schema, &Scope::new()).unwrap();

        let error = spec.labels(&Scope::new()).unwrap_err().to_string();
        assert!(error.contains("Cannot use a null value as a dynamic block label"));
    }
}
