//! lazily expanded view over an hcl body
//!
//! [ExpandBody] wraps a source body and answers content queries as if every
//! `dynamic` directive (and, optionally, every `count`/`for_each`
//! meta-argument) had been written out as literal blocks. Callers use the
//! same [BodySchema]-driven contract as for a literal body and cannot tell
//! the difference.
//!
//! Expansion recomputes on every query and recursion is lazy: a generated
//! block's body is itself an [ExpandBody] carrying the iteration it was
//! generated for, and directives inside it expand when (and if) a caller
//! asks for its content. All of the structures here are immutable once
//! built, so a single expanded view can serve unsynchronized concurrent
//! readers.
use crate::diagnostics::{Diagnostic, Diagnostics, SourceSpan};
use crate::eval::Scope;
use crate::expand_spec::{CountArg, DynamicSpec, ForEachArg, MetaArgSpec};
use crate::iteration::{Iteration, MetaArgIteration};
use crate::schema::{BlockHeaderSchema, BodySchema};
use crate::value::{Marks, Value};
use hcl_edit::structure::{Block, Body, Structure};
use hcl_edit::Span;
use std::collections::HashSet;
use std::sync::Arc;

/// Block type that introduces a dynamic directive
const DYNAMIC: &str = "dynamic";

/// Start an expanded view over `body` with `scope` as the ambient scope.
pub fn expand(body: &Body, scope: Scope) -> ExpandBody<'_> {
    ExpandBody {
        body,
        scope,
        iteration: None,
        meta_arg: None,
        content_marks: Marks::default(),
        hidden_attrs: HashSet::new(),
        hidden_blocks: HashSet::new(),
        meta_args: None,
    }
}

/// How a block declaring both `count` and `for_each` is resolved.
///
/// Both arguments decode fine on their own; which one wins (or whether the
/// combination is an error) is caller policy, not something the decoder
/// guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetaArgPrecedence {
    #[default]
    Reject,
    Count,
    ForEach,
}

#[derive(Debug, Clone)]
struct MetaArguments {
    block_types: HashSet<String>,
    precedence: MetaArgPrecedence,
}

/// Outcome classification of a content query.
///
/// `Deferred` is neither success nor failure: some directive's cardinality
/// was unknown, so the content includes placeholders and a later pass (with
/// more knowledge in scope) may resolve more.
#[derive(Debug)]
pub enum Resolution<T> {
    Complete(T),
    Deferred(T),
}

impl<T> Resolution<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Resolution::Deferred(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Resolution::Complete(inner) | Resolution::Deferred(inner) => inner,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolution::Complete(inner) | Resolution::Deferred(inner) => inner,
        }
    }
}

/// Content extracted from an expanded body
///
/// Every attribute requested by the schema has an entry: evaluated and
/// converted to the schema's type, null when the attribute is absent,
/// unknown-of-expected-type when it cannot be resolved yet.
#[derive(Debug, Default)]
pub struct BodyContent<'src> {
    pub attributes: indexmap::IndexMap<String, Value>,
    pub blocks: Vec<ContentBlock<'src>>,
}

impl<'src> BodyContent<'src> {
    /// All blocks of one type, in expansion order
    pub fn blocks_of_type<'a>(
        &'a self,
        block_type: &'a str,
    ) -> impl Iterator<Item = &'a ContentBlock<'src>> {
        self.blocks
            .iter()
            .filter(move |block| block.block_type == block_type)
    }
}

/// One block in extracted content: literal or generated, indistinguishable
#[derive(Debug)]
pub struct ContentBlock<'src> {
    pub block_type: String,
    /// Concrete strings; for generated blocks these were resolved from the
    /// directive's label expressions at expansion time
    pub labels: Vec<String>,
    /// Where this block was defined: the literal block itself, or the
    /// directive that generated it
    pub def_span: Option<SourceSpan>,
    pub body: ExpandBody<'src>,
}

/// Expanded view over a source body; see the module docs
#[derive(Debug, Clone)]
pub struct ExpandBody<'src> {
    body: &'src Body,
    /// Root ambient scope (iterations are layered on per query)
    scope: Scope,
    /// Dynamic-block bindings in effect for this body
    iteration: Option<Arc<Iteration>>,
    /// count/for_each binding in effect for this body
    meta_arg: Option<MetaArgIteration>,
    /// Marks every extracted content value is tainted with, because this
    /// body was generated from a marked collection
    content_marks: Marks,
    /// Names already consumed by an earlier partial query
    hidden_attrs: HashSet<String>,
    hidden_blocks: HashSet<String>,
    meta_args: Option<MetaArguments>,
}

impl<'src> ExpandBody<'src> {
    /// Also expand `count`/`for_each` meta-arguments on blocks of the given
    /// types, resolving count-vs-for_each conflicts per `precedence`.
    pub fn with_meta_arguments<I, S>(mut self, block_types: I, precedence: MetaArgPrecedence) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_args = Some(MetaArguments {
            block_types: block_types.into_iter().map(Into::into).collect(),
            precedence,
        });
        self
    }

    /// Require complete content matching `schema`.
    ///
    /// Strict: attributes and blocks present in the body but absent from the
    /// schema are diagnostics, as are missing required attributes.
    pub fn content(&self, schema: &BodySchema) -> (Resolution<BodyContent<'src>>, Diagnostics) {
        self.resolve(schema, false)
    }

    /// Best-effort content matching `schema`, plus a residual view.
    ///
    /// The residual wraps the same source with the consumed names hidden, so
    /// a later pass over it (possibly with a richer scope) can decode the
    /// remaining block types.
    pub fn partial_content(
        &self,
        schema: &BodySchema,
    ) -> (Resolution<BodyContent<'src>>, ExpandBody<'src>, Diagnostics) {
        let (resolution, diagnostics) = self.resolve(schema, true);

        let mut remainder = self.clone();
        remainder
            .hidden_attrs
            .extend(schema.attributes.iter().map(|a| a.name.clone()));
        remainder
            .hidden_blocks
            .extend(schema.blocks.iter().map(|b| b.block_type.clone()));

        (resolution, remainder, diagnostics)
    }

    /// The scope in effect inside this body
    fn effective_scope(&self) -> Scope {
        let mut scope = match &self.iteration {
            Some(iteration) => iteration.scope(&self.scope),
            None => self.scope.clone(),
        };
        if let Some(meta_arg) = &self.meta_arg {
            scope = meta_arg.scope(&scope);
        }
        scope
    }

    fn resolve(
        &self,
        schema: &BodySchema,
        partial: bool,
    ) -> (Resolution<BodyContent<'src>>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut content = BodyContent::default();
        let mut deferred = false;
        let scope = self.effective_scope();

        //// attributes

        for attr_schema in &schema.attributes {
            if self.hidden_attrs.contains(&attr_schema.name) {
                continue;
            }

            let Some(attribute) = self
                .body
                .attributes()
                .find(|attribute| attribute.key.value().as_str() == attr_schema.name)
            else {
                if attr_schema.required {
                    diagnostics.push(Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument {:?} is required, but no definition was found.",
                            attr_schema.name
                        ),
                    ));
                }
                content.attributes.insert(
                    attr_schema.name.clone(),
                    Value::null().with_marks(&self.content_marks),
                );
                continue;
            };

            let (value, eval_diags) = scope.evaluate_edit(&attribute.value);
            diagnostics.extend(eval_diags);

            let value = match value.convert(attr_schema.value_type) {
                Ok(value) => value,
                Err(conversion) => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Incorrect attribute value type",
                            format!(
                                "Inappropriate value for attribute {:?}: {}.",
                                attr_schema.name, conversion
                            ),
                        )
                        .with_span(attribute.value.span()),
                    );
                    Value::unknown(attr_schema.value_type)
                }
            };
            content.attributes.insert(
                attr_schema.name.clone(),
                value.with_marks(&self.content_marks),
            );
        }

        if !partial {
            for attribute in self.body.attributes() {
                let name = attribute.key.value().as_str();
                if self.hidden_attrs.contains(name) {
                    continue;
                }
                if !schema.attributes.iter().any(|a| a.name == name) {
                    diagnostics.push(
                        Diagnostic::error(
                            "Unsupported argument",
                            format!("An argument named {name:?} is not expected here."),
                        )
                        .with_span(attribute.key.span()),
                    );
                }
            }
        }

        //// blocks, one ordered pass so literal blocks and directives
        //// interleave in declaration order

        for structure in self.body.iter() {
            let Structure::Block(block) = structure else {
                continue;
            };
            let ident = block.ident.value().as_str();

            if ident == DYNAMIC {
                if block.labels.len() != 1 {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid dynamic block",
                            "A dynamic block requires exactly one label \
                             naming the block type it generates.",
                        )
                        .with_span(block.ident.span()),
                    );
                    continue;
                }
                let target = block.labels[0].as_str();
                if self.hidden_blocks.contains(target) {
                    continue;
                }
                let Some(block_schema) = schema
                    .blocks
                    .iter()
                    .find(|candidate| candidate.block_type == target)
                else {
                    if !partial {
                        diagnostics.push(
                            Diagnostic::error(
                                "Unexpected block",
                                format!("Blocks of type {target:?} are not expected here."),
                            )
                            .with_span(block.ident.span()),
                        );
                    }
                    continue;
                };
                deferred |=
                    self.expand_dynamic(block, block_schema, &scope, &mut content, &mut diagnostics);
            } else {
                if self.hidden_blocks.contains(ident) {
                    continue;
                }
                if !schema
                    .blocks
                    .iter()
                    .any(|candidate| candidate.block_type == ident)
                {
                    if !partial {
                        diagnostics.push(
                            Diagnostic::error(
                                "Unexpected block",
                                format!("Blocks of type {ident:?} are not expected here."),
                            )
                            .with_span(block.ident.span()),
                        );
                    }
                    continue;
                }
                deferred |= self.append_block(block, &scope, &mut content, &mut diagnostics);
            }
        }

        let resolution = if deferred {
            Resolution::Deferred(content)
        } else {
            Resolution::Complete(content)
        };
        (resolution, diagnostics)
    }

    /// A literal block of a requested type; expands its meta-arguments when
    /// that is enabled for its type. Returns whether resolution deferred.
    fn append_block(
        &self,
        block: &'src Block,
        scope: &Scope,
        content: &mut BodyContent<'src>,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        if let Some(meta_args) = &self.meta_args {
            if meta_args
                .block_types
                .contains(block.ident.value().as_str())
            {
                return self.expand_meta_arg(block, meta_args.precedence, scope, content, diagnostics);
            }
        }

        content.blocks.push(ContentBlock {
            block_type: block.ident.value().as_str().to_string(),
            labels: block
                .labels
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
            def_span: block.ident.span(),
            body: ExpandBody {
                body: &block.body,
                scope: self.scope.clone(),
                iteration: self.iteration.clone(),
                meta_arg: self.meta_arg.clone(),
                content_marks: self.content_marks.clone(),
                hidden_attrs: HashSet::new(),
                hidden_blocks: HashSet::new(),
                meta_args: self.meta_args.clone(),
            },
        });
        false
    }

    /// Expand one `dynamic` directive into zero or more generated blocks.
    /// Returns whether resolution deferred.
    fn expand_dynamic(
        &self,
        block: &'src Block,
        block_schema: &BlockHeaderSchema,
        scope: &Scope,
        content: &mut BodyContent<'src>,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let spec = match DynamicSpec::decode(block, block_schema, scope) {
            Ok(spec) => spec,
            Err(spec_diags) => {
                // fatal to this directive only
                diagnostics.extend(spec_diags);
                return false;
            }
        };

        let (for_each, marks) = spec.for_each.unmark();

        if !for_each.is_known() {
            // Deferred: still generate one placeholder bound to an unknown
            // iteration, so downstream consumers see that a block of this
            // shape exists even though its contents are not resolvable yet.
            tracing::debug!(block_type = %spec.block_type, "for_each is unknown, deferring");
            let iteration =
                Iteration::unknown(&spec.iterator_name, &marks, self.iteration.clone());
            match spec.labels(&self.scope_with(&iteration)) {
                Ok(Some(labels)) => {
                    content
                        .blocks
                        .push(self.generated_block(&spec, labels, iteration, &marks));
                }
                // an unknown label cannot name even a placeholder
                Ok(None) => {}
                Err(label_diags) => diagnostics.extend(label_diags),
            }
            return true;
        }

        let Some(pairs) = for_each.iterate_elements() else {
            diagnostics.push(Diagnostic::bug(
                "Uniterable for_each after decode",
                "A for_each value that passed decode validation is not iterable.",
            ));
            return false;
        };

        for (key, value) in pairs {
            let iteration = Iteration::new(
                &spec.iterator_name,
                key.with_marks(&marks),
                value.with_marks(&marks),
                self.iteration.clone(),
            );
            match spec.labels(&self.scope_with(&iteration)) {
                Ok(Some(labels)) => {
                    tracing::trace!(block_type = %spec.block_type, ?labels, "generated block");
                    content
                        .blocks
                        .push(self.generated_block(&spec, labels, iteration, &marks));
                }
                // this element's identity is not known yet, skip it
                Ok(None) => continue,
                Err(label_diags) => {
                    // one bad element does not abort the remaining elements
                    diagnostics.extend(label_diags);
                    continue;
                }
            }
        }
        false
    }

    fn generated_block(
        &self,
        spec: &DynamicSpec<'src>,
        labels: Vec<String>,
        iteration: Arc<Iteration>,
        marks: &Marks,
    ) -> ContentBlock<'src> {
        ContentBlock {
            block_type: spec.block_type.clone(),
            labels,
            def_span: spec.def_span.clone(),
            body: ExpandBody {
                body: spec.content,
                scope: self.scope.clone(),
                iteration: Some(iteration),
                meta_arg: self.meta_arg.clone(),
                content_marks: self.content_marks.clone().into_iter().chain(marks.clone()).collect(),
                hidden_attrs: HashSet::new(),
                hidden_blocks: HashSet::new(),
                meta_args: self.meta_args.clone(),
            },
        }
    }

    /// Expand a block's count/for_each meta-arguments into repeated copies.
    /// Returns whether resolution deferred.
    fn expand_meta_arg(
        &self,
        block: &'src Block,
        precedence: MetaArgPrecedence,
        scope: &Scope,
        content: &mut BodyContent<'src>,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let spec = match MetaArgSpec::decode(block, scope) {
            Ok(spec) => spec,
            Err(spec_diags) => {
                diagnostics.extend(spec_diags);
                return false;
            }
        };

        match (spec.count, spec.for_each) {
            (Some(count), Some(for_each)) => match precedence {
                MetaArgPrecedence::Reject => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid combination of \"count\" and \"for_each\"",
                            "The \"count\" and \"for_each\" meta-arguments are \
                             mutually-exclusive, only one may be used.",
                        )
                        .with_span(count.span.clone()),
                    );
                    false
                }
                MetaArgPrecedence::Count => self.expand_count(block, count, content),
                MetaArgPrecedence::ForEach => self.expand_for_each(block, for_each, content),
            },
            (Some(count), None) => self.expand_count(block, count, content),
            (None, Some(for_each)) => self.expand_for_each(block, for_each, content),
            (None, None) => {
                // no meta-arguments present, the block passes through as-is
                content.blocks.push(ContentBlock {
                    block_type: block.ident.value().as_str().to_string(),
                    labels: block
                        .labels
                        .iter()
                        .map(|label| label.as_str().to_string())
                        .collect(),
                    def_span: block.ident.span(),
                    body: ExpandBody {
                        body: &block.body,
                        scope: self.scope.clone(),
                        iteration: self.iteration.clone(),
                        meta_arg: self.meta_arg.clone(),
                        content_marks: self.content_marks.clone(),
                        hidden_attrs: HashSet::new(),
                        hidden_blocks: HashSet::new(),
                        meta_args: self.meta_args.clone(),
                    },
                });
                false
            }
        }
    }

    fn expand_count(
        &self,
        block: &'src Block,
        count: CountArg,
        content: &mut BodyContent<'src>,
    ) -> bool {
        let (_, marks) = count.value.unmark();

        let Some(num) = count.num else {
            tracing::debug!("count is unknown, deferring");
            content.blocks.push(self.meta_arg_block(
                block,
                MetaArgIteration::unknown_count(&marks),
                &marks,
            ));
            return true;
        };

        for index in 0..num {
            content.blocks.push(self.meta_arg_block(
                block,
                MetaArgIteration::count(index),
                &marks,
            ));
        }
        false
    }

    fn expand_for_each(
        &self,
        block: &'src Block,
        for_each: ForEachArg,
        content: &mut BodyContent<'src>,
    ) -> bool {
        let (value, marks) = for_each.value.unmark();

        if !value.is_known() {
            tracing::debug!("for_each is unknown, deferring");
            content.blocks.push(self.meta_arg_block(
                block,
                MetaArgIteration::unknown_for_each(&marks),
                &marks,
            ));
            return true;
        }

        // decode already validated iterability
        let pairs = value.iterate_elements().unwrap_or_default();
        for (key, value) in pairs {
            content.blocks.push(self.meta_arg_block(
                block,
                MetaArgIteration::for_each(key.with_marks(&marks), value.with_marks(&marks)),
                &marks,
            ));
        }
        false
    }

    fn meta_arg_block(
        &self,
        block: &'src Block,
        meta_arg: MetaArgIteration,
        marks: &Marks,
    ) -> ContentBlock<'src> {
        // count/for_each themselves are consumed by the expansion and must
        // not surface as content of the generated copies
        let mut hidden_attrs = HashSet::new();
        hidden_attrs.insert("count".to_string());
        hidden_attrs.insert("for_each".to_string());

        ContentBlock {
            block_type: block.ident.value().as_str().to_string(),
            labels: block
                .labels
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
            def_span: block.ident.span(),
            body: ExpandBody {
                body: &block.body,
                scope: self.scope.clone(),
                iteration: self.iteration.clone(),
                meta_arg: Some(meta_arg),
                content_marks: self.content_marks.clone().into_iter().chain(marks.clone()).collect(),
                hidden_attrs,
                hidden_blocks: HashSet::new(),
                meta_args: self.meta_args.clone(),
            },
        }
    }

    /// `scope` in effect for content governed by `iteration`, including the
    /// meta-argument binding of this body (if any)
    fn scope_with(&self, iteration: &Arc<Iteration>) -> Scope {
        let mut scope = iteration.scope(&self.scope);
        if let Some(meta_arg) = &self.meta_arg {
            scope = meta_arg.scope(&scope);
        }
        scope
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::AttributeSchema;
    use crate::value::TypeHint;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Body {
        hcl_edit::parser::parse_body(source).expect("body must parse")
    }

    fn val(content: &BodyContent<'_>, name: &str) -> Value {
        content.attributes.get(name).expect("attribute").clone()
    }

    #[test]
    fn literal_passthrough_is_identity() {
        let body = parse(
            r#"
            a "one" {}
            b {}
            a "two" {}
            "#,
        );
        let schema = BodySchema::new()
            .block(BlockHeaderSchema::new("a").with_labels(["name"]))
            .block(BlockHeaderSchema::new("b"));

        let (resolution, diagnostics) = expand(&body, Scope::new()).content(&schema);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        assert!(!resolution.is_deferred());

        let kinds: Vec<_> = resolution
            .get()
            .blocks
            .iter()
            .map(|block| (block.block_type.as_str(), block.labels.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", vec!["one".to_string()]),
                ("b", vec![]),
                ("a", vec!["two".to_string()]),
            ]
        );
    }

    #[test]
    fn declaration_order_is_preserved_across_directives() {
        let body = parse(
            r#"
            a "first" {
              val = "literal 0"
            }

            dynamic "a" {
              for_each = ["gen 0", "gen 1"]
              labels   = [a.key]

              content {
                val = a.value
              }
            }

            a "last" {
              val = "literal 1"
            }
            "#,
        );
        let schema =
            BodySchema::new().block(BlockHeaderSchema::new("a").with_labels(["name"]));

        let (resolution, diagnostics) = expand(&body, Scope::new()).content(&schema);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");

        let labels: Vec<_> = resolution
            .get()
            .blocks
            .iter()
            .map(|block| block.labels[0].clone())
            .collect();
        assert_eq!(labels, vec!["first", "0", "1", "last"]);

        let attr_schema =
            BodySchema::new().attribute(AttributeSchema::required("val", TypeHint::String));
        let values: Vec<_> = resolution
            .get()
            .blocks
            .iter()
            .map(|block| {
                let (inner, diags) = block.body.content(&attr_schema);
                assert!(diags.is_empty(), "unexpected: {diags}");
                val(inner.get(), "val")
            })
            .collect();
        assert_eq!(
            values,
            vec![
                Value::from("literal 0"),
                Value::from("gen 0"),
                Value::from("gen 1"),
                Value::from("literal 1"),
            ]
        );
    }

    #[test]
    fn one_bad_directive_does_not_block_siblings() {
        let body = parse(
            r#"
            dynamic "a" {
              for_each = "scalar"
              content {}
            }

            dynamic "a" {
              for_each = ["ok"]
              content {}
            }
            "#,
        );
        let schema = BodySchema::new().block(BlockHeaderSchema::new("a"));

        let (resolution, diagnostics) = expand(&body, Scope::new()).content(&schema);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(resolution.get().blocks.len(), 1);
        assert!(!resolution.is_deferred());
    }

    #[test]
    fn unknown_for_each_defers_with_placeholder() {
        let body = parse(
            r#"
            dynamic "a" {
              for_each = later

              content {
                val = a.value
              }
            }
            "#,
        );
        let scope = Scope::new().with_var("later", Value::unknown(TypeHint::Array));
        let schema = BodySchema::new().block(BlockHeaderSchema::new("a"));

        let (resolution, diagnostics) = expand(&body, scope).content(&schema);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        assert!(resolution.is_deferred());
        assert_eq!(resolution.get().blocks.len(), 1);

        let attr_schema =
            BodySchema::new().attribute(AttributeSchema::optional("val", TypeHint::String));
        let (inner, diags) = resolution.get().blocks[0].body.content(&attr_schema);
        assert!(diags.is_empty(), "unexpected: {diags}");
        assert_eq!(val(inner.get(), "val"), Value::unknown(TypeHint::String));
    }

    #[test]
    fn partial_content_hides_consumed_names() {
        let body = parse(
            r#"
            a "one" {}
            b {
              val = "b"
            }
            "#,
        );
        let schema_a =
            BodySchema::new().block(BlockHeaderSchema::new("a").with_labels(["name"]));

        let view = expand(&body, Scope::new());
        let (resolution, remainder, diagnostics) = view.partial_content(&schema_a);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        assert_eq!(resolution.get().blocks.len(), 1);

        // the remainder resolves "b" strictly without tripping over "a"
        let schema_b = BodySchema::new().block(BlockHeaderSchema::new("b"));
        let (resolution, diagnostics) = remainder.content(&schema_b);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        assert_eq!(resolution.get().blocks.len(), 1);
    }

    #[test]
    fn count_meta_argument_generates_copies() {
        let body = parse(
            r#"
            resource "null" "a" {
              count = 2
              idx   = count.index
            }
            "#,
        );
        let schema = BodySchema::new()
            .block(BlockHeaderSchema::new("resource").with_labels(["type", "name"]));

        let (resolution, diagnostics) = expand(&body, Scope::new())
            .with_meta_arguments(["resource"], MetaArgPrecedence::Reject)
            .content(&schema);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");

        let content = resolution.into_inner();
        assert_eq!(content.blocks.len(), 2);

        let attr_schema =
            BodySchema::new().attribute(AttributeSchema::required("idx", TypeHint::Number));
        let indices: Vec<_> = content
            .blocks
            .iter()
            .map(|block| {
                let (inner, diags) = block.body.content(&attr_schema);
                assert!(diags.is_empty(), "unexpected: {diags}");
                val(inner.get(), "idx")
            })
            .collect();
        assert_eq!(indices, vec![Value::from(0i64), Value::from(1i64)]);
    }

    #[test]
    fn conflicting_meta_arguments_follow_policy() {
        let body = parse(
            r#"
            resource "null" "a" {
              count    = 2
              for_each = ["x"]
            }
            "#,
        );
        let schema = BodySchema::new()
            .block(BlockHeaderSchema::new("resource").with_labels(["type", "name"]));

        let (resolution, diagnostics) = expand(&body, Scope::new())
            .with_meta_arguments(["resource"], MetaArgPrecedence::Reject)
            .content(&schema);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics
            .to_string()
            .contains("Invalid combination of \"count\" and \"for_each\""));
        assert_eq!(resolution.get().blocks.len(), 0);

        let (resolution, diagnostics) = expand(&body, Scope::new())
            .with_meta_arguments(["resource"], MetaArgPrecedence::Count)
            .content(&schema);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics}");
        assert_eq!(resolution.get().blocks.len(), 2);
    }
}
