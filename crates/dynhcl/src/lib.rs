//! # dynhcl - dynamic block expansion for HCL
//!
//! `dynhcl` is the expansion engine of a static-analysis toolchain for
//! HCL-based configuration: it lets a checker read a configuration body *as
//! if* every `dynamic` block (and optionally every `count`/`for_each`
//! meta-argument) had been written out as literal blocks.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `dynhcl` works internally.
//!
//! ### HCL Terms
//!
//! Quick introduction to terms used to describe elements of HCL documents.
//!
//! In hcl terms...
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`:
//!     - 1 `identifier`
//!     - followed by 0 or more `labels`
//!     - and a `body` enclosed in `{` and `}`
//!
//! ### Dynamic blocks
//!
//! Instead of writing N sibling blocks literally, a configuration may write
//! one directive that generates them:
//!
//! ```hcl
//! dynamic "setting" {
//!   for_each = ["a", "b"]
//!   iterator = s
//!
//!   content {
//!     name = s.value
//!   }
//! }
//! ```
//!
//! This is equivalent to two literal `setting` blocks with `name = "a"` and
//! `name = "b"`. The `iterator` name defaults to the generated block type,
//! `labels` (a list of expressions) fills the generated blocks' label slots,
//! and directives nest: a `dynamic` inside another directive's `content`
//! expands too and can reference the outer iterator by name.
//!
//! ### Expansion
//!
//! [expand_body::expand] wraps a parsed body ([hcl_edit::structure::Body])
//! in an [expand_body::ExpandBody]. Callers describe what they want with a
//! [schema::BodySchema] and ask for it with `content` (strict) or
//! `partial_content` (best-effort plus a residual view for later passes).
//! For every requested block type the view returns literal blocks unchanged
//! and, for each `dynamic` directive labeled with that type, decodes the
//! directive (spec decoding), iterates its `for_each`/`count` cardinality
//! and emits one generated block per element, bound to an
//! [iteration::Iteration]. Generated bodies expand lazily on their own
//! `content` calls, which is what makes arbitrary nesting work.
//!
//! ### Evaluation
//!
//! Because this happens at check time, expressions evaluate to a
//! [value::Value] that may be null, *unknown* (not resolvable yet) or
//! *marked* (tainted by a sensitive source). [eval::Scope] evaluates the
//! common forms directly and delegates the rest to [hcl::eval], see the
//! module docs for the exact split. Unknown cardinalities do not fail:
//! queries come back as [expand_body::Resolution::Deferred] with placeholder
//! blocks whose unresolvable fields are unknown-of-expected-type.
//!
//! Nothing here performs I/O, and every published structure is immutable,
//! so one expanded view can serve many rule executions concurrently.
pub mod diagnostics;
pub mod eval;
pub mod expand_body;
mod expand_spec;
pub mod iteration;
pub mod schema;
pub mod value;
mod visit;

/// Utility macro to parse a [hcl_edit::structure::Body]
///
/// ```
/// # use dynhcl::hcl_body;
/// hcl_body!("attribute = 42");
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use dynhcl::hcl_body;
/// hcl_body!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_body {
    { $expr:expr } => {
        hcl_edit::parser::parse_body($expr).expect("body must parse")
    };
}
