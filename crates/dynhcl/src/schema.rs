//! content schemas
//!
//! A [BodySchema] describes what a caller wants out of a body: which
//! attributes and which block types. The same schema works against a literal
//! body and against an expanded view, which is what makes expansion
//! transparent to callers.
use crate::value::TypeHint;

/// The shape of content requested from a body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodySchema {
    pub attributes: Vec<AttributeSchema>,
    pub blocks: Vec<BlockHeaderSchema>,
}

impl BodySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn block(mut self, block: BlockHeaderSchema) -> Self {
        self.blocks.push(block);
        self
    }
}

/// One requested attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    pub name: String,
    pub required: bool,
    /// Evaluated values are converted to this type; unresolved values come
    /// back as unknown-of-this-type.
    pub value_type: TypeHint,
}

impl AttributeSchema {
    pub fn required(name: impl Into<String>, value_type: TypeHint) -> Self {
        Self {
            name: name.into(),
            required: true,
            value_type,
        }
    }

    pub fn optional(name: impl Into<String>, value_type: TypeHint) -> Self {
        Self {
            name: name.into(),
            required: false,
            value_type,
        }
    }
}

/// One requested block type
///
/// The label count drives validation of a dynamic directive's `labels`
/// argument: a directive generating blocks of this type must produce exactly
/// `label_names.len()` labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockHeaderSchema {
    pub block_type: String,
    pub label_names: Vec<String>,
}

impl BlockHeaderSchema {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            label_names: Vec::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, label_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_names = label_names.into_iter().map(Into::into).collect();
        self
    }
}
