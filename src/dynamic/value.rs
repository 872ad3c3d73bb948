//! Dynamic values with structural type descriptors.
//!
//! Every value knows its own type: a tuple carries the type of each position
//! and an object carries the type of each attribute it actually has. There
//! is no nominal schema and no notion of an optional attribute.

use serde_json::Number;
use std::collections::BTreeMap;

/// String that stands for a value which is not known yet.
///
/// Because of this substitution the literal text `???` cannot be carried as
/// payload data.
pub const UNKNOWN_SENTINEL: &str = "???";

/// Structural type of a [`DynamicValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DynamicType {
    /// No type information (null or unknown without a more specific type).
    Dynamic,
    Bool,
    Number,
    String,
    /// Heterogeneous, fixed-length sequence.
    Tuple(Vec<DynamicType>),
    /// Exact set of attribute names and their types.
    Object(BTreeMap<String, DynamicType>),
}

impl std::fmt::Display for DynamicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DynamicType::Dynamic => write!(f, "dynamic"),
            DynamicType::Bool => write!(f, "bool"),
            DynamicType::Number => write!(f, "number"),
            DynamicType::String => write!(f, "string"),
            DynamicType::Tuple(elements) => {
                write!(f, "tuple([")?;
                for (i, ty) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, "])")
            }
            DynamicType::Object(attributes) => {
                write!(f, "object({{")?;
                for (i, (name, ty)) in attributes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}})")
            }
        }
    }
}

/// A typed value as produced by decoding script output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicValue {
    Null(DynamicType),
    /// Not yet determined; computed by a later phase.
    Unknown(DynamicType),
    Bool(bool),
    Number(Number),
    String(String),
    Tuple(TupleValue),
    Object(ObjectValue),
}

impl DynamicValue {
    /// Untyped null.
    pub fn null() -> Self {
        DynamicValue::Null(DynamicType::Dynamic)
    }

    /// Untyped unknown.
    pub fn unknown() -> Self {
        DynamicValue::Unknown(DynamicType::Dynamic)
    }

    pub fn tuple(elements: Vec<DynamicValue>) -> Self {
        DynamicValue::Tuple(TupleValue::new(elements))
    }

    pub fn object(attributes: BTreeMap<String, DynamicValue>) -> Self {
        DynamicValue::Object(ObjectValue::new(attributes))
    }

    /// The type descriptor of this value.
    pub fn dynamic_type(&self) -> DynamicType {
        match self {
            DynamicValue::Null(ty) | DynamicValue::Unknown(ty) => ty.clone(),
            DynamicValue::Bool(_) => DynamicType::Bool,
            DynamicValue::Number(_) => DynamicType::Number,
            DynamicValue::String(_) => DynamicType::String,
            DynamicValue::Tuple(t) => DynamicType::Tuple(t.element_types.clone()),
            DynamicValue::Object(o) => DynamicType::Object(o.attribute_types.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown(_))
    }

    /// True when no unknown appears anywhere in the value.
    pub fn is_fully_known(&self) -> bool {
        match self {
            DynamicValue::Unknown(_) => false,
            DynamicValue::Tuple(t) => t.elements.iter().all(DynamicValue::is_fully_known),
            DynamicValue::Object(o) => o.attributes.values().all(DynamicValue::is_fully_known),
            _ => true,
        }
    }

    /// Attribute lookup on objects; `None` for any other kind.
    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        match self {
            DynamicValue::Object(o) => o.attributes.get(name),
            _ => None,
        }
    }

    /// Positional lookup on tuples; `None` for any other kind.
    pub fn index(&self, index: usize) -> Option<&DynamicValue> {
        match self {
            DynamicValue::Tuple(t) => t.elements.get(index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Tuple contents together with the per-position types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleValue {
    element_types: Vec<DynamicType>,
    elements: Vec<DynamicValue>,
}

impl TupleValue {
    pub fn new(elements: Vec<DynamicValue>) -> Self {
        let element_types = elements.iter().map(DynamicValue::dynamic_type).collect();
        Self {
            element_types,
            elements,
        }
    }

    pub fn element_types(&self) -> &[DynamicType] {
        &self.element_types
    }

    pub fn elements(&self) -> &[DynamicValue] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Object attributes together with the per-attribute types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectValue {
    attribute_types: BTreeMap<String, DynamicType>,
    attributes: BTreeMap<String, DynamicValue>,
}

impl ObjectValue {
    pub fn new(attributes: BTreeMap<String, DynamicValue>) -> Self {
        let attribute_types = attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.dynamic_type()))
            .collect();
        Self {
            attribute_types,
            attributes,
        }
    }

    pub fn attribute_types(&self) -> &BTreeMap<String, DynamicType> {
        &self.attribute_types
    }

    pub fn attributes(&self) -> &BTreeMap<String, DynamicValue> {
        &self.attributes
    }
}
