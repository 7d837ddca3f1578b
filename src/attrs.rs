//! Decoded attribute lists
//!
//! A flat list of attribute/value pairs, as produced by an external decoder.
//! The core only reads these; it never encodes or decodes the wire format.

use crate::dict::AttrId;

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U32(u32),
    Octets(Vec<u8>),
    String(String),
}

impl Value {
    /// Interpret the value as an unsigned 32-bit integer, if it is one
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }
}

/// An ordered list of decoded attribute pairs
#[derive(Debug, Clone, Default)]
pub struct Attrs {
    pairs: Vec<(AttrId, Value)>,
}

impl Attrs {
    /// Create an empty list
    pub fn new() -> Self {
        Attrs::default()
    }

    /// Append an attribute pair
    pub fn push(&mut self, id: AttrId, value: Value) {
        self.pairs.push((id, value));
    }

    /// Find the first value for an attribute
    pub fn find(&self, id: AttrId) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(pair_id, _)| *pair_id == id)
            .map(|(_, value)| value)
    }

    /// Find the first value for an attribute, as a u32
    pub fn find_u32(&self, id: AttrId) -> Option<u32> {
        self.find(id).and_then(Value::as_u32)
    }

    /// Iterate over all pairs
    pub fn iter(&self) -> impl Iterator<Item = &(AttrId, Value)> {
        self.pairs.iter()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
