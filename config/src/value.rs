//! # Stored Values
//!
//! The value model of the section tree: [`Value`] is what a path resolves
//! to, [`ValueCell`] is what a section actually stores under a key (the
//! value plus its block and inline comment lines).

use crate::section::SectionId;
use crate::serialization::ConfigSerializable;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// One comment line attached to a key. `None` is a blank line.
pub type CommentLine = Option<String>;

/// Ordered string-keyed map, used for raw mappings and serialized objects.
pub type SerializedMap = IndexMap<String, Value>;

/// A value stored in (or resolved from) a configuration tree.
///
/// `Section` holds a handle into the arena of the tree that produced it.
/// Handles coming out of the default tree are resolvable through the owning
/// [`Config`](crate::Config) via [`Config::section`](crate::Config::section).
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(SerializedMap),
    Section(SectionId),
    Object(Arc<dyn ConfigSerializable>)
}

impl Value {
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Scalars that render to a plain string (string, number, bool).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Integer(_) | Self::Float(_) | Self::String(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None
        }
    }

    pub fn as_map(&self) -> Option<&SerializedMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None
        }
    }

    pub fn as_section(&self) -> Option<SectionId> {
        match self {
            Self::Section(id) => Some(*id),
            _ => None
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn ConfigSerializable>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Section(a), Self::Section(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.as_any().type_id() == b.as_any().type_id()
                        && a.serialize() == b.serialize())
            }
            _ => false
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Self::Section(id) => write!(f, "Section[{id}]"),
            Self::Object(object) => write!(f, "{object:?}")
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<SerializedMap> for Value {
    fn from(value: SerializedMap) -> Self {
        Self::Map(value)
    }
}

impl From<SectionId> for Value {
    fn from(value: SectionId) -> Self {
        Self::Section(value)
    }
}

impl<T: ConfigSerializable> From<Arc<T>> for Value {
    fn from(value: Arc<T>) -> Self {
        Self::Object(value)
    }
}

/// A stored value together with the comments written around its key.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCell {
    data: Value,
    comments: Vec<CommentLine>,
    inline_comments: Vec<CommentLine>
}

impl ValueCell {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            comments: Vec::new(),
            inline_comments: Vec::new()
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Replaces the value and hands back the previous one. Comments stay.
    pub fn replace_data(&mut self, data: Value) -> Value {
        std::mem::replace(&mut self.data, data)
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn comments(&self) -> &[CommentLine] {
        &self.comments
    }

    pub fn set_comments(&mut self, comments: Vec<CommentLine>) {
        self.comments = comments;
    }

    pub fn inline_comments(&self) -> &[CommentLine] {
        &self.inline_comments
    }

    pub fn set_inline_comments(&mut self, comments: Vec<CommentLine>) {
        self.inline_comments = comments;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_replace_keeps_comments() {
        let mut cell = ValueCell::new(Value::from(1));
        cell.set_comments(vec![Some("port".to_string()), None]);
        cell.set_inline_comments(vec![Some("tcp".to_string())]);

        let old = cell.replace_data(Value::from(2));

        assert_eq!(old, Value::Integer(1));
        assert_eq!(cell.data(), &Value::Integer(2));
        assert_eq!(cell.comments(), &[Some("port".to_string()), None]);
        assert_eq!(cell.inline_comments(), &[Some("tcp".to_string())]);
    }

    #[test]
    fn test_display_renders_floats_with_fraction() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Integer(7).to_string(), "7");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_number_predicates() {
        assert!(Value::Integer(3).is_number());
        assert!(Value::Float(3.5).is_number());
        assert!(!Value::from("3").is_number());
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert!(Value::from("x").is_primitive());
        assert!(!Value::from(vec!["x"]).is_primitive());
    }
}
