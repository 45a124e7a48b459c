//! # Section Access
//!
//! [`ConfigSection`] is the read API shared by the root [`Config`] and by
//! section views; [`ConfigSectionMut`] adds mutation. Both only need the
//! owning tree and the section handle, every operation is provided on top.
//!
//! Lookups fall back to the default tree when a path is missing. Typed
//! getters narrow the resolved value and fall back to the typed default
//! when it has the wrong shape.

use crate::conversions::{
    bool_item, byte_item, char_item, coerce_list, double_item, float_item, int_item, long_item,
    short_item, string_item, to_double, to_int, to_long
};
use crate::section::{Config, Section, SectionId, SectionMut};
use crate::serialization::ConfigSerializable;
use crate::value::{CommentLine, SerializedMap, Value};
use errors::ConfigError;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

pub trait ConfigSection {
    /// The tree that owns this section.
    fn tree(&self) -> &Config;

    fn section_id(&self) -> SectionId;

    /// Key of this section in its parent; empty for the root.
    fn name(&self) -> &str {
        self.tree().name_of(self.section_id())
    }

    /// Full path from the root; empty for the root.
    fn current_path(&self) -> &str {
        self.tree().full_path_of(self.section_id())
    }

    fn parent(&self) -> Option<SectionId> {
        self.tree().parent_of(self.section_id())
    }

    fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Resolves `path` here, then in the default tree. An empty path is this
    /// section itself.
    fn get(&self, path: &str) -> Option<Value> {
        self.tree().resolve(self.section_id(), path)
    }

    /// Resolves `path` here only, returning `def` when it does not resolve.
    fn get_or(&self, path: &str, def: Option<Value>) -> Option<Value> {
        self.tree().get_in(self.section_id(), path, def)
    }

    /// Value the default tree holds for `path`, relative to this section.
    fn default_value(&self, path: &str) -> Option<Value> {
        self.tree().default_in(self.section_id(), path)
    }

    fn contains(&self, path: &str, ignore_default: bool) -> bool {
        if ignore_default {
            self.get_or(path, None).is_some()
        } else {
            self.get(path).is_some()
        }
    }

    /// With `copy_defaults` a default counts as set.
    fn is_set(&self, path: &str) -> bool {
        if self.tree().options().copy_defaults {
            self.contains(path, false)
        } else {
            self.get_or(path, None).is_some()
        }
    }

    /// Keys of this section, deep keys as full relative paths.
    fn get_keys(&self, deep: bool) -> IndexSet<String> {
        self.tree().keys_in(self.section_id(), deep)
    }

    fn get_values(&self, deep: bool) -> IndexMap<String, Value> {
        self.tree().values_in(self.section_id(), deep)
    }

    /// Section at `path`, possibly one owned by the default tree. Never
    /// creates anything; see [`ConfigSectionMut::get_configuration_section`].
    fn configuration_section(&self, path: &str) -> Option<SectionId> {
        self.get(path)?.as_section()
    }

    fn is_configuration_section(&self, path: &str) -> bool {
        self.configuration_section(path).is_some()
    }

    /// Shared view of the section at `path`.
    fn section_at(&self, path: &str) -> Option<Section<'_>> {
        let id = self.configuration_section(path)?;
        self.tree().section(id).ok()
    }

    /// Counterpart of this section in the default tree.
    fn default_section(&self) -> Option<Section<'_>> {
        self.tree().default_section_of(self.section_id())
    }

    fn get_comments(&self, path: &str) -> Vec<CommentLine> {
        self.tree()
            .cell_in(self.section_id(), path)
            .map(|cell| cell.comments().to_vec())
            .unwrap_or_default()
    }

    fn get_inline_comments(&self, path: &str) -> Vec<CommentLine> {
        self.tree()
            .cell_in(self.section_id(), path)
            .map(|cell| cell.inline_comments().to_vec())
            .unwrap_or_default()
    }

    fn get_string(&self, path: &str) -> Option<String> {
        let def = self
            .default_value(path)
            .filter(Value::is_primitive)
            .map(|v| v.to_string());
        self.get_string_or(path, def)
    }

    /// Only string values are returned; any other value yields `def`.
    fn get_string_or(&self, path: &str, def: Option<String>) -> Option<String> {
        match self.get_or(path, None) {
            Some(Value::String(s)) => Some(s),
            _ => def
        }
    }

    fn is_string(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::String(_)))
    }

    fn get_int(&self, path: &str) -> i32 {
        let def = self
            .default_value(path)
            .filter(Value::is_number)
            .map_or(0, |v| to_int(&v));
        self.get_int_or(path, def)
    }

    fn get_int_or(&self, path: &str, def: i32) -> i32 {
        match self.get_or(path, None) {
            Some(v) if v.is_number() => to_int(&v),
            _ => def
        }
    }

    /// An integer that fits an `i32`.
    fn is_int(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Integer(i)) if i32::try_from(i).is_ok())
    }

    fn get_boolean(&self, path: &str) -> bool {
        let def = self
            .default_value(path)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.get_boolean_or(path, def)
    }

    fn get_boolean_or(&self, path: &str, def: bool) -> bool {
        match self.get_or(path, None) {
            Some(Value::Bool(b)) => b,
            _ => def
        }
    }

    fn is_boolean(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Bool(_)))
    }

    fn get_double(&self, path: &str) -> f64 {
        let def = self
            .default_value(path)
            .filter(Value::is_number)
            .map_or(0.0, |v| to_double(&v));
        self.get_double_or(path, def)
    }

    fn get_double_or(&self, path: &str, def: f64) -> f64 {
        match self.get_or(path, None) {
            Some(v) if v.is_number() => to_double(&v),
            _ => def
        }
    }

    fn is_double(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Float(_)))
    }

    fn get_long(&self, path: &str) -> i64 {
        let def = self
            .default_value(path)
            .filter(Value::is_number)
            .map_or(0, |v| to_long(&v));
        self.get_long_or(path, def)
    }

    fn get_long_or(&self, path: &str, def: i64) -> i64 {
        match self.get_or(path, None) {
            Some(v) if v.is_number() => to_long(&v),
            _ => def
        }
    }

    fn is_long(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Integer(_)))
    }

    fn get_list(&self, path: &str) -> Option<Vec<Value>> {
        let def = match self.default_value(path) {
            Some(Value::List(items)) => Some(items),
            _ => None
        };
        self.get_list_or(path, def)
    }

    fn get_list_or(&self, path: &str, def: Option<Vec<Value>>) -> Option<Vec<Value>> {
        match self.get_or(path, None) {
            Some(Value::List(items)) => Some(items),
            _ => def
        }
    }

    fn is_list(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::List(_)))
    }

    /// Primitive elements rendered as strings; collections are skipped.
    fn get_string_list(&self, path: &str) -> Vec<String> {
        self.coerced_list(path, string_item)
    }

    /// Numbers and numeric strings; everything else is skipped.
    fn get_integer_list(&self, path: &str) -> Vec<i32> {
        self.coerced_list(path, int_item)
    }

    fn get_long_list(&self, path: &str) -> Vec<i64> {
        self.coerced_list(path, long_item)
    }

    fn get_double_list(&self, path: &str) -> Vec<f64> {
        self.coerced_list(path, double_item)
    }

    fn get_float_list(&self, path: &str) -> Vec<f32> {
        self.coerced_list(path, float_item)
    }

    fn get_short_list(&self, path: &str) -> Vec<i16> {
        self.coerced_list(path, short_item)
    }

    fn get_byte_list(&self, path: &str) -> Vec<i8> {
        self.coerced_list(path, byte_item)
    }

    fn get_boolean_list(&self, path: &str) -> Vec<bool> {
        self.coerced_list(path, bool_item)
    }

    fn get_character_list(&self, path: &str) -> Vec<char> {
        self.coerced_list(path, char_item)
    }

    /// Map elements of the list at `path`.
    fn get_map_list(&self, path: &str) -> Vec<SerializedMap> {
        self.coerced_list(path, |v| v.as_map().cloned())
    }

    fn coerced_list<T>(&self, path: &str, coerce: impl Fn(&Value) -> Option<T>) -> Vec<T> {
        self.get_list(path)
            .map(|items| coerce_list(&items, coerce))
            .unwrap_or_default()
    }

    fn get_object(&self, path: &str) -> Option<Arc<dyn ConfigSerializable>> {
        match self.get(path) {
            Some(Value::Object(object)) => Some(object),
            _ => None
        }
    }

    /// Typed object of type `T` stored at `path`.
    fn get_serializable<T>(&self, path: &str) -> Option<T>
    where
        T: ConfigSerializable + Clone
    {
        let def = self
            .default_value(path)
            .and_then(|v| downcast_value::<T>(&v));
        self.get_serializable_or(path, def)
    }

    fn get_serializable_or<T>(&self, path: &str, def: Option<T>) -> Option<T>
    where
        T: ConfigSerializable + Clone
    {
        self.get_or(path, None)
            .and_then(|v| downcast_value::<T>(&v))
            .or(def)
    }
}

fn downcast_value<T: ConfigSerializable + Clone>(value: &Value) -> Option<T> {
    value.as_object()?.downcast_ref::<T>().cloned()
}

pub trait ConfigSectionMut: ConfigSection {
    fn tree_mut(&mut self) -> &mut Config;

    /// Stores `value` at `path`, creating missing sections on the way.
    /// An existing entry keeps its comments.
    fn set(&mut self, path: &str, value: impl Into<Value>) {
        self.set_value(path, Some(value.into()));
    }

    /// `None` removes the entry at `path`.
    fn set_value(&mut self, path: &str, value: Option<Value>) {
        let id = self.section_id();
        self.tree_mut().set_in(id, path, value);
    }

    fn remove(&mut self, path: &str) {
        self.set_value(path, None);
    }

    /// Creates an empty section at `path`, replacing whatever was stored
    /// there (its comments included).
    fn create_section(&mut self, path: &str) -> SectionId {
        let id = self.section_id();
        self.tree_mut().create_section_in(id, path)
    }

    /// Creates a section filled from `map`; nested maps become sections.
    fn create_section_from(&mut self, path: &str, map: &SerializedMap) -> SectionId {
        let id = self.section_id();
        self.tree_mut().create_section_from(id, path, map)
    }

    /// Own section at `path`. When only the default tree has a section
    /// there, an empty own section is created and returned.
    fn get_configuration_section(&mut self, path: &str) -> Option<SectionId> {
        let id = self.section_id();
        self.tree_mut().configuration_section_in(id, path)
    }

    fn section_at_mut(&mut self, path: &str) -> Option<SectionMut<'_>> {
        let id = self.get_configuration_section(path)?;
        self.tree_mut().section_mut(id).ok()
    }

    /// No-op when nothing is stored at `path`.
    fn set_comments(&mut self, path: &str, comments: Vec<CommentLine>) {
        let id = self.section_id();
        if let Some(cell) = self.tree_mut().cell_in_mut(id, path) {
            cell.set_comments(comments);
        }
    }

    fn set_inline_comments(&mut self, path: &str, comments: Vec<CommentLine>) {
        let id = self.section_id();
        if let Some(cell) = self.tree_mut().cell_in_mut(id, path) {
            cell.set_inline_comments(comments);
        }
    }

    /// Stores a default for `path` relative to this section.
    ///
    /// ## Errors
    /// `UnsupportedOperation` on the root; use [`Config::add_default`].
    fn add_default(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        if self.is_root() {
            return Err(ConfigError::UnsupportedOperation {
                operation: "add_default on the root section".to_string()
            });
        }
        let full_path = self.tree().path_of(self.section_id(), path);
        Config::add_default(self.tree_mut(), &full_path, value);
        Ok(())
    }
}

impl ConfigSection for Config {
    fn tree(&self) -> &Config {
        self
    }

    fn section_id(&self) -> SectionId {
        self.root_id()
    }
}

impl ConfigSectionMut for Config {
    fn tree_mut(&mut self) -> &mut Config {
        self
    }
}

impl ConfigSection for Section<'_> {
    fn tree(&self) -> &Config {
        self.config
    }

    fn section_id(&self) -> SectionId {
        self.id
    }
}

impl ConfigSection for SectionMut<'_> {
    fn tree(&self) -> &Config {
        &*self.config
    }

    fn section_id(&self) -> SectionId {
        self.id
    }
}

impl ConfigSectionMut for SectionMut<'_> {
    fn tree_mut(&mut self) -> &mut Config {
        self.config
    }
}
