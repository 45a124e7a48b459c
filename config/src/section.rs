//! # Section Tree
//!
//! [`Config`] owns every section of one tree in an arena. Sections are
//! addressed by [`SectionId`] handles; a handle records the tree it belongs
//! to and the generation of its slot, so a handle to a section that was
//! removed or overwritten never resolves to a different section later.
//!
//! Ownership only flows downwards: a section is owned by the entry of its
//! parent that holds it. The `parent` link is a plain handle used to rebuild
//! paths, never to keep anything alive.
//!
//! Paths are split on [`ConfigOptions::path_separator`]. A key that contains
//! the separator cannot be addressed as a single key.

use crate::options::ConfigOptions;
use crate::value::{CommentLine, SerializedMap, Value, ValueCell};
use errors::ConfigError;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

const ROOT_SLOT: u32 = 0;

/// Handle to a section inside a [`Config`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId {
    tree: u64,
    slot: u32,
    generation: u32
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.tree, self.slot, self.generation)
    }
}

#[derive(Debug)]
struct SectionNode {
    name: String,
    full_path: String,
    parent: Option<SectionId>,
    entries: IndexMap<String, ValueCell>
}

impl SectionNode {
    fn new(name: String, full_path: String, parent: Option<SectionId>) -> Self {
        Self {
            name,
            full_path,
            parent,
            entries: IndexMap::new()
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SectionNode>
}

/// Section contents lifted out of an arena, used to copy subtrees.
#[derive(Debug)]
struct ExportedCell {
    comments: Vec<CommentLine>,
    inline_comments: Vec<CommentLine>,
    data: ExportedData
}

#[derive(Debug)]
enum ExportedData {
    Value(Value),
    Section(Vec<(String, ExportedCell)>)
}

/// Root of a configuration tree.
///
/// Besides its own sections a `Config` owns an optional default tree (an
/// independent `Config` consulted when a path is missing here) and the
/// [`ConfigOptions`] that every section of the tree shares.
///
/// ## Usage
/// ```rust
/// use config::{Config, ConfigSection, ConfigSectionMut};
///
/// let mut config = Config::new();
/// config.set("server.port", 8080);
/// config.add_default("server.host", "localhost");
///
/// assert_eq!(config.get_int("server.port"), 8080);
/// assert_eq!(config.get_string("server.host").as_deref(), Some("localhost"));
/// assert!(!config.is_set("server.host"));
/// ```
#[derive(Debug)]
pub struct Config {
    tree: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) defaults: Option<Box<Config>>,
    options: ConfigOptions
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self {
            tree: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            slots: vec![Slot {
                generation: 0,
                node: Some(SectionNode::new(String::new(), String::new(), None))
            }],
            free: Vec::new(),
            defaults: None,
            options
        }
    }

    pub fn with_defaults(defaults: Config) -> Self {
        let mut config = Self::new();
        config.defaults = Some(Box::new(defaults));
        config
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ConfigOptions {
        &mut self.options
    }

    pub fn root_id(&self) -> SectionId {
        SectionId {
            tree: self.tree,
            slot: ROOT_SLOT,
            generation: 0
        }
    }

    pub fn root(&self) -> Section<'_> {
        Section {
            config: self,
            id: self.root_id()
        }
    }

    pub fn root_mut(&mut self) -> SectionMut<'_> {
        let id = self.root_id();
        SectionMut { config: self, id }
    }

    /// `true` if `id` is a live section of this tree (defaults excluded).
    pub fn owns(&self, id: SectionId) -> bool {
        self.node(id).is_some()
    }

    /// Shared view of a section of this tree or of its default tree.
    ///
    /// ## Errors
    /// `DetachedSection` when the handle's section was removed, or belongs
    /// to an unrelated tree.
    pub fn section(&self, id: SectionId) -> Result<Section<'_>, ConfigError> {
        self.owner_of(id)
            .map(|config| Section { config, id })
            .ok_or_else(|| ConfigError::DetachedSection {
                handle: id.to_string()
            })
    }

    /// Exclusive view of a section of this tree or of its default tree.
    pub fn section_mut(&mut self, id: SectionId) -> Result<SectionMut<'_>, ConfigError> {
        match self.owner_of_mut(id) {
            Some(config) => Ok(SectionMut { config, id }),
            None => Err(ConfigError::DetachedSection {
                handle: id.to_string()
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries(self.root_id()).is_none_or(IndexMap::is_empty)
    }

    /// Removes every entry of the tree. Defaults and options are kept.
    pub fn clear(&mut self) {
        let root = self.root_id();
        let removed = self
            .node_mut(root)
            .map(|node| std::mem::take(&mut node.entries))
            .unwrap_or_default();
        for (_, cell) in removed {
            self.release(cell.into_data());
        }
    }

    /// Takes over the sections of `other`, keeping this tree's defaults and
    /// options. Every handle into the previous contents becomes detached.
    pub fn replace_contents(&mut self, other: Config) {
        self.tree = other.tree;
        self.slots = other.slots;
        self.free = other.free;
    }

    fn node(&self, id: SectionId) -> Option<&SectionNode> {
        if id.tree != self.tree {
            return None;
        }
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: SectionId) -> Option<&mut SectionNode> {
        if id.tree != self.tree {
            return None;
        }
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Node behind a handle that path operations run on.
    ///
    /// # Panics
    /// When `id` is detached. A view only gets here after its own section
    /// was removed behind its back, which is a bug in the calling code.
    fn attached(&self, id: SectionId) -> &SectionNode {
        match self.node(id) {
            Some(node) => node,
            None => panic!(
                "{}",
                ConfigError::DetachedSection {
                    handle: id.to_string()
                }
            )
        }
    }

    fn owner_of(&self, id: SectionId) -> Option<&Config> {
        if self.owns(id) {
            return Some(self);
        }
        self.defaults.as_deref()?.owner_of(id)
    }

    fn owner_of_mut(&mut self, id: SectionId) -> Option<&mut Config> {
        if self.owns(id) {
            return Some(self);
        }
        self.defaults.as_deref_mut()?.owner_of_mut(id)
    }

    fn entries(&self, id: SectionId) -> Option<&IndexMap<String, ValueCell>> {
        self.node(id).map(|node| &node.entries)
    }

    fn own_cell(&self, id: SectionId, key: &str) -> Option<&ValueCell> {
        self.entries(id)?.get(key)
    }

    fn child_section(&self, id: SectionId, key: &str) -> Option<SectionId> {
        self.own_cell(id, key)?.data().as_section()
    }

    fn split<'p>(&self, path: &'p str) -> (Vec<&'p str>, &'p str) {
        let mut parts: Vec<&str> = path.split(self.options.path_separator).collect();
        let key = parts.pop().unwrap_or_default();
        (parts, key)
    }

    pub(crate) fn name_of(&self, id: SectionId) -> &str {
        &self.attached(id).name
    }

    pub(crate) fn full_path_of(&self, id: SectionId) -> &str {
        &self.attached(id).full_path
    }

    pub(crate) fn parent_of(&self, id: SectionId) -> Option<SectionId> {
        self.attached(id).parent
    }

    /// Path of `key` below `id`, relative to the root, rebuilt from the
    /// parent links with the current separator.
    pub(crate) fn path_of(&self, id: SectionId, key: &str) -> String {
        self.attached(id);
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(section) = current {
            let Some(node) = self.node(section) else {
                break;
            };
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        if !key.is_empty() {
            names.push(key);
        }
        names.join(&self.options.path_separator.to_string())
    }

    /// Own-tree lookup; `def` is returned when the path does not resolve.
    pub(crate) fn get_in(&self, base: SectionId, path: &str, def: Option<Value>) -> Option<Value> {
        self.attached(base);
        if path.is_empty() {
            return Some(Value::Section(base));
        }

        let (parents, key) = self.split(path);
        let mut section = base;
        for name in parents {
            match self.child_section(section, name) {
                Some(child) => section = child,
                None => return def
            }
        }

        match self.own_cell(section, key) {
            Some(cell) => Some(cell.data().clone()),
            None => def
        }
    }

    /// Value the default tree holds for `path` below `base`.
    pub(crate) fn default_in(&self, base: SectionId, path: &str) -> Option<Value> {
        let defaults = self.defaults.as_deref()?;
        defaults.resolve(defaults.root_id(), &self.path_of(base, path))
    }

    /// Own value, falling back to the default tree.
    pub(crate) fn resolve(&self, base: SectionId, path: &str) -> Option<Value> {
        self.get_in(base, path, None)
            .or_else(|| self.default_in(base, path))
    }

    /// The default tree's counterpart of `base`, if it is a section there.
    pub(crate) fn default_section_of(&self, base: SectionId) -> Option<Section<'_>> {
        let defaults = self.defaults.as_deref()?;
        let path = self.path_of(base, "");
        let id = defaults.resolve(defaults.root_id(), &path)?.as_section()?;
        defaults.section(id).ok()
    }

    pub(crate) fn keys_in(&self, base: SectionId, deep: bool) -> IndexSet<String> {
        self.attached(base);
        let mut keys = IndexSet::new();
        if self.options.copy_defaults {
            if let Some(defaults) = self.default_section_of(base) {
                keys.extend(defaults.config.keys_in(defaults.id, deep));
            }
        }
        self.collect_keys(base, None, deep, &mut keys);
        keys
    }

    fn collect_keys(
        &self,
        section: SectionId,
        prefix: Option<&str>,
        deep: bool,
        out: &mut IndexSet<String>
    ) {
        let Some(entries) = self.entries(section) else {
            return;
        };
        for (key, cell) in entries {
            let path = self.join(prefix, key);
            out.insert(path.clone());
            if deep {
                if let Value::Section(child) = cell.data() {
                    self.collect_keys(*child, Some(&path), deep, out);
                }
            }
        }
    }

    /// Own entries replace default entries with the same path and move to
    /// the position of the own entry.
    pub(crate) fn values_in(&self, base: SectionId, deep: bool) -> IndexMap<String, Value> {
        self.attached(base);
        let mut values = IndexMap::new();
        if self.options.copy_defaults {
            if let Some(defaults) = self.default_section_of(base) {
                values.extend(defaults.config.values_in(defaults.id, deep));
            }
        }
        self.collect_values(base, None, deep, &mut values);
        values
    }

    fn collect_values(
        &self,
        section: SectionId,
        prefix: Option<&str>,
        deep: bool,
        out: &mut IndexMap<String, Value>
    ) {
        let Some(entries) = self.entries(section) else {
            return;
        };
        for (key, cell) in entries {
            let path = self.join(prefix, key);
            out.shift_remove(&path);
            out.insert(path.clone(), cell.data().clone());
            if deep {
                if let Value::Section(child) = cell.data() {
                    self.collect_values(*child, Some(&path), deep, out);
                }
            }
        }
    }

    fn join(&self, prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(prefix) => format!("{prefix}{}{key}", self.options.path_separator),
            None => key.to_string()
        }
    }

    pub(crate) fn set_in(&mut self, base: SectionId, path: &str, value: Option<Value>) {
        self.attached(base);
        let (parents, key) = self.split(path);
        let mut section = base;
        for name in parents {
            section = match self.child_section(section, name) {
                Some(child) => child,
                // nothing to remove below a missing section
                None if value.is_none() => return,
                None => self.create_child(section, name)
            };
        }

        match value {
            None => {
                let removed = self
                    .node_mut(section)
                    .and_then(|node| node.entries.shift_remove(key));
                if let Some(cell) = removed {
                    self.release(cell.into_data());
                }
            }
            Some(Value::Section(source)) => self.copy_section_into(section, key, source),
            Some(value) => {
                let Some(node) = self.node_mut(section) else {
                    return;
                };
                let previous = match node.entries.get_mut(key) {
                    Some(cell) => Some(cell.replace_data(value)),
                    None => {
                        node.entries.insert(key.to_string(), ValueCell::new(value));
                        None
                    }
                };
                if let Some(previous) = previous {
                    self.release(previous);
                }
            }
        }
    }

    pub(crate) fn create_section_in(&mut self, base: SectionId, path: &str) -> SectionId {
        self.attached(base);
        let (parents, key) = self.split(path);
        let mut section = base;
        for name in parents {
            section = match self.configuration_section_in(section, name) {
                Some(child) => child,
                None => self.create_child(section, name)
            };
        }
        self.create_child(section, key)
    }

    pub(crate) fn create_section_from(
        &mut self,
        base: SectionId,
        path: &str,
        map: &SerializedMap
    ) -> SectionId {
        let section = self.create_section_in(base, path);
        for (key, value) in map {
            match value {
                Value::Map(nested) => {
                    self.create_section_from(section, key, nested);
                }
                other => self.set_in(section, key, Some(other.clone()))
            }
        }
        section
    }

    /// Section stored at `path`, or a freshly materialized empty one when
    /// only the default tree has a section there.
    pub(crate) fn configuration_section_in(
        &mut self,
        base: SectionId,
        path: &str
    ) -> Option<SectionId> {
        if let Some(value) = self.get_in(base, path, None) {
            return value.as_section();
        }

        match self.default_in(base, path) {
            Some(Value::Section(_)) => {
                debug!(path = %self.path_of(base, path), "Materializing section from defaults");
                Some(self.create_section_in(base, path))
            }
            _ => None
        }
    }

    /// Own-tree cell lookup used by the comment accessors.
    pub(crate) fn cell_in(&self, base: SectionId, path: &str) -> Option<&ValueCell> {
        self.attached(base);
        let (parents, key) = self.split(path);
        let mut section = base;
        for name in parents {
            section = self.child_section(section, name)?;
        }
        self.own_cell(section, key)
    }

    pub(crate) fn cell_in_mut(&mut self, base: SectionId, path: &str) -> Option<&mut ValueCell> {
        self.attached(base);
        let (parents, key) = self.split(path);
        let mut section = base;
        for name in parents {
            section = self.child_section(section, name)?;
        }
        self.node_mut(section)?.entries.get_mut(key)
    }

    fn alloc(&mut self, node: SectionNode) -> SectionId {
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            return SectionId {
                tree: self.tree,
                slot,
                generation: entry.generation
            };
        }

        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node)
        });
        SectionId {
            tree: self.tree,
            slot,
            generation: 0
        }
    }

    /// Creates an empty section under `parent`, replacing whatever cell was
    /// stored under `name`. Nothing is allocated under a detached parent.
    fn create_child(&mut self, parent: SectionId, name: &str) -> SectionId {
        let parent_path = &self.attached(parent).full_path;
        let full_path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}{}{name}", self.options.path_separator)
        };
        let id = self.alloc(SectionNode::new(name.to_string(), full_path, Some(parent)));

        let previous = self.node_mut(parent).and_then(|node| {
            node.entries
                .insert(name.to_string(), ValueCell::new(Value::Section(id)))
        });
        if let Some(previous) = previous {
            self.release(previous.into_data());
        }
        id
    }

    fn release(&mut self, value: Value) {
        if let Value::Section(id) = value {
            self.free_subtree(id);
        }
    }

    fn free_subtree(&mut self, id: SectionId) {
        if id.tree != self.tree || id.slot == ROOT_SLOT {
            return;
        }
        let Some(slot) = self.slots.get_mut(id.slot as usize) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);

        for (_, cell) in node.entries {
            self.release(cell.into_data());
        }
    }

    fn export(&self, id: SectionId) -> Vec<(String, ExportedCell)> {
        let Some(entries) = self.entries(id) else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|(key, cell)| {
                let data = match cell.data() {
                    Value::Section(child) if self.owns(*child) => {
                        ExportedData::Section(self.export(*child))
                    }
                    other => ExportedData::Value(other.clone())
                };
                let exported = ExportedCell {
                    comments: cell.comments().to_vec(),
                    inline_comments: cell.inline_comments().to_vec(),
                    data
                };
                (key.clone(), exported)
            })
            .collect()
    }

    fn import(&mut self, target: SectionId, entries: Vec<(String, ExportedCell)>) {
        for (key, exported) in entries {
            match exported.data {
                ExportedData::Value(value) => self.set_in_place(target, &key, value),
                ExportedData::Section(children) => {
                    let child = self.create_child(target, &key);
                    self.import(child, children);
                }
            }
            if let Some(cell) = self.node_mut(target).and_then(|n| n.entries.get_mut(&key)) {
                cell.set_comments(exported.comments);
                cell.set_inline_comments(exported.inline_comments);
            }
        }
    }

    fn set_in_place(&mut self, section: SectionId, key: &str, value: Value) {
        if let Some(node) = self.node_mut(section) {
            node.entries.insert(key.to_string(), ValueCell::new(value));
        }
    }

    /// Stores a copy of the section `source` under `key`. The cell keeps
    /// the comments it already had.
    fn copy_section_into(&mut self, parent: SectionId, key: &str, source: SectionId) {
        let exported = match self.owner_of(source) {
            Some(owner) => owner.export(source),
            None => {
                warn!(handle = %source, "Storing empty section for detached handle");
                Vec::new()
            }
        };
        let kept = self
            .own_cell(parent, key)
            .map(|cell| (cell.comments().to_vec(), cell.inline_comments().to_vec()));

        let target = self.create_child(parent, key);
        self.import(target, exported);

        if let Some((comments, inline_comments)) = kept {
            if let Some(cell) = self.node_mut(parent).and_then(|n| n.entries.get_mut(key)) {
                cell.set_comments(comments);
                cell.set_inline_comments(inline_comments);
            }
        }
    }
}

/// Shared view of one section.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub(crate) config: &'a Config,
    pub(crate) id: SectionId
}

impl<'a> Section<'a> {
    /// The tree that owns this section.
    pub fn owner(&self) -> &'a Config {
        self.config
    }

    pub fn id(&self) -> SectionId {
        self.id
    }
}

/// Exclusive view of one section.
#[derive(Debug)]
pub struct SectionMut<'a> {
    pub(crate) config: &'a mut Config,
    pub(crate) id: SectionId
}

impl SectionMut<'_> {
    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn as_section(&self) -> Section<'_> {
        Section {
            config: &*self.config,
            id: self.id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ConfigSection, ConfigSectionMut};

    #[test]
    fn test_set_then_get() {
        let mut config = Config::new();
        let root = config.root_id();
        config.set_in(root, "a.b.c", Some(Value::from(1)));

        assert_eq!(config.get_in(root, "a.b.c", None), Some(Value::Integer(1)));
        assert!(config.get_in(root, "a.b", None).unwrap().as_section().is_some());
    }

    #[test]
    fn test_full_path_and_parent() {
        let mut config = Config::new();
        let root = config.root_id();
        let c = config.create_section_in(root, "a.b.c");

        assert_eq!(config.full_path_of(c), "a.b.c");
        assert_eq!(config.name_of(c), "c");
        let b = config.parent_of(c).unwrap();
        assert_eq!(config.full_path_of(b), "a.b");
        assert_eq!(config.path_of(c, "d"), "a.b.c.d");
    }

    #[test]
    fn test_overwriting_section_detaches_it() {
        let mut config = Config::new();
        let root = config.root_id();
        let a = config.create_section_in(root, "a");
        config.set_in(a, "x", Some(Value::from(1)));

        config.set_in(root, "a", Some(Value::from("scalar")));

        assert!(!config.owns(a));
        assert!(matches!(
            config.section(a),
            Err(ConfigError::DetachedSection { .. })
        ));
        // the freed slot is reused with a new generation
        let b = config.create_section_in(root, "b");
        assert!(config.owns(b));
        assert!(!config.owns(a));
    }

    #[test]
    fn test_remove_without_intermediate_creates_nothing() {
        let mut config = Config::new();
        let root = config.root_id();
        config.set_in(root, "missing.leaf", None);

        assert!(config.is_empty());
    }

    #[test]
    fn test_set_section_value_copies_subtree() {
        let mut config = Config::new();
        let root = config.root_id();
        config.set_in(root, "src.x", Some(Value::from(1)));
        let src = config.child_section(root, "src").unwrap();

        config.set_in(root, "dst", Some(Value::Section(src)));
        config.set_in(root, "src.x", Some(Value::from(2)));

        assert_eq!(config.get_in(root, "dst.x", None), Some(Value::Integer(1)));
        assert_ne!(config.child_section(root, "dst"), Some(src));
    }

    #[test]
    fn test_clear_detaches_children() {
        let mut config = Config::new();
        let root = config.root_id();
        let a = config.create_section_in(root, "a");
        config.clear();

        assert!(config.is_empty());
        assert!(!config.owns(a));
        assert!(config.owns(root));
    }

    #[test]
    #[should_panic(expected = "is not attached")]
    fn test_stale_view_refuses_writes() {
        let mut config = Config::new();
        let root = config.root_id();
        let s = config.create_section_in(root, "s");
        let slots = config.slots.len();

        let mut view = config.section_mut(s).unwrap();
        view.tree_mut().remove("s");
        assert_eq!(view.tree().slots.len(), slots);

        view.set("a.b", 2);
    }

    #[test]
    #[should_panic(expected = "is not attached")]
    fn test_stale_view_refuses_reads() {
        let mut config = Config::new();
        let root = config.root_id();
        let s = config.create_section_in(root, "s");
        config.set_in(s, "x", Some(Value::from(1)));
        config.set_in(root, "s", None);

        config.get_in(s, "x", None);
    }

    #[test]
    fn test_detached_parent_allocates_nothing() {
        let mut config = Config::new();
        let root = config.root_id();
        let s = config.create_section_in(root, "s");
        config.set_in(root, "s", None);
        let slots = config.slots.len();
        let free = config.free.len();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            config.create_section_in(s, "child")
        }));

        assert!(result.is_err());
        assert_eq!(config.slots.len(), slots);
        assert_eq!(config.free.len(), free);
    }

    #[test]
    fn test_custom_separator() {
        let mut config =
            Config::with_options(ConfigOptions::default().with_path_separator('/'));
        let root = config.root_id();
        config.set_in(root, "a/b.c", Some(Value::from(true)));

        assert_eq!(config.get_in(root, "a/b.c", None), Some(Value::Bool(true)));
        let keys = config.keys_in(root, true);
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "a/b.c".to_string()]
        );
    }
}
