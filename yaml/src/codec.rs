//! # Tree ⇄ Document Codec
//!
//! Converts a [`Config`] into a comment-carrying [`Document`] and back.
//!
//! Saving walks each section's values (defaults included when the tree
//! copies them), attaching block comments to the key node and inline
//! comments to the key for composite values or to the value for scalars.
//! The configured header is written above the first entry followed by one
//! blank separator line, which loading strips again.
//!
//! Loading fills a staging tree and only swaps it in once the whole
//! document has been converted, so a rejected document leaves the target
//! untouched.

use crate::document::{self, Document, EmitOptions, Node, NodeKind, NodeTuple};
use config::{
    CommentLine, Config, ConfigError, ConfigSection, ConfigSectionMut, SERIALIZED_TYPE_KEY,
    Section, SectionId, SerializationError, SerializationRegistry, SerializedMap, Value
};
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

/// What to store when a typed object's type is registered but none of its
/// reconstruction strategies succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedObjectPolicy {
    /// Store the serialized map as a plain map value.
    #[default]
    KeepRawMap,
    /// Leave the entry out.
    Drop,
    /// Reject the whole document.
    Fail
}

/// YAML codec bound to a serialization registry.
///
/// ## Usage
/// ```rust
/// use config::{Config, ConfigSection, ConfigSectionMut, SerializationRegistry};
/// use yaml::YamlCodec;
///
/// let registry = SerializationRegistry::new();
/// let codec = YamlCodec::new(&registry);
///
/// let mut config = Config::new();
/// config.set("server.port", 8080);
/// config.set_comments("server", vec![Some("Network".to_string())]);
///
/// let text = codec.save_to_string(&config).unwrap();
/// assert_eq!(text, "# Network\nserver:\n  port: 8080\n");
///
/// let mut loaded = Config::new();
/// codec.load_from_string(&mut loaded, &text).unwrap();
/// assert_eq!(loaded.get_int("server.port"), 8080);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct YamlCodec<'r> {
    registry: &'r SerializationRegistry,
    policy: UnresolvedObjectPolicy
}

impl<'r> YamlCodec<'r> {
    pub fn new(registry: &'r SerializationRegistry) -> Self {
        Self {
            registry,
            policy: UnresolvedObjectPolicy::default()
        }
    }

    pub fn with_policy(mut self, policy: UnresolvedObjectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &'r SerializationRegistry {
        self.registry
    }

    pub fn policy(&self) -> UnresolvedObjectPolicy {
        self.policy
    }

    /// Renders the whole tree. An empty tree without header or footer is
    /// the empty string.
    pub fn save_to_string(&self, config: &Config) -> Result<String, ConfigError> {
        let options = config.options();
        let root = self.section_node(config.root(), options.parse_comments)?;

        let mut header = options.header.clone();
        if !header.is_empty() {
            header.push(None);
        }
        let footer = options.footer.clone();

        let empty = matches!(&root.kind, NodeKind::Mapping(tuples) if tuples.is_empty());
        if empty && header.is_empty() && footer.is_empty() {
            return Ok(String::new());
        }

        let document = Document {
            block_comments: header,
            root: Some(root),
            end_comments: footer
        };
        let emit_options = EmitOptions {
            indent: options.effective_indent(),
            width: options.width,
            emit_comments: options.parse_comments
        };

        let text = document::emit(&document, &emit_options)
            .map_err(|e| ConfigError::invalid(e.to_string()))?;
        debug!(bytes = text.len(), "Saved configuration");
        Ok(text)
    }

    /// Replaces the contents of `config` with the document in `contents`.
    ///
    /// ## Errors
    /// `InvalidConfig` when the text is not valid YAML or its top level is
    /// not a mapping; `Serialization` when a typed object names an unknown
    /// alias. On error `config` is left as it was.
    pub fn load_from_string(&self, config: &mut Config, contents: &str) -> Result<(), ConfigError> {
        let parse_comments = config.options().parse_comments;
        let document = document::parse(contents, parse_comments)
            .map_err(|e| ConfigError::invalid(e.to_string()))?;

        let Some(root) = document.root else {
            debug!("Loaded empty document");
            config.clear();
            return Ok(());
        };

        let NodeKind::Mapping(mut tuples) = root.kind else {
            return Err(ConfigError::invalid("Top level is not a Map."));
        };

        let mut header_lines = document.block_comments;
        if header_lines.is_empty() {
            if let Some(first) = tuples.first_mut() {
                header_lines = split_header(&mut first.key.block_comments);
            }
        }

        let mut staging = Config::with_options(config.options().clone());
        let root_id = staging.root_id();
        let count = tuples.len();
        self.fill_section(&mut staging, root_id, tuples)?;

        config.replace_contents(staging);
        let options = config.options_mut();
        options.header = load_header(header_lines);
        options.footer = document.end_comments;

        debug!(entries = count, "Loaded configuration");
        Ok(())
    }

    fn section_node(&self, section: Section<'_>, comments: bool) -> Result<Node, ConfigError> {
        let mut tuples = Vec::new();

        for (key, value) in section.get_values(false) {
            let mut value_node = self.value_node(section.owner(), &value, comments)?;
            let mut key_node = Node::scalar(YamlValue::String(key.clone()));

            if comments {
                key_node.block_comments = section.get_comments(&key);
                let inline = section.get_inline_comments(&key);
                if value_node.is_composite() {
                    key_node.inline_comments = inline;
                } else {
                    value_node.inline_comments = inline;
                }
            }

            tuples.push(NodeTuple {
                key: key_node,
                value: value_node
            });
        }

        Ok(Node::new(NodeKind::Mapping(tuples)))
    }

    fn value_node(&self, tree: &Config, value: &Value, comments: bool) -> Result<Node, ConfigError> {
        let node = match value {
            Value::Section(id) => return self.section_node(tree.section(*id)?, comments),
            Value::Bool(b) => Node::scalar(YamlValue::Bool(*b)),
            Value::Integer(i) => Node::scalar(YamlValue::Number((*i).into())),
            Value::Float(f) => Node::scalar(YamlValue::Number((*f).into())),
            Value::String(s) => Node::scalar(YamlValue::String(s.clone())),
            Value::List(items) => {
                let nodes = items
                    .iter()
                    .map(|item| self.value_node(tree, item, comments))
                    .collect::<Result<Vec<_>, _>>()?;
                Node::new(NodeKind::Sequence(nodes))
            }
            Value::Map(map) => self.map_node(tree, map, comments)?,
            Value::Object(object) => {
                let mut map = SerializedMap::new();
                map.insert(
                    SERIALIZED_TYPE_KEY.to_string(),
                    Value::String(self.registry.get_alias(&**object))
                );
                map.extend(object.serialize());
                self.map_node(tree, &map, comments)?
            }
        };
        Ok(node)
    }

    fn map_node(&self, tree: &Config, map: &SerializedMap, comments: bool) -> Result<Node, ConfigError> {
        let tuples = map
            .iter()
            .map(|(key, value)| {
                Ok(NodeTuple {
                    key: Node::scalar(YamlValue::String(key.clone())),
                    value: self.value_node(tree, value, comments)?
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Node::new(NodeKind::Mapping(tuples)))
    }

    fn fill_section(
        &self,
        staging: &mut Config,
        section: SectionId,
        tuples: Vec<NodeTuple>
    ) -> Result<(), ConfigError> {
        for NodeTuple { key, value } in tuples {
            let name = key.key_text();
            let inline = if value.is_composite() {
                key.inline_comments
            } else {
                value.inline_comments
            };

            match value.kind {
                NodeKind::Mapping(children) if !has_type_key(&children) => {
                    let child = staging.section_mut(section)?.create_section(&name);
                    self.fill_section(staging, child, children)?;
                }
                kind => {
                    let data = self.construct(kind)?;
                    staging.section_mut(section)?.set_value(&name, data);
                }
            }

            let mut view = staging.section_mut(section)?;
            view.set_comments(&name, key.block_comments);
            view.set_inline_comments(&name, inline);
        }
        Ok(())
    }

    /// Plain value of a node. Typed objects are rebuilt bottom-up, so
    /// nested objects are already resolved when their parent is.
    fn construct(&self, kind: NodeKind) -> Result<Option<Value>, ConfigError> {
        match kind {
            NodeKind::Scalar(scalar) => Ok(scalar_value(scalar)),
            NodeKind::Sequence(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = self.construct(item.kind)? {
                        values.push(value);
                    }
                }
                Ok(Some(Value::List(values)))
            }
            NodeKind::Mapping(tuples) => {
                let mut map = SerializedMap::new();
                for NodeTuple { key, value } in tuples {
                    if let Some(value) = self.construct(value.kind)? {
                        map.insert(key.key_text(), value);
                    }
                }
                if map.contains_key(SERIALIZED_TYPE_KEY) {
                    self.resolve_object(map)
                } else {
                    Ok(Some(Value::Map(map)))
                }
            }
        }
    }

    fn resolve_object(&self, map: SerializedMap) -> Result<Option<Value>, ConfigError> {
        if let Some(object) = self.registry.deserialize_object(&map)? {
            return Ok(Some(Value::Object(object)));
        }

        let alias = map
            .get(SERIALIZED_TYPE_KEY)
            .map(ToString::to_string)
            .unwrap_or_default();
        match self.policy {
            UnresolvedObjectPolicy::KeepRawMap => {
                warn!(%alias, "Keeping unresolved object as a plain map");
                Ok(Some(Value::Map(map)))
            }
            UnresolvedObjectPolicy::Drop => {
                warn!(%alias, "Dropping unresolved object");
                Ok(None)
            }
            UnresolvedObjectPolicy::Fail => {
                let type_name = self
                    .registry
                    .class_by_alias(&alias)
                    .map_or(alias.clone(), |d| d.type_name().to_string());
                Err(SerializationError::ReconstructionFailed { type_name }.into())
            }
        }
    }
}

fn has_type_key(tuples: &[NodeTuple]) -> bool {
    tuples.iter().any(|tuple| {
        matches!(&tuple.key.kind, NodeKind::Scalar(YamlValue::String(key)) if key == SERIALIZED_TYPE_KEY)
    })
}

fn scalar_value(scalar: YamlValue) -> Option<Value> {
    match scalar {
        YamlValue::Null => None,
        YamlValue::Bool(b) => Some(Value::Bool(b)),
        YamlValue::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Integer(i)),
            None => n.as_f64().map(Value::Float)
        },
        YamlValue::String(s) => Some(Value::String(s)),
        YamlValue::Tagged(tagged) => scalar_value(tagged.value),
        other => Some(Value::String(document::scalar_text(&other)))
    }
}

/// Moves the comment lines up to and including the last blank line of the
/// first key into the document header.
fn split_header(first_key_comments: &mut Vec<CommentLine>) -> Vec<CommentLine> {
    let Some(index) = first_key_comments.iter().rposition(Option::is_none) else {
        return Vec::new();
    };
    let own = first_key_comments.split_off(index + 1);
    std::mem::replace(first_key_comments, own)
}

/// Drops the separator line written after the header, then any leading
/// blank lines.
fn load_header(mut lines: Vec<CommentLine>) -> Vec<CommentLine> {
    lines.pop();
    let first_text = lines
        .iter()
        .position(Option::is_some)
        .unwrap_or(lines.len());
    lines.split_off(first_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ConfigOptions;

    fn line(text: &str) -> CommentLine {
        Some(text.to_string())
    }

    #[test]
    fn test_empty_tree_saves_as_empty_string() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        assert_eq!(codec.save_to_string(&Config::new()).unwrap(), "");
    }

    #[test]
    fn test_empty_tree_with_header_saves_flow_map() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);
        let config = Config::with_options(ConfigOptions::default().with_header([Some("Title")]));

        assert_eq!(codec.save_to_string(&config).unwrap(), "# Title\n\n{}\n");
    }

    #[test]
    fn test_save_layout() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::new();
        config.set("name", "svc");
        config.set("ports", vec![80, 443]);
        config.set("db.url", "jdbc");
        config.set_inline_comments("name", vec![line("service name")]);
        config.set_inline_comments("ports", vec![line("listeners")]);
        config.set_comments("db", vec![None, line("Database")]);

        let text = codec.save_to_string(&config).unwrap();
        assert_eq!(
            text,
            "name: svc # service name\nports: # listeners\n- 80\n- 443\n\n# Database\ndb:\n  url: jdbc\n"
        );
    }

    #[test]
    fn test_save_without_comments() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::with_options(
            ConfigOptions::default()
                .with_parse_comments(false)
                .with_header([Some("Title")])
        );
        config.set("a", 1);
        config.set_comments("a", vec![line("hidden")]);

        assert_eq!(codec.save_to_string(&config).unwrap(), "a: 1\n");
    }

    #[test]
    fn test_save_includes_copied_defaults() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::with_options(ConfigOptions::default().with_copy_defaults(true));
        config.add_default("a", 1);
        config.add_default("s.x", true);
        config.set("b", 2);

        assert_eq!(
            codec.save_to_string(&config).unwrap(),
            "a: 1\ns:\n  x: true\nb: 2\n"
        );
    }

    #[test]
    fn test_load_header_and_footer() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::new();
        codec
            .load_from_string(&mut config, "# Title\n#\n\n# about a\na: 1\n# the end\n")
            .unwrap();

        assert_eq!(config.options().header, vec![line("Title"), line("")]);
        assert_eq!(config.options().footer, vec![line("the end")]);
        assert_eq!(config.get_comments("a"), vec![line("about a")]);
    }

    #[test]
    fn test_load_rejects_non_mapping_and_keeps_tree() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::new();
        config.set("keep", 1);

        let result = codec.load_from_string(&mut config, "- a\n- b\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig { .. })));
        assert_eq!(config.get_int("keep"), 1);

        let result = codec.load_from_string(&mut config, "a: [broken\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig { .. })));
        assert_eq!(config.get_int("keep"), 1);
    }

    #[test]
    fn test_load_empty_document_clears_tree() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::with_options(ConfigOptions::default().with_header([Some("kept")]));
        config.set("a", 1);

        codec.load_from_string(&mut config, "# just a comment\n").unwrap();

        assert!(config.is_empty());
        assert_eq!(config.options().header, vec![line("kept")]);
    }

    #[test]
    fn test_load_values() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::new();
        codec
            .load_from_string(
                &mut config,
                "int: 3\nfloat: 2.5\nflag: true\nnothing: ~\nlist: [1, null, two]\nmap:\n  nested:\n    deep: x\n1: numeric key\n"
            )
            .unwrap();

        assert!(config.is_int("int"));
        assert!(config.is_double("float"));
        assert!(config.is_boolean("flag"));
        assert!(!config.contains("nothing", true));
        assert_eq!(
            config.get_list("list"),
            Some(vec![Value::Integer(1), Value::from("two")])
        );
        assert!(config.is_configuration_section("map.nested"));
        assert_eq!(config.get_string("map.nested.deep").as_deref(), Some("x"));
        assert_eq!(config.get_string("1").as_deref(), Some("numeric key"));
    }

    #[test]
    fn test_load_detaches_previous_handles() {
        let registry = SerializationRegistry::new();
        let codec = YamlCodec::new(&registry);

        let mut config = Config::new();
        let old = config.create_section("old");
        codec.load_from_string(&mut config, "a: 1\n").unwrap();

        assert!(config.section(old).is_err());
        assert_eq!(config.get_keys(false).len(), 1);
    }

    #[test]
    fn test_split_header() {
        let mut comments = vec![line("Title"), None, line("first key")];
        let header = split_header(&mut comments);

        assert_eq!(header, vec![line("Title"), None]);
        assert_eq!(comments, vec![line("first key")]);

        let mut comments = vec![line("no blank")];
        assert!(split_header(&mut comments).is_empty());
        assert_eq!(comments, vec![line("no blank")]);
    }

    #[test]
    fn test_load_header_strips_leading_blanks() {
        assert_eq!(
            load_header(vec![None, None, line("Title"), line(""), None]),
            vec![line("Title"), line("")]
        );
        assert!(load_header(Vec::new()).is_empty());
    }
}
