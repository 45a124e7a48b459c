//! # Default Values
//!
//! A tree may carry a second, independent tree of default values. Lookups
//! that miss in the tree fall back to it, and with
//! [`copy_defaults`](crate::ConfigOptions::copy_defaults) its entries are
//! enumerated and persisted as if they were set.
//!
//! The default tree is created lazily on the first default added.

use crate::access::{ConfigSection, ConfigSectionMut};
use crate::section::Config;
use crate::value::Value;
use tracing::{debug, info};

impl Config {
    /// Stores a default value for `path`, relative to the root.
    pub fn add_default(&mut self, path: &str, value: impl Into<Value>) {
        self.defaults
            .get_or_insert_with(|| Box::new(Config::new()))
            .set(path, value);
    }

    /// Stores every `(path, value)` pair as a default.
    pub fn add_defaults<I, K, V>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>
    {
        let mut count = 0usize;
        for (path, value) in defaults {
            self.add_default(path.as_ref(), value);
            count += 1;
        }
        debug!(count, "Added defaults");
    }

    /// Copies every leaf of `source` into the default tree.
    ///
    /// # M-CANONICAL-DOCS
    ///
    /// ## Purpose
    /// Layers a complete tree (usually one loaded from a bundled resource)
    /// underneath this one. Sections themselves are not copied, only the
    /// values below them, so existing defaults in other branches survive.
    ///
    /// ## Usage
    /// ```rust
    /// use config::{Config, ConfigSection, ConfigSectionMut};
    ///
    /// let mut bundled = Config::new();
    /// bundled.set("server.port", 8080);
    ///
    /// let mut config = Config::new();
    /// config.add_defaults_from(&bundled, "bundled");
    /// assert_eq!(config.get_int("server.port"), 8080);
    /// ```
    pub fn add_defaults_from(&mut self, source: &Config, source_name: &str) {
        let mut changes = Vec::new();

        for (path, value) in source.get_values(true) {
            if matches!(value, Value::Section(_)) {
                continue;
            }
            changes.push(format!("{path} = {value}"));
            self.add_default(&path, value);
        }

        if !changes.is_empty() {
            info!("Defaults from {}: {:?}", source_name, changes);
        }
    }

    /// Replaces the default tree.
    pub fn set_defaults(&mut self, defaults: Config) {
        self.defaults = Some(Box::new(defaults));
    }

    pub fn defaults(&self) -> Option<&Config> {
        self.defaults.as_deref()
    }

    pub fn defaults_mut(&mut self) -> Option<&mut Config> {
        self.defaults.as_deref_mut()
    }

    pub fn take_defaults(&mut self) -> Option<Config> {
        self.defaults.take().map(|defaults| *defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConfigOptions;

    #[test]
    fn test_default_tree_created_lazily() {
        let mut config = Config::new();
        assert!(config.defaults().is_none());

        config.add_default("a", 1);

        assert!(config.defaults().is_some());
        assert!(config.is_empty());
    }

    #[test]
    fn test_add_defaults_from_iterator() {
        let mut config = Config::new();
        config.add_defaults([("a.b", 1), ("c", 2)]);

        assert_eq!(config.get_int("a.b"), 1);
        assert_eq!(config.get_int("c"), 2);
        assert!(config.is_configuration_section("a"));
    }

    #[test]
    fn test_add_defaults_from_config_copies_leaves() {
        let mut source = Config::new();
        source.set("server.port", 8080);
        source.set("server.tls.enabled", true);
        source.set("name", "svc");

        let mut config = Config::new();
        config.add_default("server.host", "localhost");
        config.add_defaults_from(&source, "bundled");

        assert_eq!(config.get_int("server.port"), 8080);
        assert!(config.get_boolean("server.tls.enabled"));
        assert_eq!(config.get_string("name").as_deref(), Some("svc"));
        assert_eq!(config.get_string("server.host").as_deref(), Some("localhost"));
    }

    #[test]
    fn test_own_value_shadows_default() {
        let mut config = Config::new();
        config.add_default("port", 80);
        config.set("port", 443);

        assert_eq!(config.get_int("port"), 443);
        assert_eq!(config.default_value("port"), Some(Value::Integer(80)));
    }

    #[test]
    fn test_set_and_take_defaults() {
        let mut defaults = Config::new();
        defaults.set("x", 1);

        let mut config = Config::with_options(ConfigOptions::default().with_copy_defaults(true));
        config.set_defaults(defaults);
        assert!(config.is_set("x"));

        if let Some(defaults) = config.defaults_mut() {
            defaults.set("y", 2);
        }
        assert_eq!(config.get_int("y"), 2);

        let taken = config.take_defaults().unwrap();
        assert_eq!(taken.get_int("x"), 1);
        assert!(!config.contains("x", false));
    }

    #[test]
    fn test_default_section_view() {
        let mut config = Config::new();
        config.add_default("db.url", "jdbc");
        config.set("db.user", "admin");

        let db = config.section_at("db").unwrap();
        let defaults = db.default_section().unwrap();

        assert_eq!(defaults.current_path(), "db");
        assert_eq!(defaults.get_string("url").as_deref(), Some("jdbc"));
        assert!(!defaults.contains("user", true));
    }
}
