//! # Configuration File Persistence
//!
//! Whole-document reads and writes of a tree through a [`YamlCodec`].
//!
//! Text is UTF-8; a leading byte order mark is stripped on load. I/O
//! failures surface as [`ConfigFileError::Io`] or
//! [`ConfigFileError::Stream`], data failures as
//! [`ConfigFileError::InvalidConfig`].

use crate::codec::{UnresolvedObjectPolicy, YamlCodec};
use config::{Config, ConfigError, ConfigOptions, SerializationRegistry};
use errors::ConfigFileError;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const BOM: char = '\u{feff}';

fn decode(bytes: Vec<u8>, origin: &str) -> Result<String, ConfigFileError> {
    let text = String::from_utf8(bytes).map_err(|e| ConfigFileError::InvalidConfig {
        origin: origin.to_string(),
        source: ConfigError::invalid(e.to_string())
    })?;

    match text.strip_prefix(BOM) {
        Some(stripped) => Ok(stripped.to_string()),
        None => Ok(text)
    }
}

fn invalid(origin: &str, source: ConfigError) -> ConfigFileError {
    ConfigFileError::InvalidConfig {
        origin: origin.to_string(),
        source
    }
}

/// Replaces the contents of `config` with the document read from `reader`.
pub fn load_from_reader<R: Read>(
    codec: &YamlCodec<'_>,
    config: &mut Config,
    mut reader: R
) -> Result<(), ConfigFileError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let contents = decode(bytes, "stream")?;
    codec
        .load_from_string(config, &contents)
        .map_err(|e| invalid("stream", e))
}

/// Writes the rendered document of `config` to `writer`.
pub fn save_to_writer<W: Write>(
    codec: &YamlCodec<'_>,
    config: &Config,
    mut writer: W
) -> Result<(), ConfigFileError> {
    let contents = codec
        .save_to_string(config)
        .map_err(|e| invalid("stream", e))?;
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Load configuration from a YAML file into `config`.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Reads the whole file and replaces the tree's contents with it. The
/// tree keeps its options and default tree; header and footer are taken
/// from the file.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, ConfigSection, SerializationRegistry};
/// use std::path::Path;
/// use yaml::{YamlCodec, load_from_path};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = SerializationRegistry::new();
///     let mut config = Config::new();
///     load_from_path(&YamlCodec::new(&registry), &mut config, Path::new("config.yml"))?;
///     println!("port: {}", config.get_int("server.port"));
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File missing or unreadable
/// - Text that is not UTF-8
/// - Invalid YAML or a top level that is not a mapping
pub fn load_from_path(
    codec: &YamlCodec<'_>,
    config: &mut Config,
    path: &Path
) -> Result<(), ConfigFileError> {
    let bytes = fs::read(path).map_err(|e| ConfigFileError::io(path, e))?;
    let origin = path.display().to_string();

    let contents = decode(bytes, &origin)?;
    codec
        .load_from_string(config, &contents)
        .map_err(|e| invalid(&origin, e))?;

    debug!(path = %origin, "Loaded configuration file");
    Ok(())
}

/// Renders `config` and writes it to `path`, creating missing parent
/// directories.
pub fn save_to_path(
    codec: &YamlCodec<'_>,
    config: &Config,
    path: &Path
) -> Result<(), ConfigFileError> {
    let origin = path.display().to_string();
    let contents = codec
        .save_to_string(config)
        .map_err(|e| invalid(&origin, e))?;

    create_parent_dirs(path)?;
    fs::write(path, contents).map_err(|e| ConfigFileError::io(path, e))?;

    debug!(path = %origin, "Saved configuration file");
    Ok(())
}

fn create_parent_dirs(path: &Path) -> Result<(), ConfigFileError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| ConfigFileError::io(parent, e))
        }
        _ => Ok(())
    }
}

/// A tree bound to its backing file.
///
/// ## Usage
/// ```rust,no_run
/// use config::{ConfigSection, ConfigSectionMut};
/// use yaml::YamlConfig;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut file = YamlConfig::new("plugins/demo/config.yml");
///     file.load()?;
///     file.config_mut().set("enabled", true);
///     file.save()?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct YamlConfig {
    file: PathBuf,
    config: Config,
    registry: Arc<SerializationRegistry>,
    policy: UnresolvedObjectPolicy
}

impl YamlConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self::with_options(file, ConfigOptions::default())
    }

    pub fn with_options(file: impl Into<PathBuf>, options: ConfigOptions) -> Self {
        Self {
            file: file.into(),
            config: Config::with_options(options),
            registry: Arc::new(SerializationRegistry::new()),
            policy: UnresolvedObjectPolicy::default()
        }
    }

    /// Attaches `defaults` as the default tree.
    pub fn with_defaults(mut self, defaults: Config) -> Self {
        self.config.set_defaults(defaults);
        self
    }

    pub fn with_registry(mut self, registry: Arc<SerializationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_policy(mut self, policy: UnresolvedObjectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Binds `file` and loads it. A file that cannot be loaded is logged
    /// and leaves the tree empty.
    pub fn load_configuration(file: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(file);
        if let Err(e) = config.load() {
            warn!(path = %config.file.display(), "Cannot load configuration: {}", e);
        }
        config
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn registry(&self) -> &SerializationRegistry {
        &self.registry
    }

    /// Takes the fields rather than `&self` so `load` can hold the codec
    /// while the tree is borrowed mutably.
    fn codec(registry: &SerializationRegistry, policy: UnresolvedObjectPolicy) -> YamlCodec<'_> {
        YamlCodec::new(registry).with_policy(policy)
    }

    /// Creates the backing file (and its directories) when missing, then
    /// replaces the tree's contents with the file's document.
    pub fn load(&mut self) -> Result<(), ConfigFileError> {
        self.ensure_file()?;
        let codec = Self::codec(&self.registry, self.policy);
        load_from_path(&codec, &mut self.config, &self.file)
    }

    /// Writes the tree to the backing file.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.ensure_file()?;
        let codec = Self::codec(&self.registry, self.policy);
        save_to_path(&codec, &self.config, &self.file)
    }

    /// Loads the file again, optionally writing the current tree first.
    pub fn reload(&mut self, save_first: bool) -> Result<(), ConfigFileError> {
        if save_first {
            self.save()?;
        }
        self.load()
    }

    /// Removes the backing file. A missing file is not an error.
    pub fn delete(&self) -> Result<(), ConfigFileError> {
        match fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigFileError::io(&self.file, e))
        }
    }

    /// Moves the backing file to `target` and keeps using it there.
    pub fn rename_file(&mut self, target: impl Into<PathBuf>) -> Result<(), ConfigFileError> {
        let target = target.into();
        create_parent_dirs(&target)?;
        fs::rename(&self.file, &target).map_err(|e| ConfigFileError::io(&self.file, e))?;
        debug!(from = %self.file.display(), to = %target.display(), "Renamed configuration file");
        self.file = target;
        Ok(())
    }

    fn ensure_file(&self) -> Result<(), ConfigFileError> {
        if self.file.exists() {
            return Ok(());
        }
        create_parent_dirs(&self.file)?;
        fs::File::create(&self.file).map_err(|e| ConfigFileError::io(&self.file, e))?;
        Ok(())
    }
}
