//! # Configuration Store
//!
//! Hierarchical, comment-aware configuration trees.
//!
//! This crate provides:
//! - An arena-backed tree of named sections ([`Config`]) addressed by
//!   separator-delimited paths
//! - A read API ([`ConfigSection`]) and a write API ([`ConfigSectionMut`])
//!   shared by the root and every section view
//! - A default tree consulted on missing paths
//! - Block and inline comments attached to every stored key
//! - A registry that rebuilds typed objects from their serialized maps
//!
//! Persistence lives in the `yaml` crate; nothing here touches the
//! filesystem.
//!
//! # Best Practices
//!
//! - Keep handles ([`SectionId`]) short-lived; loading a document detaches
//!   every handle into the previous contents
//! - Own a [`SerializationRegistry`] per application instead of sharing one

pub mod access;
pub mod conversions;
pub mod defaults;
pub mod options;
pub mod section;
pub mod serialization;
pub mod value;

pub use access::{ConfigSection, ConfigSectionMut};
pub use errors::{ConfigError, SerializationError};
pub use options::{ConfigOptions, DEFAULT_INDENT, DEFAULT_PATH_SEPARATOR, DEFAULT_WIDTH};
pub use section::{Config, Section, SectionId, SectionMut};
pub use serialization::{
    ConfigSerializable, ReconstructionStrategy, SERIALIZED_TYPE_KEY, SerializableType,
    SerializationRegistry, TypeDescriptor, TypeDescriptorBuilder
};
pub use value::{CommentLine, SerializedMap, Value, ValueCell};

/// Traits needed to call section methods.
pub mod prelude {
    pub use crate::access::{ConfigSection, ConfigSectionMut};
}
