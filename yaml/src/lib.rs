//! # YAML Persistence
//!
//! Comment-preserving YAML documents for [`config::Config`] trees.
//!
//! This crate provides:
//! - A document layer ([`document`]) that parses YAML into nodes carrying
//!   block and inline comments, and renders such nodes back to text
//! - [`YamlCodec`], translating between documents and trees, typed objects
//!   included
//! - Stream and path entry points plus the [`YamlConfig`] file handle
//!
//! Values are parsed by `serde_yaml`; comments and layout are handled
//! here since the parser drops them.

pub mod codec;
pub mod document;
pub mod file;

pub use codec::{UnresolvedObjectPolicy, YamlCodec};
pub use document::{Document, DocumentError, EmitOptions, Node, NodeKind, NodeTuple};
pub use errors::ConfigFileError;
pub use file::{YamlConfig, load_from_path, load_from_reader, save_to_path, save_to_writer};
