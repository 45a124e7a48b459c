//! # Tree Options
//!
//! Options owned by a [`Config`](crate::Config): path syntax, default
//! overlay behavior and the knobs the text codec reads when persisting.

use crate::value::CommentLine;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PATH_SEPARATOR: char = '.';
pub const DEFAULT_INDENT: usize = 2;
pub const DEFAULT_WIDTH: usize = 80;

/// Options of one configuration tree.
///
/// ## Fields
/// - `path_separator`: splits paths into section names (default `.`)
/// - `copy_defaults`: when set, default-tree entries count as set and are
///   enumerated and persisted with the tree (default `false`)
/// - `header` / `footer`: comment lines written above the first entry and
///   below the last one
/// - `parse_comments`: read and write comments at all (default `true`)
/// - `indent`: spaces per nesting level, clamped to `1..=10` on output
/// - `width`: preferred line width
///
/// Missing fields take their defaults when deserialized, so options can be
/// kept partially in an application's own settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    pub path_separator: char,
    pub copy_defaults: bool,
    pub header: Vec<CommentLine>,
    pub footer: Vec<CommentLine>,
    pub parse_comments: bool,
    pub indent: usize,
    pub width: usize
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            path_separator: DEFAULT_PATH_SEPARATOR,
            copy_defaults: false,
            header: Vec::new(),
            footer: Vec::new(),
            parse_comments: true,
            indent: DEFAULT_INDENT,
            width: DEFAULT_WIDTH
        }
    }
}

impl ConfigOptions {
    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    pub fn with_copy_defaults(mut self, copy_defaults: bool) -> Self {
        self.copy_defaults = copy_defaults;
        self
    }

    pub fn with_header<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>
    {
        self.header = lines.into_iter().map(|l| l.map(Into::into)).collect();
        self
    }

    pub fn with_footer<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>
    {
        self.footer = lines.into_iter().map(|l| l.map(Into::into)).collect();
        self
    }

    pub fn with_parse_comments(mut self, parse_comments: bool) -> Self {
        self.parse_comments = parse_comments;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Indentation actually used when writing documents.
    pub fn effective_indent(&self) -> usize {
        self.indent.clamp(1, 10)
    }
}
