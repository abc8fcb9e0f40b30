//! Allow-list registry of template tags and filters
//!
//! A [`Vocabulary`] only knows the names registered into it. Names on the
//! disabled lists can never be registered and fail with a
//! [`TemplateError::Disabled`] error wherever they appear; any other unknown
//! name is an ordinary parse or render error.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::error::{FeatureKind, TemplateError};
use super::filters;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Tags that iterate, include other templates or compose layouts
pub const DISABLED_TAGS: &[&str] = &["case", "for", "include", "layout", "render", "tablerow"];

/// Filters that transform, search or introspect whole collections
pub const DISABLED_FILTERS: &[&str] = &[
    "array_to_sentence_string",
    "concat",
    "find",
    "find_exp",
    "find_index",
    "find_index_exp",
    "group_by",
    "group_by_exp",
    "has",
    "has_exp",
    "map",
    "newline_to_br",
    "reject",
    "reject_exp",
    "reverse",
    "sort",
    "sort_natural",
    "uniq",
    "where",
    "where_exp",
    "type",
    "push",
    "pop",
    "shift",
    "unshift",
    "compact",
    "sum",
];

/// Behavior bound to a tag name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    If,
    Unless,
    Assign,
    Capture,
    Comment,
    InlineComment,
    Raw,
    Echo,
}

/// Arguments passed to a filter, already evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
    /// Bytes the render may still allocate
    pub budget: usize,
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FilterArgs {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keyword: Vec::new(),
            budget: usize::MAX,
        }
    }

    /// Positional argument `index`, if supplied
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Positional argument `index`, failing when missing
    pub fn required(&self, index: usize, filter: &str) -> Result<&Value, FilterError> {
        self.get(index).ok_or_else(|| {
            FilterError::Invalid(format!("{} expects at least {} argument(s)", filter, index + 1))
        })
    }

    /// Keyword argument `name`, if supplied
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Fail before building a result larger than the remaining budget
    pub fn reserve(&self, bytes: usize) -> Result<(), FilterError> {
        if bytes > self.budget {
            return Err(FilterError::OverBudget { requested: bytes });
        }
        Ok(())
    }
}

/// Why a filter call failed
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Bad input or arguments
    Invalid(String),
    /// The result would not fit in the render's memory budget
    OverBudget { requested: usize },
}

impl From<String> for FilterError {
    fn from(message: String) -> Self {
        FilterError::Invalid(message)
    }
}

impl From<&str> for FilterError {
    fn from(message: &str) -> Self {
        FilterError::Invalid(message.to_string())
    }
}

/// A filter implementation
pub type FilterFn = fn(&Value, &FilterArgs) -> Result<Value, FilterError>;

/// Registry of the tags and filters a sandbox accepts
#[derive(Clone)]
pub struct Vocabulary {
    tags: HashMap<String, TagKind>,
    filters: HashMap<String, FilterFn>,
}

impl Vocabulary {
    /// A vocabulary that accepts nothing
    pub fn empty() -> Self {
        Self {
            tags: HashMap::new(),
            filters: HashMap::new(),
        }
    }

    /// The standard allow-list
    pub fn standard() -> Self {
        let mut vocabulary = Self::empty();
        let tags = [
            ("if", TagKind::If),
            ("unless", TagKind::Unless),
            ("assign", TagKind::Assign),
            ("capture", TagKind::Capture),
            ("comment", TagKind::Comment),
            ("#", TagKind::InlineComment),
            ("raw", TagKind::Raw),
            ("echo", TagKind::Echo),
        ];
        for (name, kind) in tags {
            vocabulary.tags.insert(name.to_string(), kind);
        }
        for (name, filter) in filters::STANDARD_FILTERS {
            vocabulary.filters.insert(name.to_string(), *filter);
        }
        vocabulary
    }

    /// Allow a tag under `name`
    pub fn register_tag(&mut self, name: &str, kind: TagKind) -> Result<(), TemplateError> {
        if is_disabled_tag(name) {
            return Err(TemplateError::disabled(FeatureKind::Tag, name));
        }
        self.tags.insert(name.to_string(), kind);
        Ok(())
    }

    /// Allow a filter under `name`
    pub fn register_filter(&mut self, name: &str, filter: FilterFn) -> Result<(), TemplateError> {
        if is_disabled_filter(name) {
            return Err(TemplateError::disabled(FeatureKind::Filter, name));
        }
        self.filters.insert(name.to_string(), filter);
        Ok(())
    }

    /// Remove a tag from the allow-list
    pub fn remove_tag(&mut self, name: &str) -> bool {
        self.tags.remove(name).is_some()
    }

    /// Remove a filter from the allow-list
    pub fn remove_filter(&mut self, name: &str) -> bool {
        self.filters.remove(name).is_some()
    }

    /// Resolve a tag name
    pub fn lookup_tag(&self, name: &str, position: usize) -> Result<TagKind, TemplateError> {
        if is_disabled_tag(name) {
            return Err(TemplateError::disabled(FeatureKind::Tag, name));
        }
        self.tags
            .get(name)
            .copied()
            .ok_or_else(|| TemplateError::parse(format!("Unknown tag '{}'", name), position))
    }

    /// Resolve a filter name
    pub fn lookup_filter(&self, name: &str) -> Result<FilterFn, TemplateError> {
        if is_disabled_filter(name) {
            return Err(TemplateError::disabled(FeatureKind::Filter, name));
        }
        self.filters
            .get(name)
            .copied()
            .ok_or_else(|| TemplateError::render(format!("Unknown filter '{}'", name)))
    }

    /// Allowed tag names, sorted
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Allowed filter names, sorted
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocabulary")
            .field("tags", &self.tag_names())
            .field("filters", &self.filter_names())
            .finish()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

/// Check the disabled tag list
pub fn is_disabled_tag(name: &str) -> bool {
    DISABLED_TAGS.contains(&name)
}

/// Check the disabled filter list
pub fn is_disabled_filter(name: &str) -> bool {
    DISABLED_FILTERS.contains(&name)
}
