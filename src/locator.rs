//! Locator value types shared across the engine.
//!
//! A [`Locator`] is an immutable strategy + selector pair constructed at the
//! call site; an [`ElementHandle`] is the opaque, session-scoped reference a
//! driver hands back once a locator resolves. Handles carry weak-reference
//! semantics: a DOM re-render invalidates them, so the engine re-resolves
//! instead of caching them across wait boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy used to match DOM nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Id,
    Name,
    ClassName,
    Css,
    XPath,
    LinkText,
    TagName,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::ClassName => "class-name",
            Strategy::Css => "css",
            Strategy::XPath => "xpath",
            Strategy::LinkText => "link-text",
            Strategy::TagName => "tag-name",
        }
    }
}

/// Immutable strategy + selector pair identifying zero or more DOM nodes.
///
/// Uniqueness is the call site's responsibility; when several nodes match,
/// resolution takes the first in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, value)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.value)
    }
}

/// Opaque, session-scoped reference to a resolved DOM node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Identifier the driver assigned to the node.
    pub element_id: String,
    /// Session the node belongs to; handles are never valid across sessions.
    pub session_id: String,
}

impl ElementHandle {
    pub fn new(element_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            session_id: session_id.into(),
        }
    }
}
