//! Migration context and item usage contexts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{ContextId, Item, MigrationRecord};

/// Kind of location an item is used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Course,
    Module,
    Category,
    Block,
    User,
    System,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Course => "course",
            ContextKind::Module => "module",
            ContextKind::Category => "category",
            ContextKind::Block => "block",
            ContextKind::User => "user",
            ContextKind::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "course" => Some(Self::Course),
            "module" => Some(Self::Module),
            "category" => Some(Self::Category),
            "block" => Some(Self::Block),
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A location where an item is used, with the tokens it exposes to name
/// formats (`courseid`, `modulename`, `useremail`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    pub id: ContextId,
    pub kind: ContextKind,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl ItemContext {
    pub fn new(id: ContextId, kind: ContextKind) -> Self {
        Self {
            id,
            kind,
            tokens: BTreeMap::new(),
        }
    }

    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(name.into(), value.into());
        self
    }

    /// Replace `%token%` placeholders in a name format.
    ///
    /// `%filename%` is always available. Unknown tokens are left untouched.
    pub fn resolve_text(&self, format: &str, filename: &str) -> String {
        let mut text = format.replace("%filename%", filename);
        for (name, value) in &self.tokens {
            text = text.replace(&format!("%{}%", name), value);
        }
        text
    }
}

/// Mutable state shared by the steps of one migration run.
///
/// The engine owns the context for the duration of a run and lends it to
/// each step in turn.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    /// In-memory copy of the persisted record
    pub record: MigrationRecord,
    /// The original item, absent once it has been deleted
    pub item: Option<Item>,
}

impl MigrationContext {
    pub fn new(record: MigrationRecord, item: Option<Item>) -> Self {
        Self { record, item }
    }
}
