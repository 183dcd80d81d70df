//! Evidence registry
//!
//! Append-only store of evidence items keyed by id. Items are created during
//! discovery or directive research and referenced by `[TOOL:<id>]` markers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Kind of source an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    #[default]
    Web,
    Academic,
    News,
}

impl EvidenceCategory {
    /// Lenient parse of provider-supplied labels
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "academic" | "paper" | "journal" | "study" | "arxiv" | "pubmed" => Self::Academic,
            "news" => Self::News,
            _ => Self::Web,
        }
    }

    /// Authority rank used for contradiction strength
    pub fn authority(self) -> u8 {
        match self {
            Self::Academic => 3,
            Self::News => 2,
            Self::Web => 1,
        }
    }
}

/// Evidence as reported by a search tool, before registration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvidenceDraft {
    /// Id already announced to the model, honoured when still free
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, alias = "source_type", deserialize_with = "category_label")]
    pub category: EvidenceCategory,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date: Option<String>,
}

/// A registered, immutable piece of evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceItem {
    pub id: String,
    pub source: String,
    pub title: String,
    pub snippet: String,
    pub category: EvidenceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EvidenceItem {
    pub fn from_draft(id: impl Into<String>, draft: EvidenceDraft) -> Self {
        Self {
            id: id.into(),
            source: draft.source,
            title: draft.title,
            snippet: draft.snippet,
            category: draft.category,
            url: draft.url,
            date: draft.date,
        }
    }

    /// Whether this item outranks `other`: higher authority, or equal
    /// authority and a strictly newer date. Dates compare as ISO-like strings.
    pub fn is_stronger_than(&self, other: &EvidenceItem) -> bool {
        let (mine, theirs) = (self.category.authority(), other.category.authority());
        if mine != theirs {
            return mine > theirs;
        }
        match (&self.date, &other.date) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Evidence id already registered: {0}")]
pub struct DuplicateEvidenceId(pub String);

/// Append-only keyed store of evidence items
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceRegistry {
    items: Vec<EvidenceItem>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EvidenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a drafted item under a fresh id.
    ///
    /// Returns `None` when an item with the same normalized title already
    /// exists (search tools routinely return the same source twice). An id
    /// the duplicate already announced becomes an alias of the existing item
    /// so citations made with it still resolve.
    pub fn register(&mut self, draft: EvidenceDraft) -> Option<&EvidenceItem> {
        let title = normalize_title(&draft.title);
        if title.is_empty() {
            return None;
        }
        if let Some(existing) = self.items.iter().position(|i| normalize_title(&i.title) == title) {
            if let Some(alias) = draft.id.filter(|id| is_valid_id(id) && !self.index.contains_key(id)) {
                self.index.insert(alias, existing);
            }
            return None;
        }
        let proposed = draft.id.clone().filter(|id| is_valid_id(id) && !self.index.contains_key(id));
        let id = match proposed {
            Some(id) => id,
            None => loop {
                let candidate = new_evidence_id();
                if !self.index.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        self.push(EvidenceItem::from_draft(id, draft));
        self.items.last()
    }

    /// Insert an item with a caller-chosen id
    #[allow(dead_code)] // Used by fixtures that pin ids
    pub fn insert(&mut self, item: EvidenceItem) -> Result<(), DuplicateEvidenceId> {
        if self.index.contains_key(&item.id) {
            return Err(DuplicateEvidenceId(item.id));
        }
        self.push(item);
        Ok(())
    }

    fn push(&mut self, item: EvidenceItem) {
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.items.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fresh `tool_` id with six hex characters
pub fn new_evidence_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    let suffix: String = hex.chars().take(6).collect();
    format!("tool_{suffix}")
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn category_label<'de, D>(deserializer: D) -> Result<EvidenceCategory, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.as_deref().map(EvidenceCategory::from_label).unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
