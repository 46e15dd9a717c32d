use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Category, Item, ItemId, PatronId, Status},
    lifecycle::TransitionKind,
};

/// Structural predicate over items. Every supplied field must match; a missing or
/// whitespace-only `text` matches every title. Any other text is used as-is, surrounding
/// spaces included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilter {
    pub text: Option<String>,
    pub status: Option<Status>,
    pub category: Option<Category>,
    #[serde(alias = "currentBranch")]
    pub branch: Option<String>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Lowercases the text needle once so it can be reused across a whole scan.
    pub fn prepare(&self) -> PreparedFilter<'_> {
        let needle = self
            .text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_lowercase);
        PreparedFilter {
            filter: self,
            needle,
        }
    }
}

#[derive(Debug)]
pub struct PreparedFilter<'a> {
    filter: &'a ItemFilter,
    needle: Option<String>,
}

impl PreparedFilter<'_> {
    pub fn matches(&self, item: &Item) -> bool {
        let text_ok = self
            .needle
            .as_deref()
            .map_or(true, |needle| item.title().to_lowercase().contains(needle));

        text_ok
            && self
                .filter
                .status
                .map_or(true, |status| item.status() == status)
            && self
                .filter
                .category
                .map_or(true, |category| item.category() == category)
            && self
                .filter
                .branch
                .as_deref()
                .map_or(true, |branch| item.current_branch() == Some(branch))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CatalogueEvent {
    TransitionApplied {
        item: Item,
        kind: TransitionKind,
        from: Status,
        at: DateTime<Utc>,
    },
    DuplicateHoldFound {
        item_id: ItemId,
        held_by: PatronId,
        requested_by: PatronId,
        at: DateTime<Utc>,
    },
}

/// One committed search, as handed to the rendering side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub seq: u64,
    pub query: String,
    pub items: Vec<Item>,
}
