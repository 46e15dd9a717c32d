use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ItemId {
    type Err = CatalogueError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|e| CatalogueError::validation(format!("invalid item id '{raw}': {e}")))
    }
}

/// Identifier of the patron holding or borrowing an item. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatronId(String);

impl PatronId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CatalogueError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CatalogueError::validation("patron id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PatronId {
    type Error = CatalogueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PatronId> for String {
    fn from(value: PatronId) -> Self {
        value.0
    }
}

impl fmt::Display for PatronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! label_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CatalogueError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let normalized = raw.trim().replace('-', "_").to_ascii_uppercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == normalized)
                    .ok_or_else(|| {
                        CatalogueError::validation(format!(
                            "unknown {} '{raw}'",
                            stringify!($name).to_ascii_lowercase()
                        ))
                    })
            }
        }
    };
}

// Borrowing eligibility is carried and queryable but not enforced here.
label_enum!(Category {
    Circulating => "CIRCULATING",
    Restricted => "RESTRICTED",
});

label_enum!(Status {
    Available => "AVAILABLE",
    OnHold => "ON_HOLD",
    CheckedOut => "CHECKED_OUT",
});

/// Circulation state. The patron lives inside the variants that require one, so an
/// available item can never carry a patron.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ItemState {
    #[default]
    Available,
    OnHold {
        patron: PatronId,
        until: Option<DateTime<Utc>>,
    },
    CheckedOut {
        patron: PatronId,
    },
}

impl ItemState {
    pub fn status(&self) -> Status {
        match self {
            Self::Available => Status::Available,
            Self::OnHold { .. } => Status::OnHold,
            Self::CheckedOut { .. } => Status::CheckedOut,
        }
    }

    pub fn patron(&self) -> Option<&PatronId> {
        match self {
            Self::Available => None,
            Self::OnHold { patron, .. } | Self::CheckedOut { patron } => Some(patron),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    id: ItemId,
    title: String,
    category: Category,
    pub(crate) state: ItemState,
    pub(crate) current_branch: Option<String>,
    pub(crate) version: u64,
}

impl Item {
    /// Builds a freshly catalogued, available item.
    pub fn new(
        id: ItemId,
        title: impl Into<String>,
        category: Category,
        current_branch: Option<String>,
    ) -> Result<Self, CatalogueError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogueError::validation(format!(
                "item {id} must have a non-empty title"
            )));
        }
        Ok(Self {
            id,
            title,
            category,
            state: ItemState::Available,
            current_branch: current_branch.and_then(normalize_branch),
            version: 0,
        })
    }

    pub fn with_state(mut self, state: ItemState) -> Self {
        self.state = state;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn current_patron(&self) -> Option<&PatronId> {
        self.state.patron()
    }

    pub fn current_branch(&self) -> Option<&str> {
        self.current_branch.as_deref()
    }

    pub fn hold_until(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ItemState::OnHold { until, .. } => *until,
            ItemState::Available | ItemState::CheckedOut { .. } => None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.hold_until().is_some_and(|until| until <= now)
    }
}

pub(crate) fn normalize_branch(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Flat on-disk/on-wire shape of an [`Item`], matching the catalogue's JSON seed files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    #[serde(alias = "bookId")]
    id: ItemId,
    title: String,
    #[serde(alias = "type")]
    category: Category,
    #[serde(alias = "state")]
    status: Status,
    #[serde(default, alias = "currentBranch", skip_serializing_if = "Option::is_none")]
    current_branch: Option<String>,
    #[serde(default, alias = "currentPatron", skip_serializing_if = "Option::is_none")]
    current_patron: Option<String>,
    #[serde(default, alias = "holdUntil", skip_serializing_if = "Option::is_none")]
    hold_until: Option<DateTime<Utc>>,
    #[serde(default)]
    version: u64,
}

impl TryFrom<ItemRecord> for Item {
    type Error = CatalogueError;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let patron = record
            .current_patron
            .filter(|patron| !patron.trim().is_empty())
            .map(PatronId::new)
            .transpose()?;

        let state = match (record.status, patron) {
            (Status::Available, None) => {
                if record.hold_until.is_some() {
                    return Err(CatalogueError::validation(format!(
                        "item {id} is AVAILABLE but carries a hold deadline"
                    )));
                }
                ItemState::Available
            }
            (Status::Available, Some(patron)) => {
                return Err(CatalogueError::validation(format!(
                    "item {id} is AVAILABLE but names patron {patron}"
                )));
            }
            (Status::OnHold, Some(patron)) => ItemState::OnHold {
                patron,
                until: record.hold_until,
            },
            (Status::CheckedOut, Some(patron)) => {
                if record.hold_until.is_some() {
                    return Err(CatalogueError::validation(format!(
                        "item {id} is CHECKED_OUT but carries a hold deadline"
                    )));
                }
                ItemState::CheckedOut { patron }
            }
            (status @ (Status::OnHold | Status::CheckedOut), None) => {
                return Err(CatalogueError::validation(format!(
                    "item {id} is {status} but names no patron"
                )));
            }
        };

        Ok(Item::new(id, record.title, record.category, record.current_branch)?
            .with_state(state)
            .with_version(record.version))
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        let status = item.status();
        let hold_until = item.hold_until();
        let current_patron = item.current_patron().map(|patron| patron.as_str().to_string());
        Self {
            id: item.id,
            title: item.title,
            category: item.category,
            status,
            current_branch: item.current_branch,
            current_patron,
            hold_until,
            version: item.version,
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
