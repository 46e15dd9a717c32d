//! Circulation transitions.
//!
//! `AVAILABLE -> ON_HOLD -> CHECKED_OUT -> AVAILABLE`, with `ON_HOLD -> AVAILABLE` when a hold
//! is cancelled or expires. Expiry only succeeds once the hold's deadline has passed. Checking
//! out requires a hold by the same patron first; every pair not listed above is rejected with
//! [`CatalogueError::InvalidTransition`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{normalize_branch, Item, ItemState, PatronId},
    error::CatalogueError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    Hold,
    Checkout,
    CancelHold,
    ExpireHold,
    Return,
}

impl TransitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Checkout => "CHECKOUT",
            Self::CancelHold => "CANCEL_HOLD",
            Self::ExpireHold => "EXPIRE_HOLD",
            Self::Return => "RETURN",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Hold {
        patron: PatronId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<DateTime<Utc>>,
    },
    Checkout {
        patron: PatronId,
    },
    CancelHold,
    /// Releases a hold whose deadline is at or before `now`.
    ExpireHold {
        now: DateTime<Utc>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
}

impl Transition {
    pub fn hold(patron: PatronId) -> Self {
        Self::Hold {
            patron,
            until: None,
        }
    }

    pub fn hold_until(patron: PatronId, until: DateTime<Utc>) -> Self {
        Self::Hold {
            patron,
            until: Some(until),
        }
    }

    pub fn checkout(patron: PatronId) -> Self {
        Self::Checkout { patron }
    }

    pub fn return_to(branch: impl Into<String>) -> Self {
        Self::Return {
            branch: Some(branch.into()),
        }
    }

    pub fn kind(&self) -> TransitionKind {
        match self {
            Self::Hold { .. } => TransitionKind::Hold,
            Self::Checkout { .. } => TransitionKind::Checkout,
            Self::CancelHold => TransitionKind::CancelHold,
            Self::ExpireHold { .. } => TransitionKind::ExpireHold,
            Self::Return { .. } => TransitionKind::Return,
        }
    }
}

impl Item {
    /// Computes the successor of `self` under `transition`. `self` is never touched, so a
    /// caller that only stores the result on `Ok` gets all-or-nothing updates.
    pub fn apply(&self, transition: &Transition) -> Result<Item, CatalogueError> {
        let state = match (&self.state, transition) {
            (ItemState::Available, Transition::Hold { patron, until }) => ItemState::OnHold {
                patron: patron.clone(),
                until: *until,
            },
            (ItemState::OnHold { patron: holder, .. }, Transition::Checkout { patron }) => {
                if holder != patron {
                    return Err(CatalogueError::Conflict {
                        item: self.id(),
                        held_by: holder.clone(),
                        requested_by: patron.clone(),
                    });
                }
                ItemState::CheckedOut {
                    patron: holder.clone(),
                }
            }
            (ItemState::OnHold { .. }, Transition::CancelHold) => ItemState::Available,
            (ItemState::OnHold { .. }, Transition::ExpireHold { now }) => {
                if !self.is_hold_expired(*now) {
                    return Err(self.rejected(transition));
                }
                ItemState::Available
            }
            (ItemState::CheckedOut { .. }, Transition::Return { .. }) => ItemState::Available,
            (
                ItemState::Available,
                Transition::Checkout { .. }
                | Transition::CancelHold
                | Transition::ExpireHold { .. }
                | Transition::Return { .. },
            )
            | (ItemState::OnHold { .. }, Transition::Hold { .. } | Transition::Return { .. })
            | (
                ItemState::CheckedOut { .. },
                Transition::Hold { .. }
                | Transition::Checkout { .. }
                | Transition::CancelHold
                | Transition::ExpireHold { .. },
            ) => return Err(self.rejected(transition)),
        };

        let current_branch = match transition {
            Transition::Return {
                branch: Some(branch),
            } => normalize_branch(branch.clone()).or_else(|| self.current_branch.clone()),
            Transition::Hold { .. }
            | Transition::Checkout { .. }
            | Transition::CancelHold
            | Transition::ExpireHold { .. }
            | Transition::Return { branch: None } => self.current_branch.clone(),
        };

        let mut next = self.clone();
        next.state = state;
        next.current_branch = current_branch;
        next.version = self.version.saturating_add(1);
        Ok(next)
    }

    fn rejected(&self, transition: &Transition) -> CatalogueError {
        CatalogueError::InvalidTransition {
            item: self.id(),
            from: self.status(),
            kind: transition.kind(),
        }
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
