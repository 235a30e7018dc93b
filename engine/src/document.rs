//! The snapshot document: one JSON blob carrying the whole trip state.
//!
//! This is the unit of exchange for snapshot-mode sync and for manual
//! import/export. Every section is optional so a loaded blob only
//! overwrites the sections it actually carries; anything absent from the
//! payload is left untouched in local state.

use crate::{error::Result, ChecklistItem, DayPlan, Error, Expense, PersonName};
use serde::{Deserialize, Serialize};

/// A full or partial trip snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<ChecklistItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<Vec<Expense>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Vec<DayPlan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<PersonName>>,
    /// Stamped on export; absent on sync payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
}

impl Snapshot {
    /// Parse a snapshot document.
    ///
    /// An unparseable document is rejected as a whole; malformed individual
    /// fields inside a parseable one are coerced by the model's lenient
    /// deserializers.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// Serialize for the sync channel.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// Serialize for file export.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// True when no section is present.
    pub fn is_empty(&self) -> bool {
        self.checklist.is_none()
            && self.expenses.is_none()
            && self.itinerary.is_none()
            && self.notes.is_none()
            && self.people.is_none()
    }
}
