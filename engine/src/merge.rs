//! Reconciliation of remote canonical expenses with device-local state.
//!
//! The remote schema is ground truth for every field it models, but it may
//! not carry `settled_by` (the column can be missing on older backends, and
//! snapshot-to-entities migrations renumber rows). This module recovers the
//! locally known settlement flags:
//!
//! 1. Exact id match against the local copy.
//! 2. Otherwise a content-signature match (item, date, amount, currency),
//!    where each local record may satisfy at most one remote row.
//!
//! Every recovery is reported back so the caller can schedule a best-effort
//! push and other devices converge too.

use crate::{Expense, Id, PersonName};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a settlement field was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    /// Local record with the same id
    Id,
    /// Local record with the same content signature
    Signature,
}

/// One `settled_by` value recovered from local state, pending write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredSettlement {
    /// The remote expense the field was merged into
    pub expense_id: Id,
    /// The recovered names
    pub settled_by: Vec<PersonName>,
    /// Which matching rule produced the recovery
    pub matched_by: MatchKind,
}

/// Result of merging remote expenses with the local copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// Remote rows, with recovered settlement fields merged in
    pub expenses: Vec<Expense>,
    /// Fields that must be pushed back to the remote (outbox input)
    pub recovered: Vec<RecoveredSettlement>,
}

/// Merge remote canonical expenses with the device's local copy.
///
/// Remote rows win for every field except a missing `settled_by`, which is
/// backfilled from the local copy when a match is found. A `used` set keyed
/// by local id guarantees one local record never satisfies two remote rows.
pub fn merge_expenses(remote: Vec<Expense>, local: &[Expense]) -> MergeOutcome {
    let by_id: HashMap<&str, &Expense> = local.iter().map(|e| (e.id.as_str(), e)).collect();

    // signature -> local records in order, for the heuristic fallback
    let mut by_signature: HashMap<String, Vec<&Expense>> = HashMap::new();
    for e in local {
        if e.has_settlements() {
            by_signature.entry(e.signature()).or_default().push(e);
        }
    }

    let mut used: HashSet<Id> = HashSet::new();
    let mut recovered = Vec::new();

    let expenses = remote
        .into_iter()
        .map(|mut r| {
            if r.has_settlements() {
                return r;
            }

            if let Some(hit) = by_id.get(r.id.as_str()).filter(|e| e.has_settlements()) {
                if used.insert(hit.id.clone()) {
                    let names = hit.settled_by.clone().unwrap_or_default();
                    r.settled_by = Some(names.clone());
                    recovered.push(RecoveredSettlement {
                        expense_id: r.id.clone(),
                        settled_by: names,
                        matched_by: MatchKind::Id,
                    });
                }
                return r;
            }

            let signature = r.signature();
            if let Some(candidates) = by_signature.get(&signature) {
                if let Some(hit) = candidates.iter().find(|e| !used.contains(&e.id)) {
                    used.insert(hit.id.clone());
                    let names = hit.settled_by.clone().unwrap_or_default();
                    r.settled_by = Some(names.clone());
                    recovered.push(RecoveredSettlement {
                        expense_id: r.id.clone(),
                        settled_by: names,
                        matched_by: MatchKind::Signature,
                    });
                }
            }
            r
        })
        .collect();

    MergeOutcome {
        expenses,
        recovered,
    }
}
