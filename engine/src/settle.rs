//! Settlement engine: who paid, who owes, and the minimal transfer plan.
//!
//! `settle` is a pure function over the expense ledger and the roster.
//! It is recomputed on demand and never persisted, so the same inputs
//! always produce the same output.

use crate::{Expense, Id, PersonName, Rates};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tolerance below which a residual balance counts as settled.
pub const EPSILON: f64 = 1e-6;

/// A suggested reimbursement from one person to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from: PersonName,
    pub to: PersonName,
    /// THB, strictly positive
    pub amount: f64,
}

/// One outstanding share of a single expense, owed to its payer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obligation {
    pub to: PersonName,
    pub expense_id: Id,
    pub item: String,
    /// THB
    pub amount: f64,
}

/// Total outstanding amount from one person to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairTotal {
    pub from: PersonName,
    pub to: PersonName,
    /// THB
    pub amount: f64,
}

/// The full settlement view derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Net out-of-pocket per person (THB), adjusted by recorded settlements
    pub paid: BTreeMap<PersonName, f64>,
    /// Fair cumulative share per person (THB), independent of settlements
    pub owed: BTreeMap<PersonName, f64>,
    /// paid - owed per roster member; sums to ~0 across the roster
    pub balance: BTreeMap<PersonName, f64>,
    /// Greedy minimal transfer plan clearing all balances
    pub transfers: Vec<Transfer>,
    /// Outstanding obligations grouped by debtor
    pub detail_by_person: BTreeMap<PersonName, Vec<Obligation>>,
    /// Outstanding totals aggregated per (debtor, payer) pair
    pub detail_by_pair: Vec<PairTotal>,
}

impl Settlement {
    /// True when every balance is within [`EPSILON`] of zero.
    pub fn all_settled(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Compute per-person balances and a minimal transfer plan.
///
/// For each expense, the THB total is split equally among its participants
/// (the full roster when participants are absent or empty). `owed` always
/// reflects the fair share. `paid` starts from what the payer fronted and
/// moves one share from payer to reimburser for every name in `settled_by`.
/// Expenses with no participants still credit their payer in full (a gift);
/// expenses with no payer only distribute `owed`.
pub fn settle(expenses: &[Expense], roster: &[PersonName], rates: &Rates) -> Settlement {
    let mut paid: BTreeMap<PersonName, f64> = BTreeMap::new();
    let mut owed: BTreeMap<PersonName, f64> = BTreeMap::new();
    for p in roster {
        paid.insert(p.clone(), 0.0);
        owed.insert(p.clone(), 0.0);
    }

    let mut detail_by_person: BTreeMap<PersonName, Vec<Obligation>> = BTreeMap::new();
    let mut pair_totals: BTreeMap<(PersonName, PersonName), f64> = BTreeMap::new();

    for e in expenses {
        let thb = rates.to_thb(e.amount, e.currency);
        let parts: &[PersonName] = match &e.participants {
            Some(p) if !p.is_empty() => p,
            _ => roster,
        };
        let share = if parts.is_empty() {
            0.0
        } else {
            thb / parts.len() as f64
        };

        for p in parts {
            *owed.entry(p.clone()).or_insert(0.0) += share;
        }

        let Some(payer) = &e.paid_by else {
            continue;
        };
        *paid.entry(payer.clone()).or_insert(0.0) += thb;

        let settled: &[PersonName] = e.settled_by.as_deref().unwrap_or(&[]);
        for p in parts {
            if p == payer {
                continue;
            }
            if settled.contains(p) {
                // Reimbursed: the payer's net outlay drops by one share and
                // the reimburser's rises by what they handed over.
                *paid.entry(payer.clone()).or_insert(0.0) -= share;
                *paid.entry(p.clone()).or_insert(0.0) += share;
            } else if share > 0.0 {
                detail_by_person
                    .entry(p.clone())
                    .or_default()
                    .push(Obligation {
                        to: payer.clone(),
                        expense_id: e.id.clone(),
                        item: e.item.clone(),
                        amount: share,
                    });
                *pair_totals
                    .entry((p.clone(), payer.clone()))
                    .or_insert(0.0) += share;
            }
        }
    }

    let mut balance: BTreeMap<PersonName, f64> = BTreeMap::new();
    for p in roster {
        let b = paid.get(p).copied().unwrap_or(0.0) - owed.get(p).copied().unwrap_or(0.0);
        balance.insert(p.clone(), b);
    }

    let transfers = plan_transfers(&balance, roster);

    let detail_by_pair = pair_totals
        .into_iter()
        .map(|((from, to), amount)| PairTotal { from, to, amount })
        .collect();

    Settlement {
        paid,
        owed,
        balance,
        transfers,
        detail_by_person,
        detail_by_pair,
    }
}

/// Greedy matching of largest debtor against largest creditor.
///
/// Lists are built in roster order and sorted descending by amount with a
/// stable sort, so equal amounts keep roster order. Produces at most
/// `debtors + creditors - 1` transfers.
fn plan_transfers(
    balance: &BTreeMap<PersonName, f64>,
    roster: &[PersonName],
) -> Vec<Transfer> {
    let mut debtors: Vec<(PersonName, f64)> = Vec::new();
    let mut creditors: Vec<(PersonName, f64)> = Vec::new();
    for p in roster {
        let b = balance.get(p).copied().unwrap_or(0.0);
        if b < -EPSILON {
            debtors.push((p.clone(), -b));
        } else if b > EPSILON {
            creditors.push((p.clone(), b));
        }
    }
    debtors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    creditors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < debtors.len() && j < creditors.len() {
        let pay = debtors[i].1.min(creditors[j].1);
        if pay > 0.0 {
            transfers.push(Transfer {
                from: debtors[i].0.clone(),
                to: creditors[j].0.clone(),
                amount: pay,
            });
        }
        debtors[i].1 -= pay;
        creditors[j].1 -= pay;
        if debtors[i].1 <= EPSILON {
            i += 1;
        }
        if creditors[j].1 <= EPSILON {
            j += 1;
        }
    }
    transfers
}
