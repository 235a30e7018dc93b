//! Outbox for recovered settlement write-backs.
//!
//! When reconciliation recovers a `settled_by` that the remote lost, the
//! write-back is queued here instead of being fired blindly, so callers can
//! observe what is pending, what was sent, and what failed.

use crate::remote::RemoteAdapter;
use std::sync::{Arc, Mutex};
use valise_engine::RecoveredSettlement;

/// Delivery state of one queued write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Sent,
    Failed(String),
}

/// One recovered settlement awaiting (or past) delivery.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub expense_id: String,
    pub settled_by: Vec<String>,
    pub status: EntryStatus,
    pub attempts: u32,
}

/// Queue of settlement write-backs with observable delivery state.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Mutex<Vec<OutboxEntry>>,
}

impl Outbox {
    /// Queue recovered settlements for delivery.
    pub fn enqueue(&self, recovered: &[RecoveredSettlement]) {
        let mut entries = self.entries.lock().expect("outbox lock poisoned");
        for r in recovered {
            entries.push(OutboxEntry {
                expense_id: r.expense_id.clone(),
                settled_by: r.settled_by.clone(),
                status: EntryStatus::Pending,
                attempts: 0,
            });
        }
    }

    /// Snapshot of all entries, for inspection.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.entries.lock().expect("outbox lock poisoned").clone()
    }

    /// Number of entries still awaiting delivery.
    pub fn pending(&self) -> usize {
        self.entries
            .lock()
            .expect("outbox lock poisoned")
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count()
    }

    /// Attempt delivery of every pending entry. Failures are recorded on
    /// the entry and retried on the next flush; they never bubble up.
    pub async fn flush(&self, adapter: &Arc<dyn RemoteAdapter>) {
        let pending: Vec<(usize, OutboxEntry)> = {
            let entries = self.entries.lock().expect("outbox lock poisoned");
            entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.status == EntryStatus::Pending)
                .map(|(i, e)| (i, e.clone()))
                .collect()
        };

        for (index, entry) in pending {
            let result = adapter
                .push_settlements(&entry.expense_id, &entry.settled_by)
                .await;
            let mut entries = self.entries.lock().expect("outbox lock poisoned");
            let entry = &mut entries[index];
            entry.attempts += 1;
            match result {
                Ok(()) => entry.status = EntryStatus::Sent,
                Err(err) => {
                    tracing::warn!(
                        expense_id = %entry.expense_id,
                        "settlement write-back failed: {err}"
                    );
                    entry.status = EntryStatus::Failed(err.to_string());
                }
            }
        }
    }

    /// Move failed entries back to pending so the next flush retries them.
    pub fn retry_failed(&self) {
        let mut entries = self.entries.lock().expect("outbox lock poisoned");
        for entry in entries.iter_mut() {
            if matches!(entry.status, EntryStatus::Failed(_)) {
                entry.status = EntryStatus::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valise_engine::MatchKind;

    fn recovered(expense_id: &str) -> RecoveredSettlement {
        RecoveredSettlement {
            expense_id: expense_id.into(),
            settled_by: vec!["Bob".into()],
            matched_by: MatchKind::Id,
        }
    }

    #[test]
    fn enqueue_tracks_pending() {
        let outbox = Outbox::default();
        assert_eq!(outbox.pending(), 0);

        outbox.enqueue(&[recovered("e-1"), recovered("e-2")]);
        assert_eq!(outbox.pending(), 2);
        assert!(outbox
            .entries()
            .iter()
            .all(|e| e.status == EntryStatus::Pending && e.attempts == 0));
    }

    #[test]
    fn retry_failed_requeues() {
        let outbox = Outbox::default();
        outbox.enqueue(&[recovered("e-1")]);
        {
            let mut entries = outbox.entries.lock().unwrap();
            entries[0].status = EntryStatus::Failed("timeout".into());
        }
        assert_eq!(outbox.pending(), 0);

        outbox.retry_failed();
        assert_eq!(outbox.pending(), 1);
    }
}
