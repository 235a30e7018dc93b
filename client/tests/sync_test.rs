//! End-to-end sync behavior against a scripted in-memory remote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use valise_client::{ClientError, LocalStore, RemoteAdapter, Result, SyncMode, TripStore};
use valise_engine::{Currency, Expense, Snapshot};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ==================== mock remote ====================

#[derive(Default)]
struct MockRemote {
    mode_entities: bool,
    remote: Mutex<Snapshot>,
    pushes: Mutex<Vec<Snapshot>>,
    settlement_pushes: Mutex<Vec<(String, Vec<String>)>>,
    fail_load: AtomicBool,
    fail_settlements: AtomicBool,
}

impl MockRemote {
    fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            remote: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    fn entities(snapshot: Snapshot) -> Self {
        Self {
            mode_entities: true,
            remote: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    fn last_push(&self) -> Snapshot {
        self.pushes.lock().unwrap().last().cloned().unwrap()
    }

    fn settlement_pushes(&self) -> Vec<(String, Vec<String>)> {
        self.settlement_pushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RemoteAdapter for MockRemote {
    fn mode(&self) -> SyncMode {
        if self.mode_entities {
            SyncMode::Entities
        } else {
            SyncMode::Snapshot
        }
    }

    async fn load(&self) -> Result<Snapshot> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(ClientError::Schema("scripted load failure".into()));
        }
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn push(&self, snapshot: &Snapshot) -> Result<()> {
        self.pushes.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn push_settlements(&self, expense_id: &str, settled_by: &[String]) -> Result<()> {
        if self.fail_settlements.load(Ordering::SeqCst) {
            return Err(ClientError::Schema(
                "column settled_by does not exist".into(),
            ));
        }
        self.settlement_pushes
            .lock()
            .unwrap()
            .push((expense_id.to_string(), settled_by.to_vec()));
        Ok(())
    }
}

fn expense(id: &str, item: &str, amount: f64, settled_by: Option<Vec<String>>) -> Expense {
    Expense {
        id: id.into(),
        item: item.into(),
        amount,
        currency: Currency::Thb,
        category: "Food".into(),
        date: "2026-08-20".into(),
        timestamp: String::new(),
        bill_photo: None,
        paid_by: Some("Alice".into()),
        participants: Some(vec!["Alice".into(), "Bob".into()]),
        settled_by,
    }
}

// ==================== debounced snapshot push ====================

#[tokio::test(start_paused = true)]
async fn burst_of_edits_pushes_once() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::default());
    let store = TripStore::with_adapter(
        LocalStore::open(dir.path()).unwrap(),
        SyncMode::Snapshot,
        remote.clone(),
    );

    store.add_checklist_item("Passport").await.unwrap();
    store.add_checklist_item("Visa").await.unwrap();
    store.add_checklist_item("Sunscreen").await.unwrap();

    // quiet period long past the debounce window
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(remote.push_count(), 1);
    // the single push carries the final state, not the first edit
    let pushed = remote.last_push();
    assert_eq!(pushed.checklist.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn separate_quiet_periods_push_separately() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::default());
    let store = TripStore::with_adapter(
        LocalStore::open(dir.path()).unwrap(),
        SyncMode::Snapshot,
        remote.clone(),
    );

    store.add_checklist_item("Passport").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.push_count(), 1);

    store.set_notes("remember sunscreen").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.push_count(), 2);
    assert_eq!(remote.last_push().notes.as_deref(), Some("remember sunscreen"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_armed_push() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::default());
    let store = TripStore::with_adapter(
        LocalStore::open(dir.path()).unwrap(),
        SyncMode::Snapshot,
        remote.clone(),
    );

    store.add_checklist_item("Passport").await.unwrap();
    store.shutdown();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(remote.push_count(), 0);
    // the edit is still durable locally
    assert_eq!(store.state().await.checklist.len(), 1);
}

// ==================== snapshot-mode load ====================

#[tokio::test]
async fn snapshot_load_adopts_present_sections_only() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = TripStore::local_only(LocalStore::open(dir.path()).unwrap());
        store.add_checklist_item("Passport").await.unwrap();
    }

    let remote = Arc::new(MockRemote::with_snapshot(Snapshot {
        notes: Some("from the cloud".into()),
        ..Default::default()
    }));
    let store = TripStore::with_adapter(
        LocalStore::open(dir.path()).unwrap(),
        SyncMode::Snapshot,
        remote,
    );
    store.load().await.unwrap();

    let state = store.state().await;
    assert_eq!(state.notes, "from the cloud");
    // the blob carried no checklist, local survives
    assert_eq!(state.checklist.len(), 1);
}

#[tokio::test]
async fn remote_load_failure_keeps_local_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = TripStore::local_only(LocalStore::open(dir.path()).unwrap());
        store.set_notes("offline edits").await.unwrap();
    }

    let remote = Arc::new(MockRemote::default());
    remote.fail_load.store(true, Ordering::SeqCst);
    let store = TripStore::with_adapter(
        LocalStore::open(dir.path()).unwrap(),
        SyncMode::Snapshot,
        remote,
    );

    store.load().await.unwrap();
    assert_eq!(store.state().await.notes, "offline edits");
}

// ==================== entity-mode reconciliation ====================

#[tokio::test]
async fn entity_load_recovers_settlements_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::open(dir.path()).unwrap();
    local
        .put_expenses(&[expense("7", "Dinner", 300.0, Some(vec!["Bob".into()]))])
        .unwrap();

    // the remote row lost its settled_by
    let remote = Arc::new(MockRemote::entities(Snapshot {
        expenses: Some(vec![expense("7", "Dinner", 300.0, None)]),
        ..Default::default()
    }));
    let store = TripStore::with_adapter(local, SyncMode::Entities, remote.clone());
    store.load().await.unwrap();

    let state = store.state().await;
    assert_eq!(
        state.expenses[0].settled_by,
        Some(vec!["Bob".to_string()])
    );

    // the recovery is queued and delivered back to the remote
    store.flush_outbox().await.unwrap();
    let pushes = remote.settlement_pushes();
    assert!(!pushes.is_empty());
    assert_eq!(pushes[0], ("7".to_string(), vec!["Bob".to_string()]));
    assert_eq!(store.outbox().pending(), 0);
}

#[tokio::test]
async fn entity_load_recovers_settlements_by_signature() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::open(dir.path()).unwrap();
    // local id predates the migration, remote assigned a fresh row id
    local
        .put_expenses(&[expense(
            "device-a1",
            "  Street Food ",
            120.0,
            Some(vec!["Bob".into()]),
        )])
        .unwrap();

    let remote = Arc::new(MockRemote::entities(Snapshot {
        expenses: Some(vec![expense("99", "street food", 120.0, None)]),
        ..Default::default()
    }));
    let store = TripStore::with_adapter(local, SyncMode::Entities, remote);
    store.load().await.unwrap();

    let state = store.state().await;
    assert_eq!(state.expenses[0].id, "99");
    assert_eq!(
        state.expenses[0].settled_by,
        Some(vec!["Bob".to_string()])
    );
}

#[tokio::test]
async fn entity_load_treats_remote_as_canonical() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::open(dir.path()).unwrap();
    local
        .put_expenses(&[
            expense("1", "Dinner", 300.0, None),
            // deleted on another device, must not resurrect
            expense("2", "Taxi", 80.0, Some(vec!["Bob".into()])),
        ])
        .unwrap();

    let remote = Arc::new(MockRemote::entities(Snapshot {
        expenses: Some(vec![expense("1", "Dinner", 350.0, None)]),
        people: Some(vec!["Alice".into(), "Bob".into(), "Cara".into()]),
        ..Default::default()
    }));
    let store = TripStore::with_adapter(local, SyncMode::Entities, remote);
    store.load().await.unwrap();

    let state = store.state().await;
    assert_eq!(state.expenses.len(), 1);
    assert_eq!(state.expenses[0].amount, 350.0);
    assert_eq!(state.people.len(), 3);
}

#[tokio::test]
async fn failed_writeback_is_observable_and_retryable() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::open(dir.path()).unwrap();
    local
        .put_expenses(&[expense("7", "Dinner", 300.0, Some(vec!["Bob".into()]))])
        .unwrap();

    let remote = Arc::new(MockRemote::entities(Snapshot {
        expenses: Some(vec![expense("7", "Dinner", 300.0, None)]),
        ..Default::default()
    }));
    remote.fail_settlements.store(true, Ordering::SeqCst);
    let store = TripStore::with_adapter(local, SyncMode::Entities, remote.clone());
    store.load().await.unwrap();

    store.flush_outbox().await.unwrap();
    let entries = store.outbox().entries();
    assert!(entries
        .iter()
        .all(|e| matches!(e.status, valise_client::EntryStatus::Failed(_))));
    assert!(remote.settlement_pushes().is_empty());

    // the backend fixed its schema; a retry drains the queue
    remote.fail_settlements.store(false, Ordering::SeqCst);
    store.flush_outbox().await.unwrap();
    assert_eq!(remote.settlement_pushes().len(), 1);
    assert!(store
        .outbox()
        .entries()
        .iter()
        .all(|e| e.status == valise_client::EntryStatus::Sent));
}
