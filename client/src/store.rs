//! The trip store: in-memory state, local persistence, and sync wiring.
//!
//! All mutations are optimistic: the in-memory state and the local store
//! are updated first, then the change is propagated to the remote (a row
//! write in entity mode, a debounced snapshot push in snapshot mode).
//! Remote failures on updates and deletes are logged and dropped; local
//! state stays authoritative.

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::local::{Collection, LocalStore, KEY_ITEMS, KEY_PEOPLE, KEY_RATES, KEY_TEXT};
use crate::outbox::Outbox;
use crate::remote::{
    ActivityPatch, EntityAdapter, RemoteAdapter, SnapshotAdapter, SyncMode,
};
use crate::scheduler::SyncScheduler;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;
use valise_engine::{
    merge_expenses, settle, Activity, ChecklistItem, Currency, DayPlan, Expense, Id, PersonName,
    Rates, Settlement, Snapshot,
};

/// The whole in-memory trip.
#[derive(Debug, Clone, Default)]
pub struct TripState {
    pub checklist: Vec<ChecklistItem>,
    pub expenses: Vec<Expense>,
    pub itinerary: Vec<DayPlan>,
    pub notes: String,
    pub people: Vec<PersonName>,
    pub rates: Rates,
}

impl TripState {
    /// Full snapshot of the current state, for pushing and exporting.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            checklist: Some(self.checklist.clone()),
            expenses: Some(self.expenses.clone()),
            itinerary: Some(self.itinerary.clone()),
            notes: Some(self.notes.clone()),
            people: Some(self.people.clone()),
            export_date: None,
        }
    }

    /// Adopt the sections a snapshot carries; absent sections stay as-is.
    pub fn apply(&mut self, snapshot: Snapshot) {
        if let Some(checklist) = snapshot.checklist {
            self.checklist = checklist;
        }
        if let Some(expenses) = snapshot.expenses {
            self.expenses = expenses;
        }
        if let Some(itinerary) = snapshot.itinerary {
            self.itinerary = itinerary;
        }
        if let Some(notes) = snapshot.notes {
            self.notes = notes;
        }
        if let Some(people) = snapshot.people {
            self.people = people;
        }
    }
}

/// Input for a new expense; id and timestamp are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub item: String,
    pub amount: f64,
    pub currency: Currency,
    pub category: String,
    pub date: String,
    pub bill_photo: Option<String>,
    pub paid_by: Option<PersonName>,
    pub participants: Option<Vec<PersonName>>,
}

/// Input for a new itinerary activity.
#[derive(Debug, Clone, Default)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub cost: f64,
    pub currency: Currency,
    pub category: String,
    pub map_link: Option<String>,
    pub arrive_time: Option<String>,
    pub leave_time: Option<String>,
}

/// One device's view of the trip.
pub struct TripStore {
    mode: SyncMode,
    local: LocalStore,
    adapter: Option<Arc<dyn RemoteAdapter>>,
    entity: Option<Arc<EntityAdapter>>,
    scheduler: Option<SyncScheduler>,
    outbox: Arc<Outbox>,
    state: Arc<RwLock<TripState>>,
    revision: watch::Sender<u64>,
}

impl TripStore {
    /// Open a store from configuration: local store plus, when a remote is
    /// configured, the adapter matching the sync mode.
    pub fn open(config: &Config) -> Result<Self> {
        let local = LocalStore::open(&config.data_dir)?;
        let (adapter, entity): (Option<Arc<dyn RemoteAdapter>>, Option<Arc<EntityAdapter>>) =
            match (&config.remote, config.mode) {
                (Some(remote), SyncMode::Snapshot) => {
                    (Some(Arc::new(SnapshotAdapter::new(remote))), None)
                }
                (Some(remote), SyncMode::Entities) => {
                    let entity = Arc::new(EntityAdapter::new(remote, config.trip_id));
                    (Some(entity.clone() as Arc<dyn RemoteAdapter>), Some(entity))
                }
                (None, _) => (None, None),
            };
        Ok(Self::assemble(local, config.mode, adapter, entity))
    }

    /// Store without any remote; edits only ever touch the local store.
    pub fn local_only(local: LocalStore) -> Self {
        Self::assemble(local, SyncMode::Snapshot, None, None)
    }

    /// Store with an injected adapter, for tests and embedding.
    pub fn with_adapter(
        local: LocalStore,
        mode: SyncMode,
        adapter: Arc<dyn RemoteAdapter>,
    ) -> Self {
        Self::assemble(local, mode, Some(adapter), None)
    }

    fn assemble(
        local: LocalStore,
        mode: SyncMode,
        adapter: Option<Arc<dyn RemoteAdapter>>,
        entity: Option<Arc<EntityAdapter>>,
    ) -> Self {
        let state = Arc::new(RwLock::new(TripState::default()));
        // the debounced push only exists in snapshot mode; entity mode
        // writes rows synchronously per mutation
        let scheduler = match (&adapter, mode) {
            (Some(adapter), SyncMode::Snapshot) => Some(SyncScheduler::new(
                Arc::clone(adapter),
                Arc::clone(&state),
            )),
            _ => None,
        };
        let (revision, _) = watch::channel(0);
        Self {
            mode,
            local,
            adapter,
            entity,
            scheduler,
            outbox: Arc::new(Outbox::default()),
            state,
            revision,
        }
    }

    // ==================== lifecycle ====================

    /// Hydrate from the local store, then reconcile with the remote when
    /// one is configured. Remote failure leaves the device on local data.
    pub async fn load(&self) -> Result<()> {
        let mut state = TripState {
            checklist: self
                .local
                .get(Collection::Checklist, KEY_ITEMS)?
                .unwrap_or_default(),
            expenses: self.local.expenses()?,
            itinerary: self
                .local
                .get(Collection::Itinerary, KEY_ITEMS)?
                .unwrap_or_default(),
            notes: self
                .local
                .get(Collection::Notes, KEY_TEXT)?
                .unwrap_or_default(),
            people: self
                .local
                .get(Collection::Settings, KEY_PEOPLE)?
                .unwrap_or_default(),
            rates: self
                .local
                .get(Collection::Settings, KEY_RATES)?
                .unwrap_or_default(),
        };

        if let Some(adapter) = &self.adapter {
            match adapter.load().await {
                Ok(snapshot) => match self.mode {
                    SyncMode::Snapshot => state.apply(snapshot),
                    SyncMode::Entities => self.reconcile(&mut state, snapshot),
                },
                Err(err) => {
                    tracing::warn!("remote load failed, staying on local data: {err}");
                }
            }
        }

        self.persist_all(&state)?;
        *self.state.write().await = state;
        self.bump_revision();

        // deliver any recovered settlements in the background
        if self.outbox.pending() > 0 {
            if let Some(adapter) = &self.adapter {
                let outbox = Arc::clone(&self.outbox);
                let adapter = Arc::clone(adapter);
                tokio::spawn(async move {
                    outbox.flush(&adapter).await;
                });
            }
        }
        Ok(())
    }

    /// Entity-mode reconciliation: the remote is canonical, but a
    /// `settled_by` it lost is recovered from local state and queued for
    /// write-back.
    fn reconcile(&self, state: &mut TripState, snapshot: Snapshot) {
        let outcome = merge_expenses(
            snapshot.expenses.clone().unwrap_or_default(),
            &state.expenses,
        );
        if !outcome.recovered.is_empty() {
            tracing::info!(
                count = outcome.recovered.len(),
                "recovered settlement fields from local state"
            );
            self.outbox.enqueue(&outcome.recovered);
        }
        state.apply(Snapshot {
            expenses: None,
            ..snapshot
        });
        state.expenses = outcome.expenses;
    }

    /// Re-run hydration and reconciliation against the remote on demand.
    pub async fn reload_from_remote(&self) -> Result<()> {
        if self.adapter.is_none() {
            return Err(ClientError::RemoteDisabled);
        }
        self.load().await
    }

    /// Push the full current state now, bypassing the debounce.
    pub async fn push_to_remote(&self) -> Result<()> {
        let adapter = self.adapter.as_ref().ok_or(ClientError::RemoteDisabled)?;
        let snapshot = self.state.read().await.snapshot();
        adapter.push(&snapshot).await
    }

    /// Retry delivery of pending and previously failed outbox entries.
    pub async fn flush_outbox(&self) -> Result<()> {
        let adapter = self.adapter.as_ref().ok_or(ClientError::RemoteDisabled)?;
        self.outbox.retry_failed();
        self.outbox.flush(adapter).await;
        Ok(())
    }

    /// Cancel any armed background push.
    pub fn shutdown(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
    }

    // ==================== observation ====================

    /// Clone of the current state.
    pub async fn state(&self) -> TripState {
        self.state.read().await.clone()
    }

    /// Revision counter that ticks on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// The settlement write-back queue.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Whether the primary local store is unavailable.
    pub fn degraded(&self) -> bool {
        self.local.degraded()
    }

    /// Compute balances and suggested transfers for the current ledger.
    pub async fn settlement(&self) -> Settlement {
        let state = self.state.read().await;
        settle(&state.expenses, &state.people, &state.rates)
    }

    // ==================== checklist ====================

    pub async fn add_checklist_item(&self, text: &str) -> Result<ChecklistItem> {
        let item = match &self.entity {
            // entity mode needs the server-assigned id up front
            Some(entity) => entity.add_checklist(text).await?,
            None => ChecklistItem {
                id: new_id(),
                text: text.to_string(),
                checked: false,
            },
        };
        {
            let mut state = self.state.write().await;
            state.checklist.push(item.clone());
            self.persist_checklist(&state)?;
        }
        self.after_mutation();
        Ok(item)
    }

    pub async fn toggle_checklist_item(&self, id: &str) -> Result<bool> {
        let checked = {
            let mut state = self.state.write().await;
            let item = state
                .checklist
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ClientError::NotFound(format!("checklist item {id}")))?;
            item.checked = !item.checked;
            let checked = item.checked;
            self.persist_checklist(&state)?;
            checked
        };
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.set_checklist_checked(id, checked).await {
                tracing::warn!("remote checklist update failed: {err}");
            }
        }
        self.after_mutation();
        Ok(checked)
    }

    pub async fn delete_checklist_item(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.checklist.retain(|i| i.id != id);
            self.persist_checklist(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.delete_checklist(id).await {
                tracing::warn!("remote checklist delete failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    /// Uncheck every item, keeping the list.
    pub async fn clear_checked(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            for item in &mut state.checklist {
                item.checked = false;
            }
            self.persist_checklist(&state)?;
        }
        self.after_mutation();
        Ok(())
    }

    /// Drop the whole checklist.
    pub async fn reset_checklist(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.checklist.clear();
            self.persist_checklist(&state)?;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== expenses ====================

    pub async fn add_expense(&self, new: NewExpense) -> Result<Expense> {
        let mut expense = Expense {
            id: new_id(),
            item: new.item,
            amount: normalize_amount(new.amount),
            currency: new.currency,
            category: new.category,
            date: new.date,
            timestamp: now_rfc3339(),
            bill_photo: new.bill_photo,
            paid_by: new.paid_by,
            participants: new.participants,
            settled_by: None,
        };
        if let Some(entity) = &self.entity {
            expense.id = entity.add_expense(&expense).await?;
        }
        {
            let mut state = self.state.write().await;
            state.expenses.push(expense.clone());
            self.persist_expenses(&state)?;
        }
        self.after_mutation();
        Ok(expense)
    }

    pub async fn update_expense_amount(&self, id: &str, amount: f64) -> Result<()> {
        let amount = normalize_amount(amount);
        {
            let mut state = self.state.write().await;
            let expense = state
                .expenses
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| ClientError::NotFound(format!("expense {id}")))?;
            expense.amount = amount;
            self.persist_expenses(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.update_expense_amount(id, amount).await {
                tracing::warn!("remote expense update failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    /// Record which participants have reimbursed the payer.
    pub async fn set_expense_settlements(
        &self,
        id: &str,
        settled_by: Vec<PersonName>,
    ) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let expense = state
                .expenses
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| ClientError::NotFound(format!("expense {id}")))?;
            expense.settled_by = if settled_by.is_empty() {
                None
            } else {
                Some(settled_by.clone())
            };
            self.persist_expenses(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.push_settlements(id, &settled_by).await {
                tracing::warn!("remote settlement update failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    pub async fn delete_expense(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.expenses.retain(|e| e.id != id);
            self.persist_expenses(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.delete_expense(id).await {
                tracing::warn!("remote expense delete failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    /// Drop the whole ledger.
    pub async fn reset_expenses(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.expenses.clear();
            self.persist_expenses(&state)?;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== itinerary ====================

    pub async fn add_day(&self, title: &str) -> Result<DayPlan> {
        let id = match &self.entity {
            Some(entity) => entity.add_day(title).await?,
            None => new_id(),
        };
        let day = DayPlan {
            id,
            title: title.to_string(),
            activities: Vec::new(),
        };
        {
            let mut state = self.state.write().await;
            state.itinerary.push(day.clone());
            self.persist_itinerary(&state)?;
        }
        self.after_mutation();
        Ok(day)
    }

    pub async fn delete_day(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.itinerary.retain(|d| d.id != id);
            self.persist_itinerary(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.delete_day(id).await {
                tracing::warn!("remote day delete failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    pub async fn add_activity(&self, day_id: &str, new: NewActivity) -> Result<Activity> {
        let mut activity = Activity {
            id: new_id(),
            title: new.title,
            description: new.description,
            cost: normalize_amount(new.cost),
            currency: new.currency,
            category: new.category,
            map_link: new.map_link,
            arrive_time: new.arrive_time,
            leave_time: new.leave_time,
        };
        if let Some(entity) = &self.entity {
            activity.id = entity.add_activity(day_id, &activity).await?;
        }
        {
            let mut state = self.state.write().await;
            let day = state
                .itinerary
                .iter_mut()
                .find(|d| d.id == day_id)
                .ok_or_else(|| ClientError::NotFound(format!("itinerary day {day_id}")))?;
            day.activities.push(activity.clone());
            self.persist_itinerary(&state)?;
        }
        self.after_mutation();
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        day_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let day = state
                .itinerary
                .iter_mut()
                .find(|d| d.id == day_id)
                .ok_or_else(|| ClientError::NotFound(format!("itinerary day {day_id}")))?;
            let activity = day
                .activities
                .iter_mut()
                .find(|a| a.id == activity_id)
                .ok_or_else(|| ClientError::NotFound(format!("activity {activity_id}")))?;
            patch.apply(activity);
            self.persist_itinerary(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.update_activity(activity_id, &patch).await {
                tracing::warn!("remote activity update failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    pub async fn delete_activity(&self, day_id: &str, activity_id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if let Some(day) = state.itinerary.iter_mut().find(|d| d.id == day_id) {
                day.activities.retain(|a| a.id != activity_id);
            }
            self.persist_itinerary(&state)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.delete_activity(activity_id).await {
                tracing::warn!("remote activity delete failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== notes, people, rates ====================

    /// Notes are shared in snapshot mode; entity mode keeps them local.
    pub async fn set_notes(&self, text: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.notes = text.to_string();
            self.local.set(Collection::Notes, KEY_TEXT, &state.notes)?;
        }
        self.after_mutation();
        Ok(())
    }

    pub async fn set_people(&self, people: Vec<PersonName>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.people = people.clone();
            self.local
                .set(Collection::Settings, KEY_PEOPLE, &state.people)?;
        }
        if let Some(entity) = &self.entity {
            if let Err(err) = entity.replace_members(&people).await {
                tracing::warn!("remote member update failed: {err}");
            }
        }
        self.after_mutation();
        Ok(())
    }

    /// Exchange rates are a device preference; they never sync.
    pub async fn set_rates(&self, rates: Rates) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.rates = rates;
            self.local.set(Collection::Settings, KEY_RATES, &rates)?;
        }
        self.bump_revision();
        Ok(())
    }

    // ==================== import / export ====================

    /// Export the whole trip as a pretty-printed document.
    pub async fn export_data(&self) -> Result<String> {
        let mut snapshot = self.state.read().await.snapshot();
        snapshot.export_date = Some(now_rfc3339());
        Ok(snapshot.to_json_pretty()?)
    }

    /// Import a document: present sections replace local state wholesale,
    /// absent sections are untouched. An unparseable document changes
    /// nothing.
    pub async fn import_data(&self, json: &str) -> Result<()> {
        let snapshot = Snapshot::from_json(json)?;
        {
            let mut state = self.state.write().await;
            state.apply(snapshot);
            self.persist_all(&state)?;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== internals ====================

    fn after_mutation(&self) {
        self.bump_revision();
        if let Some(scheduler) = &self.scheduler {
            scheduler.notify_mutated();
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn persist_checklist(&self, state: &TripState) -> Result<()> {
        self.local
            .set(Collection::Checklist, KEY_ITEMS, &state.checklist)
    }

    fn persist_expenses(&self, state: &TripState) -> Result<()> {
        self.local.put_expenses(&state.expenses)
    }

    fn persist_itinerary(&self, state: &TripState) -> Result<()> {
        self.local
            .set(Collection::Itinerary, KEY_ITEMS, &state.itinerary)
    }

    fn persist_all(&self, state: &TripState) -> Result<()> {
        self.persist_checklist(state)?;
        self.persist_expenses(state)?;
        self.persist_itinerary(state)?;
        self.local.set(Collection::Notes, KEY_TEXT, &state.notes)?;
        self.local
            .set(Collection::Settings, KEY_PEOPLE, &state.people)?;
        self.local
            .set(Collection::Settings, KEY_RATES, &state.rates)?;
        Ok(())
    }
}

impl std::fmt::Debug for TripStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripStore")
            .field("mode", &self.mode)
            .field("degraded", &self.local.degraded())
            .finish_non_exhaustive()
    }
}

fn new_id() -> Id {
    Uuid::new_v4().to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Finite non-negative, same rule the lenient deserializers apply.
fn normalize_amount(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}
