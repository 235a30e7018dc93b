//! Entity adapter: normalized per-row tables scoped by trip id.
//!
//! Reads assemble a [`Snapshot`] from the `checklist`, `expenses`,
//! `itinerary_days`, `itinerary_activities` and `trip_members` tables.
//! Writes happen per mutation through the row CRUD methods below, so the
//! trait-level `push` is a no-op. Notes have no table in this mode and stay
//! device-local.

use crate::config::RemoteConfig;
use crate::error::{ClientError, Result};
use crate::remote::{RemoteAdapter, RestClient, SyncMode};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use valise_engine::{Activity, ChecklistItem, DayPlan, Expense, Id, Snapshot};

#[derive(Debug)]
pub struct EntityAdapter {
    rest: RestClient,
    trip_id: i64,
}

// ==================== row shapes ====================

#[derive(Debug, Deserialize)]
struct ChecklistRow {
    id: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    checked: bool,
}

impl From<ChecklistRow> for ChecklistItem {
    fn from(row: ChecklistRow) -> Self {
        ChecklistItem {
            id: row.id.to_string(),
            text: row.text,
            checked: row.checked,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpenseRow {
    id: i64,
    #[serde(default)]
    item: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    bill_photo: Option<String>,
    #[serde(default)]
    paid_by: Option<String>,
    #[serde(default)]
    participants: Option<Vec<String>>,
    #[serde(default)]
    settled_by: Option<Vec<String>>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id.to_string(),
            item: row.item.unwrap_or_default(),
            amount: row.amount.unwrap_or(0.0).max(0.0),
            currency: valise_engine::Currency::parse_lenient(
                row.currency.as_deref().unwrap_or(""),
            ),
            category: row.category.unwrap_or_default(),
            date: row.date.unwrap_or_default(),
            timestamp: row.created_at.unwrap_or_default(),
            bill_photo: row.bill_photo,
            paid_by: row.paid_by,
            participants: row.participants,
            settled_by: row.settled_by,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DayRow {
    id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    id: i64,
    day_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    map_link: Option<String>,
    #[serde(default)]
    arrive_time: Option<String>,
    #[serde(default)]
    leave_time: Option<String>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: row.id.to_string(),
            title: row.title,
            description: row.description.unwrap_or_default(),
            cost: row.cost.unwrap_or(0.0).max(0.0),
            currency: valise_engine::Currency::parse_lenient(
                row.currency.as_deref().unwrap_or(""),
            ),
            category: row.category.unwrap_or_default(),
            map_link: row.map_link,
            arrive_time: row.arrive_time,
            leave_time: row.leave_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

/// Partial update for one itinerary activity. `None` fields stay untouched
/// on the remote row and in local state.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub currency: Option<valise_engine::Currency>,
    pub category: Option<String>,
    pub map_link: Option<Option<String>>,
    pub arrive_time: Option<Option<String>>,
    pub leave_time: Option<Option<String>>,
}

impl ActivityPatch {
    /// Apply the present fields onto an in-memory activity.
    pub fn apply(&self, activity: &mut Activity) {
        if let Some(title) = &self.title {
            activity.title = title.clone();
        }
        if let Some(description) = &self.description {
            activity.description = description.clone();
        }
        if let Some(cost) = self.cost {
            activity.cost = cost.max(0.0);
        }
        if let Some(currency) = self.currency {
            activity.currency = currency;
        }
        if let Some(category) = &self.category {
            activity.category = category.clone();
        }
        if let Some(map_link) = &self.map_link {
            activity.map_link = map_link.clone();
        }
        if let Some(arrive_time) = &self.arrive_time {
            activity.arrive_time = arrive_time.clone();
        }
        if let Some(leave_time) = &self.leave_time {
            activity.leave_time = leave_time.clone();
        }
    }

    fn to_row(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut row = serde_json::Map::new();
        if let Some(title) = &self.title {
            row.insert("title".into(), json!(title));
        }
        if let Some(description) = &self.description {
            row.insert("description".into(), json!(description));
        }
        if let Some(cost) = self.cost {
            row.insert("cost".into(), json!(cost.max(0.0)));
        }
        if let Some(currency) = self.currency {
            row.insert("currency".into(), json!(currency.code()));
        }
        if let Some(category) = &self.category {
            row.insert("category".into(), json!(category));
        }
        if let Some(map_link) = &self.map_link {
            row.insert("map_link".into(), json!(map_link));
        }
        if let Some(arrive_time) = &self.arrive_time {
            row.insert("arrive_time".into(), json!(arrive_time));
        }
        if let Some(leave_time) = &self.leave_time {
            row.insert("leave_time".into(), json!(leave_time));
        }
        row
    }
}

// sort_order uses wall-clock seconds so rows append in creation order
fn now_sort_order() -> i64 {
    chrono::Utc::now().timestamp()
}

impl EntityAdapter {
    pub fn new(config: &RemoteConfig, trip_id: i64) -> Self {
        Self {
            rest: RestClient::new(config),
            trip_id,
        }
    }

    fn trip_filter(&self) -> (&'static str, String) {
        ("trip_id", format!("eq.{}", self.trip_id))
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .rest
            .request(Method::GET, table)
            .query(query)
            .send()
            .await?;
        Ok(RestClient::check(response).await?.json().await?)
    }

    /// Insert a row and return its server-assigned id.
    async fn insert_returning_id(&self, table: &str, row: serde_json::Value) -> Result<Id> {
        let response = self
            .rest
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .query(&[("select", "id")])
            .json(&row)
            .send()
            .await?;
        let mut rows: Vec<IdRow> = RestClient::check(response).await?.json().await?;
        match rows.pop() {
            Some(row) => Ok(row.id.to_string()),
            None => Err(ClientError::Schema(format!(
                "insert into {table} returned no row"
            ))),
        }
    }

    async fn patch_row(&self, table: &str, id: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .rest
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}")), self.trip_filter()])
            .json(&body)
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<()> {
        let response = self
            .rest
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{id}")), self.trip_filter()])
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    // ==================== checklist ====================

    pub async fn add_checklist(&self, text: &str) -> Result<ChecklistItem> {
        let id = self
            .insert_returning_id(
                "checklist",
                json!({
                    "trip_id": self.trip_id,
                    "text": text,
                    "checked": false,
                    "sort_order": now_sort_order(),
                }),
            )
            .await?;
        Ok(ChecklistItem {
            id,
            text: text.to_string(),
            checked: false,
        })
    }

    pub async fn set_checklist_checked(&self, id: &str, checked: bool) -> Result<()> {
        self.patch_row("checklist", id, json!({ "checked": checked }))
            .await
    }

    pub async fn delete_checklist(&self, id: &str) -> Result<()> {
        self.delete_row("checklist", id).await
    }

    // ==================== expenses ====================

    /// Insert an expense and return the server-assigned id.
    pub async fn add_expense(&self, expense: &Expense) -> Result<Id> {
        self.insert_returning_id(
            "expenses",
            json!({
                "trip_id": self.trip_id,
                "item": expense.item,
                "amount": expense.amount,
                "currency": expense.currency.code(),
                "category": expense.category,
                "date": expense.date,
                "bill_photo": expense.bill_photo,
                "paid_by": expense.paid_by,
                "participants": expense.participants,
                "settled_by": expense.settled_by,
            }),
        )
        .await
    }

    pub async fn update_expense_amount(&self, id: &str, amount: f64) -> Result<()> {
        self.patch_row("expenses", id, json!({ "amount": amount.max(0.0) }))
            .await
    }

    pub async fn delete_expense(&self, id: &str) -> Result<()> {
        self.delete_row("expenses", id).await
    }

    // ==================== itinerary ====================

    pub async fn add_day(&self, title: &str) -> Result<Id> {
        self.insert_returning_id(
            "itinerary_days",
            json!({
                "trip_id": self.trip_id,
                "title": title,
                "sort_order": now_sort_order(),
            }),
        )
        .await
    }

    /// Delete a day; its activities go with it (cascade on the backend).
    pub async fn delete_day(&self, id: &str) -> Result<()> {
        self.delete_row("itinerary_days", id).await
    }

    pub async fn add_activity(&self, day_id: &str, activity: &Activity) -> Result<Id> {
        let day_id: i64 = day_id.parse().map_err(|_| {
            ClientError::Schema(format!("non-numeric day id {day_id:?} in entity mode"))
        })?;
        self.insert_returning_id(
            "itinerary_activities",
            json!({
                "trip_id": self.trip_id,
                "day_id": day_id,
                "title": activity.title,
                "description": activity.description,
                "cost": activity.cost,
                "currency": activity.currency.code(),
                "category": activity.category,
                "map_link": activity.map_link,
                "arrive_time": activity.arrive_time,
                "leave_time": activity.leave_time,
                "sort_order": now_sort_order(),
            }),
        )
        .await
    }

    pub async fn update_activity(&self, id: &str, patch: &ActivityPatch) -> Result<()> {
        let row = patch.to_row();
        if row.is_empty() {
            return Ok(());
        }
        self.patch_row("itinerary_activities", id, serde_json::Value::Object(row))
            .await
    }

    pub async fn delete_activity(&self, id: &str) -> Result<()> {
        self.delete_row("itinerary_activities", id).await
    }

    // ==================== members ====================

    /// Replace the trip roster wholesale: delete then re-insert in order.
    pub async fn replace_members(&self, names: &[String]) -> Result<()> {
        let response = self
            .rest
            .request(Method::DELETE, "trip_members")
            .query(&[self.trip_filter()])
            .send()
            .await?;
        RestClient::check(response).await?;

        if names.is_empty() {
            return Ok(());
        }
        let rows: Vec<serde_json::Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| json!({ "trip_id": self.trip_id, "name": name, "sort_order": i }))
            .collect();
        let response = self
            .rest
            .request(Method::POST, "trip_members")
            .json(&rows)
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for EntityAdapter {
    fn mode(&self) -> SyncMode {
        SyncMode::Entities
    }

    async fn load(&self) -> Result<Snapshot> {
        let checklist: Vec<ChecklistRow> = self
            .fetch(
                "checklist",
                &[
                    self.trip_filter(),
                    ("select", "id,text,checked".to_string()),
                    ("order", "sort_order.asc,id.asc".to_string()),
                ],
            )
            .await?;

        // select=* tolerates backends without the settled_by column;
        // the serde default just leaves the field absent
        let expenses: Vec<ExpenseRow> = self
            .fetch(
                "expenses",
                &[
                    self.trip_filter(),
                    ("select", "*".to_string()),
                    ("order", "date.asc,id.asc".to_string()),
                ],
            )
            .await?;

        let days: Vec<DayRow> = self
            .fetch(
                "itinerary_days",
                &[
                    self.trip_filter(),
                    ("select", "id,title".to_string()),
                    ("order", "sort_order.asc,id.asc".to_string()),
                ],
            )
            .await?;
        let activities: Vec<ActivityRow> = self
            .fetch(
                "itinerary_activities",
                &[
                    self.trip_filter(),
                    ("select", "*".to_string()),
                    ("order", "sort_order.asc,id.asc".to_string()),
                ],
            )
            .await?;
        let mut itinerary: Vec<DayPlan> = days
            .into_iter()
            .map(|d| DayPlan {
                id: d.id.to_string(),
                title: d.title,
                activities: Vec::new(),
            })
            .collect();
        for row in activities {
            let day_id = row.day_id.to_string();
            if let Some(day) = itinerary.iter_mut().find(|d| d.id == day_id) {
                day.activities.push(row.into());
            }
        }

        let members: Vec<MemberRow> = self
            .fetch(
                "trip_members",
                &[
                    self.trip_filter(),
                    ("select", "name".to_string()),
                    ("order", "sort_order.asc".to_string()),
                ],
            )
            .await?;

        Ok(Snapshot {
            checklist: Some(checklist.into_iter().map(Into::into).collect()),
            expenses: Some(expenses.into_iter().map(Into::into).collect()),
            itinerary: Some(itinerary),
            // no notes table in this mode, notes stay local
            notes: None,
            people: Some(members.into_iter().map(|m| m.name).collect()),
            export_date: None,
        })
    }

    // Rows are written per mutation; there is no whole-state push.
    async fn push(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    async fn push_settlements(&self, expense_id: &str, settled_by: &[String]) -> Result<()> {
        self.patch_row("expenses", expense_id, json!({ "settled_by": settled_by }))
            .await
    }
}
