//! Trip data model: checklist items, expenses, and itinerary types.
//!
//! All types deserialize leniently: documents written by older clients or
//! hand-edited exports frequently carry numeric strings, missing currencies,
//! or null arrays. Malformed individual fields are coerced to safe defaults
//! (amount 0, currency THB) instead of rejecting the record.

use crate::{Currency, Id, PersonName};
use serde::{Deserialize, Serialize};

/// A single checklist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub id: Id,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub checked: bool,
}

/// A shared expense in the trip ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub id: Id,
    #[serde(default)]
    pub item: String,
    /// Amount in `currency`; normalized to a finite non-negative number.
    #[serde(default, deserialize_with = "de::lenient_amount")]
    pub amount: f64,
    #[serde(default, deserialize_with = "de::lenient_currency")]
    pub currency: Currency,
    #[serde(default)]
    pub category: String,
    /// Calendar date string (YYYY-MM-DD)
    #[serde(default)]
    pub date: String,
    /// Last-write instant (RFC 3339)
    #[serde(default)]
    pub timestamp: String,
    /// Opaque reference to a bill photo (storage path, URL, or data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_photo: Option<String>,
    /// Who fronted the money
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_by: Option<PersonName>,
    /// Names sharing this expense equally; absent means the full roster
    #[serde(default, deserialize_with = "de::lenient_names")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<PersonName>>,
    /// Participants who already reimbursed the payer
    #[serde(default, deserialize_with = "de::lenient_names")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_by: Option<Vec<PersonName>>,
}

impl Expense {
    /// Content signature used as an identity fallback when ids differ
    /// across a snapshot-to-entities migration: normalized item name,
    /// date, amount rounded to 2 decimals, and currency.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{:.2}|{}",
            self.item.trim().to_lowercase(),
            self.date,
            self.amount,
            self.currency
        )
    }

    /// Whether any participant has been recorded as settled.
    pub fn has_settlements(&self) -> bool {
        self.settled_by.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// One planned activity within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Estimated cost in `currency`; normalized like expense amounts.
    #[serde(default, deserialize_with = "de::lenient_amount")]
    pub cost: f64,
    #[serde(default, deserialize_with = "de::lenient_currency")]
    pub currency: Currency,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
    /// "HH:MM" local time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrive_time: Option<String>,
    /// "HH:MM" local time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_time: Option<String>,
}

/// One day of the itinerary with its ordered activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "de::lenient_activities")]
    pub activities: Vec<Activity>,
}

/// Lenient field deserializers shared by the model types.
mod de {
    use crate::{Currency, Id};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Number or string id, normalized to a string. Anything else
    /// becomes empty and must be reassigned by the caller.
    pub fn lenient_id<'de, D>(deserializer: D) -> Result<Id, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        })
    }

    /// Finite non-negative number; numeric strings are parsed,
    /// everything else coerces to 0.
    pub fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let n = match value {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if n.is_finite() && n >= 0.0 {
            Ok(n)
        } else {
            Ok(0.0)
        }
    }

    /// Known currency code (any case), else THB.
    pub fn lenient_currency<'de, D>(deserializer: D) -> Result<Currency, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => Currency::parse_lenient(&s),
            _ => Currency::default(),
        })
    }

    /// Array of names; non-string entries are dropped, non-arrays become None.
    pub fn lenient_names<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }

    /// Truthy flag: bool, or nonzero number, else false.
    pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
            _ => false,
        })
    }

    /// Activity list; a missing or non-array value becomes empty.
    pub fn lenient_activities<'de, D>(
        deserializer: D,
    ) -> Result<Vec<crate::Activity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expense_string_amount_coerces_to_zero() {
        let e: Expense = serde_json::from_value(json!({"item": "Tea", "amount": "abc"})).unwrap();
        assert_eq!(e.item, "Tea");
        assert_eq!(e.amount, 0.0);
        assert_eq!(e.currency, Currency::Thb);
    }

    #[test]
    fn expense_numeric_string_amount_parses() {
        let e: Expense =
            serde_json::from_value(json!({"item": "Taxi", "amount": "120.50"})).unwrap();
        assert_eq!(e.amount, 120.50);
    }

    #[test]
    fn negative_amount_coerces_to_zero() {
        let e: Expense = serde_json::from_value(json!({"item": "Refund", "amount": -30})).unwrap();
        assert_eq!(e.amount, 0.0);
    }

    #[test]
    fn missing_currency_defaults_to_thb() {
        let e: Expense = serde_json::from_value(json!({"item": "Lunch", "amount": 90})).unwrap();
        assert_eq!(e.currency, Currency::Thb);

        let e: Expense =
            serde_json::from_value(json!({"item": "Lunch", "amount": 90, "currency": "EUR"}))
                .unwrap();
        assert_eq!(e.currency, Currency::Thb);
    }

    #[test]
    fn numeric_id_normalizes_to_string() {
        let e: Expense = serde_json::from_value(json!({"id": 42, "item": "Bus"})).unwrap();
        assert_eq!(e.id, "42");

        let e: Expense = serde_json::from_value(json!({"id": "abc-1", "item": "Bus"})).unwrap();
        assert_eq!(e.id, "abc-1");
    }

    #[test]
    fn non_array_participants_become_none() {
        let e: Expense =
            serde_json::from_value(json!({"item": "Dinner", "participants": "Alice"})).unwrap();
        assert!(e.participants.is_none());

        let e: Expense = serde_json::from_value(
            json!({"item": "Dinner", "participants": ["Alice", 7, "Bob"]}),
        )
        .unwrap();
        assert_eq!(e.participants, Some(vec!["Alice".into(), "Bob".into()]));
    }

    #[test]
    fn signature_normalizes_item_and_amount() {
        let a: Expense = serde_json::from_value(json!({
            "item": "  Street Food  ",
            "amount": 100.004,
            "currency": "THB",
            "date": "2026-08-20"
        }))
        .unwrap();
        let b: Expense = serde_json::from_value(json!({
            "item": "street food",
            "amount": 100.0,
            "currency": "THB",
            "date": "2026-08-20"
        }))
        .unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), "street food|2026-08-20|100.00|THB");
    }

    #[test]
    fn signature_distinguishes_currency_and_date() {
        let base = json!({"item": "Coffee", "amount": 60, "date": "2026-08-20", "currency": "THB"});
        let a: Expense = serde_json::from_value(base.clone()).unwrap();

        let mut other = base.clone();
        other["currency"] = json!("JPY");
        let b: Expense = serde_json::from_value(other).unwrap();
        assert_ne!(a.signature(), b.signature());

        let mut other = base;
        other["date"] = json!("2026-08-21");
        let c: Expense = serde_json::from_value(other).unwrap();
        assert_ne!(a.signature(), c.signature());
    }

    #[test]
    fn checklist_truthy_checked() {
        let i: ChecklistItem = serde_json::from_value(json!({"id": 1, "text": "Passport", "checked": 1})).unwrap();
        assert!(i.checked);
        let i: ChecklistItem =
            serde_json::from_value(json!({"id": 2, "text": "Visa"})).unwrap();
        assert!(!i.checked);
    }

    #[test]
    fn day_plan_tolerates_missing_activities() {
        let d: DayPlan = serde_json::from_value(json!({"id": 1, "title": "Day 1"})).unwrap();
        assert!(d.activities.is_empty());

        let d: DayPlan = serde_json::from_value(json!({
            "id": 1,
            "title": "Day 1",
            "activities": [{"id": 1, "title": "Temple", "cost": "500", "currency": "jpy"}]
        }))
        .unwrap();
        assert_eq!(d.activities.len(), 1);
        assert_eq!(d.activities[0].cost, 500.0);
        assert_eq!(d.activities[0].currency, Currency::Jpy);
    }

    #[test]
    fn expense_serialization_roundtrip() {
        let e = Expense {
            id: "e-1".into(),
            item: "Dinner".into(),
            amount: 300.0,
            currency: Currency::Thb,
            category: "Food".into(),
            date: "2026-08-20".into(),
            timestamp: "2026-08-20T12:00:00Z".into(),
            bill_photo: None,
            paid_by: Some("Alice".into()),
            participants: Some(vec!["Alice".into(), "Bob".into()]),
            settled_by: Some(vec!["Bob".into()]),
        };
        let json = serde_json::to_string(&e).unwrap();
        let parsed: Expense = serde_json::from_str(&json).unwrap();
        assert_eq!(e, parsed);
        // wire field names stay camelCase
        assert!(json.contains("\"paidBy\""));
        assert!(json.contains("\"settledBy\""));
    }
}
