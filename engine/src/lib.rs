//! # Valise Engine
//!
//! The deterministic core of Valise, a local-first trip companion for a
//! small group: shared checklist, expense ledger, itinerary, and debt
//! settlement, synchronized best-effort across devices.
//!
//! This crate is pure logic. It has no knowledge of files, network, or
//! platform; the `valise-client` crate wires it to a durable local store
//! and a remote backend. The same inputs always produce the same outputs.
//!
//! ## Core Concepts
//!
//! ### Model
//!
//! Trip data is a handful of plain collections: [`ChecklistItem`],
//! [`Expense`], and [`DayPlan`] (with its [`Activity`] entries). Every type
//! deserializes leniently — malformed amounts coerce to 0, unknown
//! currencies to THB — so imports and old device payloads never fail on a
//! single bad field.
//!
//! ### Reconciliation
//!
//! [`merge_expenses`] combines remote canonical rows with device-local
//! state. The remote wins for every field it models; a missing
//! `settled_by` is recovered from the local copy by id, then by content
//! signature, each local record consumed at most once. Recoveries are
//! reported for best-effort write-back.
//!
//! ### Settlement
//!
//! [`settle`] turns the ledger and roster into per-person balances and a
//! greedy minimal set of suggested transfers. Balances across the roster
//! always sum to zero within [`settle::EPSILON`].
//!
//! ### Snapshot document
//!
//! [`Snapshot`] is the single-blob exchange format for snapshot-mode sync
//! and for import/export. All sections are optional: a partial payload
//! only overwrites what it carries.
//!
//! ## Quick Start
//!
//! ```rust
//! use valise_engine::{settle, Currency, Expense, Rates};
//!
//! let expense = Expense {
//!     id: "e-1".into(),
//!     item: "Dinner".into(),
//!     amount: 300.0,
//!     currency: Currency::Thb,
//!     category: "Food".into(),
//!     date: "2026-08-20".into(),
//!     timestamp: "2026-08-20T12:00:00Z".into(),
//!     bill_photo: None,
//!     paid_by: Some("Alice".into()),
//!     participants: Some(vec!["Alice".into(), "Bob".into(), "Cara".into()]),
//!     settled_by: None,
//! };
//!
//! let roster = vec!["Alice".to_string(), "Bob".to_string(), "Cara".to_string()];
//! let settlement = settle(&[expense], &roster, &Rates::default());
//!
//! assert_eq!(settlement.balance["Alice"], 200.0);
//! assert_eq!(settlement.transfers.len(), 2);
//! ```

pub mod currency;
pub mod document;
pub mod error;
pub mod merge;
pub mod model;
pub mod settle;

// Re-export main types at crate root
pub use currency::{Currency, Rates};
pub use document::Snapshot;
pub use error::Error;
pub use merge::{merge_expenses, MatchKind, MergeOutcome, RecoveredSettlement};
pub use model::{Activity, ChecklistItem, DayPlan, Expense};
pub use settle::{settle, Obligation, PairTotal, Settlement, Transfer};

/// Type aliases for clarity
pub type Id = String;
pub type PersonName = String;
